use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bridgeform_synapse::wiki::publish;
use bridgeform_synapse::SynapseApi;
use bridgeform_wiki::{build_query, LayoutDocument, TargetLayout};
use clap::Subcommand;
use colored::Colorize;

use crate::auth::AuthArgs;

#[derive(Subcommand, Debug)]
pub enum WikiCommands {
    /// Compile a layout target to markdown on stdout.
    Render {
        /// Layout document (YAML).
        #[arg(long)]
        layout: PathBuf,
        /// Target name within the layout document.
        #[arg(long)]
        target: String,
    },

    /// Compile a layout target and store it on the project's wiki.
    Publish {
        #[arg(long)]
        layout: PathBuf,
        #[arg(long)]
        target: String,
        /// Project owning the wiki.
        #[arg(long)]
        project: String,
        /// Compile and resolve the page but do not write it.
        #[arg(long)]
        no_store: bool,
        #[command(flatten)]
        auth: AuthArgs,
    },

    /// Print the SQL of one named query for a table.
    Query {
        /// Query name, e.g. `get_n_users`.
        name: String,
        table_id: String,
    },
}

pub fn cmd_wiki(command: WikiCommands) -> Result<()> {
    match command {
        WikiCommands::Render { layout, target } => {
            let layout = load_target(&layout, &target)?;
            println!("{}", layout.to_markdown());
        }
        WikiCommands::Publish {
            layout,
            target,
            project,
            no_store,
            auth,
        } => {
            let layout = load_target(&layout, &target)?;
            let synapse = auth.connect_synapse()?;
            cmd_publish(&synapse, &project, &layout, !no_store)?;
        }
        WikiCommands::Query { name, table_id } => {
            println!("{}", build_query(&name, &table_id)?);
        }
    }
    Ok(())
}

fn load_target(path: &Path, target: &str) -> Result<TargetLayout> {
    let document = LayoutDocument::from_path(path)?;
    document
        .target(target)
        .with_context(|| format!("selecting target `{target}` from {}", path.display()))
}

pub fn cmd_publish(api: &dyn SynapseApi, project: &str, layout: &TargetLayout, persist: bool) -> Result<()> {
    let markdown = layout.to_markdown();
    let page = publish(api, project, layout.subpage.as_deref(), &markdown, persist)
        .with_context(|| format!("publishing `{}` to {project}", layout.name))?;
    let verb = if persist { "Published".green().bold() } else { "Compiled".yellow().bold() };
    println!(
        "{} {} → {} wiki {} ({} cells, {} bytes)",
        verb,
        layout.name,
        project,
        page.id.as_deref().unwrap_or("?"),
        layout.cells.len(),
        markdown.len()
    );
    Ok(())
}
