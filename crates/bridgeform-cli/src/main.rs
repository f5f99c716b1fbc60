//! Bridgeform CLI
//!
//! - `provision`: create a study's downstream resources on Synapse (folders,
//!   raw-data view, external parquet storage, ACLs, dashboard wikis)
//! - `wiki`: compile YAML dashboard layouts to wiki markdown and publish them

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

mod auth;
mod logging;
mod pipeline;
mod provision;
mod wiki_cmd;

#[derive(Parser)]
#[command(name = "bridgeform")]
#[command(author, version, about = "Bridgeform: Synapse provisioning and dashboards for Bridge studies")]
struct Cli {
    /// Debug-level logging for bridgeform crates (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand a resource template under a project and wire up storage, ACLs,
    /// the raw-data view schema and the dashboard wikis.
    Provision(provision::ProvisionArgs),

    /// Dashboard layouts: render, publish, inspect queries.
    Wiki {
        #[command(subcommand)]
        command: wiki_cmd::WikiCommands,
    },
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Provision(args) => provision::cmd_provision(&args),
        Commands::Wiki { command } => wiki_cmd::cmd_wiki(command),
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = logging::init(cli.verbose) {
        eprintln!("{} {err:#}", "warning:".yellow().bold());
    }

    if let Err(err) = run(cli) {
        tracing::error!(error = %format!("{err:#}"), "command failed");
        eprintln!("{} {err:#}", "error:".red().bold());
        std::process::exit(1);
    }
}
