use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use bridgeform_aws::{InMemoryObjectStore, ObjectStore, S3Client};
use bridgeform_synapse::acl::{admin_access, ReservedPrincipal, BRIDGE_DOWNSTREAM_PRINCIPAL};
use bridgeform_synapse::schema::ColumnPolicy;
use clap::Args;
use colored::Colorize;

use crate::auth::AuthArgs;
use crate::pipeline::{parquet_base_key, Pipeline, ProvisionConfig, ProvisionReport, Stage, WikiSource};

pub const DEFAULT_PARQUET_BUCKET: &str = "bridge-downstream-dev-parquet";
pub const DEFAULT_WIKI: &str = "syn26546076";
pub const DEFAULT_WIKI_SUB_PAGE: &str = "620218";
pub const DEFAULT_PARQUET_WIKI_SUB_PAGE: &str = "620176";

#[derive(Args, Debug, Clone)]
pub struct ProvisionArgs {
    /// Resource template (YAML); `{bridge_raw_data}` is replaced with --bridge-raw-data.
    #[arg(long)]
    pub template: PathBuf,

    /// Project the template resources are created in.
    #[arg(long)]
    pub parent_project: String,

    /// The study's "Bridge Raw Data" folder.
    #[arg(long)]
    pub bridge_raw_data: String,

    /// Bridge app identifier (first path component under bridge-downstream/).
    #[arg(long)]
    pub app: String,

    /// Bridge study identifier.
    #[arg(long)]
    pub study: String,

    /// File uploaded as owner.txt; defaults to the authenticated user's name.
    #[arg(long)]
    pub owner_txt: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_PARQUET_BUCKET)]
    pub parquet_bucket: String,

    /// Entity whose wiki holds the main dashboard template.
    #[arg(long, default_value = DEFAULT_WIKI)]
    pub wiki: String,

    #[arg(long, default_value = DEFAULT_WIKI_SUB_PAGE)]
    pub wiki_sub_page: String,

    /// Entity whose wiki holds the parquet dashboard template.
    #[arg(long, default_value = DEFAULT_WIKI)]
    pub parquet_wiki: String,

    #[arg(long, default_value = DEFAULT_PARQUET_WIKI_SUB_PAGE)]
    pub parquet_wiki_sub_page: String,

    /// Principal excluded from the ACL copy and granted admin access instead.
    #[arg(long, default_value_t = BRIDGE_DOWNSTREAM_PRINCIPAL)]
    pub reserved_principal: i64,

    /// Stage to skip (repeatable).
    #[arg(long, value_enum)]
    pub skip: Vec<Stage>,

    #[command(flatten)]
    pub auth: AuthArgs,
}

fn sub_page(raw: &str) -> Option<String> {
    let raw = raw.trim();
    (!raw.is_empty()).then(|| raw.to_string())
}

impl ProvisionArgs {
    pub fn to_config(&self, owner: Vec<u8>) -> Result<ProvisionConfig> {
        let template = fs::read_to_string(&self.template)
            .with_context(|| format!("reading template {}", self.template.display()))?;
        Ok(ProvisionConfig {
            template,
            parent_project: self.parent_project.clone(),
            bridge_raw_data: self.bridge_raw_data.clone(),
            app: self.app.clone(),
            study: self.study.clone(),
            parquet_bucket: self.parquet_bucket.clone(),
            owner,
            dashboard_wiki: WikiSource {
                owner_id: self.wiki.clone(),
                sub_page: sub_page(&self.wiki_sub_page),
            },
            parquet_wiki: WikiSource {
                owner_id: self.parquet_wiki.clone(),
                sub_page: sub_page(&self.parquet_wiki_sub_page),
            },
            reserved: ReservedPrincipal {
                principal_id: self.reserved_principal,
                access: admin_access(),
            },
            column_policy: ColumnPolicy::default(),
            skip: self.skip.iter().copied().collect(),
        })
    }
}

pub fn cmd_provision(args: &ProvisionArgs) -> Result<()> {
    println!(
        "{} {} under {}",
        "Provisioning".green().bold(),
        args.template.display(),
        args.parent_project
    );

    let synapse = args.auth.connect_synapse()?;
    let owner = match &args.owner_txt {
        Some(path) => fs::read(path).with_context(|| format!("reading {}", path.display()))?,
        None => synapse.user_profile()?.user_name.into_bytes(),
    };
    let config = args.to_config(owner)?;
    // No upload happens without the storage stage.
    let objects: Box<dyn ObjectStore> = if config.runs(Stage::Storage) {
        Box::new(S3Client::new(args.auth.aws_config()?, args.auth.aws_credentials()?)?)
    } else {
        Box::new(InMemoryObjectStore::new())
    };

    let report = Pipeline::new(&synapse, objects.as_ref()).run(&config)?;
    print_report(&config, &report);
    Ok(())
}

fn print_report(config: &ProvisionConfig, report: &ProvisionReport) {
    println!("  {} {} resources", "→".cyan(), report.created.len());
    for entity in &report.created {
        println!(
            "      {} {}",
            entity.id.as_deref().unwrap_or("?").bold(),
            entity.name
        );
    }
    println!("  {} parquet folder {}", "→".cyan(), report.parquet_folder);
    if let (Some(key), Some(location)) = (&report.owner_key, report.storage_location_id) {
        println!(
            "  {} s3://{}/{} (storage location {})",
            "→".cyan(),
            config.parquet_bucket,
            key,
            location
        );
        println!(
            "  {} base key {}",
            "→".cyan(),
            parquet_base_key(&config.app, &config.study)
        );
    }
    if let Some(principals) = report.acl_principals {
        println!("  {} ACL copied ({} principals)", "→".cyan(), principals);
    }
    if let (Some(view), Some(changes)) = (&report.raw_data_view, report.schema_changes) {
        println!("  {} {} columns adjusted on {}", "→".cyan(), changes, view);
    }
    if let Some(pages) = report.parquet_wiki_pages {
        println!("  {} parquet wiki: {} pages", "→".cyan(), pages);
    }
    if let Some(pages) = report.dashboard_wiki_pages {
        println!("  {} dashboard wiki: {} pages", "→".cyan(), pages);
    }
    for stage in &report.skipped {
        println!("  {} skipped {}", "→".yellow(), stage);
    }
}
