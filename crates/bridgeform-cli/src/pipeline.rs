//! Study provisioning as one ordered sequence of stages.
//!
//! expand template → create resources → locate parquet folder / raw-data view /
//! scores folder → owner file + external storage → ACL copy → view schema →
//! parquet dashboard wiki → main dashboard wiki.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use anyhow::{Context, Result};
use bridgeform_aws::ObjectStore;
use bridgeform_synapse::acl::{copy_acl, ReservedPrincipal};
use bridgeform_synapse::formation::{
    create_resources, parse_template, render_template, BRIDGE_RAW_DATA_PLACEHOLDER,
};
use bridgeform_synapse::lookup::{find_folder, find_scoped_view};
use bridgeform_synapse::schema::{adjust_view_columns, ColumnPolicy};
use bridgeform_synapse::storage::bind_external_s3;
use bridgeform_synapse::wiki::{copy_wiki, WikiCopyRequest};
use bridgeform_synapse::{Entity, SynapseApi};
use clap::ValueEnum;
use tracing::{info, info_span};

pub const PARQUET_FOLDER: &str = "parquet";
pub const SCORES_FOLDER: &str = "scores";
pub const OWNER_FILE: &str = "owner.txt";

/// Placeholders in the main dashboard wiki.
pub const SOURCE_TABLE_PLACEHOLDER: &str = "source_table";
pub const SCORE_FOLDER_PLACEHOLDER: &str = "score_folder";

/// Stages that can be turned off with `--skip`.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Storage,
    Acl,
    Schema,
    ParquetWiki,
    DashboardWiki,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Storage => "storage",
            Stage::Acl => "acl",
            Stage::Schema => "schema",
            Stage::ParquetWiki => "parquet-wiki",
            Stage::DashboardWiki => "dashboard-wiki",
        };
        f.write_str(name)
    }
}

/// Base key of the study's parquet prefix: `bridge-downstream/{app}/{study}/parquet/`.
pub fn parquet_base_key(app: &str, study: &str) -> String {
    format!("bridge-downstream/{app}/{study}/parquet/")
}

#[derive(Debug, Clone, PartialEq)]
pub struct WikiSource {
    pub owner_id: String,
    pub sub_page: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProvisionConfig {
    /// Resource template text, before placeholder substitution.
    pub template: String,
    pub parent_project: String,
    pub bridge_raw_data: String,
    pub app: String,
    pub study: String,
    pub parquet_bucket: String,
    /// Contents of `owner.txt`.
    pub owner: Vec<u8>,
    pub dashboard_wiki: WikiSource,
    pub parquet_wiki: WikiSource,
    pub reserved: ReservedPrincipal,
    pub column_policy: ColumnPolicy,
    pub skip: BTreeSet<Stage>,
}

impl ProvisionConfig {
    pub fn runs(&self, stage: Stage) -> bool {
        !self.skip.contains(&stage)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProvisionReport {
    pub created: Vec<Entity>,
    pub parquet_folder: String,
    pub raw_data_view: Option<String>,
    pub scores_folder: Option<String>,
    pub owner_key: Option<String>,
    pub storage_location_id: Option<i64>,
    pub acl_principals: Option<usize>,
    pub schema_changes: Option<usize>,
    pub parquet_wiki_pages: Option<usize>,
    pub dashboard_wiki_pages: Option<usize>,
    pub skipped: Vec<Stage>,
}

pub struct Pipeline<'a> {
    synapse: &'a dyn SynapseApi,
    objects: &'a dyn ObjectStore,
}

fn entity_id(entity: &Entity) -> Result<String> {
    Ok(entity.id()?.to_string())
}

impl<'a> Pipeline<'a> {
    pub fn new(synapse: &'a dyn SynapseApi, objects: &'a dyn ObjectStore) -> Self {
        Self { synapse, objects }
    }

    pub fn run(&self, config: &ProvisionConfig) -> Result<ProvisionReport> {
        let _span = info_span!("provision", project = %config.parent_project).entered();
        let mut report = ProvisionReport {
            skipped: config.skip.iter().copied().collect(),
            ..ProvisionReport::default()
        };

        let text = render_template(
            &config.template,
            &[(BRIDGE_RAW_DATA_PLACEHOLDER, config.bridge_raw_data.as_str())],
        );
        let specs = parse_template(&text).context("parsing resource template")?;
        report.created = create_resources(self.synapse, &specs, Some(&config.parent_project))
            .context("creating template resources")?;

        let created = &report.created;
        report.parquet_folder = entity_id(find_folder(created, PARQUET_FOLDER)?)?;
        if config.runs(Stage::Schema) || config.runs(Stage::DashboardWiki) {
            report.raw_data_view = Some(entity_id(find_scoped_view(created, &config.bridge_raw_data)?)?);
        }
        if config.runs(Stage::DashboardWiki) {
            report.scores_folder = Some(entity_id(find_folder(created, SCORES_FOLDER)?)?);
        }
        let parquet = report.parquet_folder.clone();

        if config.runs(Stage::Storage) {
            let base_key = parquet_base_key(&config.app, &config.study);
            let owner_key = format!("{base_key}{OWNER_FILE}");
            self.objects
                .put_object(&config.parquet_bucket, &owner_key, config.owner.clone())
                .with_context(|| format!("uploading s3://{}/{owner_key}", config.parquet_bucket))?;
            let binding = bind_external_s3(self.synapse, &parquet, &config.parquet_bucket, &base_key, true)
                .context("binding external storage location")?;
            report.owner_key = Some(owner_key);
            report.storage_location_id = Some(binding.storage_location_id);
        }

        if config.runs(Stage::Acl) {
            let acl = copy_acl(self.synapse, &config.bridge_raw_data, &parquet, &config.reserved)
                .context("copying raw data ACL onto the parquet folder")?;
            report.acl_principals = Some(acl.resource_access.len());
        }

        if config.runs(Stage::Schema) {
            if let Some(view) = &report.raw_data_view {
                let transaction = adjust_view_columns(self.synapse, view, &config.column_policy)
                    .context("adjusting raw data view columns")?;
                let changed = transaction
                    .changes
                    .iter()
                    .flat_map(|c| &c.changes)
                    .filter(|c| c.old_column_id != c.new_column_id)
                    .count();
                report.schema_changes = Some(changed);
            }
        }

        if config.runs(Stage::ParquetWiki) {
            let copied = copy_wiki(
                self.synapse,
                &WikiCopyRequest {
                    source_id: config.parquet_wiki.owner_id.clone(),
                    destination_id: parquet.clone(),
                    source_sub_page: config.parquet_wiki.sub_page.clone(),
                    entity_map: BTreeMap::new(),
                },
            )
            .context("copying parquet dashboard wiki")?;
            report.parquet_wiki_pages = Some(copied.pages.len());
        }

        if config.runs(Stage::DashboardWiki) {
            if let (Some(view), Some(scores)) = (&report.raw_data_view, &report.scores_folder) {
                let entity_map = BTreeMap::from([
                    (SOURCE_TABLE_PLACEHOLDER.to_string(), view.clone()),
                    (SCORE_FOLDER_PLACEHOLDER.to_string(), scores.clone()),
                ]);
                let copied = copy_wiki(
                    self.synapse,
                    &WikiCopyRequest {
                        source_id: config.dashboard_wiki.owner_id.clone(),
                        destination_id: config.parent_project.clone(),
                        source_sub_page: config.dashboard_wiki.sub_page.clone(),
                        entity_map,
                    },
                )
                .context("copying dashboard wiki")?;
                report.dashboard_wiki_pages = Some(copied.pages.len());
            }
        }

        info!(
            created = report.created.len(),
            parquet_folder = %report.parquet_folder,
            skipped = report.skipped.len(),
            "provisioning finished"
        );
        Ok(report)
    }
}
