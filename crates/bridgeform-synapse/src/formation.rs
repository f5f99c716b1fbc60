//! Resource templates: declarative get-or-create of projects, folders and views.
//!
//! ```yaml
//! - name: parquet
//!   type: Folder
//! - name: scores
//!   type: Folder
//! - name: Bridge Raw Data View
//!   type: EntityView
//!   scope: ["{bridge_raw_data}"]
//!   columns:
//!     - { name: recordId, column_type: STRING, maximum_size: 36 }
//! - name: examples
//!   type: Folder
//!   acl:
//!     - { principal_id: 273948, access_type: [READ, DOWNLOAD] }
//!   children:
//!     - { name: notebooks, type: Folder }
//! ```
//!
//! Placeholders such as `{bridge_raw_data}` are substituted in the raw text
//! before parsing.

use std::collections::BTreeSet;

use serde::Deserialize;
use tracing::{debug, info};

use crate::acl;
use crate::api::SynapseApi;
use crate::error::{Result, SynapseError};
use crate::model::{AccessType, ColumnModel, ColumnType, Entity, EntityKind, ResourceAccess, VIEW_TYPE_FILE};

pub const BRIDGE_RAW_DATA_PLACEHOLDER: &str = "{bridge_raw_data}";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntityKind,
    #[serde(default)]
    pub acl: Vec<AclSpec>,
    #[serde(default)]
    pub children: Vec<ResourceSpec>,
    /// EntityView only.
    #[serde(default)]
    pub scope: Vec<String>,
    #[serde(default)]
    pub view_type_mask: Option<i64>,
    #[serde(default)]
    pub include_default_columns: Option<bool>,
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AclSpec {
    pub principal_id: i64,
    pub access_type: BTreeSet<AccessType>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
    #[serde(default)]
    pub maximum_size: Option<i64>,
}

/// Replace each `(placeholder, value)` in the template text.
pub fn render_template(text: &str, substitutions: &[(&str, &str)]) -> String {
    substitutions
        .iter()
        .fold(text.to_string(), |acc, (from, to)| acc.replace(from, to))
}

pub fn parse_template(text: &str) -> Result<Vec<ResourceSpec>> {
    Ok(serde_yaml::from_str(text)?)
}

/// Create (or reuse) every resource under `parent_id`, children under their
/// parent. Returns the entities in declaration order (pre-order).
pub fn create_resources(
    api: &dyn SynapseApi,
    specs: &[ResourceSpec],
    parent_id: Option<&str>,
) -> Result<Vec<Entity>> {
    let mut created = Vec::new();
    create_into(api, specs, parent_id, &mut created)?;
    info!(count = created.len(), parent_id = ?parent_id, "expanded resource template");
    Ok(created)
}

fn create_into(
    api: &dyn SynapseApi,
    specs: &[ResourceSpec],
    parent_id: Option<&str>,
    out: &mut Vec<Entity>,
) -> Result<()> {
    for spec in specs {
        let entity = get_or_create(api, spec, parent_id)?;
        let id = entity.id()?.to_string();
        if !spec.acl.is_empty() {
            let entries: Vec<ResourceAccess> = spec
                .acl
                .iter()
                .map(|a| ResourceAccess {
                    principal_id: a.principal_id,
                    access_type: a.access_type.clone(),
                })
                .collect();
            acl::set_permissions(api, &id, &entries, true)?;
        }
        out.push(entity);
        create_into(api, &spec.children, Some(&id), out)?;
    }
    Ok(())
}

fn get_or_create(api: &dyn SynapseApi, spec: &ResourceSpec, parent_id: Option<&str>) -> Result<Entity> {
    // Projects live at the top level regardless of where they are declared.
    let parent_id = match spec.kind {
        EntityKind::Project => None,
        _ => parent_id,
    };

    if let Some(existing_id) = api.find_child(parent_id, &spec.name)? {
        let existing = api.get_entity(&existing_id)?;
        if !existing.is(spec.kind) {
            return Err(SynapseError::KindMismatch {
                name: spec.name.clone(),
                expected: spec.kind.to_string(),
                found: existing.concrete_type,
            });
        }
        debug!(name = %spec.name, id = %existing_id, "reusing existing resource");
        return Ok(existing);
    }

    let mut entity = Entity::new(spec.kind, spec.name.clone(), parent_id);
    if spec.kind == EntityKind::EntityView {
        entity.scope_ids = spec.scope.clone();
        let mask = spec.view_type_mask.unwrap_or(VIEW_TYPE_FILE);
        entity.view_type_mask = Some(mask);

        let mut columns = if spec.include_default_columns.unwrap_or(true) {
            api.view_scope_columns(&spec.scope, mask)?
        } else {
            Vec::new()
        };
        for column in &spec.columns {
            columns.retain(|c| c.name != column.name);
            columns.push(ColumnModel::new(
                column.name.clone(),
                column.column_type,
                column.maximum_size,
            ));
        }
        entity.column_ids = api
            .create_columns(&columns)?
            .into_iter()
            .map(|c| c.id.ok_or_else(|| SynapseError::MissingId(c.name)))
            .collect::<Result<Vec<_>>>()?;
    }

    let created = api.create_entity(&entity)?;
    info!(name = %created.name, id = ?created.id, kind = %spec.kind, "created resource");
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemorySynapse;

    const TEMPLATE: &str = r#"
- name: parquet
  type: Folder
- name: Bridge Raw Data View
  type: EntityView
  scope: ["{bridge_raw_data}"]
  columns:
    - { name: recordId, column_type: STRING, maximum_size: 36 }
- name: examples
  type: Folder
  acl:
    - { principal_id: 273948, access_type: [READ, DOWNLOAD] }
  children:
    - { name: notebooks, type: Folder }
"#;

    fn project(synapse: &InMemorySynapse) -> String {
        synapse.insert_entity(Entity::new(EntityKind::Project, "Study", None))
    }

    #[test]
    fn placeholder_is_substituted_before_parsing() {
        let text = render_template(TEMPLATE, &[(BRIDGE_RAW_DATA_PLACEHOLDER, "syn777")]);
        let specs = parse_template(&text).unwrap();
        assert_eq!(specs[1].scope, vec!["syn777"]);
        assert_eq!(specs[2].children[0].kind, EntityKind::Folder);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            parse_template("- { name: x, type: Folder, colour: blue }"),
            Err(SynapseError::Template(_))
        ));
    }

    #[test]
    fn resources_created_in_preorder() {
        let synapse = InMemorySynapse::new();
        synapse.set_view_defaults(vec![
            ColumnModel::new("id", ColumnType::Entityid, None),
            ColumnModel::new("recordId", ColumnType::String, Some(50)),
        ]);
        let parent = project(&synapse);
        let specs =
            parse_template(&render_template(TEMPLATE, &[(BRIDGE_RAW_DATA_PLACEHOLDER, "syn777")]))
                .unwrap();

        let created = create_resources(&synapse, &specs, Some(&parent)).unwrap();
        let names: Vec<_> = created.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["parquet", "Bridge Raw Data View", "examples", "notebooks"]);

        let view = &created[1];
        assert!(view.is(EntityKind::EntityView));
        assert_eq!(view.view_type_mask, Some(VIEW_TYPE_FILE));
        assert_eq!(view.column_ids.len(), 2);
        let record = synapse.column(&view.column_ids[1]).unwrap();
        assert_eq!(record.maximum_size, Some(36));

        assert_eq!(created[3].parent_id, created[2].id);
        let examples_acl = synapse.local_acl(created[2].id.as_deref().unwrap()).unwrap();
        assert_eq!(examples_acl.access_for(273948).unwrap().len(), 2);
    }

    #[test]
    fn existing_resources_are_reused() {
        let synapse = InMemorySynapse::new();
        let parent = project(&synapse);
        let specs = parse_template("- { name: parquet, type: Folder }").unwrap();
        let first = create_resources(&synapse, &specs, Some(&parent)).unwrap();
        let second = create_resources(&synapse, &specs, Some(&parent)).unwrap();
        assert_eq!(first[0].id, second[0].id);
    }

    #[test]
    fn existing_resource_of_other_kind_is_an_error() {
        let synapse = InMemorySynapse::new();
        let parent = project(&synapse);
        create_resources(
            &synapse,
            &parse_template("- { name: parquet, type: Folder }").unwrap(),
            Some(&parent),
        )
        .unwrap();
        let err = create_resources(
            &synapse,
            &parse_template("- { name: parquet, type: EntityView, scope: [syn1] }").unwrap(),
            Some(&parent),
        )
        .unwrap_err();
        assert!(matches!(err, SynapseError::KindMismatch { .. }));
    }
}
