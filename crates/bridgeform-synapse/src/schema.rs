//! File-view column adjustment.
//!
//! String annotation columns of a freshly created raw-data view are sized from
//! the first files the view sees, which is too small for later uploads, and
//! several of them are really dates, booleans or integers.

use std::collections::BTreeSet;

use tracing::info;

use crate::api::SynapseApi;
use crate::error::{Result, SynapseError};
use crate::model::{ColumnChange, ColumnModel, ColumnType, TableSchemaChange, TableUpdateTransaction};

fn names(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnPolicy {
    /// STRING columns left exactly as they are.
    pub ignore: BTreeSet<String>,
    pub date: BTreeSet<String>,
    pub boolean: BTreeSet<String>,
    pub integer: BTreeSet<String>,
    /// STRING columns that get `xl_string_length`.
    pub xl_string: BTreeSet<String>,
    pub default_string_length: i64,
    pub xl_string_length: i64,
}

impl Default for ColumnPolicy {
    fn default() -> Self {
        Self {
            ignore: names(&["name", "etag", "type"]),
            date: names(&["exportedOn", "eventTimestamp", "uploadedOn", "scheduleModifiedOn"]),
            boolean: names(&["timeWindowPersistent"]),
            integer: names(&[
                "sessionInstanceStartDay",
                "sessionInstanceEndDay",
                "assessmentRevision",
                "participantVersion",
            ]),
            xl_string: names(&["clientInfo"]),
            default_string_length: 128,
            xl_string_length: 512,
        }
    }
}

impl ColumnPolicy {
    /// Replacement for `column` (without id), or `None` to keep it.
    pub fn plan(&self, column: &ColumnModel) -> Option<ColumnModel> {
        if column.column_type != ColumnType::String || self.ignore.contains(&column.name) {
            return None;
        }
        let mut next = column.clone();
        next.id = None;
        let name = column.name.as_str();
        let (column_type, maximum_size) = if self.date.contains(name) {
            (ColumnType::Date, None)
        } else if self.boolean.contains(name) {
            (ColumnType::Boolean, None)
        } else if self.integer.contains(name) {
            (ColumnType::Integer, None)
        } else if self.xl_string.contains(name) {
            (ColumnType::String, Some(self.xl_string_length))
        } else {
            (ColumnType::String, Some(self.default_string_length))
        };
        next.column_type = column_type;
        next.maximum_size = maximum_size;
        Some(next)
    }
}

/// Retype/resize the view's columns and submit one schema transaction.
pub fn adjust_view_columns(
    api: &dyn SynapseApi,
    view_id: &str,
    policy: &ColumnPolicy,
) -> Result<TableUpdateTransaction> {
    let view = api.get_entity(view_id)?;
    let columns = view
        .column_ids
        .iter()
        .map(|id| api.get_column(id))
        .collect::<Result<Vec<_>>>()?;

    let planned: Vec<Option<ColumnModel>> = columns.iter().map(|c| policy.plan(c)).collect();
    let to_create: Vec<ColumnModel> = planned.iter().flatten().cloned().collect();
    let mut created = api.create_columns(&to_create)?.into_iter();

    let mut changes = Vec::with_capacity(columns.len());
    for (old, plan) in columns.iter().zip(&planned) {
        let old_id = old.id.clone().unwrap_or_default();
        let new_id = match plan {
            Some(_) => created
                .next()
                .and_then(|c| c.id)
                .ok_or_else(|| SynapseError::MissingId(old.name.clone()))?,
            None => old_id.clone(),
        };
        changes.push(ColumnChange {
            old_column_id: old_id,
            new_column_id: new_id,
        });
    }

    let transaction = TableUpdateTransaction::schema_change(TableSchemaChange::new(view_id, changes));
    api.table_transaction(&transaction)?;
    info!(
        view_id,
        changed = to_create.len(),
        total = columns.len(),
        "adjusted file view columns"
    );
    Ok(transaction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemorySynapse;
    use crate::model::{Entity, EntityKind};

    fn string(name: &str, size: i64) -> ColumnModel {
        ColumnModel::new(name, ColumnType::String, Some(size))
    }

    #[test]
    fn plan_follows_policy() {
        let policy = ColumnPolicy::default();
        assert_eq!(policy.plan(&string("name", 256)), None);
        assert_eq!(
            policy.plan(&ColumnModel::new("createdOn", ColumnType::Date, None)),
            None
        );

        let date = policy.plan(&string("uploadedOn", 50)).unwrap();
        assert_eq!((date.column_type, date.maximum_size), (ColumnType::Date, None));
        let flag = policy.plan(&string("timeWindowPersistent", 5)).unwrap();
        assert_eq!(flag.column_type, ColumnType::Boolean);
        let day = policy.plan(&string("sessionInstanceEndDay", 3)).unwrap();
        assert_eq!(day.column_type, ColumnType::Integer);
        let info = policy.plan(&string("clientInfo", 50)).unwrap();
        assert_eq!(info.maximum_size, Some(512));
        let other = policy.plan(&string("recordId", 36)).unwrap();
        assert_eq!(
            (other.column_type, other.maximum_size),
            (ColumnType::String, Some(128))
        );
    }

    #[test]
    fn transaction_maps_every_column_in_order() {
        let synapse = InMemorySynapse::new();
        let keep = synapse.insert_column(string("name", 256));
        let widen = synapse.insert_column(string("recordId", 36));
        let number = synapse.insert_column(ColumnModel::new("createdOn", ColumnType::Date, None));
        let retype = synapse.insert_column(string("exportedOn", 30));

        let mut view = Entity::new(EntityKind::EntityView, "raw view", None);
        view.column_ids = vec![keep.clone(), widen.clone(), number.clone(), retype.clone()];
        let view_id = synapse.insert_entity(view);

        let tx = adjust_view_columns(&synapse, &view_id, &ColumnPolicy::default()).unwrap();
        let changes = &tx.changes[0].changes;
        assert_eq!(changes.len(), 4);
        assert_eq!(changes[0].new_column_id, keep);
        assert_ne!(changes[1].new_column_id, widen);
        assert_eq!(changes[2].new_column_id, number);
        assert_ne!(changes[3].new_column_id, retype);

        let widened = synapse.column(&changes[1].new_column_id).unwrap();
        assert_eq!(widened.maximum_size, Some(128));
        let dated = synapse.column(&changes[3].new_column_id).unwrap();
        assert_eq!(dated.column_type, ColumnType::Date);

        assert_eq!(synapse.transactions().len(), 1);
        assert_eq!(
            synapse.entity(&view_id).unwrap().column_ids,
            tx.changes[0].ordered_column_ids
        );
    }
}
