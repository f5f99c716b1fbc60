//! Wire types for the Synapse REST API (camelCase JSON).
//!
//! Only the fields the provisioning tools read or write are typed; anything
//! else an entity or wiki page carries is kept in `extra` so that a
//! read-modify-write round trip does not drop it.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, SynapseError};

// ============================================================================
// Entities
// ============================================================================

pub const PROJECT_TYPE: &str = "org.sagebionetworks.repo.model.Project";
pub const FOLDER_TYPE: &str = "org.sagebionetworks.repo.model.Folder";
pub const ENTITY_VIEW_TYPE: &str = "org.sagebionetworks.repo.model.table.EntityView";

/// View type mask bit for files.
pub const VIEW_TYPE_FILE: i64 = 0x01;

/// The entity kinds a resource template can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    Project,
    Folder,
    EntityView,
}

impl EntityKind {
    pub fn concrete_type(self) -> &'static str {
        match self {
            EntityKind::Project => PROJECT_TYPE,
            EntityKind::Folder => FOLDER_TYPE,
            EntityKind::EntityView => ENTITY_VIEW_TYPE,
        }
    }

    pub fn from_concrete_type(concrete_type: &str) -> Option<Self> {
        match concrete_type {
            PROJECT_TYPE => Some(EntityKind::Project),
            FOLDER_TYPE => Some(EntityKind::Folder),
            ENTITY_VIEW_TYPE => Some(EntityKind::EntityView),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Project => "Project",
            EntityKind::Folder => "Folder",
            EntityKind::EntityView => "EntityView",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub concrete_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scope_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_type_mask: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub column_ids: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Entity {
    pub fn new(kind: EntityKind, name: impl Into<String>, parent_id: Option<&str>) -> Self {
        Self {
            concrete_type: kind.concrete_type().to_string(),
            id: None,
            name: name.into(),
            parent_id: parent_id.map(str::to_string),
            etag: None,
            scope_ids: Vec::new(),
            view_type_mask: None,
            column_ids: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn kind(&self) -> Option<EntityKind> {
        EntityKind::from_concrete_type(&self.concrete_type)
    }

    pub fn is(&self, kind: EntityKind) -> bool {
        self.concrete_type == kind.concrete_type()
    }

    /// The assigned id; entities returned by the platform always carry one.
    pub fn id(&self) -> Result<&str> {
        self.id
            .as_deref()
            .ok_or_else(|| SynapseError::MissingId(self.name.clone()))
    }
}

/// Strip the `syn` prefix: scope ids come back from the platform as bare numbers.
pub fn numeric_id(id: &str) -> &str {
    let trimmed = id.trim();
    match trimmed.get(..3) {
        Some(prefix) if prefix.eq_ignore_ascii_case("syn") => &trimmed[3..],
        _ => trimmed,
    }
}

pub fn same_id(a: &str, b: &str) -> bool {
    numeric_id(a) == numeric_id(b)
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntityId {
    pub id: String,
}

// ============================================================================
// Access control
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessType {
    Create,
    Read,
    Update,
    Delete,
    ChangePermissions,
    Download,
    Upload,
    Participate,
    Submit,
    ReadPrivateSubmission,
    UpdateSubmission,
    DeleteSubmission,
    TeamMembershipUpdate,
    SendMessage,
    ChangeSettings,
    Moderate,
    ReviewSubmissions,
    ExemptionEligible,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAccess {
    pub principal_id: i64,
    pub access_type: BTreeSet<AccessType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessControlList {
    /// Id of the entity the ACL is attached to.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default)]
    pub resource_access: Vec<ResourceAccess>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AccessControlList {
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            id: entity_id.into(),
            etag: None,
            resource_access: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn access_for(&self, principal_id: i64) -> Option<&BTreeSet<AccessType>> {
        self.resource_access
            .iter()
            .find(|ra| ra.principal_id == principal_id)
            .map(|ra| &ra.access_type)
    }
}

// ============================================================================
// Tables
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColumnType {
    String,
    Double,
    Integer,
    Boolean,
    Date,
    Filehandleid,
    Entityid,
    Submissionid,
    Evaluationid,
    Link,
    Mediumtext,
    Largetext,
    Userid,
    StringList,
    IntegerList,
    BooleanList,
    DateList,
    EntityidList,
    UseridList,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnModel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub column_type: ColumnType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_size: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ColumnModel {
    pub fn new(name: impl Into<String>, column_type: ColumnType, maximum_size: Option<i64>) -> Self {
        Self {
            id: None,
            name: name.into(),
            column_type,
            maximum_size,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnChange {
    pub old_column_id: String,
    pub new_column_id: String,
}

pub const SCHEMA_CHANGE_TYPE: &str = "org.sagebionetworks.repo.model.table.TableSchemaChangeRequest";
pub const TRANSACTION_TYPE: &str =
    "org.sagebionetworks.repo.model.table.TableUpdateTransactionRequest";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchemaChange {
    pub concrete_type: String,
    pub entity_id: String,
    pub changes: Vec<ColumnChange>,
    pub ordered_column_ids: Vec<String>,
}

impl TableSchemaChange {
    pub fn new(entity_id: impl Into<String>, changes: Vec<ColumnChange>) -> Self {
        let ordered_column_ids = changes.iter().map(|c| c.new_column_id.clone()).collect();
        Self {
            concrete_type: SCHEMA_CHANGE_TYPE.to_string(),
            entity_id: entity_id.into(),
            changes,
            ordered_column_ids,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableUpdateTransaction {
    pub concrete_type: String,
    pub entity_id: String,
    pub changes: Vec<TableSchemaChange>,
}

impl TableUpdateTransaction {
    pub fn schema_change(change: TableSchemaChange) -> Self {
        Self {
            concrete_type: TRANSACTION_TYPE.to_string(),
            entity_id: change.entity_id.clone(),
            changes: vec![change],
        }
    }
}

// ============================================================================
// Wikis
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WikiHeader {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WikiPage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub markdown: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_wiki_id: Option<String>,
    #[serde(default)]
    pub attachment_file_handle_ids: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// Storage
// ============================================================================

pub const EXTERNAL_S3_TYPE: &str =
    "org.sagebionetworks.repo.model.project.ExternalS3StorageLocationSetting";
pub const UPLOAD_SETTING_TYPE: &str =
    "org.sagebionetworks.repo.model.project.UploadDestinationListSetting";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalS3StorageLocation {
    pub concrete_type: String,
    pub bucket: String,
    pub base_key: String,
    pub sts_enabled: bool,
    pub upload_type: String,
}

impl ExternalS3StorageLocation {
    pub fn new(bucket: impl Into<String>, base_key: impl Into<String>, sts_enabled: bool) -> Self {
        Self {
            concrete_type: EXTERNAL_S3_TYPE.to_string(),
            bucket: bucket.into(),
            base_key: base_key.into(),
            sts_enabled,
            upload_type: "S3".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageLocationId {
    pub storage_location_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSetting {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    pub concrete_type: String,
    pub project_id: String,
    pub settings_type: String,
    #[serde(default)]
    pub locations: Vec<i64>,
}

impl ProjectSetting {
    pub fn upload(project_id: impl Into<String>, locations: Vec<i64>) -> Self {
        Self {
            id: None,
            etag: None,
            concrete_type: UPLOAD_SETTING_TYPE.to_string(),
            project_id: project_id.into(),
            settings_type: "upload".to_string(),
            locations,
        }
    }
}
