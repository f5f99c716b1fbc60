use crate::error::Result;
use crate::model::{
    AccessControlList, ColumnModel, Entity, ExternalS3StorageLocation, ProjectSetting,
    TableUpdateTransaction, WikiHeader, WikiPage,
};

/// Platform operations used by provisioning and wiki publishing.
///
/// Every call is blocking and maps to one logical platform request (async
/// jobs are started and awaited inside a single call).
pub trait SynapseApi {
    fn get_entity(&self, id: &str) -> Result<Entity>;

    fn create_entity(&self, entity: &Entity) -> Result<Entity>;

    /// Id of the child named `name` under `parent_id` (`None` = top-level projects).
    fn find_child(&self, parent_id: Option<&str>, name: &str) -> Result<Option<String>>;

    /// Id of the entity whose ACL governs `id`.
    fn get_benefactor(&self, id: &str) -> Result<String>;

    /// ACL attached to `id` itself; fails with 404 when `id` inherits.
    fn get_acl(&self, id: &str) -> Result<AccessControlList>;

    fn create_acl(&self, acl: &AccessControlList) -> Result<AccessControlList>;

    fn update_acl(&self, acl: &AccessControlList) -> Result<AccessControlList>;

    fn get_column(&self, id: &str) -> Result<ColumnModel>;

    fn create_columns(&self, columns: &[ColumnModel]) -> Result<Vec<ColumnModel>>;

    /// Default (non-annotation) columns for a view over `scope`.
    fn view_scope_columns(&self, scope: &[String], view_type_mask: i64) -> Result<Vec<ColumnModel>>;

    fn table_transaction(&self, request: &TableUpdateTransaction) -> Result<()>;

    /// Wiki headers of `owner_id` in tree order (parents before children).
    fn wiki_headers(&self, owner_id: &str) -> Result<Vec<WikiHeader>>;

    /// `wiki_id = None` fetches the root page.
    fn get_wiki(&self, owner_id: &str, wiki_id: Option<&str>) -> Result<WikiPage>;

    fn create_wiki(&self, owner_id: &str, page: &WikiPage) -> Result<WikiPage>;

    fn update_wiki(&self, owner_id: &str, page: &WikiPage) -> Result<WikiPage>;

    /// Copy the attachments of `wiki_id`, returning the new file handle ids in order.
    fn copy_wiki_attachments(&self, wiki_id: &str, file_handle_ids: &[String]) -> Result<Vec<String>>;

    fn create_storage_location(&self, setting: &ExternalS3StorageLocation) -> Result<i64>;

    fn get_upload_setting(&self, project_id: &str) -> Result<Option<ProjectSetting>>;

    fn create_project_setting(&self, setting: &ProjectSetting) -> Result<ProjectSetting>;

    fn update_project_setting(&self, setting: &ProjectSetting) -> Result<()>;
}
