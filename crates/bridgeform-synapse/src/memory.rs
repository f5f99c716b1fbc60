//! In-process platform used by tests and local rehearsals.
//!
//! Mirrors the platform behaviour the provisioning steps depend on: name
//! uniqueness among siblings, ACL inheritance through the parent chain, a
//! single root wiki per owner, and optimistic-concurrency-free updates.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;

use crate::api::SynapseApi;
use crate::error::{Result, SynapseError};
use crate::model::{
    AccessControlList, ColumnModel, Entity, EntityKind, ExternalS3StorageLocation, ProjectSetting,
    TableUpdateTransaction, WikiHeader, WikiPage,
};

#[derive(Default)]
struct State {
    next_id: u64,
    entities: BTreeMap<String, Entity>,
    acls: HashMap<String, AccessControlList>,
    columns: BTreeMap<String, ColumnModel>,
    view_defaults: Vec<ColumnModel>,
    transactions: Vec<TableUpdateTransaction>,
    /// owner id → pages in creation order
    wikis: HashMap<String, Vec<WikiPage>>,
    attachment_copies: Vec<(String, String)>,
    storage_locations: BTreeMap<i64, ExternalS3StorageLocation>,
    project_settings: HashMap<String, ProjectSetting>,
}

impl State {
    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct InMemorySynapse {
    state: Mutex<State>,
}

fn not_found(method: &str, path: String) -> SynapseError {
    SynapseError::Http {
        method: method.to_string(),
        path,
        status: 404,
        reason: "The resource you are attempting to access cannot be found".to_string(),
    }
}

fn conflict(method: &str, path: String, reason: String) -> SynapseError {
    SynapseError::Http {
        method: method.to_string(),
        path,
        status: 409,
        reason,
    }
}

impl InMemorySynapse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an entity as-is (assigning an id if missing) and return its id.
    pub fn insert_entity(&self, mut entity: Entity) -> String {
        let mut state = self.state.lock();
        let id = match entity.id.clone() {
            Some(id) => id,
            None => format!("syn{}", 1000 + state.next()),
        };
        entity.id = Some(id.clone());
        if entity.is(EntityKind::Project) {
            state
                .acls
                .entry(id.clone())
                .or_insert_with(|| AccessControlList::new(id.clone()));
        }
        state.entities.insert(id.clone(), entity);
        id
    }

    pub fn insert_acl(&self, acl: AccessControlList) {
        self.state.lock().acls.insert(acl.id.clone(), acl);
    }

    pub fn insert_column(&self, mut column: ColumnModel) -> String {
        let mut state = self.state.lock();
        let id = match column.id.clone() {
            Some(id) => id,
            None => state.next().to_string(),
        };
        column.id = Some(id.clone());
        state.columns.insert(id.clone(), column);
        id
    }

    /// Columns returned by [`SynapseApi::view_scope_columns`] for any scope.
    pub fn set_view_defaults(&self, columns: Vec<ColumnModel>) {
        self.state.lock().view_defaults = columns;
    }

    pub fn entity(&self, id: &str) -> Option<Entity> {
        self.state.lock().entities.get(id).cloned()
    }

    pub fn entities(&self) -> Vec<Entity> {
        self.state.lock().entities.values().cloned().collect()
    }

    /// ACL attached directly to `id` (none when it inherits).
    pub fn local_acl(&self, id: &str) -> Option<AccessControlList> {
        self.state.lock().acls.get(id).cloned()
    }

    pub fn column(&self, id: &str) -> Option<ColumnModel> {
        self.state.lock().columns.get(id).cloned()
    }

    pub fn transactions(&self) -> Vec<TableUpdateTransaction> {
        self.state.lock().transactions.clone()
    }

    pub fn wiki_pages(&self, owner_id: &str) -> Vec<WikiPage> {
        self.state
            .lock()
            .wikis
            .get(owner_id)
            .cloned()
            .unwrap_or_default()
    }

    /// `(original, copy)` file handle id pairs.
    pub fn attachment_copies(&self) -> Vec<(String, String)> {
        self.state.lock().attachment_copies.clone()
    }

    pub fn storage_locations(&self) -> Vec<(i64, ExternalS3StorageLocation)> {
        self.state
            .lock()
            .storage_locations
            .iter()
            .map(|(id, s)| (*id, s.clone()))
            .collect()
    }

    pub fn project_setting(&self, project_id: &str) -> Option<ProjectSetting> {
        self.state.lock().project_settings.get(project_id).cloned()
    }
}

impl SynapseApi for InMemorySynapse {
    fn get_entity(&self, id: &str) -> Result<Entity> {
        self.entity(id)
            .ok_or_else(|| not_found("GET", format!("/entity/{id}")))
    }

    fn create_entity(&self, entity: &Entity) -> Result<Entity> {
        {
            let state = self.state.lock();
            let clash = state
                .entities
                .values()
                .any(|e| e.parent_id == entity.parent_id && e.name == entity.name);
            if clash {
                return Err(conflict(
                    "POST",
                    "/entity".to_string(),
                    format!("An entity with the name: {} already exists", entity.name),
                ));
            }
            if let Some(parent) = &entity.parent_id {
                if !state.entities.contains_key(parent) {
                    return Err(not_found("POST", format!("/entity/{parent}")));
                }
            }
        }
        let mut created = entity.clone();
        created.id = None;
        created.etag = Some("etag-1".to_string());
        let id = self.insert_entity(created);
        self.get_entity(&id)
    }

    fn find_child(&self, parent_id: Option<&str>, name: &str) -> Result<Option<String>> {
        Ok(self
            .state
            .lock()
            .entities
            .values()
            .find(|e| e.parent_id.as_deref() == parent_id && e.name == name)
            .and_then(|e| e.id.clone()))
    }

    fn get_benefactor(&self, id: &str) -> Result<String> {
        let state = self.state.lock();
        let mut current = id.to_string();
        loop {
            if state.acls.contains_key(&current) {
                return Ok(current);
            }
            let entity = state
                .entities
                .get(&current)
                .ok_or_else(|| not_found("GET", format!("/entity/{id}/benefactor")))?;
            match &entity.parent_id {
                Some(parent) => current = parent.clone(),
                None => return Err(not_found("GET", format!("/entity/{id}/benefactor"))),
            }
        }
    }

    fn get_acl(&self, id: &str) -> Result<AccessControlList> {
        self.local_acl(id)
            .ok_or_else(|| not_found("GET", format!("/entity/{id}/acl")))
    }

    fn create_acl(&self, acl: &AccessControlList) -> Result<AccessControlList> {
        let mut state = self.state.lock();
        let path = format!("/entity/{}/acl", acl.id);
        if state.acls.contains_key(&acl.id) {
            return Err(conflict("POST", path, "ACL already exists".to_string()));
        }
        if !state.entities.contains_key(&acl.id) {
            return Err(not_found("POST", path));
        }
        let mut stored = acl.clone();
        stored.etag = Some(format!("acl-{}", state.next()));
        state.acls.insert(acl.id.clone(), stored.clone());
        Ok(stored)
    }

    fn update_acl(&self, acl: &AccessControlList) -> Result<AccessControlList> {
        let mut state = self.state.lock();
        if !state.acls.contains_key(&acl.id) {
            return Err(not_found("PUT", format!("/entity/{}/acl", acl.id)));
        }
        let mut stored = acl.clone();
        stored.etag = Some(format!("acl-{}", state.next()));
        state.acls.insert(acl.id.clone(), stored.clone());
        Ok(stored)
    }

    fn get_column(&self, id: &str) -> Result<ColumnModel> {
        self.column(id)
            .ok_or_else(|| not_found("GET", format!("/column/{id}")))
    }

    fn create_columns(&self, columns: &[ColumnModel]) -> Result<Vec<ColumnModel>> {
        Ok(columns
            .iter()
            .map(|c| {
                let mut c = c.clone();
                c.id = None;
                let id = self.insert_column(c.clone());
                c.id = Some(id);
                c
            })
            .collect())
    }

    fn view_scope_columns(&self, _scope: &[String], _view_type_mask: i64) -> Result<Vec<ColumnModel>> {
        Ok(self.state.lock().view_defaults.clone())
    }

    fn table_transaction(&self, request: &TableUpdateTransaction) -> Result<()> {
        let mut state = self.state.lock();
        let entity = state
            .entities
            .get_mut(&request.entity_id)
            .ok_or_else(|| not_found("POST", format!("/entity/{}/table/transaction/async/start", request.entity_id)))?;
        for change in &request.changes {
            entity.column_ids = change.ordered_column_ids.clone();
        }
        state.transactions.push(request.clone());
        Ok(())
    }

    fn wiki_headers(&self, owner_id: &str) -> Result<Vec<WikiHeader>> {
        let state = self.state.lock();
        let pages = state
            .wikis
            .get(owner_id)
            .ok_or_else(|| not_found("GET", format!("/entity/{owner_id}/wikiheadertree")))?;
        Ok(pages
            .iter()
            .map(|p| WikiHeader {
                id: p.id.clone().unwrap_or_default(),
                title: p.title.clone(),
                parent_id: p.parent_wiki_id.clone(),
            })
            .collect())
    }

    fn get_wiki(&self, owner_id: &str, wiki_id: Option<&str>) -> Result<WikiPage> {
        let state = self.state.lock();
        let path = match wiki_id {
            Some(id) => format!("/entity/{owner_id}/wiki/{id}"),
            None => format!("/entity/{owner_id}/wiki"),
        };
        state
            .wikis
            .get(owner_id)
            .and_then(|pages| {
                pages.iter().find(|p| match wiki_id {
                    Some(id) => p.id.as_deref() == Some(id),
                    None => p.parent_wiki_id.is_none(),
                })
            })
            .cloned()
            .ok_or_else(|| not_found("GET", path))
    }

    fn create_wiki(&self, owner_id: &str, page: &WikiPage) -> Result<WikiPage> {
        let mut state = self.state.lock();
        let path = format!("/entity/{owner_id}/wiki");
        let pages = state.wikis.get(owner_id);
        match &page.parent_wiki_id {
            None if pages.is_some_and(|p| p.iter().any(|w| w.parent_wiki_id.is_none())) => {
                return Err(conflict("POST", path, format!("{owner_id} already has a root wiki")));
            }
            Some(parent)
                if !pages.is_some_and(|p| p.iter().any(|w| w.id.as_deref() == Some(parent))) =>
            {
                return Err(not_found("POST", path));
            }
            _ => {}
        }
        let mut stored = page.clone();
        stored.id = Some((600_000 + state.next()).to_string());
        stored.etag = Some("wiki-1".to_string());
        state
            .wikis
            .entry(owner_id.to_string())
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }

    fn update_wiki(&self, owner_id: &str, page: &WikiPage) -> Result<WikiPage> {
        let mut state = self.state.lock();
        let wiki_id = page
            .id
            .clone()
            .ok_or_else(|| SynapseError::MissingId(page.title.clone()))?;
        let etag = format!("wiki-{}", state.next());
        let slot = state
            .wikis
            .get_mut(owner_id)
            .and_then(|pages| pages.iter_mut().find(|p| p.id.as_deref() == Some(wiki_id.as_str())))
            .ok_or_else(|| not_found("PUT", format!("/entity/{owner_id}/wiki/{wiki_id}")))?;
        let mut stored = page.clone();
        stored.etag = Some(etag);
        *slot = stored.clone();
        Ok(stored)
    }

    fn copy_wiki_attachments(&self, _wiki_id: &str, file_handle_ids: &[String]) -> Result<Vec<String>> {
        let mut state = self.state.lock();
        let mut copies = Vec::with_capacity(file_handle_ids.len());
        for original in file_handle_ids {
            let copy = format!("fh{}", state.next());
            state.attachment_copies.push((original.clone(), copy.clone()));
            copies.push(copy);
        }
        Ok(copies)
    }

    fn create_storage_location(&self, setting: &ExternalS3StorageLocation) -> Result<i64> {
        let mut state = self.state.lock();
        let id = 40_000 + state.next() as i64;
        state.storage_locations.insert(id, setting.clone());
        Ok(id)
    }

    fn get_upload_setting(&self, project_id: &str) -> Result<Option<ProjectSetting>> {
        Ok(self.project_setting(project_id))
    }

    fn create_project_setting(&self, setting: &ProjectSetting) -> Result<ProjectSetting> {
        let mut state = self.state.lock();
        if state.project_settings.contains_key(&setting.project_id) {
            return Err(conflict(
                "POST",
                "/projectSettings".to_string(),
                "project setting already exists".to_string(),
            ));
        }
        let mut stored = setting.clone();
        stored.id = Some(state.next().to_string());
        stored.etag = Some("ps-1".to_string());
        state
            .project_settings
            .insert(setting.project_id.clone(), stored.clone());
        Ok(stored)
    }

    fn update_project_setting(&self, setting: &ProjectSetting) -> Result<()> {
        let mut state = self.state.lock();
        let slot = state
            .project_settings
            .get_mut(&setting.project_id)
            .ok_or_else(|| not_found("PUT", "/projectSettings".to_string()))?;
        *slot = setting.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn benefactor_walks_parent_chain() {
        let synapse = InMemorySynapse::new();
        let project = synapse.insert_entity(Entity::new(EntityKind::Project, "P", None));
        let folder = synapse
            .create_entity(&Entity::new(EntityKind::Folder, "F", Some(&project)))
            .unwrap();
        let folder_id = folder.id.unwrap();
        assert_eq!(synapse.get_benefactor(&folder_id).unwrap(), project);
        assert!(synapse.get_acl(&folder_id).unwrap_err().is_not_found());
    }

    #[test]
    fn sibling_names_are_unique() {
        let synapse = InMemorySynapse::new();
        let project = synapse.insert_entity(Entity::new(EntityKind::Project, "P", None));
        let folder = Entity::new(EntityKind::Folder, "parquet", Some(&project));
        synapse.create_entity(&folder).unwrap();
        let err = synapse.create_entity(&folder).unwrap_err();
        assert_eq!(err.status(), Some(409));
        assert!(synapse.find_child(Some(&project), "parquet").unwrap().is_some());
    }

    #[test]
    fn only_one_root_wiki() {
        let synapse = InMemorySynapse::new();
        let root = synapse
            .create_wiki("syn1", &WikiPage { title: "Home".into(), ..Default::default() })
            .unwrap();
        assert!(synapse
            .create_wiki("syn1", &WikiPage { title: "Again".into(), ..Default::default() })
            .is_err());
        let child = WikiPage {
            title: "Child".into(),
            parent_wiki_id: root.id.clone(),
            ..Default::default()
        };
        synapse.create_wiki("syn1", &child).unwrap();
        let headers = synapse.wiki_headers("syn1").unwrap();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[1].parent_id, root.id);
    }
}
