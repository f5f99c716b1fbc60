//! Blocking HTTPS client for the Synapse repository and file services.

use std::thread;
use std::time::{Duration, Instant};

use reqwest::blocking::{Client, Response};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;

use crate::api::SynapseApi;
use crate::error::{Result, SynapseError};
use crate::model::{
    AccessControlList, ColumnModel, Entity, EntityId, ExternalS3StorageLocation, ProjectSetting,
    StorageLocationId, TableUpdateTransaction, WikiHeader, WikiPage,
};

pub const DEFAULT_REPO_ENDPOINT: &str = "https://repo-prod.prod.sagebase.org/repo/v1";
pub const DEFAULT_FILE_ENDPOINT: &str = "https://repo-prod.prod.sagebase.org/file/v1";
pub const REPO_ENDPOINT_ENV: &str = "SYNAPSE_ENDPOINT";

const RETRY_STATUSES: [u16; 4] = [429, 502, 503, 504];
const WIKI_HEADER_PAGE: usize = 50;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub repo_endpoint: Url,
    pub file_endpoint: Url,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Upper bound for waiting on an asynchronous job.
    pub job_timeout: Duration,
    /// Attempts per request for throttling/gateway statuses.
    pub max_attempts: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            repo_endpoint: Url::parse(DEFAULT_REPO_ENDPOINT).expect("static endpoint"),
            file_endpoint: Url::parse(DEFAULT_FILE_ENDPOINT).expect("static endpoint"),
            timeout: Duration::from_secs(70),
            job_timeout: Duration::from_secs(600),
            max_attempts: 3,
        }
    }
}

impl ClientConfig {
    /// Point both services at `repo_endpoint` (`.../repo/v1` → `.../file/v1`).
    pub fn with_repo_endpoint(mut self, repo_endpoint: &str) -> Result<Self> {
        let repo = Url::parse(repo_endpoint)
            .map_err(|_| SynapseError::Endpoint(repo_endpoint.to_string()))?;
        let file_str = repo.as_str().trim_end_matches('/').replace("/repo/v1", "/file/v1");
        let file = Url::parse(&file_str).map_err(|_| SynapseError::Endpoint(file_str.clone()))?;
        self.repo_endpoint = repo;
        self.file_endpoint = file;
        Ok(self)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub owner_id: String,
    pub user_name: String,
}

#[derive(Deserialize)]
struct AsyncJobId {
    token: String,
}

#[derive(Deserialize)]
struct PaginatedResults<T> {
    results: Vec<T>,
}

#[derive(Deserialize)]
struct ListWrapper<T> {
    list: Vec<T>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ViewColumnPage {
    results: Vec<ColumnModel>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CopyResults {
    copy_results: Vec<CopyResult>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CopyResult {
    original_file_handle_id: String,
    #[serde(default)]
    new_file_handle: Option<EntityId>,
    #[serde(default)]
    failure_code: Option<String>,
}

#[derive(Clone, Copy)]
enum Service {
    Repo,
    File,
}

pub struct SynapseClient {
    http: Client,
    config: ClientConfig,
    token: String,
}

impl SynapseClient {
    pub fn new(token: impl Into<String>, config: ClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("bridgeform/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| SynapseError::Transport {
                url: config.repo_endpoint.to_string(),
                source,
            })?;
        Ok(Self {
            http,
            config,
            token: token.into(),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Profile of the authenticated user; cheap way to validate the token.
    pub fn user_profile(&self) -> Result<UserProfile> {
        self.get_json("/userProfile")
    }

    fn url(&self, service: Service, path: &str) -> String {
        let base = match service {
            Service::Repo => &self.config.repo_endpoint,
            Service::File => &self.config.file_endpoint,
        };
        format!("{}{}", base.as_str().trim_end_matches('/'), path)
    }

    fn send(
        &self,
        service: Service,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Response> {
        let url = self.url(service, path);
        let mut attempt = 1;
        loop {
            let mut request = self
                .http
                .request(method.clone(), &url)
                .bearer_auth(&self.token);
            if let Some(body) = body {
                request = request.json(body);
            }
            debug!(method = %method, %path, attempt, "synapse request");
            let response = request.send().map_err(|source| SynapseError::Transport {
                url: url.clone(),
                source,
            })?;

            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }
            if RETRY_STATUSES.contains(&status.as_u16()) && attempt < self.config.max_attempts {
                let backoff = Duration::from_millis(500 * 2u64.pow(attempt - 1));
                warn!(%path, status = status.as_u16(), ?backoff, "retrying synapse request");
                thread::sleep(backoff);
                attempt += 1;
                continue;
            }
            return Err(http_error(&method, path, response));
        }
    }

    fn decode<T: DeserializeOwned>(path: &str, response: Response) -> Result<T> {
        response.json().map_err(|e| SynapseError::Decode {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    fn to_body<B: Serialize>(path: &str, body: &B) -> Result<Value> {
        serde_json::to_value(body).map_err(|e| SynapseError::Decode {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(Service::Repo, Method::GET, path, None)?;
        Self::decode(path, response)
    }

    fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let body = Self::to_body(path, body)?;
        let response = self.send(Service::Repo, Method::POST, path, Some(&body))?;
        Self::decode(path, response)
    }

    fn put_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let body = Self::to_body(path, body)?;
        let response = self.send(Service::Repo, Method::PUT, path, Some(&body))?;
        Self::decode(path, response)
    }

    /// Start `{base}/async/start` and poll `{base}/async/get/{token}` until done.
    fn run_async_job<B: Serialize, T: DeserializeOwned>(&self, base: &str, body: &B) -> Result<T> {
        let job: AsyncJobId = self.post_json(&format!("{base}/async/start"), body)?;
        let get_path = format!("{base}/async/get/{}", job.token);
        let started = Instant::now();
        let mut wait = Duration::from_millis(250);
        loop {
            let response = self.send(Service::Repo, Method::GET, &get_path, None)?;
            if response.status() != StatusCode::ACCEPTED {
                return Self::decode(&get_path, response);
            }
            if started.elapsed() >= self.config.job_timeout {
                return Err(SynapseError::JobTimeout {
                    token: job.token,
                    seconds: self.config.job_timeout.as_secs(),
                });
            }
            debug!(token = %job.token, ?wait, "async job still processing");
            thread::sleep(wait);
            wait = (wait * 2).min(Duration::from_secs(5));
        }
    }
}

fn http_error(method: &Method, path: &str, response: Response) -> SynapseError {
    let status = response.status().as_u16();
    let text = response.text().unwrap_or_default();
    SynapseError::Http {
        method: method.to_string(),
        path: path.to_string(),
        status,
        reason: error_reason(&text),
    }
}

/// The platform reports failures as `{"reason": "..."}`.
fn error_reason(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("reason").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

impl SynapseApi for SynapseClient {
    fn get_entity(&self, id: &str) -> Result<Entity> {
        self.get_json(&format!("/entity/{id}"))
    }

    fn create_entity(&self, entity: &Entity) -> Result<Entity> {
        self.post_json("/entity", entity)
    }

    fn find_child(&self, parent_id: Option<&str>, name: &str) -> Result<Option<String>> {
        let body = json!({ "parentId": parent_id, "entityName": name });
        match self.post_json::<_, EntityId>("/entity/child", &body) {
            Ok(found) => Ok(Some(found.id)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn get_benefactor(&self, id: &str) -> Result<String> {
        let benefactor: EntityId = self.get_json(&format!("/entity/{id}/benefactor"))?;
        Ok(benefactor.id)
    }

    fn get_acl(&self, id: &str) -> Result<AccessControlList> {
        self.get_json(&format!("/entity/{id}/acl"))
    }

    fn create_acl(&self, acl: &AccessControlList) -> Result<AccessControlList> {
        self.post_json(&format!("/entity/{}/acl", acl.id), acl)
    }

    fn update_acl(&self, acl: &AccessControlList) -> Result<AccessControlList> {
        self.put_json(&format!("/entity/{}/acl", acl.id), acl)
    }

    fn get_column(&self, id: &str) -> Result<ColumnModel> {
        self.get_json(&format!("/column/{id}"))
    }

    fn create_columns(&self, columns: &[ColumnModel]) -> Result<Vec<ColumnModel>> {
        if columns.is_empty() {
            return Ok(Vec::new());
        }
        let body = json!({
            "concreteType": "org.sagebionetworks.repo.model.ListWrapper",
            "list": columns,
        });
        let created: ListWrapper<ColumnModel> = self.post_json("/column/batch", &body)?;
        Ok(created.list)
    }

    fn view_scope_columns(&self, scope: &[String], view_type_mask: i64) -> Result<Vec<ColumnModel>> {
        let mut columns = Vec::new();
        let mut next_page_token: Option<String> = None;
        loop {
            let body = json!({
                "concreteType": "org.sagebionetworks.repo.model.table.ViewColumnModelRequest",
                "viewScope": {
                    "scope": scope,
                    "viewEntityType": "entityview",
                    "viewTypeMask": view_type_mask,
                },
                "nextPageToken": next_page_token,
            });
            let page: ViewColumnPage = self.run_async_job("/column/view/scope", &body)?;
            columns.extend(page.results);
            match page.next_page_token {
                Some(token) => next_page_token = Some(token),
                None => return Ok(columns),
            }
        }
    }

    fn table_transaction(&self, request: &TableUpdateTransaction) -> Result<()> {
        let _: Value = self.run_async_job(
            &format!("/entity/{}/table/transaction", request.entity_id),
            request,
        )?;
        Ok(())
    }

    fn wiki_headers(&self, owner_id: &str) -> Result<Vec<WikiHeader>> {
        let mut headers = Vec::new();
        loop {
            let path = format!(
                "/entity/{owner_id}/wikiheadertree?offset={}&limit={WIKI_HEADER_PAGE}",
                headers.len()
            );
            let page: PaginatedResults<WikiHeader> = self.get_json(&path)?;
            let n = page.results.len();
            headers.extend(page.results);
            if n < WIKI_HEADER_PAGE {
                return Ok(headers);
            }
        }
    }

    fn get_wiki(&self, owner_id: &str, wiki_id: Option<&str>) -> Result<WikiPage> {
        match wiki_id {
            Some(wiki_id) => self.get_json(&format!("/entity/{owner_id}/wiki/{wiki_id}")),
            None => self.get_json(&format!("/entity/{owner_id}/wiki")),
        }
    }

    fn create_wiki(&self, owner_id: &str, page: &WikiPage) -> Result<WikiPage> {
        self.post_json(&format!("/entity/{owner_id}/wiki"), page)
    }

    fn update_wiki(&self, owner_id: &str, page: &WikiPage) -> Result<WikiPage> {
        let wiki_id = page
            .id
            .as_deref()
            .ok_or_else(|| SynapseError::MissingId(page.title.clone()))?;
        self.put_json(&format!("/entity/{owner_id}/wiki/{wiki_id}"), page)
    }

    fn copy_wiki_attachments(&self, wiki_id: &str, file_handle_ids: &[String]) -> Result<Vec<String>> {
        if file_handle_ids.is_empty() {
            return Ok(Vec::new());
        }
        let requests: Vec<Value> = file_handle_ids
            .iter()
            .map(|id| {
                json!({
                    "originalFile": {
                        "fileHandleId": id,
                        "associateObjectId": wiki_id,
                        "associateObjectType": "WikiAttachment",
                    }
                })
            })
            .collect();
        let body = json!({ "copyRequests": requests });
        let path = "/filehandles/copy";
        let response = self.send(Service::File, Method::POST, path, Some(&body))?;
        let results: CopyResults = Self::decode(path, response)?;
        results
            .copy_results
            .into_iter()
            .map(|r| match (r.new_file_handle, r.failure_code) {
                (Some(handle), None) => Ok(handle.id),
                (_, code) => Err(SynapseError::AttachmentCopy {
                    file_handle_id: r.original_file_handle_id,
                    code: code.unwrap_or_else(|| "UNKNOWN".to_string()),
                }),
            })
            .collect()
    }

    fn create_storage_location(&self, setting: &ExternalS3StorageLocation) -> Result<i64> {
        let created: StorageLocationId = self.post_json("/storageLocation", setting)?;
        Ok(created.storage_location_id)
    }

    fn get_upload_setting(&self, project_id: &str) -> Result<Option<ProjectSetting>> {
        let path = format!("/projectSettings/{project_id}/type/upload");
        let response = match self.send(Service::Repo, Method::GET, &path, None) {
            Ok(response) => response,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        Self::decode(&path, response).map(Some)
    }

    fn create_project_setting(&self, setting: &ProjectSetting) -> Result<ProjectSetting> {
        self.post_json("/projectSettings", setting)
    }

    fn update_project_setting(&self, setting: &ProjectSetting) -> Result<()> {
        let body = Self::to_body("/projectSettings", setting)?;
        self.send(Service::Repo, Method::PUT, "/projectSettings", Some(&body))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_is_extracted_from_error_body() {
        assert_eq!(
            error_reason(r#"{"reason":"The resource you are attempting to access cannot be found"}"#),
            "The resource you are attempting to access cannot be found"
        );
        assert_eq!(error_reason("  gateway timeout \n"), "gateway timeout");
    }

    #[test]
    fn repo_endpoint_override_derives_file_endpoint() {
        let config = ClientConfig::default()
            .with_repo_endpoint("https://repo-staging.prod.sagebase.org/repo/v1")
            .unwrap();
        assert_eq!(
            config.file_endpoint.as_str(),
            "https://repo-staging.prod.sagebase.org/file/v1"
        );
    }

    #[test]
    fn urls_join_without_double_slash() {
        let config = ClientConfig::default()
            .with_repo_endpoint("http://localhost:8080/repo/v1/")
            .unwrap();
        let client = SynapseClient::new("token", config).unwrap();
        assert_eq!(
            client.url(Service::Repo, "/entity/syn1"),
            "http://localhost:8080/repo/v1/entity/syn1"
        );
        assert_eq!(
            client.url(Service::File, "/filehandles/copy"),
            "http://localhost:8080/file/v1/filehandles/copy"
        );
    }

    #[test]
    fn bad_endpoint_is_rejected() {
        assert!(matches!(
            ClientConfig::default().with_repo_endpoint("not a url"),
            Err(SynapseError::Endpoint(_))
        ));
    }
}
