//! AWS credential resolution.
//!
//! Order: the profile named in [`AwsConfig::profile`] → `AWS_ACCESS_KEY_ID` /
//! `AWS_SECRET_ACCESS_KEY` (+ `AWS_SESSION_TOKEN`) → web identity
//! (`AWS_WEB_IDENTITY_TOKEN_FILE` + `AWS_ROLE_ARN`) → `$AWS_PROFILE` or
//! `default` from the shared config/credentials files → ECS container
//! endpoint → EC2 instance metadata.
//!
//! A profile resolves to static keys, an assumed role (`role_arn` with
//! `source_profile` or `credential_source`, or `web_identity_token_file`), or
//! SSO role credentials (`sso_session` / legacy `sso_start_url`).

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::Utc;
use reqwest::blocking::Client;
use tracing::{debug, info};

use crate::config::{AwsConfig, PROFILE_ENV};
use crate::error::{AwsError, Result};
use crate::metadata::{self, ContainerEndpoint, DEFAULT_IMDS_ENDPOINT};
use crate::sso::{self, SsoRole};
use crate::sts::{AssumeRole, StsClient};

pub const ACCESS_KEY_ENV: &str = "AWS_ACCESS_KEY_ID";
pub const SECRET_KEY_ENV: &str = "AWS_SECRET_ACCESS_KEY";
pub const SESSION_TOKEN_ENV: &str = "AWS_SESSION_TOKEN";
pub const CREDENTIALS_FILE_ENV: &str = "AWS_SHARED_CREDENTIALS_FILE";
pub const CONFIG_FILE_ENV: &str = "AWS_CONFIG_FILE";
pub const WEB_IDENTITY_TOKEN_FILE_ENV: &str = "AWS_WEB_IDENTITY_TOKEN_FILE";
pub const ROLE_ARN_ENV: &str = "AWS_ROLE_ARN";
pub const ROLE_SESSION_NAME_ENV: &str = "AWS_ROLE_SESSION_NAME";
pub const CONTAINER_RELATIVE_URI_ENV: &str = "AWS_CONTAINER_CREDENTIALS_RELATIVE_URI";
pub const CONTAINER_FULL_URI_ENV: &str = "AWS_CONTAINER_CREDENTIALS_FULL_URI";
pub const CONTAINER_TOKEN_ENV: &str = "AWS_CONTAINER_AUTHORIZATION_TOKEN";
pub const CONTAINER_TOKEN_FILE_ENV: &str = "AWS_CONTAINER_AUTHORIZATION_TOKEN_FILE";
pub const IMDS_DISABLED_ENV: &str = "AWS_EC2_METADATA_DISABLED";
pub const IMDS_ENDPOINT_ENV: &str = "AWS_EC2_METADATA_SERVICE_ENDPOINT";
pub const DEFAULT_PROFILE: &str = "default";
pub const DEFAULT_SESSION_NAME: &str = "bridgeform";

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// `AWS_WEB_IDENTITY_TOKEN_FILE` / `AWS_ROLE_ARN` / `AWS_ROLE_SESSION_NAME`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebIdentity {
    pub token_file: PathBuf,
    pub role_arn: String,
    pub session_name: Option<String>,
}

/// Snapshot of the environment that takes part in resolution.
///
/// `Default` disables every network provider except STS/SSO calls a
/// configured profile asks for.
#[derive(Debug, Clone, Default)]
pub struct CredentialEnv {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    pub profile: Option<String>,
    pub credentials_file: Option<PathBuf>,
    pub config_file: Option<PathBuf>,
    pub sso_cache_dir: Option<PathBuf>,
    pub web_identity: Option<WebIdentity>,
    pub container: Option<ContainerEndpoint>,
    /// Instance metadata endpoint; `None` when disabled.
    pub instance_metadata: Option<String>,
}

fn aws_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".aws"))
}

pub fn default_credentials_path() -> Option<PathBuf> {
    aws_dir().map(|dir| dir.join("credentials"))
}

pub fn default_config_path() -> Option<PathBuf> {
    aws_dir().map(|dir| dir.join("config"))
}

impl CredentialEnv {
    pub fn from_process() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        let web_identity = match (var(WEB_IDENTITY_TOKEN_FILE_ENV), var(ROLE_ARN_ENV)) {
            (Some(token_file), Some(role_arn)) => Some(WebIdentity {
                token_file: PathBuf::from(token_file),
                role_arn,
                session_name: var(ROLE_SESSION_NAME_ENV),
            }),
            _ => None,
        };
        let imds_disabled = var(IMDS_DISABLED_ENV).is_some_and(|v| v.eq_ignore_ascii_case("true"));
        Self {
            access_key_id: var(ACCESS_KEY_ENV),
            secret_access_key: var(SECRET_KEY_ENV),
            session_token: var(SESSION_TOKEN_ENV),
            profile: var(PROFILE_ENV),
            credentials_file: var(CREDENTIALS_FILE_ENV)
                .map(PathBuf::from)
                .or_else(default_credentials_path),
            config_file: var(CONFIG_FILE_ENV)
                .map(PathBuf::from)
                .or_else(default_config_path),
            sso_cache_dir: aws_dir().map(|dir| dir.join("sso").join("cache")),
            web_identity,
            container: ContainerEndpoint::from_vars(
                var(CONTAINER_RELATIVE_URI_ENV),
                var(CONTAINER_FULL_URI_ENV),
                var(CONTAINER_TOKEN_ENV),
                var(CONTAINER_TOKEN_FILE_ENV).map(PathBuf::from),
            ),
            instance_metadata: (!imds_disabled)
                .then(|| var(IMDS_ENDPOINT_ENV).unwrap_or_else(|| DEFAULT_IMDS_ENDPOINT.to_string())),
        }
    }

    fn static_keys(&self) -> Option<Credentials> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(key), Some(secret)) => Some(Credentials {
                access_key_id: key.clone(),
                secret_access_key: secret.clone(),
                session_token: self.session_token.clone(),
            }),
            _ => None,
        }
    }
}

// ============================================================================
// Shared config + credentials files
// ============================================================================

/// Sections of an INI-style AWS file; `[profile x]` is read as `x`.
pub fn parse_ini(text: &str) -> BTreeMap<String, BTreeMap<String, String>> {
    let mut sections: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
    let mut current: Option<String> = None;
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = name.trim();
            let name = name.strip_prefix("profile ").unwrap_or(name).trim().to_string();
            sections.entry(name.clone()).or_default();
            current = Some(name);
            continue;
        }
        let (Some(section), Some((key, value))) = (&current, line.split_once('=')) else {
            continue;
        };
        if let Some(entries) = sections.get_mut(section) {
            entries.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    sections
}

/// Profiles merged from the config file and the credentials file; the
/// credentials file wins key by key.
#[derive(Debug, Clone, Default)]
pub struct SharedProfiles {
    sections: BTreeMap<String, BTreeMap<String, String>>,
    sources: Vec<PathBuf>,
}

impl SharedProfiles {
    pub fn load(config_file: Option<&Path>, credentials_file: Option<&Path>) -> Result<Self> {
        let mut profiles = Self::default();
        for path in [config_file, credentials_file].into_iter().flatten() {
            if !path.exists() {
                continue;
            }
            let text = std::fs::read_to_string(path).map_err(|source| AwsError::Io {
                path: path.display().to_string(),
                source,
            })?;
            for (name, entries) in parse_ini(&text) {
                profiles.sections.entry(name).or_default().extend(entries);
            }
            profiles.sources.push(path.to_path_buf());
        }
        Ok(profiles)
    }

    pub fn get(&self, name: &str) -> Option<&BTreeMap<String, String>> {
        self.sections.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sections.contains_key(name)
    }

    fn describe_sources(&self) -> String {
        if self.sources.is_empty() {
            return "the shared AWS files (none found)".to_string();
        }
        self.sources
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

// ============================================================================
// Resolution
// ============================================================================

pub fn resolve(config: &AwsConfig) -> Result<Credentials> {
    resolve_from(config, &CredentialEnv::from_process())
}

pub fn resolve_from(config: &AwsConfig, env: &CredentialEnv) -> Result<Credentials> {
    CredentialChain::new(config, env)?.resolve()
}

struct CredentialChain<'a> {
    config: &'a AwsConfig,
    env: &'a CredentialEnv,
    profiles: SharedProfiles,
    metadata_http: Client,
}

impl<'a> CredentialChain<'a> {
    fn new(config: &'a AwsConfig, env: &'a CredentialEnv) -> Result<Self> {
        Ok(Self {
            config,
            env,
            profiles: SharedProfiles::load(env.config_file.as_deref(), env.credentials_file.as_deref())?,
            metadata_http: metadata::metadata_client()?,
        })
    }

    fn resolve(&self) -> Result<Credentials> {
        if let Some(profile) = self.config.profile.as_deref() {
            return self.profile(profile);
        }
        if let Some(credentials) = self.env.static_keys() {
            debug!(source = "environment", "resolved AWS credentials");
            return Ok(credentials);
        }
        if let Some(web) = &self.env.web_identity {
            return self.web_identity(&web.token_file, &web.role_arn, web.session_name.as_deref(), &self.config.region);
        }
        if let Some(profile) = self.env.profile.as_deref() {
            return self.profile(profile);
        }
        if self.profiles.contains(DEFAULT_PROFILE) {
            return self.profile(DEFAULT_PROFILE);
        }
        if let Some(container) = &self.env.container {
            return self.container(container);
        }
        if let Some(endpoint) = &self.env.instance_metadata {
            return self.instance(endpoint);
        }
        Err(AwsError::MissingCredentials)
    }

    fn profile(&self, name: &str) -> Result<Credentials> {
        let credentials = self.profile_chain(name, &mut Vec::new())?;
        info!(profile = name, access_key_id = %credentials.access_key_id, "resolved AWS credentials");
        Ok(credentials)
    }

    fn profile_chain(&self, name: &str, visited: &mut Vec<String>) -> Result<Credentials> {
        if visited.iter().any(|seen| seen == name) {
            return Err(AwsError::ProfileCycle {
                profile: name.to_string(),
            });
        }
        visited.push(name.to_string());
        let section = self.profiles.get(name).ok_or_else(|| AwsError::ProfileNotFound {
            profile: name.to_string(),
            path: self.profiles.describe_sources(),
        })?;
        let region = section.get("region").map(String::as_str).unwrap_or(&self.config.region);

        if let Some(role_arn) = section.get("role_arn") {
            let session_name = section.get("role_session_name").map(String::as_str);
            if let Some(token_file) = section.get("web_identity_token_file") {
                return self.web_identity(Path::new(token_file), role_arn, session_name, region);
            }
            let source = match (section.get("source_profile"), section.get("credential_source")) {
                (Some(source), _) if source == name => self.static_profile(name, section)?,
                (Some(source), _) => self.profile_chain(source, visited)?,
                (None, Some(kind)) => self.credential_source(name, kind)?,
                (None, None) => {
                    return Err(AwsError::InvalidProfile {
                        profile: name.to_string(),
                        reason: "role_arn needs source_profile or credential_source".to_string(),
                    })
                }
            };
            let duration_seconds = section
                .get("duration_seconds")
                .map(|raw| {
                    raw.parse::<u32>().map_err(|_| AwsError::InvalidProfile {
                        profile: name.to_string(),
                        reason: format!("duration_seconds `{raw}` is not a number"),
                    })
                })
                .transpose()?;
            let request = AssumeRole {
                role_arn: role_arn.clone(),
                session_name: session_name.unwrap_or(DEFAULT_SESSION_NAME).to_string(),
                external_id: section.get("external_id").cloned(),
                duration_seconds,
            };
            return self.sts(region)?.assume_role(&source, &request);
        }

        if section.contains_key("sso_account_id") {
            return self.sso_profile(name, section);
        }
        self.static_profile(name, section)
    }

    fn static_profile(&self, name: &str, section: &BTreeMap<String, String>) -> Result<Credentials> {
        let required = |key: &'static str| {
            section.get(key).cloned().ok_or_else(|| AwsError::IncompleteProfile {
                profile: name.to_string(),
                path: self.profiles.describe_sources(),
                key,
            })
        };
        Ok(Credentials {
            access_key_id: required("aws_access_key_id")?,
            secret_access_key: required("aws_secret_access_key")?,
            session_token: section.get("aws_session_token").cloned(),
        })
    }

    fn credential_source(&self, profile: &str, kind: &str) -> Result<Credentials> {
        let unavailable = |what: &str| AwsError::InvalidProfile {
            profile: profile.to_string(),
            reason: format!("credential_source {kind}: {what}"),
        };
        match kind {
            "Environment" => self
                .env
                .static_keys()
                .ok_or_else(|| unavailable("AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY are not set")),
            "EcsContainer" => match &self.env.container {
                Some(container) => self.container(container),
                None => Err(unavailable("no container credentials endpoint")),
            },
            "Ec2InstanceMetadata" => match &self.env.instance_metadata {
                Some(endpoint) => self.instance(endpoint),
                None => Err(unavailable("instance metadata is disabled")),
            },
            _ => Err(unavailable("unknown source")),
        }
    }

    fn sso_profile(&self, name: &str, section: &BTreeMap<String, String>) -> Result<Credentials> {
        // `sso_session` points at an `[sso-session x]` section holding the
        // start URL and region; legacy profiles carry them inline.
        let session = match section.get("sso_session") {
            Some(session) => self
                .profiles
                .get(&format!("sso-session {session}"))
                .ok_or_else(|| AwsError::InvalidProfile {
                    profile: name.to_string(),
                    reason: format!("sso-session `{session}` not found"),
                })?,
            None => section,
        };
        let field = |entries: &BTreeMap<String, String>, key: &str| {
            entries.get(key).cloned().ok_or_else(|| AwsError::InvalidProfile {
                profile: name.to_string(),
                reason: format!("missing `{key}`"),
            })
        };
        let role = SsoRole {
            start_url: field(session, "sso_start_url")?,
            region: field(session, "sso_region")?,
            account_id: field(section, "sso_account_id")?,
            role_name: field(section, "sso_role_name")?,
        };
        let cache_dir = self.env.sso_cache_dir.as_deref().ok_or_else(|| AwsError::SsoLogin {
            start_url: role.start_url.clone(),
        })?;
        let token = sso::cached_token(cache_dir, &role.start_url, Utc::now())?;
        let http = self.config.http_client()?;
        sso::role_credentials(&http, self.config, &role, &token)
    }

    fn sts(&self, region: &str) -> Result<StsClient> {
        let mut config = self.config.clone();
        config.region = region.to_string();
        StsClient::new(config)
    }

    fn web_identity(
        &self,
        token_file: &Path,
        role_arn: &str,
        session_name: Option<&str>,
        region: &str,
    ) -> Result<Credentials> {
        let token = std::fs::read_to_string(token_file).map_err(|source| AwsError::Io {
            path: token_file.display().to_string(),
            source,
        })?;
        self.sts(region)?.assume_role_with_web_identity(
            role_arn,
            session_name.unwrap_or(DEFAULT_SESSION_NAME),
            token.trim(),
        )
    }

    fn container(&self, endpoint: &ContainerEndpoint) -> Result<Credentials> {
        let credentials = metadata::container_credentials(&self.metadata_http, endpoint)?;
        info!(source = "container", "resolved AWS credentials");
        Ok(credentials)
    }

    fn instance(&self, endpoint: &str) -> Result<Credentials> {
        let credentials = metadata::instance_credentials(&self.metadata_http, endpoint)?;
        info!(source = "instance metadata", "resolved AWS credentials");
        Ok(credentials)
    }
}
