//! Credentials served by the compute platform: the ECS container endpoint and
//! EC2 instance metadata (IMDSv2).

use std::path::PathBuf;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use tracing::debug;

use crate::credentials::Credentials;
use crate::error::{AwsError, Result};

pub const DEFAULT_CONTAINER_HOST: &str = "http://169.254.170.2";
pub const DEFAULT_IMDS_ENDPOINT: &str = "http://169.254.169.254";

const CONTAINER: &str = "container credentials";
const IMDS: &str = "instance metadata";
const IMDS_TOKEN_TTL: &str = "21600";
const SECURITY_CREDENTIALS_PATH: &str = "/latest/meta-data/iam/security-credentials/";

/// Where the container agent serves credentials, and how to authenticate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerEndpoint {
    pub uri: String,
    pub authorization: Option<String>,
    pub authorization_file: Option<PathBuf>,
}

impl ContainerEndpoint {
    /// From `AWS_CONTAINER_CREDENTIALS_RELATIVE_URI` or `..._FULL_URI`; relative wins.
    pub fn from_vars(
        relative_uri: Option<String>,
        full_uri: Option<String>,
        authorization: Option<String>,
        authorization_file: Option<PathBuf>,
    ) -> Option<Self> {
        let uri = match (relative_uri, full_uri) {
            (Some(relative), _) => format!("{DEFAULT_CONTAINER_HOST}{relative}"),
            (None, Some(full)) => full,
            (None, None) => return None,
        };
        Some(Self {
            uri,
            authorization,
            authorization_file,
        })
    }

    fn authorization(&self) -> Result<Option<String>> {
        if let Some(path) = &self.authorization_file {
            let token = std::fs::read_to_string(path).map_err(|source| AwsError::Io {
                path: path.display().to_string(),
                source,
            })?;
            return Ok(Some(token.trim().to_string()));
        }
        Ok(self.authorization.clone())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MetadataCredentials {
    #[serde(default)]
    code: Option<String>,
    access_key_id: String,
    secret_access_key: String,
    token: String,
}

/// Short timeouts: off-platform these addresses do not answer.
pub(crate) fn metadata_client() -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(1))
        .timeout(Duration::from_secs(3))
        .build()
        .map_err(|source| AwsError::Transport {
            url: "metadata client".to_string(),
            source,
        })
}

fn fetch(service: &'static str, url: &str, builder: RequestBuilder) -> Result<String> {
    let transport = |source: reqwest::Error| AwsError::Transport {
        url: url.to_string(),
        source,
    };
    let resp = builder.send().map_err(transport)?;
    let status = resp.status();
    let body = resp.text().map_err(transport)?;
    if !status.is_success() {
        return Err(AwsError::Http {
            service,
            status: status.as_u16(),
            message: body.trim().to_string(),
        });
    }
    Ok(body)
}

fn decode(service: &'static str, body: &str) -> Result<Credentials> {
    let parsed: MetadataCredentials = serde_json::from_str(body).map_err(|e| AwsError::Decode {
        service,
        message: e.to_string(),
    })?;
    if let Some(code) = parsed.code.filter(|c| c != "Success") {
        return Err(AwsError::Decode {
            service,
            message: format!("credentials unavailable: {code}"),
        });
    }
    Ok(Credentials {
        access_key_id: parsed.access_key_id,
        secret_access_key: parsed.secret_access_key,
        session_token: Some(parsed.token),
    })
}

pub fn container_credentials(http: &Client, endpoint: &ContainerEndpoint) -> Result<Credentials> {
    let mut builder = http.get(&endpoint.uri);
    if let Some(token) = endpoint.authorization()? {
        builder = builder.header("authorization", token);
    }
    debug!(uri = %endpoint.uri, "fetching container credentials");
    decode(CONTAINER, &fetch(CONTAINER, &endpoint.uri, builder)?)
}

/// Session token, attached role name, then that role's credentials.
pub fn instance_credentials(http: &Client, endpoint: &str) -> Result<Credentials> {
    let base = endpoint.trim_end_matches('/');
    let token_url = format!("{base}/latest/api/token");
    let token = fetch(
        IMDS,
        &token_url,
        http.put(&token_url)
            .header("x-aws-ec2-metadata-token-ttl-seconds", IMDS_TOKEN_TTL),
    )?;
    let token = token.trim();

    let roles_url = format!("{base}{SECURITY_CREDENTIALS_PATH}");
    let roles = fetch(
        IMDS,
        &roles_url,
        http.get(&roles_url).header("x-aws-ec2-metadata-token", token),
    )?;
    let role = roles
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| AwsError::Decode {
            service: IMDS,
            message: "no instance profile attached".to_string(),
        })?;

    let role_url = format!("{roles_url}{role}");
    debug!(role, "fetching instance profile credentials");
    let body = fetch(
        IMDS,
        &role_url,
        http.get(&role_url).header("x-aws-ec2-metadata-token", token),
    )?;
    decode(IMDS, &body)
}
