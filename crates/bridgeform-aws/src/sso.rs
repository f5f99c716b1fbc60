//! IAM Identity Center (SSO) role credentials from a cached `aws sso login` token.

use std::path::Path;

use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::config::AwsConfig;
use crate::credentials::Credentials;
use crate::error::{AwsError, Result};

const SERVICE: &str = "sso";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsoRole {
    pub start_url: String,
    pub region: String,
    pub account_id: String,
    pub role_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedToken {
    #[serde(default)]
    start_url: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoleCredentialsResponse {
    role_credentials: RoleCredentials,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoleCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: String,
}

/// The CLI has written both `...Z` and `...UTC` timestamps.
fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    let normalized = match raw.strip_suffix("UTC") {
        Some(stripped) => format!("{stripped}Z"),
        None => raw.to_string(),
    };
    DateTime::parse_from_rfc3339(&normalized)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Unexpired access token for `start_url` among the cache files in `cache_dir`.
pub fn cached_token(cache_dir: &Path, start_url: &str, now: DateTime<Utc>) -> Result<String> {
    let login = || AwsError::SsoLogin {
        start_url: start_url.to_string(),
    };
    let entries = match std::fs::read_dir(cache_dir) {
        Ok(entries) => entries,
        Err(_) => return Err(login()),
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Ok(text) = std::fs::read_to_string(&path) else {
            continue;
        };
        let Ok(token) = serde_json::from_str::<CachedToken>(&text) else {
            continue;
        };
        let fresh = token
            .expires_at
            .as_deref()
            .and_then(parse_expiry)
            .is_some_and(|expiry| expiry > now);
        if token.start_url.as_deref() == Some(start_url) && fresh {
            if let Some(access_token) = token.access_token {
                debug!(cache = %path.display(), "using cached SSO token");
                return Ok(access_token);
            }
        }
    }
    Err(login())
}

fn portal_url(config: &AwsConfig, role: &SsoRole) -> Result<Url> {
    let base = match &config.endpoint_url {
        Some(url) => url.as_str().trim_end_matches('/').to_string(),
        None => format!("https://portal.sso.{}.amazonaws.com", role.region),
    };
    let raw = format!("{base}/federation/credentials");
    let mut url = Url::parse(&raw).map_err(|_| AwsError::Endpoint(raw))?;
    url.query_pairs_mut()
        .append_pair("account_id", &role.account_id)
        .append_pair("role_name", &role.role_name);
    Ok(url)
}

pub fn role_credentials(http: &Client, config: &AwsConfig, role: &SsoRole, access_token: &str) -> Result<Credentials> {
    let url = portal_url(config, role)?;
    let transport = |source: reqwest::Error| AwsError::Transport {
        url: url.to_string(),
        source,
    };
    let resp = http
        .get(url.clone())
        .header("x-amz-sso_bearer_token", access_token)
        .send()
        .map_err(transport)?;
    let status = resp.status();
    let body = resp.text().map_err(transport)?;
    if !status.is_success() {
        return Err(AwsError::Http {
            service: SERVICE,
            status: status.as_u16(),
            message: body.trim().to_string(),
        });
    }
    let parsed: RoleCredentialsResponse = serde_json::from_str(&body).map_err(|e| AwsError::Decode {
        service: SERVICE,
        message: e.to_string(),
    })?;
    info!(account = %role.account_id, role = %role.role_name, "resolved SSO role credentials");
    Ok(Credentials {
        access_key_id: parsed.role_credentials.access_key_id,
        secret_access_key: parsed.role_credentials.secret_access_key,
        session_token: Some(parsed.role_credentials.session_token),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const START_URL: &str = "https://sage.awsapps.com/start";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    #[test]
    fn fresh_token_for_matching_start_url() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.json"),
            r#"{"startUrl":"https://other.awsapps.com/start","accessToken":"other","expiresAt":"2026-10-20T00:00:00Z"}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("b.json"),
            r#"{"startUrl":"https://sage.awsapps.com/start","accessToken":"mine","expiresAt":"2026-10-19T18:00:00UTC","region":"us-east-1"}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        assert_eq!(cached_token(dir.path(), START_URL, now()).unwrap(), "mine");
    }

    #[test]
    fn expired_or_missing_token_asks_for_login() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("b.json"),
            r#"{"startUrl":"https://sage.awsapps.com/start","accessToken":"old","expiresAt":"2026-10-19T11:00:00Z"}"#,
        )
        .unwrap();
        assert!(matches!(
            cached_token(dir.path(), START_URL, now()),
            Err(AwsError::SsoLogin { .. })
        ));
        assert!(matches!(
            cached_token(&dir.path().join("absent"), START_URL, now()),
            Err(AwsError::SsoLogin { .. })
        ));
    }

    #[test]
    fn portal_url_carries_account_and_role() {
        let role = SsoRole {
            start_url: START_URL.into(),
            region: "us-west-2".into(),
            account_id: "111122223333".into(),
            role_name: "ReadOnly".into(),
        };
        assert_eq!(
            portal_url(&AwsConfig::default(), &role).unwrap().as_str(),
            "https://portal.sso.us-west-2.amazonaws.com/federation/credentials?account_id=111122223333&role_name=ReadOnly"
        );
    }
}
