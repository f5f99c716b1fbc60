//! Region, profile and endpoint settings shared by the service clients.

use std::time::Duration;

use url::Url;

use crate::error::{AwsError, Result};

pub const DEFAULT_REGION: &str = "us-east-1";
pub const REGION_ENV: &str = "AWS_REGION";
pub const PROFILE_ENV: &str = "AWS_PROFILE";
pub const ENDPOINT_URL_ENV: &str = "AWS_ENDPOINT_URL";

#[derive(Debug, Clone, PartialEq)]
pub struct AwsConfig {
    pub region: String,
    /// Named profile in the shared config/credentials files.
    pub profile: Option<String>,
    /// Overrides every service endpoint (e.g. a local S3 emulator).
    pub endpoint_url: Option<Url>,
    pub timeout: Duration,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            profile: None,
            endpoint_url: None,
            timeout: Duration::from_secs(60),
        }
    }
}

impl AwsConfig {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            ..Self::default()
        }
    }

    pub fn with_profile(mut self, profile: Option<String>) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_endpoint_url(mut self, endpoint_url: Option<&str>) -> Result<Self> {
        self.endpoint_url = endpoint_url
            .map(|raw| Url::parse(raw).map_err(|_| AwsError::Endpoint(raw.to_string())))
            .transpose()?;
        Ok(self)
    }

    /// Base URL for `service` (`s3`, `ssm`, ...).
    pub fn service_endpoint(&self, service: &str) -> Result<Url> {
        match &self.endpoint_url {
            Some(url) => Ok(url.clone()),
            None => {
                let raw = format!("https://{service}.{}.amazonaws.com/", self.region);
                Url::parse(&raw).map_err(|_| AwsError::Endpoint(raw))
            }
        }
    }

    pub(crate) fn http_client(&self) -> Result<reqwest::blocking::Client> {
        reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|source| AwsError::Transport {
                url: "client".to_string(),
                source,
            })
    }
}
