//! S3 `PutObject`.

use chrono::Utc;
use tracing::{debug, info};
use url::Url;

use crate::config::AwsConfig;
use crate::credentials::Credentials;
use crate::error::{AwsError, Result};
use crate::sigv4::{self, SigningParams};
use crate::store::ObjectStore;
use crate::xml;

const SERVICE: &str = "s3";

pub struct S3Client {
    http: reqwest::blocking::Client,
    config: AwsConfig,
    credentials: Credentials,
}

impl S3Client {
    pub fn new(config: AwsConfig, credentials: Credentials) -> Result<Self> {
        Ok(Self {
            http: config.http_client()?,
            config,
            credentials,
        })
    }

    /// Virtual-hosted style on AWS, path style against an endpoint override.
    pub fn object_url(&self, bucket: &str, key: &str) -> Result<Url> {
        let key = sigv4::uri_encode(key.trim_start_matches('/'), false);
        let raw = match &self.config.endpoint_url {
            Some(endpoint) => format!("{}/{bucket}/{key}", endpoint.as_str().trim_end_matches('/')),
            None => format!("https://{bucket}.s3.{}.amazonaws.com/{key}", self.config.region),
        };
        Url::parse(&raw).map_err(|_| AwsError::Endpoint(raw))
    }
}

impl ObjectStore for S3Client {
    fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        let url = self.object_url(bucket, key)?;
        let payload_sha256 = sigv4::sha256_hex(&body);
        let params = SigningParams {
            credentials: &self.credentials,
            region: &self.config.region,
            service: SERVICE,
            time: Utc::now(),
        };
        let signed = sigv4::sign(
            "PUT",
            &url,
            &[("x-amz-content-sha256", payload_sha256.as_str())],
            &payload_sha256,
            &params,
        )?;

        debug!(%url, bytes = body.len(), "PUT object");
        let mut request = self
            .http
            .put(url.clone())
            .header("x-amz-content-sha256", &payload_sha256);
        for (name, value) in signed {
            request = request.header(name, value);
        }
        let resp = request
            .body(body)
            .send()
            .map_err(|source| AwsError::Transport {
                url: url.to_string(),
                source,
            })?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().unwrap_or_default();
            return Err(AwsError::Http {
                service: SERVICE,
                status,
                message: xml::error_message(&body),
            });
        }
        info!(bucket, key, "uploaded object");
        Ok(())
    }
}
