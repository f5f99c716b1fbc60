//! STS `AssumeRole` and `AssumeRoleWithWebIdentity` (query protocol, XML replies).

use chrono::Utc;
use tracing::{debug, info};
use url::form_urlencoded;

use crate::config::AwsConfig;
use crate::credentials::Credentials;
use crate::error::{AwsError, Result};
use crate::sigv4::{self, SigningParams};
use crate::xml;

const SERVICE: &str = "sts";
const API_VERSION: &str = "2011-06-15";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssumeRole {
    pub role_arn: String,
    pub session_name: String,
    pub external_id: Option<String>,
    pub duration_seconds: Option<u32>,
}

pub struct StsClient {
    http: reqwest::blocking::Client,
    config: AwsConfig,
}

impl StsClient {
    pub fn new(config: AwsConfig) -> Result<Self> {
        Ok(Self {
            http: config.http_client()?,
            config,
        })
    }

    /// Temporary credentials for `request.role_arn`, signed with `source`.
    pub fn assume_role(&self, source: &Credentials, request: &AssumeRole) -> Result<Credentials> {
        let mut form = form_urlencoded::Serializer::new(String::new());
        form.append_pair("Action", "AssumeRole")
            .append_pair("Version", API_VERSION)
            .append_pair("RoleArn", &request.role_arn)
            .append_pair("RoleSessionName", &request.session_name);
        if let Some(external_id) = &request.external_id {
            form.append_pair("ExternalId", external_id);
        }
        if let Some(duration) = request.duration_seconds {
            form.append_pair("DurationSeconds", &duration.to_string());
        }
        let body = form.finish();

        let url = self.config.service_endpoint(SERVICE)?;
        let payload_sha256 = sigv4::sha256_hex(body.as_bytes());
        let params = SigningParams {
            credentials: source,
            region: &self.config.region,
            service: SERVICE,
            time: Utc::now(),
        };
        let signed = sigv4::sign(
            "POST",
            &url,
            &[("content-type", FORM_CONTENT_TYPE)],
            &payload_sha256,
            &params,
        )?;
        let mut builder = self.http.post(url.clone()).header("content-type", FORM_CONTENT_TYPE);
        for (name, value) in signed {
            builder = builder.header(name, value);
        }
        debug!(role_arn = %request.role_arn, "assuming role");
        let credentials = self.send(builder.body(body), url.as_str())?;
        info!(role_arn = %request.role_arn, session = %request.session_name, "assumed role");
        Ok(credentials)
    }

    /// Exchange an OIDC token for role credentials; the request is unsigned.
    pub fn assume_role_with_web_identity(
        &self,
        role_arn: &str,
        session_name: &str,
        token: &str,
    ) -> Result<Credentials> {
        let body = form_urlencoded::Serializer::new(String::new())
            .append_pair("Action", "AssumeRoleWithWebIdentity")
            .append_pair("Version", API_VERSION)
            .append_pair("RoleArn", role_arn)
            .append_pair("RoleSessionName", session_name)
            .append_pair("WebIdentityToken", token)
            .finish();
        let url = self.config.service_endpoint(SERVICE)?;
        let builder = self
            .http
            .post(url.clone())
            .header("content-type", FORM_CONTENT_TYPE)
            .body(body);
        let credentials = self.send(builder, url.as_str())?;
        info!(role_arn, session = session_name, "assumed role with web identity");
        Ok(credentials)
    }

    fn send(&self, builder: reqwest::blocking::RequestBuilder, url: &str) -> Result<Credentials> {
        let transport = |source: reqwest::Error| AwsError::Transport {
            url: url.to_string(),
            source,
        };
        let resp = builder.send().map_err(transport)?;
        let status = resp.status();
        let body = resp.text().map_err(transport)?;
        if !status.is_success() {
            return Err(AwsError::Http {
                service: SERVICE,
                status: status.as_u16(),
                message: xml::error_message(&body),
            });
        }
        decode_credentials(&body)
    }
}

pub(crate) fn decode_credentials(body: &str) -> Result<Credentials> {
    let mut fields = xml::element_texts(SERVICE, body, &["AccessKeyId", "SecretAccessKey", "SessionToken"])?;
    let mut take = |name: &str| {
        fields.remove(name).ok_or_else(|| AwsError::Decode {
            service: SERVICE,
            message: format!("response has no {name}"),
        })
    };
    Ok(Credentials {
        access_key_id: take("AccessKeyId")?,
        secret_access_key: take("SecretAccessKey")?,
        session_token: Some(take("SessionToken")?),
    })
}
