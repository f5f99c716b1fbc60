//! SSM `GetParameter`.

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::AwsConfig;
use crate::credentials::Credentials;
use crate::error::{AwsError, Result};
use crate::sigv4::{self, SigningParams};
use crate::store::ParameterStore;

const SERVICE: &str = "ssm";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const GET_PARAMETER_TARGET: &str = "AmazonSSM.GetParameter";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetParameterResponse {
    parameter: Parameter,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Parameter {
    value: String,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(rename = "__type", default)]
    kind: String,
    #[serde(alias = "Message", default)]
    message: String,
}

pub struct SsmClient {
    http: reqwest::blocking::Client,
    config: AwsConfig,
    credentials: Credentials,
}

impl SsmClient {
    pub fn new(config: AwsConfig, credentials: Credentials) -> Result<Self> {
        Ok(Self {
            http: config.http_client()?,
            config,
            credentials,
        })
    }
}

fn decode_value(body: &str) -> Result<String> {
    serde_json::from_str::<GetParameterResponse>(body)
        .map(|r| r.parameter.value)
        .map_err(|e| AwsError::Decode {
            service: SERVICE,
            message: e.to_string(),
        })
}

fn decode_error(name: &str, status: u16, body: &str) -> AwsError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    if parsed.kind.ends_with("ParameterNotFound") {
        return AwsError::ParameterNotFound(name.to_string());
    }
    let message = match (parsed.kind.is_empty(), parsed.message.is_empty()) {
        (true, true) => body.trim().to_string(),
        (false, true) => parsed.kind,
        _ => parsed.message,
    };
    AwsError::Http {
        service: SERVICE,
        status,
        message,
    }
}

impl ParameterStore for SsmClient {
    fn get_parameter(&self, name: &str, with_decryption: bool) -> Result<String> {
        let url = self.config.service_endpoint(SERVICE)?;
        let payload = json!({ "Name": name, "WithDecryption": with_decryption }).to_string();
        let payload_sha256 = sigv4::sha256_hex(payload.as_bytes());
        let params = SigningParams {
            credentials: &self.credentials,
            region: &self.config.region,
            service: SERVICE,
            time: Utc::now(),
        };
        let signed = sigv4::sign(
            "POST",
            &url,
            &[("content-type", CONTENT_TYPE), ("x-amz-target", GET_PARAMETER_TARGET)],
            &payload_sha256,
            &params,
        )?;

        debug!(parameter = name, "fetching SSM parameter");
        let mut request = self
            .http
            .post(url.clone())
            .header("content-type", CONTENT_TYPE)
            .header("x-amz-target", GET_PARAMETER_TARGET);
        for (header, value) in signed {
            request = request.header(header, value);
        }
        let resp = request
            .body(payload)
            .send()
            .map_err(|source| AwsError::Transport {
                url: url.to_string(),
                source,
            })?;
        let status = resp.status();
        let body = resp.text().map_err(|source| AwsError::Transport {
            url: url.to_string(),
            source,
        })?;
        if !status.is_success() {
            return Err(decode_error(name, status.as_u16(), &body));
        }
        decode_value(&body)
    }
}
