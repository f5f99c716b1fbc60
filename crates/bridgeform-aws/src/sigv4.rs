//! AWS Signature Version 4 request signing.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use url::Url;

use crate::credentials::Credentials;
use crate::error::{AwsError, Result};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Hex SHA-256 of an empty payload.
pub const EMPTY_PAYLOAD_SHA256: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn hmac_sha256(key: &[u8], data: &str) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| AwsError::Signing(e.to_string()))?;
    mac.update(data.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Percent-encode everything outside the unreserved set (`A-Za-z0-9-_.~`).
pub fn uri_encode(input: &str, encode_slash: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(byte as char),
            b'/' if !encode_slash => out.push('/'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[derive(Debug, Clone, Copy)]
pub struct SigningParams<'a> {
    pub credentials: &'a Credentials,
    pub region: &'a str,
    pub service: &'a str,
    pub time: DateTime<Utc>,
}

impl SigningParams<'_> {
    fn date(&self) -> String {
        self.time.format("%Y%m%d").to_string()
    }

    fn amz_date(&self) -> String {
        self.time.format("%Y%m%dT%H%M%SZ").to_string()
    }

    fn scope(&self) -> String {
        format!("{}/{}/{}/aws4_request", self.date(), self.region, self.service)
    }
}

fn host_header(url: &Url) -> Result<String> {
    let host = url
        .host_str()
        .ok_or_else(|| AwsError::Endpoint(url.to_string()))?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

fn canonical_query(url: &Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (uri_encode(&k, true), uri_encode(&v, true)))
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Lower-cased, trimmed and sorted headers, plus the `;`-joined names.
fn canonical_headers(headers: &[(String, String)]) -> (String, String) {
    let mut normalized: Vec<(String, String)> = headers
        .iter()
        .map(|(name, value)| {
            let value = value.split_whitespace().collect::<Vec<_>>().join(" ");
            (name.to_ascii_lowercase(), value)
        })
        .collect();
    normalized.sort();
    let canonical = normalized
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect::<String>();
    let signed = normalized
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");
    (canonical, signed)
}

pub(crate) fn canonical_request(
    method: &str,
    url: &Url,
    headers: &[(String, String)],
    payload_sha256: &str,
) -> (String, String) {
    let path = match url.path() {
        "" => "/",
        path => path,
    };
    let (canonical_headers, signed_headers) = canonical_headers(headers);
    let request = format!(
        "{method}\n{path}\n{}\n{canonical_headers}\n{signed_headers}\n{payload_sha256}",
        canonical_query(url)
    );
    (request, signed_headers)
}

pub(crate) fn signing_key(params: &SigningParams<'_>) -> Result<Vec<u8>> {
    let secret = format!("AWS4{}", params.credentials.secret_access_key);
    let date_key = hmac_sha256(secret.as_bytes(), &params.date())?;
    let region_key = hmac_sha256(&date_key, params.region)?;
    let service_key = hmac_sha256(&region_key, params.service)?;
    hmac_sha256(&service_key, "aws4_request")
}

/// Headers to add to the request so that it carries a valid signature:
/// `x-amz-date`, `authorization` and, for temporary credentials,
/// `x-amz-security-token`.
///
/// `headers` are the request's own headers that should be signed; `host` and
/// `x-amz-date` are always included.
pub fn sign(
    method: &str,
    url: &Url,
    headers: &[(&str, &str)],
    payload_sha256: &str,
    params: &SigningParams<'_>,
) -> Result<Vec<(&'static str, String)>> {
    let amz_date = params.amz_date();
    let mut all: Vec<(String, String)> = headers
        .iter()
        .map(|(n, v)| (n.to_string(), v.to_string()))
        .collect();
    all.push(("host".to_string(), host_header(url)?));
    all.push(("x-amz-date".to_string(), amz_date.clone()));
    if let Some(token) = &params.credentials.session_token {
        all.push(("x-amz-security-token".to_string(), token.clone()));
    }

    let (request, signed_headers) = canonical_request(method, url, &all, payload_sha256);
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{}\n{}",
        params.scope(),
        sha256_hex(request.as_bytes())
    );
    let signature = hex::encode(hmac_sha256(&signing_key(params)?, &string_to_sign)?);

    let authorization = format!(
        "{ALGORITHM} Credential={}/{}, SignedHeaders={signed_headers}, Signature={signature}",
        params.credentials.access_key_id,
        params.scope()
    );
    let mut out = vec![("x-amz-date", amz_date), ("authorization", authorization)];
    if let Some(token) = &params.credentials.session_token {
        out.push(("x-amz-security-token", token.clone()));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn example_credentials() -> Credentials {
        Credentials::new("AKIDEXAMPLE", "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY")
    }

    fn example_params(credentials: &Credentials) -> SigningParams<'_> {
        SigningParams {
            credentials,
            region: "us-east-1",
            service: "iam",
            time: Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap(),
        }
    }

    const CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

    #[test]
    fn documented_iam_example() {
        let credentials = example_credentials();
        let params = example_params(&credentials);
        let url = Url::parse("https://iam.amazonaws.com/?Action=ListUsers&Version=2010-05-08").unwrap();

        assert_eq!(
            hex::encode(signing_key(&params).unwrap()),
            "c4afb1cc5771d871763a393e44b703571b55cc28424d1a5e86da6ed3c154a4b9"
        );

        let headers = sign("GET", &url, &[("content-type", CONTENT_TYPE)], EMPTY_PAYLOAD_SHA256, &params).unwrap();
        assert_eq!(headers[0], ("x-amz-date", "20150830T123600Z".to_string()));
        assert_eq!(
            headers[1].1,
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/iam/aws4_request, \
             SignedHeaders=content-type;host;x-amz-date, \
             Signature=5d672d79c15b13162d9279b0855cfba6789a8edb4c82c400e06b5924a6f2b5d7"
        );
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn canonical_request_layout() {
        let url = Url::parse("https://iam.amazonaws.com/?Version=2010-05-08&Action=ListUsers").unwrap();
        let headers = vec![
            ("Host".to_string(), "iam.amazonaws.com".to_string()),
            ("Content-Type".to_string(), format!("  {CONTENT_TYPE}")),
            ("X-Amz-Date".to_string(), "20150830T123600Z".to_string()),
        ];
        let (request, signed) = canonical_request("GET", &url, &headers, EMPTY_PAYLOAD_SHA256);
        assert_eq!(signed, "content-type;host;x-amz-date");
        assert_eq!(
            request,
            format!(
                "GET\n/\nAction=ListUsers&Version=2010-05-08\n\
                 content-type:{CONTENT_TYPE}\nhost:iam.amazonaws.com\nx-amz-date:20150830T123600Z\n\n\
                 content-type;host;x-amz-date\n{EMPTY_PAYLOAD_SHA256}"
            )
        );
        assert_eq!(
            sha256_hex(request.as_bytes()),
            "f536975d06c0309214f805bb90ccff089219ecd68b2577efef23edd43b7e1a59"
        );
    }

    #[test]
    fn session_token_is_signed_and_returned() {
        let mut credentials = example_credentials();
        credentials.session_token = Some("FQoGZXIvYXdzEXAMPLE".to_string());
        let params = example_params(&credentials);
        let url = Url::parse("http://localhost:4566/bucket/key").unwrap();
        let headers = sign("PUT", &url, &[], EMPTY_PAYLOAD_SHA256, &params).unwrap();
        assert!(headers[1].1.contains("SignedHeaders=host;x-amz-date;x-amz-security-token"));
        assert_eq!(headers[2], ("x-amz-security-token", "FQoGZXIvYXdzEXAMPLE".to_string()));
    }

    #[test]
    fn uri_encoding() {
        assert_eq!(uri_encode("a b/c~d", false), "a%20b/c~d");
        assert_eq!(uri_encode("a b/c", true), "a%20b%2Fc");
        assert_eq!(sha256_hex(b""), EMPTY_PAYLOAD_SHA256);
    }
}
