//! Field extraction from the XML bodies returned by S3 and STS.

use std::collections::BTreeMap;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{AwsError, Result};

/// Text of the first element with each local name in `names`.
pub(crate) fn element_texts(service: &'static str, body: &str, names: &[&str]) -> Result<BTreeMap<String, String>> {
    let decode = |e: quick_xml::Error| AwsError::Decode {
        service,
        message: e.to_string(),
    };
    let mut reader = Reader::from_str(body);
    let mut current: Option<String> = None;
    let mut out = BTreeMap::new();
    loop {
        match reader.read_event().map_err(decode)? {
            Event::Start(start) => {
                current = Some(String::from_utf8_lossy(start.local_name().as_ref()).into_owned());
            }
            Event::Text(text) => {
                if let Some(name) = current.as_deref().filter(|n| names.contains(n)) {
                    let value = text.unescape().map_err(decode)?;
                    out.entry(name.to_string())
                        .or_insert_with(|| value.trim().to_string());
                }
            }
            Event::End(_) => current = None,
            Event::Eof => return Ok(out),
            _ => {}
        }
    }
}

/// `Code: Message` from an AWS XML error document, or the trimmed body.
pub(crate) fn error_message(body: &str) -> String {
    let fields = element_texts("xml", body, &["Code", "Message"]).unwrap_or_default();
    match (fields.get("Code"), fields.get("Message")) {
        (Some(code), Some(message)) if !message.is_empty() => format!("{code}: {message}"),
        (Some(code), _) => code.clone(),
        (None, Some(message)) => message.clone(),
        (None, None) => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_fields_are_found() {
        let body = "<AssumeRoleResponse><AssumeRoleResult><Credentials>\
                    <AccessKeyId>ASIA1</AccessKeyId><SessionToken>a&amp;b</SessionToken>\
                    </Credentials></AssumeRoleResult></AssumeRoleResponse>";
        let fields = element_texts("sts", body, &["AccessKeyId", "SessionToken", "Expiration"]).unwrap();
        assert_eq!(fields.get("AccessKeyId").map(String::as_str), Some("ASIA1"));
        assert_eq!(fields.get("SessionToken").map(String::as_str), Some("a&b"));
        assert!(!fields.contains_key("Expiration"));
    }

    #[test]
    fn error_documents() {
        assert_eq!(
            error_message("<ErrorResponse><Error><Code>AccessDenied</Code><Message>nope</Message></Error></ErrorResponse>"),
            "AccessDenied: nope"
        );
        assert_eq!(error_message("<Error><Code>NoSuchBucket</Code></Error>"), "NoSuchBucket");
        assert_eq!(error_message("  gateway timeout\n"), "gateway timeout");
    }
}
