//! Auth token resolution.
//!
//! Order: explicit token (e.g. fetched from a parameter store) →
//! `SYNAPSE_AUTH_TOKEN` → `authtoken` under `[authentication]` in
//! `~/.synapseConfig`.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Result, SynapseError};

pub const AUTH_TOKEN_ENV: &str = "SYNAPSE_AUTH_TOKEN";
pub const CONFIG_FILE_NAME: &str = ".synapseConfig";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    Explicit,
    Environment,
    ConfigFile(PathBuf),
}

impl fmt::Display for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenSource::Explicit => f.write_str("explicit token"),
            TokenSource::Environment => write!(f, "${AUTH_TOKEN_ENV}"),
            TokenSource::ConfigFile(path) => write!(f, "{}", path.display()),
        }
    }
}

pub struct ResolvedToken {
    pub token: String,
    pub source: TokenSource,
}

impl fmt::Debug for ResolvedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedToken")
            .field("token", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(CONFIG_FILE_NAME))
}

/// Resolve from the process environment and the default config file.
pub fn resolve_token(explicit: Option<String>) -> Result<ResolvedToken> {
    let env_token = std::env::var(AUTH_TOKEN_ENV).ok();
    resolve_token_from(explicit, env_token, default_config_path().as_deref())
}

pub fn resolve_token_from(
    explicit: Option<String>,
    env_token: Option<String>,
    config_path: Option<&Path>,
) -> Result<ResolvedToken> {
    let non_empty = |t: Option<String>| t.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());

    if let Some(token) = non_empty(explicit) {
        return Ok(ResolvedToken {
            token,
            source: TokenSource::Explicit,
        });
    }
    if let Some(token) = non_empty(env_token) {
        return Ok(ResolvedToken {
            token,
            source: TokenSource::Environment,
        });
    }
    if let Some(path) = config_path.filter(|p| p.exists()) {
        let text = std::fs::read_to_string(path).map_err(|source| SynapseError::Io {
            path: path.display().to_string(),
            source,
        })?;
        if let Some(token) = config_file_token(&text) {
            return Ok(ResolvedToken {
                token,
                source: TokenSource::ConfigFile(path.to_path_buf()),
            });
        }
    }
    Err(SynapseError::MissingCredentials)
}

/// `authtoken` from the `[authentication]` section of a `.synapseConfig` file.
pub fn config_file_token(text: &str) -> Option<String> {
    let mut in_auth = false;
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            in_auth = section.trim().eq_ignore_ascii_case("authentication");
            continue;
        }
        if !in_auth {
            continue;
        }
        if let Some((key, value)) = line.split_once('=').or_else(|| line.split_once(':')) {
            if key.trim().eq_ignore_ascii_case("authtoken") && !value.trim().is_empty() {
                return Some(value.trim().to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = "\
[cache]
location = ~/.synapseCache

[authentication]
# personal access token
username = someone
authtoken = eyJ0eXAi.abc.def
";

    #[test]
    fn token_is_read_from_authentication_section() {
        assert_eq!(config_file_token(CONFIG).as_deref(), Some("eyJ0eXAi.abc.def"));
        assert_eq!(config_file_token("[other]\nauthtoken = nope\n"), None);
    }

    #[test]
    fn explicit_token_wins() {
        let resolved =
            resolve_token_from(Some("explicit".into()), Some("env".into()), None).unwrap();
        assert_eq!(resolved.token, "explicit");
        assert_eq!(resolved.source, TokenSource::Explicit);
    }

    #[test]
    fn environment_before_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, CONFIG).unwrap();

        let resolved = resolve_token_from(None, Some("env-token".into()), Some(&path)).unwrap();
        assert_eq!(resolved.source, TokenSource::Environment);

        let resolved = resolve_token_from(None, Some("  ".into()), Some(&path)).unwrap();
        assert_eq!(resolved.token, "eyJ0eXAi.abc.def");
        assert_eq!(resolved.source, TokenSource::ConfigFile(path));
    }

    #[test]
    fn nothing_configured_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            resolve_token_from(None, None, Some(&missing)),
            Err(SynapseError::MissingCredentials)
        ));
    }

    #[test]
    fn debug_output_hides_token() {
        let resolved = resolve_token_from(Some("secret".into()), None, None).unwrap();
        assert!(!format!("{resolved:?}").contains("secret"));
    }
}
