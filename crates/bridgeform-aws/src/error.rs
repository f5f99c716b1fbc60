use thiserror::Error;

pub type Result<T, E = AwsError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum AwsError {
    #[error("no AWS credentials found (set AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY or configure a profile)")]
    MissingCredentials,

    #[error("profile `{profile}` not found in {path}")]
    ProfileNotFound { profile: String, path: String },

    #[error("profile `{profile}` is invalid: {reason}")]
    InvalidProfile { profile: String, reason: String },

    #[error("profile `{profile}` sources its credentials from itself through a chain")]
    ProfileCycle { profile: String },

    #[error("no valid SSO token cached for {start_url}; run `aws sso login`")]
    SsoLogin { start_url: String },

    #[error("profile `{profile}` in {path} is missing `{key}`")]
    IncompleteProfile {
        profile: String,
        path: String,
        key: &'static str,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid endpoint `{0}`")]
    Endpoint(String),

    #[error("request signing failed: {0}")]
    Signing(String),

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} returned {status}: {message}")]
    Http {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("invalid {service} response: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },

    #[error("parameter `{0}` not found")]
    ParameterNotFound(String),
}

impl AwsError {
    pub fn status(&self) -> Option<u16> {
        match self {
            AwsError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
