use thiserror::Error;

pub type Result<T, E = SynapseError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum SynapseError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} {path} returned {status}: {reason}")]
    Http {
        method: String,
        path: String,
        status: u16,
        reason: String,
    },

    #[error("invalid response from {path}: {message}")]
    Decode { path: String, message: String },

    #[error("asynchronous job {token} did not finish within {seconds}s")]
    JobTimeout { token: String, seconds: u64 },

    #[error("invalid endpoint `{0}`")]
    Endpoint(String),

    #[error("no Synapse auth token found (pass --ssm-parameter, set SYNAPSE_AUTH_TOKEN, or add `authtoken` to ~/.synapseConfig)")]
    MissingCredentials,

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid resource template: {0}")]
    Template(#[from] serde_yaml::Error),

    #[error("resource `{name}` already exists as {found}, expected {expected}")]
    KindMismatch {
        name: String,
        expected: String,
        found: String,
    },

    #[error("entity `{0}` has no id")]
    MissingId(String),

    #[error("{owner} has no root wiki page")]
    NoRootWiki { owner: String },

    #[error("wiki page {wiki_id} not found under {owner}")]
    WikiNotFound { owner: String, wiki_id: String },

    #[error("attachment copy failed for file handle {file_handle_id}: {code}")]
    AttachmentCopy { file_handle_id: String, code: String },

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Pattern(#[from] regex::Error),
}

impl SynapseError {
    pub fn status(&self) -> Option<u16> {
        match self {
            SynapseError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Failure to pick exactly one entity out of a created set.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("did not find {what}")]
    NotFound { what: String },

    #[error("found {count} matches for {what}, expected exactly one")]
    Ambiguous { what: String, count: usize },
}
