use thiserror::Error;

pub type Result<T, E = LayoutError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("failed to read layout file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid layout document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("no layout target named `{name}`")]
    UnknownTarget { name: String },

    #[error("layout target `{name}` is declared {count} times")]
    DuplicateTarget { name: String, count: usize },

    #[error("layout target `{name}` has no content cells")]
    EmptyContent { name: String },

    #[error("layout target `{name}` declares cell (row {row}, col {col}) more than once")]
    DuplicateCell { name: String, row: i64, col: i64 },

    #[error("unknown query function `{name}`")]
    UnknownQuery { name: String },
}
