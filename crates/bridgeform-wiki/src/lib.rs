//! Dashboard wiki generation for exporter study projects.
//!
//! A layout document (YAML) describes one or more dashboard *targets*. Each
//! target is a grid of cells; every cell names one of the fixed table queries
//! in [`query`] and is rendered either as a plot widget or as a raw table
//! widget.
//!
//! ```text
//! layout.yaml ──► layout::parse ──► TargetLayout ──► markdown::compile ──► wiki markdown
//!                                        │
//!                                        └── query::QueryKind::sql(table_id)
//! ```
//!
//! Nothing in this crate talks to the network; publishing the markdown lives
//! in `bridgeform-synapse`.

pub mod error;
pub mod layout;
pub mod markdown;
pub mod query;

pub use error::{LayoutError, Result};
pub use layout::{LayoutCell, LayoutDocument, TargetLayout};
pub use markdown::{compile, Widget};
pub use query::{build_query, QueryKind};
