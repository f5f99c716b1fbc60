//! Synapse platform access for exporter study provisioning.
//!
//! - [`api::SynapseApi`]: the operations the provisioning tools need, as a trait
//!   so that every step takes an explicit client handle.
//! - [`client::SynapseClient`]: blocking HTTPS implementation (bearer token).
//! - [`memory::InMemorySynapse`]: in-process implementation used by tests.
//!
//! Operations built on the trait:
//! - [`formation`]: expand a resource template into folders/projects/views
//! - [`lookup`]: pick exactly one created entity by predicate
//! - [`acl`]: permission updates and ACL copy with a reserved principal
//! - [`schema`]: retype/widen file-view columns in one schema transaction
//! - [`storage`]: bind an external S3 storage location to a folder
//! - [`wiki`]: publish compiled markdown, copy wiki trees between entities

pub mod acl;
pub mod api;
pub mod client;
pub mod credentials;
pub mod error;
pub mod formation;
pub mod lookup;
pub mod memory;
pub mod model;
pub mod schema;
pub mod storage;
pub mod wiki;

pub use api::SynapseApi;
pub use client::{ClientConfig, SynapseClient};
pub use error::{LookupError, Result, SynapseError};
pub use memory::InMemorySynapse;
pub use model::{AccessControlList, AccessType, ColumnModel, ColumnType, Entity, EntityKind};
