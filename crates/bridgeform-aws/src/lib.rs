//! Minimal AWS access for provisioning: upload one object to S3 and read one
//! SSM parameter, signed with SigV4 over blocking HTTP, with credentials from
//! the standard provider chain.

pub mod config;
pub mod credentials;
pub mod error;
pub mod metadata;
pub mod s3;
pub mod sigv4;
pub mod sso;
pub mod ssm;
pub mod store;
pub mod sts;
mod xml;

pub use config::AwsConfig;
pub use credentials::Credentials;
pub use error::{AwsError, Result};
pub use s3::S3Client;
pub use ssm::SsmClient;
pub use sts::StsClient;
pub use store::{InMemoryObjectStore, ObjectStore, ParameterStore, StaticParameterStore};
