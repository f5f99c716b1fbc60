//! Object and parameter store seams, with in-memory implementations.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::error::{AwsError, Result};

pub trait ObjectStore {
    fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()>;
}

pub trait ParameterStore {
    fn get_parameter(&self, name: &str, with_decryption: bool) -> Result<String>;
}

/// Objects keyed by `(bucket, key)`.
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<BTreeMap<(String, String), Vec<u8>>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn keys(&self) -> Vec<(String, String)> {
        self.objects.lock().keys().cloned().collect()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        self.objects
            .lock()
            .insert((bucket.to_string(), key.to_string()), body);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticParameterStore {
    values: BTreeMap<String, String>,
}

impl StaticParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

impl ParameterStore for StaticParameterStore {
    fn get_parameter(&self, name: &str, _with_decryption: bool) -> Result<String> {
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| AwsError::ParameterNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn objects_are_overwritten_per_key() {
        let store = InMemoryObjectStore::new();
        store.put_object("b", "k", b"one".to_vec()).unwrap();
        store.put_object("b", "k", b"two".to_vec()).unwrap();
        assert_eq!(store.object("b", "k").as_deref(), Some(&b"two"[..]));
        assert_eq!(store.keys().len(), 1);
    }

    #[test]
    fn missing_parameter() {
        let store = StaticParameterStore::new().with("/synapse/token", "abc");
        assert_eq!(store.get_parameter("/synapse/token", true).unwrap(), "abc");
        assert!(matches!(
            store.get_parameter("/other", true),
            Err(AwsError::ParameterNotFound(name)) if name == "/other"
        ));
    }
}
