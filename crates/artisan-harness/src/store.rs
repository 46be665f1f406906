//! Durable storage for the latest self-test result per artifact

use crate::error::HarnessError;
use artisan_artifact::ArtifactId;
use dashmap::DashMap;

/// Key prefix for persisted self-test results
pub const RESULT_KEY_PREFIX: &str = "artisan:selftest:";

/// Storage key for an artifact's latest result
#[inline]
#[must_use]
pub fn result_key(id: &ArtifactId) -> String {
    format!("{RESULT_KEY_PREFIX}{id}")
}

/// Key-value store the debug surface persists into
pub trait ResultStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value
    ///
    /// # Errors
    /// Returns [`HarnessError::Store`] if the value could not be written.
    fn put(&self, key: &str, value: String) -> Result<(), HarnessError>;

    /// Value stored under `key`
    fn get(&self, key: &str) -> Option<String>;

    /// Remove the value under `key`
    fn remove(&self, key: &str);
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryResultStore {
    entries: DashMap<String, String>,
}

impl MemoryResultStore {
    /// Create new empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored values
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is stored
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ResultStore for MemoryResultStore {
    fn put(&self, key: &str, value: String) -> Result<(), HarnessError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    fn remove(&self, key: &str) {
        self.entries.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_scoped_by_artifact() {
        let a = ArtifactId::new();
        let b = ArtifactId::new();
        assert_ne!(result_key(&a), result_key(&b));
        assert!(result_key(&a).starts_with("artisan:selftest:"));
    }

    #[test]
    fn put_replaces() {
        let store = MemoryResultStore::new();
        store.put("k", "1".into()).unwrap();
        store.put("k", "2".into()).unwrap();
        assert_eq!(store.get("k").as_deref(), Some("2"));
        assert_eq!(store.len(), 1);
        store.remove("k");
        assert!(store.is_empty());
    }
}
