//! Runtime registry
//!
//! Maps artifact identity to its live runtime. Registration injects the
//! self-test trigger into the runtime. Constructed once per host
//! session and passed explicitly to whatever renders artifacts. Entries are
//! independent: registration and removal are serialized per id by the map's
//! entry API, never by a registry-wide lock.

use crate::error::RegistryError;
use crate::harness::SelfTestHarness;
use crate::runtime::ArtifactRuntime;
use artisan_artifact::{ArtifactId, SelfTestResult};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// Live artifact instances by id
pub struct RuntimeRegistry {
    harness: Arc<SelfTestHarness>,
    entries: DashMap<ArtifactId, Arc<dyn ArtifactRuntime>>,
}

impl std::fmt::Debug for RuntimeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeRegistry")
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl RuntimeRegistry {
    /// Create new registry backed by `harness`
    #[must_use]
    pub fn new(harness: Arc<SelfTestHarness>) -> Self {
        Self {
            harness,
            entries: DashMap::new(),
        }
    }

    /// Harness used for retries and error state
    #[inline]
    #[must_use]
    pub fn harness(&self) -> &Arc<SelfTestHarness> {
        &self.harness
    }

    /// Register a live instance and inject its self-test trigger
    ///
    /// # Errors
    /// Returns [`RegistryError::AlreadyRegistered`] if `id` is taken; the
    /// existing entry is left untouched and nothing is injected.
    pub async fn register(
        &self,
        id: ArtifactId,
        runtime: Arc<dyn ArtifactRuntime>,
    ) -> Result<(), RegistryError> {
        match self.entries.entry(id) {
            Entry::Occupied(_) => return Err(RegistryError::AlreadyRegistered(id)),
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&runtime));
            }
        }
        self.harness.attach(id, runtime.as_ref()).await;
        tracing::debug!(artifact = %id, "runtime registered");
        Ok(())
    }

    /// Live instance of `id`
    #[must_use]
    pub fn lookup(&self, id: &ArtifactId) -> Option<Arc<dyn ArtifactRuntime>> {
        self.entries.get(id).map(|r| Arc::clone(r.value()))
    }

    /// Remove and tear down the instance of `id`
    ///
    /// # Errors
    /// Returns [`RegistryError::NotFound`] if nothing is registered.
    pub async fn dispose(&self, id: &ArtifactId) -> Result<(), RegistryError> {
        let (_, runtime) = self
            .entries
            .remove(id)
            .ok_or(RegistryError::NotFound(*id))?;
        runtime.teardown().await;
        self.harness.forget(id);
        tracing::debug!(artifact = %id, "runtime disposed");
        Ok(())
    }

    /// Clear the error state and displayed result of `id`
    ///
    /// # Errors
    /// Returns [`RegistryError::NotFound`] if nothing is registered.
    pub fn reset(&self, id: &ArtifactId) -> Result<(), RegistryError> {
        if !self.entries.contains_key(id) {
            return Err(RegistryError::NotFound(*id));
        }
        self.harness.reset(id);
        Ok(())
    }

    /// Re-run the self-test of `id`
    ///
    /// # Errors
    /// Returns [`RegistryError::NotFound`] if nothing is registered.
    pub async fn retry(&self, id: &ArtifactId) -> Result<SelfTestResult, RegistryError> {
        let runtime = self.lookup(id).ok_or(RegistryError::NotFound(*id))?;
        Ok(self.harness.run_self_test(*id, runtime.as_ref()).await)
    }

    /// Number of live instances
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no instance is live
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids of live instances, sorted
    #[must_use]
    pub fn ids(&self) -> Vec<ArtifactId> {
        let mut ids: Vec<_> = self.entries.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;
    use crate::runtime::SelfCheckOutcome;
    use crate::store::MemoryResultStore;
    use crate::trigger::SELF_TEST_TRIGGER_JS;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        scripts: parking_lot::Mutex<Vec<String>>,
        checks: AtomicUsize,
        teardowns: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ArtifactRuntime for Counting {
        async fn inject_script(&self, script: &str) {
            self.scripts.lock().push(script.to_string());
        }

        async fn invoke_self_check(&self, _: &str) -> SelfCheckOutcome {
            self.checks.fetch_add(1, Ordering::SeqCst);
            SelfCheckOutcome::Returned(json!({"pass": true}))
        }

        async fn teardown(&self) {
            self.teardowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn registry() -> RuntimeRegistry {
        RuntimeRegistry::new(Arc::new(SelfTestHarness::new(
            Arc::new(EventBus::new("host")),
            Arc::new(MemoryResultStore::new()),
        )))
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let registry = registry();
        let id = ArtifactId::new();
        let first: Arc<dyn ArtifactRuntime> = Arc::new(Counting::default());
        registry.register(id, Arc::clone(&first)).await.unwrap();

        let second = Arc::new(Counting::default());
        let err = registry.register(id, second.clone()).await.unwrap_err();
        assert_eq!(err, RegistryError::AlreadyRegistered(id));
        assert!(Arc::ptr_eq(&registry.lookup(&id).unwrap(), &first));
        assert!(second.scripts.lock().is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn registration_injects_self_test_trigger() {
        let registry = registry();
        let id = ArtifactId::new();
        let runtime = Arc::new(Counting::default());
        registry.register(id, runtime.clone()).await.unwrap();

        assert_eq!(*runtime.scripts.lock(), vec![SELF_TEST_TRIGGER_JS.to_string()]);
        assert!(registry.harness().debug_surface(&id).is_some());
    }

    #[tokio::test]
    async fn retry_and_dispose() {
        let registry = registry();
        let id = ArtifactId::new();
        let runtime = Arc::new(Counting::default());
        registry.register(id, runtime.clone()).await.unwrap();

        assert!(registry.retry(&id).await.unwrap().pass);
        assert!(registry.retry(&id).await.unwrap().pass);
        assert_eq!(runtime.checks.load(Ordering::SeqCst), 2);

        registry.dispose(&id).await.unwrap();
        assert_eq!(runtime.teardowns.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
        assert!(registry.harness().debug_surface(&id).is_none());
        assert_eq!(
            registry.dispose(&id).await.unwrap_err(),
            RegistryError::NotFound(id)
        );
        assert!(registry.retry(&id).await.is_err());
    }

    #[tokio::test]
    async fn reset_clears_error_state() {
        let registry = registry();
        let id = ArtifactId::new();
        assert!(registry.reset(&id).is_err());

        registry
            .register(id, Arc::new(Counting::default()))
            .await
            .unwrap();
        registry.harness().record_error(id, "boom");
        assert!(registry.harness().error_state(&id).unwrap().has_error);

        registry.reset(&id).unwrap();
        assert!(!registry.harness().error_state(&id).unwrap().has_error);
    }

    #[tokio::test]
    async fn ids_are_sorted() {
        let registry = registry();
        let mut expected: Vec<_> = (0..3).map(|_| ArtifactId::new()).collect();
        for id in expected.iter().rev() {
            registry
                .register(*id, Arc::new(Counting::default()))
                .await
                .unwrap();
        }
        expected.sort_unstable();
        assert_eq!(registry.ids(), expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_registration_admits_one() {
        let registry = Arc::new(registry());
        let id = ArtifactId::new();
        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    registry
                        .register(id, Arc::new(Counting::default()))
                        .await
                        .is_ok()
                })
            })
            .collect();

        let mut admitted = 0;
        for task in tasks {
            if task.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
    }
}
