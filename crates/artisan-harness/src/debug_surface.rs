//! Per-artifact debug surface
//!
//! Shows the latest self-test outcome as a one-line status plus a detail
//! dump, and persists the latest result under [`result_key`].

use crate::bus::{ArtifactEvent, EventSubscriber};
use crate::store::{result_key, ResultStore};
use artisan_artifact::{ArtifactId, SelfTestResult};
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Debug, Default)]
struct View {
    status: Option<String>,
    detail: String,
    last: Option<SelfTestResult>,
}

/// Debug surface of one artifact
pub struct DebugSurface {
    artifact_id: ArtifactId,
    store: Arc<dyn ResultStore>,
    view: RwLock<View>,
}

impl std::fmt::Debug for DebugSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugSurface")
            .field("artifact_id", &self.artifact_id)
            .field("view", &*self.view.read())
            .finish_non_exhaustive()
    }
}

impl DebugSurface {
    /// Create new surface for `artifact_id`
    #[must_use]
    pub fn new(artifact_id: ArtifactId, store: Arc<dyn ResultStore>) -> Self {
        Self {
            artifact_id,
            store,
            view: RwLock::new(View::default()),
        }
    }

    /// Artifact this surface belongs to
    #[inline]
    #[must_use]
    pub fn artifact_id(&self) -> ArtifactId {
        self.artifact_id
    }

    /// Human-readable pass/fail line; `None` before the first result
    #[must_use]
    pub fn status_line(&self) -> Option<String> {
        self.view.read().status.clone()
    }

    /// Pretty-printed details of the latest result
    #[must_use]
    pub fn detail(&self) -> String {
        self.view.read().detail.clone()
    }

    /// Latest result
    #[must_use]
    pub fn last_result(&self) -> Option<SelfTestResult> {
        self.view.read().last.clone()
    }

    /// Result persisted for this artifact, if any
    #[must_use]
    pub fn persisted(&self) -> Option<SelfTestResult> {
        let raw = self.store.get(&result_key(&self.artifact_id))?;
        serde_json::from_str(&raw).ok()
    }

    /// Forget the displayed and persisted result
    pub fn clear(&self) {
        *self.view.write() = View::default();
        self.store.remove(&result_key(&self.artifact_id));
    }

    fn show(&self, result: &SelfTestResult) {
        let status = if result.pass {
            "Self-test: PASS".to_string()
        } else {
            match result.details.get("error").and_then(|e| e.as_str()) {
                Some(error) => format!("Self-test: FAIL ({error})"),
                None => "Self-test: FAIL".to_string(),
            }
        };
        let detail = serde_json::to_string_pretty(&result.details)
            .unwrap_or_else(|_| result.details.to_string());

        {
            let mut view = self.view.write();
            view.status = Some(status);
            view.detail = detail;
            view.last = Some(result.clone());
        }

        match serde_json::to_string(result) {
            Ok(json) => {
                if let Err(e) = self.store.put(&result_key(&self.artifact_id), json) {
                    tracing::warn!(artifact = %self.artifact_id, error = %e, "could not persist self-test result");
                }
            }
            Err(e) => tracing::warn!(artifact = %self.artifact_id, error = %e, "could not encode self-test result"),
        }
    }
}

impl EventSubscriber for DebugSurface {
    fn on_event(&self, event: &ArtifactEvent) {
        if let ArtifactEvent::SelfTestResult {
            artifact_id,
            result,
        } = event
        {
            if *artifact_id == self.artifact_id {
                self.show(result);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HarnessError;
    use crate::store::MemoryResultStore;
    use serde_json::json;

    fn event(id: ArtifactId, result: SelfTestResult) -> ArtifactEvent {
        ArtifactEvent::SelfTestResult {
            artifact_id: id,
            result,
        }
    }

    #[test]
    fn shows_and_persists_latest_result() {
        let id = ArtifactId::new();
        let store = Arc::new(MemoryResultStore::new());
        let surface = DebugSurface::new(id, store.clone());
        assert_eq!(surface.status_line(), None);

        surface.on_event(&event(id, SelfTestResult::passed(json!({"checks": 2}))));
        assert_eq!(surface.status_line().as_deref(), Some("Self-test: PASS"));
        assert!(surface.detail().contains("\"checks\": 2"));
        assert_eq!(surface.persisted().map(|r| r.pass), Some(true));

        surface.on_event(&event(id, SelfTestResult::diagnostic("no routine")));
        assert_eq!(
            surface.status_line().as_deref(),
            Some("Self-test: FAIL (no routine)")
        );
        assert_eq!(surface.persisted().map(|r| r.pass), Some(false));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn ignores_other_artifacts() {
        let surface = DebugSurface::new(ArtifactId::new(), Arc::new(MemoryResultStore::new()));
        surface.on_event(&event(ArtifactId::new(), SelfTestResult::passed(json!(null))));
        assert!(surface.last_result().is_none());
    }

    #[test]
    fn store_failure_keeps_display() {
        struct Broken;
        impl ResultStore for Broken {
            fn put(&self, _: &str, _: String) -> Result<(), HarnessError> {
                Err(HarnessError::Store("disk full".into()))
            }
            fn get(&self, _: &str) -> Option<String> {
                None
            }
            fn remove(&self, _: &str) {}
        }

        let id = ArtifactId::new();
        let surface = DebugSurface::new(id, Arc::new(Broken));
        surface.on_event(&event(id, SelfTestResult::passed(json!(null))));
        assert_eq!(surface.status_line().as_deref(), Some("Self-test: PASS"));
        assert!(surface.persisted().is_none());
    }

    #[test]
    fn clear_forgets_everything() {
        let id = ArtifactId::new();
        let surface = DebugSurface::new(id, Arc::new(MemoryResultStore::new()));
        surface.on_event(&event(id, SelfTestResult::passed(json!(null))));
        surface.clear();
        assert!(surface.status_line().is_none());
        assert!(surface.persisted().is_none());
    }
}
