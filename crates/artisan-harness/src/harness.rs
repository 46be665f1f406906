//! Self-test harness
//!
//! Invokes an artifact's self-check routine, normalizes the outcome and
//! publishes it on two channels: the host-wide bus and a bus scoped to the
//! artifact. Each artifact gets, once, a scope holding its bus, a
//! [`DebugSurface`] and an [`ErrorTracker`]. Results are also handed to the
//! [`ReportingSink`] on a detached task whose failure is only logged.

use crate::bus::{ArtifactEvent, EventBus, Topic};
use crate::debug_surface::DebugSurface;
use crate::error_state::{ErrorState, ErrorTracker};
use crate::reporting::ReportingSink;
use crate::runtime::ArtifactRuntime;
use crate::store::ResultStore;
use crate::trigger::{parse_artifact_message, ArtifactMessage, SELF_TEST_TRIGGER_JS};
use artisan_artifact::{ArtifactId, SelfTestResult};
use artisan_guard::SELF_TEST_ROUTINE;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;

/// Per-artifact observers
#[derive(Debug, Clone)]
pub struct ArtifactScope {
    /// Bus scoped to the artifact's container
    pub bus: Arc<EventBus>,
    /// Debug surface subscribed to `bus`
    pub debug: Arc<DebugSurface>,
    /// Error tracker subscribed to `bus`
    pub errors: Arc<ErrorTracker>,
}

/// Self-test protocol driver
pub struct SelfTestHarness {
    host_bus: Arc<EventBus>,
    store: Arc<dyn ResultStore>,
    sink: Option<Arc<dyn ReportingSink>>,
    scopes: DashMap<ArtifactId, ArtifactScope>,
}

impl std::fmt::Debug for SelfTestHarness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelfTestHarness")
            .field("host_bus", &self.host_bus)
            .field("has_sink", &self.sink.is_some())
            .field("scopes", &self.scopes.len())
            .finish_non_exhaustive()
    }
}

impl SelfTestHarness {
    /// Create new harness
    #[must_use]
    pub fn new(host_bus: Arc<EventBus>, store: Arc<dyn ResultStore>) -> Self {
        Self {
            host_bus,
            store,
            sink: None,
            scopes: DashMap::new(),
        }
    }

    /// With a reporting sink
    #[inline]
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn ReportingSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Host-wide bus
    #[inline]
    #[must_use]
    pub fn host_bus(&self) -> &Arc<EventBus> {
        &self.host_bus
    }

    /// Scope of `id`, created on first use
    ///
    /// Creation is idempotent: the debug surface and error tracker are
    /// subscribed exactly once per artifact.
    pub fn scope(&self, id: ArtifactId) -> ArtifactScope {
        self.scopes
            .entry(id)
            .or_insert_with(|| {
                let bus = Arc::new(EventBus::new(format!("artifact:{id}")));
                let debug = Arc::new(DebugSurface::new(id, Arc::clone(&self.store)));
                let errors = Arc::new(ErrorTracker::new(id));
                bus.subscribe(Topic::SelfTestResult, debug.clone());
                bus.subscribe(Topic::ArtifactError, errors.clone());
                tracing::debug!(artifact = %id, "debug surface attached");
                ArtifactScope { bus, debug, errors }
            })
            .clone()
    }

    /// Prepare a freshly rendered artifact
    ///
    /// Creates its scope and injects the trigger routine into its execution
    /// context, so the artifact can run its self-check and post the result
    /// back through [`handle_message`](Self::handle_message).
    pub async fn attach(&self, id: ArtifactId, runtime: &dyn ArtifactRuntime) -> ArtifactScope {
        let scope = self.scope(id);
        runtime.inject_script(SELF_TEST_TRIGGER_JS).await;
        tracing::debug!(artifact = %id, "self-test trigger injected");
        scope
    }

    /// Debug surface of `id`, if its scope exists
    #[must_use]
    pub fn debug_surface(&self, id: &ArtifactId) -> Option<Arc<DebugSurface>> {
        self.scopes.get(id).map(|s| Arc::clone(&s.debug))
    }

    /// Error state of `id`, if its scope exists
    #[must_use]
    pub fn error_state(&self, id: &ArtifactId) -> Option<ErrorState> {
        self.scopes.get(id).map(|s| s.errors.state())
    }

    /// Clear error state and displayed result of `id`
    pub fn reset(&self, id: &ArtifactId) {
        if let Some(scope) = self.scopes.get(id) {
            scope.errors.reset();
            scope.debug.clear();
        }
    }

    /// Drop the scope of `id`
    pub fn forget(&self, id: &ArtifactId) -> bool {
        self.scopes.remove(id).is_some()
    }

    fn publish(&self, event: &ArtifactEvent) {
        let scope = self.scope(event.artifact_id());
        let host = self.host_bus.publish(event);
        let scoped = scope.bus.publish(event);
        tracing::debug!(topic = %event.topic(), host, scoped, "event published");
    }

    /// Run the self-check of a live artifact
    ///
    /// Never fails: a missing or throwing routine yields a failing result
    /// that is published like any other.
    pub async fn run_self_test(
        &self,
        id: ArtifactId,
        runtime: &dyn ArtifactRuntime,
    ) -> SelfTestResult {
        let outcome = runtime.invoke_self_check(SELF_TEST_ROUTINE).await;
        let result = outcome.normalize();
        self.deliver(id, result.clone());
        result
    }

    /// Handle a message an artifact posted to its host
    ///
    /// Returns `false` for messages that are not artifact protocol messages.
    pub fn handle_message(&self, id: ArtifactId, message: &Value) -> bool {
        match parse_artifact_message(message) {
            Some(ArtifactMessage::SelfTestResult(result)) => {
                self.deliver(id, result);
                true
            }
            Some(ArtifactMessage::ArtifactError(message)) => {
                self.record_error(id, message);
                true
            }
            None => false,
        }
    }

    /// Publish a forwarded artifact failure
    pub fn record_error(&self, id: ArtifactId, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(artifact = %id, error = %message, "artifact error");
        self.publish(&ArtifactEvent::ArtifactError {
            artifact_id: id,
            message,
        });
    }

    fn deliver(&self, id: ArtifactId, result: SelfTestResult) {
        tracing::info!(artifact = %id, pass = result.pass, "self-test result");
        self.publish(&ArtifactEvent::SelfTestResult {
            artifact_id: id,
            result: result.clone(),
        });
        self.spawn_report(id, result);
    }

    fn spawn_report(&self, id: ArtifactId, result: SelfTestResult) {
        let Some(sink) = self.sink.clone() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(artifact = %id, "no async runtime; self-test report skipped");
            return;
        };
        handle.spawn(async move {
            if let Err(e) = sink.report(&id, &result).await {
                tracing::warn!(artifact = %id, error = %e, "self-test report failed");
            }
        });
    }
}
