//! Typed publish/subscribe
//!
//! Named topics, best-effort delivery: every subscriber registered for an
//! event's topic receives it at most once per publish, and a subscriber that
//! panics is logged and skipped without affecting the others or the
//! publisher. There is no ordering guarantee across topics.

use artisan_artifact::{ArtifactId, SelfTestResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Event topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topic {
    /// A self-check finished
    SelfTestResult,
    /// An artifact forwarded an uncaught failure
    ArtifactError,
}

impl Topic {
    /// Wire name of the topic
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::SelfTestResult => "self-test-result",
            Topic::ArtifactError => artisan_guard::ARTIFACT_ERROR_EVENT,
        }
    }

    /// Parse a wire name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "self-test-result" => Some(Topic::SelfTestResult),
            n if n == artisan_guard::ARTIFACT_ERROR_EVENT => Some(Topic::ArtifactError),
            _ => None,
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event payloads
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "topic", rename_all = "kebab-case")]
pub enum ArtifactEvent {
    /// Normalized self-check outcome
    SelfTestResult {
        /// Artifact that ran the check
        artifact_id: ArtifactId,
        /// Normalized result
        result: SelfTestResult,
    },
    /// Uncaught failure forwarded by an artifact
    ArtifactError {
        /// Artifact that failed
        artifact_id: ArtifactId,
        /// Failure message
        message: String,
    },
}

impl ArtifactEvent {
    /// Topic this event is published on
    #[inline]
    #[must_use]
    pub fn topic(&self) -> Topic {
        match self {
            ArtifactEvent::SelfTestResult { .. } => Topic::SelfTestResult,
            ArtifactEvent::ArtifactError { .. } => Topic::ArtifactError,
        }
    }

    /// Artifact the event concerns
    #[inline]
    #[must_use]
    pub fn artifact_id(&self) -> ArtifactId {
        match self {
            ArtifactEvent::SelfTestResult { artifact_id, .. }
            | ArtifactEvent::ArtifactError { artifact_id, .. } => *artifact_id,
        }
    }
}

/// Event listener
pub trait EventSubscriber: Send + Sync {
    /// Handle one event
    fn on_event(&self, event: &ArtifactEvent);
}

impl<F> EventSubscriber for F
where
    F: Fn(&ArtifactEvent) + Send + Sync,
{
    fn on_event(&self, event: &ArtifactEvent) {
        self(event);
    }
}

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    topic: Topic,
    subscriber: Arc<dyn EventSubscriber>,
}

/// Publish/subscribe bus
pub struct EventBus {
    name: String,
    next_id: AtomicU64,
    subscriptions: RwLock<Vec<Subscription>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("name", &self.name)
            .field("subscriptions", &self.subscriptions.read().len())
            .finish()
    }
}

impl EventBus {
    /// Create new bus; `name` only appears in logs
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            next_id: AtomicU64::new(1),
            subscriptions: RwLock::new(Vec::new()),
        }
    }

    /// Bus name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a subscriber for one topic
    pub fn subscribe(&self, topic: Topic, subscriber: Arc<dyn EventSubscriber>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscriptions.write().push(Subscription {
            id,
            topic,
            subscriber,
        });
        id
    }

    /// Remove a subscription; returns whether it existed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions.write();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        subscriptions.len() != before
    }

    /// Number of subscriptions for `topic`
    #[must_use]
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.subscriptions
            .read()
            .iter()
            .filter(|s| s.topic == topic)
            .count()
    }

    /// Deliver `event` to every subscriber of its topic
    ///
    /// Returns the number of subscribers that handled it without panicking.
    /// Subscribers run outside the bus lock, so they may subscribe or
    /// publish themselves.
    pub fn publish(&self, event: &ArtifactEvent) -> usize {
        let topic = event.topic();
        let targets: Vec<(SubscriptionId, Arc<dyn EventSubscriber>)> = self
            .subscriptions
            .read()
            .iter()
            .filter(|s| s.topic == topic)
            .map(|s| (s.id, Arc::clone(&s.subscriber)))
            .collect();

        let mut delivered = 0;
        for (id, subscriber) in targets {
            match catch_unwind(AssertUnwindSafe(|| subscriber.on_event(event))) {
                Ok(()) => delivered += 1,
                Err(_) => tracing::warn!(
                    bus = %self.name,
                    topic = %topic,
                    subscription = id.0,
                    "subscriber panicked; skipped"
                ),
            }
        }
        delivered
    }
}
