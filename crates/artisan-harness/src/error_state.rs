//! Error state of a rendered artifact
//!
//! Populated from `artifact-error` events; read by whatever displays the
//! artifact.

use crate::bus::{ArtifactEvent, EventSubscriber};
use artisan_artifact::ArtifactId;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;

/// History entries kept per artifact
pub const ERROR_HISTORY_LIMIT: usize = 20;

/// One forwarded failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    /// Failure message
    pub message: String,
    /// When the host received it
    pub at: DateTime<Utc>,
}

/// Error state attached to a rendered artifact
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorState {
    /// Whether any failure arrived since the last reset
    pub has_error: bool,
    /// Most recent failure
    pub last_error: Option<ErrorRecord>,
    /// Recent failures, oldest first, capped at [`ERROR_HISTORY_LIMIT`]
    pub history: VecDeque<ErrorRecord>,
}

impl ErrorState {
    /// Record a failure
    pub fn record(&mut self, message: impl Into<String>) {
        let record = ErrorRecord {
            message: message.into(),
            at: Utc::now(),
        };
        if self.history.len() == ERROR_HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(record.clone());
        self.last_error = Some(record);
        self.has_error = true;
    }
}

/// Subscriber maintaining the [`ErrorState`] of one artifact
#[derive(Debug)]
pub struct ErrorTracker {
    artifact_id: ArtifactId,
    state: Mutex<ErrorState>,
}

impl ErrorTracker {
    /// Create new tracker for `artifact_id`
    #[must_use]
    pub fn new(artifact_id: ArtifactId) -> Self {
        Self {
            artifact_id,
            state: Mutex::new(ErrorState::default()),
        }
    }

    /// Snapshot of the current state
    #[must_use]
    pub fn state(&self) -> ErrorState {
        self.state.lock().clone()
    }

    /// Clear the state
    pub fn reset(&self) {
        *self.state.lock() = ErrorState::default();
    }
}

impl EventSubscriber for ErrorTracker {
    fn on_event(&self, event: &ArtifactEvent) {
        if let ArtifactEvent::ArtifactError {
            artifact_id,
            message,
        } = event
        {
            if *artifact_id == self.artifact_id {
                self.state.lock().record(message.as_str());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_capped() {
        let mut state = ErrorState::default();
        for n in 0..25 {
            state.record(format!("error {n}"));
        }
        assert!(state.has_error);
        assert_eq!(state.history.len(), ERROR_HISTORY_LIMIT);
        assert_eq!(state.history.front().map(|r| r.message.as_str()), Some("error 5"));
        assert_eq!(state.last_error.map(|r| r.message), Some("error 24".to_string()));
    }

    #[test]
    fn tracker_ignores_other_artifacts() {
        let id = ArtifactId::new();
        let tracker = ErrorTracker::new(id);
        tracker.on_event(&ArtifactEvent::ArtifactError {
            artifact_id: ArtifactId::new(),
            message: "elsewhere".into(),
        });
        assert!(!tracker.state().has_error);

        tracker.on_event(&ArtifactEvent::ArtifactError {
            artifact_id: id,
            message: "here".into(),
        });
        assert_eq!(tracker.state().history.len(), 1);

        tracker.reset();
        assert_eq!(tracker.state(), ErrorState::default());
    }
}
