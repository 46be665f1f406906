//! Error types for the Artisan pipeline
//!
//! Every failure the caller can observe is one [`ArtisanError`] variant naming
//! the stage that failed. Collaborator failures ([`ModelError`],
//! [`FetchError`]) are converted at the stage boundary.

use crate::config::ConfigError;
use crate::types::ScopeDecision;
use artisan_artifact::ScanIssue;
use serde::{Deserialize, Serialize};

/// Pipeline stage, used for error attribution and model call tagging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// Scope gate
    Scope,
    /// Intent extraction
    Intent,
    /// Reference candidate selection and fetching
    References,
    /// First generation
    Generation,
    /// Corrective re-generation
    Repair,
    /// Whole-run deadline
    Pipeline,
}

impl Stage {
    /// Stable name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Scope => "scope",
            Stage::Intent => "intent",
            Stage::References => "references",
            Stage::Generation => "generation",
            Stage::Repair => "repair",
            Stage::Pipeline => "pipeline",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main pipeline error
#[derive(Debug, thiserror::Error)]
pub enum ArtisanError {
    /// The scope gate did not admit the request
    #[error("request not admitted ({}): {}", .decision.decision, .decision.reasons.join("; "))]
    ScopeRejected {
        /// Full decision, including metrics
        decision: ScopeDecision,
    },

    /// Intent extraction response was not structured data
    #[error("intent extraction failed: {0}")]
    ParseFailure(String),

    /// Generation response was malformed or incomplete, or the model call failed
    #[error("adaptation failed: {0}")]
    AdaptationFailure(String),

    /// Repair budget exhausted with critical findings left
    #[error("security scan failed after {attempts} repair attempts: {} critical issue(s)", .issues.iter().filter(|i| i.is_critical()).count())]
    SecurityScanFailure {
        /// Findings of the last scan
        issues: Vec<ScanIssue>,
        /// Findings of every scan, in order
        history: Vec<Vec<ScanIssue>>,
        /// Repair attempts spent
        attempts: u32,
    },

    /// A deadline elapsed
    #[error("{stage} timed out after {after_ms}ms")]
    Timeout {
        /// Stage that was running
        stage: Stage,
        /// Deadline that elapsed
        after_ms: u64,
    },

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ArtisanError {
    /// Stage the failure is attributed to
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            ArtisanError::ScopeRejected { .. } | ArtisanError::Config(_) => Stage::Scope,
            ArtisanError::ParseFailure(_) => Stage::Intent,
            ArtisanError::AdaptationFailure(_) => Stage::Generation,
            ArtisanError::SecurityScanFailure { .. } => Stage::Repair,
            ArtisanError::Timeout { stage, .. } => *stage,
        }
    }

    /// Whether resubmitting the same request may succeed
    ///
    /// Model output varies between runs, so generation failures and
    /// timeouts are worth another try; scope and config failures are not.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ArtisanError::AdaptationFailure(_)
                | ArtisanError::SecurityScanFailure { .. }
                | ArtisanError::Timeout { .. }
        )
    }

    pub(crate) fn timeout(stage: Stage, after: std::time::Duration) -> Self {
        ArtisanError::Timeout {
            stage,
            after_ms: u64::try_from(after.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Failure reported by the model collaborator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Transport or provider failure
    #[error("model transport error: {0}")]
    Transport(String),

    /// Provider refused the request
    #[error("model refused: {0}")]
    Refused(String),

    /// Provider returned nothing
    #[error("model returned an empty response")]
    Empty,
}

/// Failure reported by the reference fetch collaborator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Locator could not be resolved
    #[error("reference not found: {0}")]
    NotFound(String),

    /// Transport failure
    #[error("fetch failed: {0}")]
    Transport(String),
}

/// Result alias for pipeline operations
pub type Result<T> = std::result::Result<T, ArtisanError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Decision, ScopeMetrics};
    use artisan_artifact::{Severity, Surface};

    fn rejected() -> ArtisanError {
        ArtisanError::ScopeRejected {
            decision: ScopeDecision {
                decision: Decision::Reject,
                reasons: vec!["too big".into(), "needs ffmpeg".into()],
                metrics: ScopeMetrics {
                    predicted_file_count: 9,
                    predicted_loc: 3000,
                    bundle_bytes: 200_000,
                    requires_network: false,
                    heavy_hits: vec!["ffmpeg".into()],
                },
            },
        }
    }

    #[test]
    fn stages_and_retryability() {
        let err = rejected();
        assert_eq!(err.stage(), Stage::Scope);
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("reject"));
        assert!(err.to_string().contains("too big; needs ffmpeg"));

        let err = ArtisanError::ParseFailure("not json".into());
        assert_eq!(err.stage(), Stage::Intent);
        assert!(!err.is_retryable());

        let err = ArtisanError::timeout(Stage::Repair, std::time::Duration::from_millis(1500));
        assert_eq!(err.stage(), Stage::Repair);
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "repair timed out after 1500ms");
    }

    #[test]
    fn scan_failure_counts_critical() {
        let err = ArtisanError::SecurityScanFailure {
            issues: vec![
                ScanIssue::new(Surface::Behavior, "no-eval", Severity::Critical, "eval"),
                ScanIssue::new(Surface::Behavior, "no-inner-html", Severity::Warn, "html"),
            ],
            history: vec![],
            attempts: 2,
        };
        assert_eq!(
            err.to_string(),
            "security scan failed after 2 repair attempts: 1 critical issue(s)"
        );
        assert!(err.is_retryable());
    }
}
