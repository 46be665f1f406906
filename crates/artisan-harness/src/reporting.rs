//! External reporting of self-test results

use crate::error::HarnessError;
use artisan_artifact::{ArtifactId, SelfTestResult};

/// Collaborator that records self-test results outside the host
///
/// Calls are fire-and-forget; a failure is logged and never changes what the
/// artifact displays.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ReportingSink: Send + Sync {
    /// Record one result
    async fn report(
        &self,
        artifact_id: &ArtifactId,
        result: &SelfTestResult,
    ) -> Result<(), HarnessError>;
}

/// Sink that logs results through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait::async_trait]
impl ReportingSink for TracingSink {
    async fn report(
        &self,
        artifact_id: &ArtifactId,
        result: &SelfTestResult,
    ) -> Result<(), HarnessError> {
        tracing::info!(artifact = %artifact_id, pass = result.pass, details = %result.details, "self-test reported");
        Ok(())
    }
}
