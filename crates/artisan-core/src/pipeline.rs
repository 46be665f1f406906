//! Artifact pipeline
//!
//! The entry point that wires the stages together:
//!
//! ```text
//! scope gate -> intent -> reference candidates -> references -> code adapter
//! ```
//!
//! A caller gets either a bundle with no critical finding or exactly one
//! typed [`ArtisanError`] naming the stage that failed.

use crate::adapter::CodeAdapter;
use crate::config::ArtisanConfig;
use crate::error::{ArtisanError, Result, Stage};
use crate::intent::IntentExtractor;
use crate::model::{ModelClient, ReferenceFetcher};
use crate::references::ReferenceSelector;
use crate::scope;
use crate::types::{Decision, PipelineOutput, Request, ScopeDecision};
use std::sync::Arc;

/// Context key set when generation ran without reference material
pub const REFERENCES_CONTEXT_KEY: &str = "references";
/// Value stored under [`REFERENCES_CONTEXT_KEY`] when no reference was fetched
pub const REFERENCES_UNAVAILABLE: &str = "unavailable";

/// Request to bundle pipeline
#[derive(Debug, Clone)]
pub struct ArtifactPipeline {
    config: ArtisanConfig,
    intent: IntentExtractor,
    references: ReferenceSelector,
    adapter: CodeAdapter,
    has_fetcher: bool,
}

impl ArtifactPipeline {
    /// Create a pipeline without a reference fetcher
    ///
    /// # Errors
    /// Returns [`ArtisanError::Config`] if `config` does not validate.
    pub fn new(model: Arc<dyn ModelClient>, config: ArtisanConfig) -> Result<Self> {
        Self::build(model, None, config)
    }

    /// Create a pipeline that fetches reference material
    ///
    /// # Errors
    /// Returns [`ArtisanError::Config`] if `config` does not validate.
    pub fn with_fetcher(
        model: Arc<dyn ModelClient>,
        fetcher: Arc<dyn ReferenceFetcher>,
        config: ArtisanConfig,
    ) -> Result<Self> {
        Self::build(model, Some(fetcher), config)
    }

    fn build(
        model: Arc<dyn ModelClient>,
        fetcher: Option<Arc<dyn ReferenceFetcher>>,
        config: ArtisanConfig,
    ) -> Result<Self> {
        config.validate()?;
        let call_timeout = config.timeouts.model_call();
        Ok(Self {
            intent: IntentExtractor::new(Arc::clone(&model), call_timeout),
            has_fetcher: fetcher.is_some(),
            references: ReferenceSelector::new(
                Arc::clone(&model),
                fetcher,
                config.adapter,
                config.timeouts,
            ),
            adapter: CodeAdapter::new(model, config.adapter, call_timeout),
            config,
        })
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ArtisanConfig {
        &self.config
    }

    /// Run the scope gate alone
    #[must_use]
    pub fn check_scope(&self, request: &Request) -> ScopeDecision {
        scope::decide(&request.text, &self.config.scope)
    }

    /// Run the whole pipeline under the configured deadline
    ///
    /// # Errors
    /// One [`ArtisanError`] naming the failing stage; see the variants.
    #[tracing::instrument(skip_all, fields(request_len = request.text.len()))]
    pub async fn run(&self, request: Request) -> Result<PipelineOutput> {
        let deadline = self.config.timeouts.pipeline();
        match tokio::time::timeout(deadline, self.run_stages(request)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::error!(deadline_ms = self.config.timeouts.pipeline_ms, "pipeline deadline elapsed");
                Err(ArtisanError::timeout(Stage::Pipeline, deadline))
            }
        }
    }

    async fn run_stages(&self, request: Request) -> Result<PipelineOutput> {
        let scope = self.check_scope(&request);
        match scope.decision {
            Decision::Allow => tracing::info!("request admitted"),
            Decision::Refine if self.config.proceed_on_refine => {
                tracing::warn!(reasons = ?scope.reasons, "request near limits; proceeding");
            }
            Decision::Refine | Decision::Reject => {
                tracing::info!(decision = %scope.decision, reasons = ?scope.reasons, "request not admitted");
                return Err(ArtisanError::ScopeRejected { decision: scope });
            }
        }

        let mut intent = self.intent.extract(&request).await?;

        let references = if self.has_fetcher {
            let candidates = self.references.select_candidates(&intent).await;
            self.references.fetch_references(&candidates).await
        } else {
            tracing::debug!("no reference fetcher configured; skipping candidate selection");
            Default::default()
        };
        if references.is_empty() {
            intent.context.insert(
                REFERENCES_CONTEXT_KEY.to_string(),
                REFERENCES_UNAVAILABLE.to_string(),
            );
        }

        let adaptation = self.adapter.adapt(&intent, &references).await?;
        let mut bundle = adaptation.bundle;
        if bundle.reference_source.is_none() {
            bundle.reference_source = references.source;
        }

        tracing::info!(
            fingerprint = %bundle.fingerprint().short(),
            repair_attempts = adaptation.repair_attempts,
            "artifact ready"
        );

        Ok(PipelineOutput {
            bundle,
            intent,
            scope,
            repair_attempts: adaptation.repair_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MockModelClient;

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let mut config = ArtisanConfig::default();
        config.timeouts.pipeline_ms = 0;
        let err = ArtifactPipeline::new(Arc::new(MockModelClient::new()), config).unwrap_err();
        assert!(matches!(err, ArtisanError::Config(_)));
    }

    #[tokio::test]
    async fn rejected_request_makes_no_model_call() {
        // no expectations: any invoke would panic
        let pipeline =
            ArtifactPipeline::new(Arc::new(MockModelClient::new()), ArtisanConfig::default()).unwrap();
        let err = pipeline
            .run(Request::new("Scrape sites with puppeteer and transcode with ffmpeg"))
            .await
            .unwrap_err();
        match err {
            ArtisanError::ScopeRejected { decision } => {
                assert_eq!(decision.decision, Decision::Reject);
                assert_eq!(decision.metrics.heavy_hits.len(), 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn refine_is_rejected_unless_configured() {
        let pipeline =
            ArtifactPipeline::new(Arc::new(MockModelClient::new()), ArtisanConfig::default()).unwrap();
        let err = pipeline
            .run(Request::new("Convert PDF to Word documents"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ArtisanError::ScopeRejected { ref decision } if decision.decision == Decision::Refine
        ));
        assert_eq!(err.stage(), Stage::Scope);
    }
}
