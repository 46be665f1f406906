//! Artisan Core - request to verified artifact
//!
//! The generation pipeline:
//! - Admits or rejects requests with a deterministic scope heuristic
//! - Extracts a structured intent through the model
//! - Selects and fetches reference material (best effort)
//! - Generates, post-processes, scans and repairs the code bundle
//!
//! # Example
//!
//! ```rust,ignore
//! use artisan_core::{ArtifactPipeline, ArtisanConfig, Request};
//! use std::sync::Arc;
//!
//! # async fn example(model: Arc<dyn artisan_core::ModelClient>) -> artisan_core::Result<()> {
//! let pipeline = ArtifactPipeline::new(model, ArtisanConfig::default())?;
//! let output = pipeline.run(Request::new("Create a simple calculator")).await?;
//!
//! assert!(!output.bundle.has_critical_issues());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod adapter;
pub mod config;
pub mod error;
pub mod intent;
pub mod model;
mod payload;
pub mod pipeline;
pub mod presets;
pub mod prompt;
pub mod references;
pub mod scope;
pub mod types;

// Re-exports for convenience
pub use adapter::{Adaptation, AdapterState, CodeAdapter, GeneratedBundle};
pub use config::{AdapterConfig, ArtisanConfig, ConfigError, ScopeLimits, TimeoutConfig};
pub use error::{ArtisanError, FetchError, ModelError, Result, Stage};
pub use intent::IntentExtractor;
pub use model::{extract_json_payload, InvokeOptions, ModelClient, ReferenceFetcher};
pub use pipeline::{ArtifactPipeline, REFERENCES_CONTEXT_KEY, REFERENCES_UNAVAILABLE};
pub use presets::{resolve_preset, ArchetypePreset, PRESETS};
pub use references::ReferenceSelector;
pub use scope::decide;
pub use types::{
    Decision, Intent, PipelineOutput, ReferenceCandidate, ReferenceExcerpt, ReferenceSet,
    Request, RequestContext, ScopeDecision, ScopeMetrics,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Artisan Core
    pub use crate::{
        ArtifactPipeline, ArtisanConfig, ArtisanError, Decision, Intent, ModelClient,
        PipelineOutput, ReferenceFetcher, Request, ScopeDecision,
    };
    pub use artisan_artifact::{CodeBundle, ScanIssue, Severity, Surface};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
