//! Core types for the pipeline
//!
//! Defines the records that flow between stages:
//! - Requests and their context
//! - Scope decisions and their metrics
//! - Structured intents
//! - Reference candidates
//! - The pipeline's final output

use crate::presets::ArchetypePreset;
use artisan_artifact::CodeBundle;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Free-form request context (string keys, string values)
pub type RequestContext = BTreeMap<String, String>;

/// A user request (natural language input)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Natural language description of the wanted artifact
    pub text: String,
    /// Optional context forwarded to the intent
    #[serde(default)]
    pub context: RequestContext,
}

impl Request {
    /// Create new request
    #[inline]
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            context: RequestContext::new(),
        }
    }

    /// With a context entry
    #[inline]
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Admission decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Proceed
    Allow,
    /// Close to the limits; ask the user to narrow the request
    Refine,
    /// Out of scope
    Reject,
}

impl Decision {
    /// Stable lowercase name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Refine => "refine",
            Decision::Reject => "reject",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Heuristic size metrics the scope gate derives from request text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeMetrics {
    /// Predicted number of source files
    pub predicted_file_count: u32,
    /// Predicted lines of code
    #[serde(rename = "predictedLoC")]
    pub predicted_loc: u32,
    /// Predicted bundle size in bytes
    pub bundle_bytes: u64,
    /// Whether the request needs network access
    pub requires_network: bool,
    /// Heavy-compute vocabulary terms found in the text
    pub heavy_hits: Vec<String>,
}

/// Scope gate verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeDecision {
    /// The decision
    pub decision: Decision,
    /// Human-readable reasons, one per exceeded limit or notable feature
    pub reasons: Vec<String>,
    /// Metrics the decision was derived from
    pub metrics: ScopeMetrics,
}

impl ScopeDecision {
    /// Whether the request may proceed
    #[inline]
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        self.decision == Decision::Allow
    }
}

/// Structured intent extracted from a request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    /// What the user wants done (e.g. "create")
    pub action: String,
    /// Normalized category (e.g. "utilities", "games")
    pub category: String,
    /// Observable conditions the artifact must satisfy
    pub success_criteria: Vec<String>,
    /// Hints for the artifact's self-check routine
    pub testing_hints: Vec<String>,
    /// How the artifact should handle bad input and failures
    pub error_handling_notes: String,
    /// Data the artifact needs (inputs, storage, feeds)
    pub data_needs: Vec<String>,
    /// Model confidence in the extraction, within `[0, 1]`
    pub confidence: f64,
    /// Resolved archetype preset, if the model named a known one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archetype_preset: Option<&'static ArchetypePreset>,
    /// The request text the intent was extracted from
    pub original_prompt: String,
    /// Request context
    pub context: RequestContext,
}

/// A reusable source reference proposed by the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceCandidate {
    /// Locator of the reference (repository URL or similar)
    pub url: String,
    /// What the reference contains
    #[serde(default)]
    pub description: String,
    /// Files worth reading, relative to the locator
    #[serde(default, alias = "files")]
    pub referenced_files: Vec<String>,
    /// License named by the model
    #[serde(default)]
    pub license: String,
    /// Rough complexity label ("low", "medium", "high")
    #[serde(default)]
    pub complexity: String,
}

/// A fetched reference file excerpt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceExcerpt {
    /// Path within the reference
    pub path: String,
    /// Content, truncated to the configured excerpt size
    pub content: String,
}

/// Reference material assembled for one generation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReferenceSet {
    /// Locator the excerpts came from
    pub source: Option<String>,
    /// Excerpts in prompt order
    pub excerpts: Vec<ReferenceExcerpt>,
}

impl ReferenceSet {
    /// Whether no excerpt is available
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.excerpts.is_empty()
    }
}

/// Successful pipeline outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutput {
    /// The accepted bundle; carries no critical finding
    pub bundle: CodeBundle,
    /// Intent the bundle was generated from
    pub intent: Intent,
    /// Scope decision that admitted the request
    pub scope: ScopeDecision,
    /// Repair attempts spent
    pub repair_attempts: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder() {
        let req = Request::new("Create a timer").with_context("locale", "en");
        assert_eq!(req.text, "Create a timer");
        assert_eq!(req.context.get("locale").map(String::as_str), Some("en"));
    }

    #[test]
    fn scope_metrics_serialize_with_wire_names() {
        let metrics = ScopeMetrics {
            predicted_file_count: 3,
            predicted_loc: 200,
            bundle_bytes: 9000,
            requires_network: false,
            heavy_hits: vec![],
        };
        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["predictedFileCount"], 3);
        assert_eq!(json["predictedLoC"], 200);
        assert_eq!(json["bundleBytes"], 9000);
    }

    #[test]
    fn candidate_accepts_files_alias() {
        let c: ReferenceCandidate = serde_json::from_str(
            r#"{"url": "https://github.com/a/b", "files": ["index.html"]}"#,
        )
        .unwrap();
        assert_eq!(c.referenced_files, vec!["index.html".to_string()]);
        assert!(c.license.is_empty());
    }
}
