//! Reference candidate selection and fetching
//!
//! A soft dependency of generation. The model proposes up to a handful of
//! source references; obvious placeholder locators are dropped; the first
//! candidate that yields any file becomes the prompt's reference set. Every
//! failure here degrades to "no references" instead of failing the request.

use crate::config::{AdapterConfig, TimeoutConfig};
use crate::error::Stage;
use crate::model::{extract_json_payload, InvokeOptions, ModelClient, ReferenceFetcher};
use crate::prompt::{candidate_user_content, CANDIDATE_SYSTEM_PROMPT};
use crate::types::{Intent, ReferenceCandidate, ReferenceExcerpt, ReferenceSet};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;

/// Locators that are templates rather than real references
static PLACEHOLDER_LOCATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?ix)
        your[-_]?(repo|repository|username|user|org|organization|project|name)
        | \b(user|owner|username|org)/(repo|repository|project)\b
        | \bexample\.(com|org|net)\b
        | placeholder
        | \bfoo/bar\b
        | <[^>]*>
        | \{\{ | \}\}
        | \bx{3,}\b
        ",
    )
    .expect("static regex")
});

/// Whether `locator` looks like a template placeholder
#[must_use]
pub fn is_placeholder_locator(locator: &str) -> bool {
    let locator = locator.trim();
    locator.is_empty() || PLACEHOLDER_LOCATOR.is_match(locator)
}

/// Role a reference file plays, used to cap what goes into the prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRole {
    /// `index.html`, `main.js` and similar
    EntryPoint,
    /// Other script or component files
    Component,
    /// Stylesheets
    Style,
    /// README, manifests and other docs
    Doc,
    /// Anything else; never fetched
    Other,
}

const ENTRY_STEMS: &[&str] = &["index", "main", "app"];
const ENTRY_EXTENSIONS: &[&str] = &["html", "htm", "js", "mjs", "ts"];
const COMPONENT_EXTENSIONS: &[&str] = &["js", "mjs", "jsx", "ts", "tsx", "vue", "svelte"];
const STYLE_EXTENSIONS: &[&str] = &["css", "scss", "sass", "less"];
const DOC_NAMES: &[&str] = &["readme", "package.json", "manifest.json"];

/// Classify a reference file by its path
#[must_use]
pub fn classify_file(path: &str) -> FileRole {
    let name = path.rsplit('/').next().unwrap_or(path).to_ascii_lowercase();
    let (stem, extension) = name.rsplit_once('.').unwrap_or((name.as_str(), ""));

    if ENTRY_STEMS.contains(&stem) && ENTRY_EXTENSIONS.contains(&extension) {
        FileRole::EntryPoint
    } else if STYLE_EXTENSIONS.contains(&extension) {
        FileRole::Style
    } else if DOC_NAMES.contains(&name.as_str())
        || DOC_NAMES.contains(&stem)
        || extension == "md"
    {
        FileRole::Doc
    } else if COMPONENT_EXTENSIONS.contains(&extension) {
        FileRole::Component
    } else {
        FileRole::Other
    }
}

/// Files to fetch for a candidate, in prompt order
///
/// All entry points, then up to the configured number of components, style
/// files and docs.
#[must_use]
pub fn plan_files(candidate: &ReferenceCandidate, config: &AdapterConfig) -> Vec<String> {
    let of_role = |role: FileRole| {
        candidate
            .referenced_files
            .iter()
            .filter(move |path| classify_file(path) == role)
            .cloned()
    };

    of_role(FileRole::EntryPoint)
        .chain(of_role(FileRole::Component).take(config.max_component_files))
        .chain(of_role(FileRole::Style).take(config.max_style_files))
        .chain(of_role(FileRole::Doc).take(config.max_doc_files))
        .collect()
}

/// Keep at most `max_chars` characters
fn truncate_chars(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}\n/* truncated */", &content[..cut]),
        None => content.to_string(),
    }
}

/// Parse a candidate list from a model response
///
/// Accepts a bare array or an object with a `candidates` array. Entries that
/// do not deserialize are skipped.
#[must_use]
pub fn parse_candidates(response: &str) -> Vec<ReferenceCandidate> {
    let Some(payload) = extract_json_payload(response) else {
        return Vec::new();
    };
    let items = match serde_json::from_str::<Value>(payload) {
        Ok(Value::Array(items)) => items,
        Ok(Value::Object(mut object)) => match object.remove("candidates") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };
    items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect()
}

/// Model-backed candidate selector and reference fetcher
#[derive(Clone)]
pub struct ReferenceSelector {
    model: Arc<dyn ModelClient>,
    fetcher: Option<Arc<dyn ReferenceFetcher>>,
    config: AdapterConfig,
    timeouts: TimeoutConfig,
}

impl std::fmt::Debug for ReferenceSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceSelector")
            .field("has_fetcher", &self.fetcher.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ReferenceSelector {
    /// Create new selector
    #[inline]
    #[must_use]
    pub fn new(
        model: Arc<dyn ModelClient>,
        fetcher: Option<Arc<dyn ReferenceFetcher>>,
        config: AdapterConfig,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self {
            model,
            fetcher,
            config,
            timeouts,
        }
    }

    /// Ask the model for reference candidates
    ///
    /// Never fails: model errors, timeouts and unusable responses all give an
    /// empty list.
    pub async fn select_candidates(&self, intent: &Intent) -> Vec<ReferenceCandidate> {
        let options = InvokeOptions::json(Stage::References).with_max_tokens(1024);
        let content = candidate_user_content(intent);
        let call = self
            .model
            .invoke(CANDIDATE_SYSTEM_PROMPT, &content, &options);

        let response = match tokio::time::timeout(self.timeouts.model_call(), call).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "candidate selection failed; continuing without references");
                return Vec::new();
            }
            Err(_) => {
                tracing::warn!("candidate selection timed out; continuing without references");
                return Vec::new();
            }
        };

        let proposed = parse_candidates(&response);
        let proposed_count = proposed.len();
        let candidates: Vec<_> = proposed
            .into_iter()
            .filter(|c| !is_placeholder_locator(&c.url))
            .take(self.config.max_candidates)
            .collect();

        tracing::info!(
            proposed = proposed_count,
            kept = candidates.len(),
            "reference candidates filtered"
        );
        candidates
    }

    /// Fetch excerpts from the first candidate that yields any file
    ///
    /// A failed candidate is skipped; when every candidate fails, or no
    /// fetcher is configured, the set is empty.
    pub async fn fetch_references(&self, candidates: &[ReferenceCandidate]) -> ReferenceSet {
        let Some(fetcher) = &self.fetcher else {
            return ReferenceSet::default();
        };

        for candidate in candidates {
            let plan = plan_files(candidate, &self.config);
            if plan.is_empty() {
                tracing::debug!(url = %candidate.url, "candidate lists no usable files");
                continue;
            }

            let fetched = match tokio::time::timeout(
                self.timeouts.fetch(),
                fetcher.fetch_files(&candidate.url, &plan),
            )
            .await
            {
                Ok(Ok(files)) => files,
                Ok(Err(e)) => {
                    tracing::warn!(url = %candidate.url, error = %e, "reference fetch failed");
                    continue;
                }
                Err(_) => {
                    tracing::warn!(url = %candidate.url, "reference fetch timed out");
                    continue;
                }
            };

            let excerpts: Vec<ReferenceExcerpt> = plan
                .iter()
                .filter_map(|path| {
                    fetched.get(path).map(|content| ReferenceExcerpt {
                        path: path.clone(),
                        content: truncate_chars(content, self.config.excerpt_chars),
                    })
                })
                .collect();

            if !excerpts.is_empty() {
                tracing::info!(url = %candidate.url, files = excerpts.len(), "references fetched");
                return ReferenceSet {
                    source: Some(candidate.url.clone()),
                    excerpts,
                };
            }
        }

        ReferenceSet::default()
    }
}
