//! Collaborator seams
//!
//! The pipeline reaches the outside world through two traits: the
//! generative model ([`ModelClient`]) and the reference fetcher
//! ([`ReferenceFetcher`]). Both are text in, text out; transport, retries and
//! auth belong to the implementor.

use crate::error::{FetchError, ModelError, Stage};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Per-call options passed to the model
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeOptions {
    /// Ask the provider for a JSON-shaped response
    pub json_response: bool,
    /// Sampling temperature
    pub temperature: f32,
    /// Response token budget
    pub max_tokens: u32,
    /// Stage issuing the call
    pub stage: Stage,
}

impl InvokeOptions {
    /// Options for a JSON-returning call from `stage`
    #[inline]
    #[must_use]
    pub fn json(stage: Stage) -> Self {
        Self {
            json_response: true,
            temperature: 0.2,
            max_tokens: 2048,
            stage,
        }
    }

    /// With token budget
    #[inline]
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// With temperature
    #[inline]
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Generative model
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ModelClient: Send + Sync {
    /// Send a system prompt and user content, receive the response text
    async fn invoke(
        &self,
        system_prompt: &str,
        user_content: &str,
        options: &InvokeOptions,
    ) -> Result<String, ModelError>;
}

/// Reference source fetcher
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ReferenceFetcher: Send + Sync {
    /// Fetch `paths` from the reference at `locator`
    ///
    /// Paths that cannot be fetched are absent from the returned map.
    async fn fetch_files(
        &self,
        locator: &str,
        paths: &[String],
    ) -> Result<HashMap<String, String>, FetchError>;
}

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)```").expect("static regex")
});

/// Cut the JSON payload out of a model response
///
/// Accepts bare JSON, JSON inside a markdown code fence, and JSON surrounded
/// by prose. Returns the slice from the first `{` or `[` to the last matching
/// closer; `None` when no candidate exists. The slice is not validated.
#[must_use]
pub fn extract_json_payload(response: &str) -> Option<&str> {
    let body = CODE_FENCE
        .captures(response)
        .and_then(|c| c.get(1))
        .map_or(response, |m| m.as_str());

    let start = body.find(|c: char| c == '{' || c == '[')?;
    let closer = if body[start..].starts_with('{') { '}' } else { ']' };
    let end = body.rfind(closer)?;
    (end > start).then(|| &body[start..=end])
}

/// Parse a model response into a JSON object
///
/// Returns `None` unless the payload is a JSON object.
#[must_use]
pub fn parse_json_object(response: &str) -> Option<serde_json::Map<String, serde_json::Value>> {
    let payload = extract_json_payload(response)?;
    match serde_json::from_str(payload).ok()? {
        serde_json::Value::Object(map) => Some(map),
        _ => None,
    }
}
