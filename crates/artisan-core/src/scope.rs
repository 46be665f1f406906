//! Scope gate
//!
//! Pre-flight admission control. [`decide`] estimates the size of the
//! artifact a request describes from surface features of its text and
//! compares the estimate against [`ScopeLimits`]. Pure and deterministic:
//! the same text and limits always give the same decision.
//!
//! Decision rule, in order:
//! 1. nothing exceeded and no heavy-compute term: `allow`
//! 2. exactly one limit exceeded and the bundle estimate within
//!    `refine_tolerance` times its ceiling: `refine`
//! 3. otherwise `reject`

use crate::config::ScopeLimits;
use crate::types::{Decision, ScopeDecision, ScopeMetrics};

/// Terms implying work a self-contained browser artifact cannot do
///
/// Stored normalized: lowercase words separated by single spaces.
pub const HEAVY_COMPUTE_TERMS: &[&str] = &[
    // document conversion
    "pdf to word",
    "word to pdf",
    "docx",
    "document conversion",
    "ocr",
    // browser automation
    "headless browser",
    "browser automation",
    "puppeteer",
    "selenium",
    "playwright",
    "web scraper",
    "scrape",
    // media transcoding
    "ffmpeg",
    "transcode",
    "transcoding",
    "video editor",
    "video editing",
    "render video",
    // heavy backends
    "train a model",
    "machine learning model",
    "compiler",
    "blockchain",
];

/// Terms implying the artifact needs network access
pub const NETWORK_TERMS: &[&str] = &[
    "api",
    "fetch",
    "http",
    "https",
    "websocket",
    "real time",
    "realtime",
    "live data",
    "online",
    "weather",
    "stock price",
    "stock prices",
    "news feed",
    "sync",
];

/// Feature terms that each add an estimated file and a chunk of code
pub const FEATURE_TERMS: &[&str] = &[
    "login",
    "authentication",
    "database",
    "multiplayer",
    "chat",
    "upload",
    "drag and drop",
    "leaderboard",
    "calendar",
    "map",
    "animation",
    "animations",
    "settings",
    "history",
    "export",
    "import",
    "search",
    "filter",
    "notifications",
    "themes",
];

const BASE_FILES: u32 = 3;
const BASE_LOC: u32 = 120;
const LOC_PER_WORD: u32 = 12;
const LOC_PER_FEATURE: u32 = 150;
const BYTES_PER_LOC: u64 = 45;
const HEAVY_FILES: u32 = 3;
const HEAVY_LOC: u32 = 900;
const HEAVY_BYTES: u64 = 80_000;

/// Lowercase words joined by single spaces, padded with a space on each side
fn normalize(text: &str) -> String {
    let words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    format!(" {} ", words.join(" "))
}

fn matches<'a>(normalized: &str, vocabulary: &[&'a str]) -> Vec<&'a str> {
    vocabulary
        .iter()
        .copied()
        .filter(|term| normalized.contains(&format!(" {term} ")))
        .collect()
}

/// Estimate size metrics for a request
#[must_use]
pub fn estimate(text: &str) -> ScopeMetrics {
    let normalized = normalize(text);
    let words = u32::try_from(normalized.split_whitespace().count()).unwrap_or(u32::MAX);
    let features = u32::try_from(matches(&normalized, FEATURE_TERMS).len()).unwrap_or(u32::MAX);
    let heavy: Vec<String> = matches(&normalized, HEAVY_COMPUTE_TERMS)
        .into_iter()
        .map(str::to_string)
        .collect();
    let heavy_count = u32::try_from(heavy.len()).unwrap_or(u32::MAX);

    let predicted_file_count = BASE_FILES
        .saturating_add(features)
        .saturating_add(HEAVY_FILES.saturating_mul(heavy_count));
    let predicted_loc = BASE_LOC
        .saturating_add(LOC_PER_WORD.saturating_mul(words))
        .saturating_add(LOC_PER_FEATURE.saturating_mul(features))
        .saturating_add(HEAVY_LOC.saturating_mul(heavy_count));
    let bundle_bytes = u64::from(predicted_loc)
        .saturating_mul(BYTES_PER_LOC)
        .saturating_add(HEAVY_BYTES.saturating_mul(u64::from(heavy_count)));

    ScopeMetrics {
        predicted_file_count,
        predicted_loc,
        bundle_bytes,
        requires_network: !matches(&normalized, NETWORK_TERMS).is_empty(),
        heavy_hits: heavy,
    }
}

/// Decide whether a request is in scope
#[must_use]
pub fn decide(text: &str, limits: &ScopeLimits) -> ScopeDecision {
    let metrics = estimate(text);
    let mut exceeded = Vec::new();

    if metrics.predicted_file_count > limits.max_files {
        exceeded.push(format!(
            "predicted {} files exceeds the limit of {}",
            metrics.predicted_file_count, limits.max_files
        ));
    }
    if metrics.predicted_loc > limits.max_loc {
        exceeded.push(format!(
            "predicted {} lines of code exceeds the limit of {}",
            metrics.predicted_loc, limits.max_loc
        ));
    }
    if metrics.bundle_bytes > limits.max_bundle_bytes {
        exceeded.push(format!(
            "predicted bundle of {} bytes exceeds the limit of {}",
            metrics.bundle_bytes, limits.max_bundle_bytes
        ));
    }
    if metrics.requires_network && !limits.allow_network {
        exceeded.push("request needs network access, which is disabled".to_string());
    }

    #[allow(clippy::cast_precision_loss)]
    let within_tolerance =
        metrics.bundle_bytes as f64 <= limits.max_bundle_bytes as f64 * limits.refine_tolerance;

    let decision = if exceeded.is_empty() && metrics.heavy_hits.is_empty() {
        Decision::Allow
    } else if exceeded.len() == 1 && within_tolerance {
        Decision::Refine
    } else {
        Decision::Reject
    };

    let mut reasons = exceeded;
    reasons.extend(
        metrics
            .heavy_hits
            .iter()
            .map(|term| format!("'{term}' needs heavy compute a browser artifact cannot provide")),
    );

    tracing::debug!(
        decision = %decision,
        files = metrics.predicted_file_count,
        loc = metrics.predicted_loc,
        bytes = metrics.bundle_bytes,
        heavy = metrics.heavy_hits.len(),
        "scope decided"
    );

    ScopeDecision {
        decision,
        reasons,
        metrics,
    }
}
