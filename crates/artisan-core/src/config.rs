//! Pipeline configuration
//!
//! [`ArtisanConfig`] gathers every tunable of the pipeline. All fields have
//! defaults, so a TOML file only needs the values it changes:
//!
//! ```toml
//! proceed_on_refine = false
//!
//! [scope]
//! max_bundle_bytes = 150000
//!
//! [adapter]
//! max_repair_attempts = 3
//!
//! [timeouts]
//! model_call_ms = 30000
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Not valid TOML, or a field has the wrong type
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Parsed, but a value makes no sense
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },
}

/// Soft ceilings the scope gate compares its predictions against
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeLimits {
    /// Maximum predicted source files
    pub max_files: u32,
    /// Maximum predicted lines of code
    pub max_loc: u32,
    /// Maximum predicted bundle size in bytes
    pub max_bundle_bytes: u64,
    /// Whether requests that need network access are in scope
    pub allow_network: bool,
    /// Bundle-size tolerance for a `refine` verdict, as a multiple of `max_bundle_bytes`
    pub refine_tolerance: f64,
}

impl Default for ScopeLimits {
    fn default() -> Self {
        Self {
            max_files: 6,
            max_loc: 1500,
            max_bundle_bytes: 120_000,
            allow_network: true,
            refine_tolerance: 1.2,
        }
    }
}

/// Code adapter settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Corrective re-generations allowed after the first draft
    pub max_repair_attempts: u32,
    /// Reference candidates requested from the model
    pub max_candidates: usize,
    /// Component-like reference files included in the prompt
    pub max_component_files: usize,
    /// Style reference files included in the prompt
    pub max_style_files: usize,
    /// Metadata/doc reference files included in the prompt
    pub max_doc_files: usize,
    /// Characters kept from each reference file
    pub excerpt_chars: usize,
    /// Token budget passed to generation calls
    pub generation_max_tokens: u32,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            max_repair_attempts: 2,
            max_candidates: 3,
            max_component_files: 3,
            max_style_files: 2,
            max_doc_files: 1,
            excerpt_chars: 4000,
            generation_max_tokens: 8192,
        }
    }
}

/// Deadlines, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for a single model call
    pub model_call_ms: u64,
    /// Deadline for a single reference fetch
    pub fetch_ms: u64,
    /// Deadline for the whole pipeline run
    pub pipeline_ms: u64,
}

impl TimeoutConfig {
    /// Per-call deadline
    #[inline]
    #[must_use]
    pub fn model_call(&self) -> Duration {
        Duration::from_millis(self.model_call_ms)
    }

    /// Per-fetch deadline
    #[inline]
    #[must_use]
    pub fn fetch(&self) -> Duration {
        Duration::from_millis(self.fetch_ms)
    }

    /// Whole-run deadline
    #[inline]
    #[must_use]
    pub fn pipeline(&self) -> Duration {
        Duration::from_millis(self.pipeline_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            model_call_ms: 60_000,
            fetch_ms: 15_000,
            pipeline_ms: 240_000,
        }
    }
}

/// Artisan configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtisanConfig {
    /// Scope gate ceilings
    pub scope: ScopeLimits,
    /// Code adapter settings
    pub adapter: AdapterConfig,
    /// Deadlines
    pub timeouts: TimeoutConfig,
    /// Continue past a `refine` verdict instead of failing with `ScopeRejected`
    pub proceed_on_refine: bool,
}

impl ArtisanConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With scope limits
    #[inline]
    #[must_use]
    pub fn with_scope_limits(mut self, limits: ScopeLimits) -> Self {
        self.scope = limits;
        self
    }

    /// With repair budget
    #[inline]
    #[must_use]
    pub fn with_max_repair_attempts(mut self, attempts: u32) -> Self {
        self.adapter.max_repair_attempts = attempts;
        self
    }

    /// With per-call model deadline
    #[inline]
    #[must_use]
    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.model_call_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With whole-run deadline
    #[inline]
    #[must_use]
    pub fn with_pipeline_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.pipeline_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With refine handling
    #[inline]
    #[must_use]
    pub fn with_proceed_on_refine(mut self, proceed: bool) -> Self {
        self.proceed_on_refine = proceed;
        self
    }

    /// Parse from TOML and validate
    ///
    /// # Errors
    /// Returns [`ConfigError`] for malformed TOML or invalid values.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file cannot be read or is invalid.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Reject values the pipeline cannot run with
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks: [(bool, &'static str, &'static str); 8] = [
            (self.scope.max_files == 0, "scope.max_files", "must be positive"),
            (self.scope.max_loc == 0, "scope.max_loc", "must be positive"),
            (self.scope.max_bundle_bytes == 0, "scope.max_bundle_bytes", "must be positive"),
            (
                !(self.scope.refine_tolerance >= 1.0),
                "scope.refine_tolerance",
                "must be at least 1.0",
            ),
            (self.timeouts.model_call_ms == 0, "timeouts.model_call_ms", "must be positive"),
            (self.timeouts.fetch_ms == 0, "timeouts.fetch_ms", "must be positive"),
            (self.timeouts.pipeline_ms == 0, "timeouts.pipeline_ms", "must be positive"),
            (self.adapter.excerpt_chars == 0, "adapter.excerpt_chars", "must be positive"),
        ];

        match checks.into_iter().find(|(bad, _, _)| *bad) {
            Some((_, field, reason)) => Err(ConfigError::InvalidValue { field, reason }),
            None => Ok(()),
        }
    }
}
