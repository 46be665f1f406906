//! Code bundles and scan findings
//!
//! A [`CodeBundle`] carries the three generated code surfaces (markup, style,
//! behavior) plus presentation metadata. Scan findings are recorded per
//! surface as [`ScanIssue`] values.

use crate::hash::ContentHash;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the three code surfaces of a bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Surface {
    /// HTML markup
    Markup,
    /// CSS
    Style,
    /// JavaScript
    Behavior,
}

impl Surface {
    /// All surfaces in scan order
    pub const ALL: [Surface; 3] = [Surface::Markup, Surface::Style, Surface::Behavior];

    /// Stable lowercase name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Surface::Markup => "markup",
            Surface::Style => "style",
            Surface::Behavior => "behavior",
        }
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Finding severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Blocks delivery; triggers a repair attempt
    Critical,
    /// Reported, never blocking
    Warn,
}

impl Severity {
    /// Stable lowercase name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Warn => "warn",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single static-scan finding
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanIssue {
    /// Surface the rule matched on
    pub surface: Surface,
    /// Identifier of the matching rule
    pub rule_id: String,
    /// Severity of the matching rule
    pub severity: Severity,
    /// Human-readable explanation
    pub message: String,
}

impl ScanIssue {
    /// Create new issue
    #[inline]
    #[must_use]
    pub fn new(
        surface: Surface,
        rule_id: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            surface,
            rule_id: rule_id.into(),
            severity,
            message: message.into(),
        }
    }

    /// Whether this finding blocks delivery
    #[inline]
    #[must_use]
    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

impl fmt::Display for ScanIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}): {}",
            self.severity, self.rule_id, self.surface, self.message
        )
    }
}

/// The generated artifact: three code surfaces plus metadata
///
/// Repair attempts replace the three code fields wholesale via
/// [`CodeBundle::with_surfaces`]; no partial patching.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeBundle {
    /// HTML markup
    pub markup: String,
    /// CSS
    pub style: String,
    /// JavaScript
    pub behavior: String,
    /// Short description of the artifact
    #[serde(default)]
    pub description: String,
    /// Usage instructions shown to the user
    #[serde(default)]
    pub instructions: String,
    /// Findings of the most recent scan
    #[serde(default)]
    pub scan_issues: Vec<ScanIssue>,
    /// Optional title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Locator of the reference the generation drew from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_source: Option<String>,
}

impl CodeBundle {
    /// Create bundle from the three code surfaces
    #[inline]
    #[must_use]
    pub fn new(
        markup: impl Into<String>,
        style: impl Into<String>,
        behavior: impl Into<String>,
    ) -> Self {
        Self {
            markup: markup.into(),
            style: style.into(),
            behavior: behavior.into(),
            ..Self::default()
        }
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// With instructions
    #[inline]
    #[must_use]
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// With title
    #[inline]
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// With reference source locator
    #[inline]
    #[must_use]
    pub fn with_reference_source(mut self, source: impl Into<String>) -> Self {
        self.reference_source = Some(source.into());
        self
    }

    /// Replace all three code surfaces, keeping metadata
    ///
    /// Scan findings belong to the previous code and are cleared.
    #[must_use]
    pub fn with_surfaces(
        &self,
        markup: impl Into<String>,
        style: impl Into<String>,
        behavior: impl Into<String>,
    ) -> Self {
        Self {
            markup: markup.into(),
            style: style.into(),
            behavior: behavior.into(),
            scan_issues: Vec::new(),
            ..self.clone()
        }
    }

    /// Source text of one surface
    #[inline]
    #[must_use]
    pub fn surface(&self, surface: Surface) -> &str {
        match surface {
            Surface::Markup => &self.markup,
            Surface::Style => &self.style,
            Surface::Behavior => &self.behavior,
        }
    }

    /// Whether the recorded findings contain a critical entry
    #[inline]
    #[must_use]
    pub fn has_critical_issues(&self) -> bool {
        self.scan_issues.iter().any(ScanIssue::is_critical)
    }

    /// Total size of the three code surfaces in bytes
    #[inline]
    #[must_use]
    pub fn code_bytes(&self) -> usize {
        self.markup.len() + self.style.len() + self.behavior.len()
    }

    /// Fingerprint of the three code surfaces
    #[must_use]
    pub fn fingerprint(&self) -> ContentHash {
        ContentHash::compute_parts(&[&self.markup, &self.style, &self.behavior])
    }
}
