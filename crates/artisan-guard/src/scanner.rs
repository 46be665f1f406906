//! Static security scanner
//!
//! An ordered rule table matched against each code surface independently.
//! The scanner holds no state between calls: identical input always yields
//! an identical report, which the repair loop relies on when it re-scans.

use artisan_artifact::{CodeBundle, ScanIssue, Severity, Surface};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt::Write as _;

/// One denylist rule
#[derive(Debug, Clone)]
pub struct ScanRule {
    /// Stable identifier, reported as `ruleId`
    pub id: &'static str,
    /// Pattern searched in the surface source
    pub pattern: Regex,
    /// Severity of a match
    pub severity: Severity,
    /// Explanation attached to every issue
    pub message: &'static str,
}

impl ScanRule {
    /// Create a rule
    ///
    /// # Errors
    /// Returns the regex error if `pattern` does not compile.
    pub fn new(
        id: &'static str,
        pattern: &str,
        severity: Severity,
        message: &'static str,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            id,
            pattern: Regex::new(pattern)?,
            severity,
            message,
        })
    }
}

/// Rule id for runtime evaluation of source text
pub const RULE_EVAL: &str = "no-eval";
/// Rule id for constructing a callable from a string
pub const RULE_FUNCTION_CONSTRUCTOR: &str = "no-function-constructor";
/// Rule id for string-bodied timers
pub const RULE_STRING_TIMER: &str = "no-string-timer";
/// Rule id for opening new browsing contexts
pub const RULE_WINDOW_OPEN: &str = "no-window-open";
/// Rule id for overwriting the document stream
pub const RULE_DOCUMENT_WRITE: &str = "no-document-write";
/// Rule id for bulk markup injection
pub const RULE_INNER_HTML: &str = "no-inner-html";
/// Rule id for `javascript:` URLs
pub const RULE_JAVASCRIPT_URL: &str = "no-javascript-url";

static DEFAULT_RULES: Lazy<Vec<ScanRule>> = Lazy::new(|| {
    let table: [(&'static str, &str, Severity, &'static str); 7] = [
        (
            RULE_EVAL,
            r"(?:^|[^\w$.])eval\s*\(|\b(?:window|globalThis|self)\s*\.\s*eval\s*\(",
            Severity::Critical,
            "eval() executes arbitrary source text at runtime",
        ),
        (
            RULE_FUNCTION_CONSTRUCTOR,
            r#"\bnew\s+Function\s*\(|(?:^|[^\w$.])Function\s*\(\s*['"`]"#,
            Severity::Critical,
            "the Function constructor builds a callable from a string",
        ),
        (
            RULE_STRING_TIMER,
            r#"\bset(?:Timeout|Interval)\s*\(\s*['"`]"#,
            Severity::Critical,
            "setTimeout/setInterval with a string body evaluates source text",
        ),
        (
            RULE_WINDOW_OPEN,
            r"\bwindow\s*\.\s*open\s*\(",
            Severity::Warn,
            "window.open() opens a new browsing context",
        ),
        (
            RULE_DOCUMENT_WRITE,
            r"\bdocument\s*\.\s*write(?:ln)?\s*\(",
            Severity::Warn,
            "document.write() overwrites the document stream",
        ),
        (
            RULE_INNER_HTML,
            r"\.(?:inner|outer)HTML\s*\+?=[^=]|\binsertAdjacentHTML\s*\(",
            Severity::Warn,
            "assigning raw HTML injects unsanitized markup",
        ),
        (
            RULE_JAVASCRIPT_URL,
            r#"(?i)\bhref\s*=\s*['"]?\s*javascript:"#,
            Severity::Warn,
            "javascript: URLs execute code on navigation",
        ),
    ];

    table
        .into_iter()
        .map(|(id, pattern, severity, message)| {
            ScanRule::new(id, pattern, severity, message).expect("built-in rule pattern is valid")
        })
        .collect()
});

/// Result of scanning a bundle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Findings in surface order, then rule-table order
    pub issues: Vec<ScanIssue>,
    /// True iff any finding is critical
    pub critical: bool,
}

impl ScanReport {
    fn from_issues(issues: Vec<ScanIssue>) -> Self {
        let critical = issues.iter().any(ScanIssue::is_critical);
        Self { issues, critical }
    }

    /// Critical findings
    pub fn critical_issues(&self) -> impl Iterator<Item = &ScanIssue> {
        self.issues.iter().filter(|i| i.is_critical())
    }

    /// Warning findings
    pub fn warnings(&self) -> impl Iterator<Item = &ScanIssue> {
        self.issues.iter().filter(|i| !i.is_critical())
    }

    /// Whether a rule matched on any surface
    #[must_use]
    pub fn has_rule(&self, rule_id: &str) -> bool {
        self.issues.iter().any(|i| i.rule_id == rule_id)
    }

    /// Numbered list of findings, critical first
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let ordered = self.critical_issues().chain(self.warnings());
        for (n, issue) in ordered.enumerate() {
            let _ = writeln!(out, "{}. {}", n + 1, issue);
        }
        out
    }
}

/// Rule-table scanner
#[derive(Debug, Clone)]
pub struct StaticScanner {
    rules: Vec<ScanRule>,
}

impl Default for StaticScanner {
    fn default() -> Self {
        Self {
            rules: DEFAULT_RULES.clone(),
        }
    }
}

impl StaticScanner {
    /// Scanner with the built-in denylist
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a deployment-specific rule after the built-in ones
    #[must_use]
    pub fn with_rule(mut self, rule: ScanRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Rules in evaluation order
    #[inline]
    #[must_use]
    pub fn rules(&self) -> &[ScanRule] {
        &self.rules
    }

    /// Scan one surface
    #[must_use]
    pub fn scan_surface(&self, surface: Surface, source: &str) -> Vec<ScanIssue> {
        self.rules
            .iter()
            .filter(|rule| rule.pattern.is_match(source))
            .map(|rule| ScanIssue::new(surface, rule.id, rule.severity, rule.message))
            .collect()
    }

    /// Scan all three surfaces of a bundle
    #[must_use]
    pub fn scan(&self, bundle: &CodeBundle) -> ScanReport {
        let issues = Surface::ALL
            .iter()
            .flat_map(|&surface| self.scan_surface(surface, bundle.surface(surface)))
            .collect();
        ScanReport::from_issues(issues)
    }
}

/// Scan a bundle with the built-in rule table
#[must_use]
pub fn scan(bundle: &CodeBundle) -> ScanReport {
    StaticScanner::default().scan(bundle)
}

/// Scan one surface with the built-in rule table
#[must_use]
pub fn scan_source(surface: Surface, source: &str) -> Vec<ScanIssue> {
    StaticScanner::default().scan_surface(surface, source)
}
