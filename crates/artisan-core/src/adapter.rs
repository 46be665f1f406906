//! Code adapter and repair loop
//!
//! Drives one generation through the states
//!
//! ```text
//! Generating -> Validating -> (Repairing -> Validating)* -> Done | Failed
//! ```
//!
//! - **Generating** asks the model for a full bundle and post-processes it
//!   (evaluator injection, element reconciliation).
//! - **Validating** scans the bundle. A clean bundle gets its fallback stubs
//!   and is done; a critical one goes to repair while budget remains.
//! - **Repairing** sends the previous bundle and its findings back to the
//!   model and asks for a full replacement of all three surfaces.
//!
//! Every model call after the first draft spends one unit of the shared
//! attempt budget, whether it is a repair or the regeneration of an
//! unparsable first draft. A repair response that is unparsable, fails or
//! times out is skipped; the previous bundle stays current. The loop is
//! sequential: attempt `n + 1` is only built once attempt `n` is scanned.

use crate::config::AdapterConfig;
use crate::error::{ArtisanError, Result, Stage};
use crate::model::{parse_json_object, InvokeOptions, ModelClient};
use crate::payload::{raw_string_field, string_field};
use crate::prompt::{
    generation_system_prompt, generation_user_content, repair_system_prompt, repair_user_content,
};
use crate::types::{Intent, ReferenceSet};
use artisan_artifact::{CodeBundle, ScanIssue};
use artisan_guard::{finalize, post_process, ScanReport, StaticScanner};
use std::sync::Arc;
use std::time::Duration;

const MARKUP_KEYS: &[&str] = &["html", "markup"];
const STYLE_KEYS: &[&str] = &["css", "style", "styles"];
const BEHAVIOR_KEYS: &[&str] = &["js", "javascript", "behavior", "script"];

/// A parsed generation response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedBundle {
    /// HTML markup
    pub markup: String,
    /// CSS
    pub style: String,
    /// JavaScript
    pub behavior: String,
    /// Title, if given
    pub title: Option<String>,
    /// Description, if given
    pub description: Option<String>,
    /// Usage instructions, if given
    pub instructions: Option<String>,
}

impl GeneratedBundle {
    /// Validate a raw model response
    ///
    /// Returns `None` unless the response holds a JSON object with all three
    /// code surfaces as strings.
    #[must_use]
    pub fn parse(response: &str) -> Option<Self> {
        let object = parse_json_object(response)?;
        Some(Self {
            markup: raw_string_field(&object, MARKUP_KEYS)?,
            style: raw_string_field(&object, STYLE_KEYS)?,
            behavior: raw_string_field(&object, BEHAVIOR_KEYS)?,
            title: string_field(&object, &["title"]),
            description: string_field(&object, &["description"]),
            instructions: string_field(&object, &["instructions"]),
        })
    }

    /// Fresh bundle from a first generation
    #[must_use]
    pub fn into_bundle(self) -> CodeBundle {
        let mut bundle = CodeBundle::new(self.markup, self.style, self.behavior)
            .with_description(self.description.unwrap_or_default())
            .with_instructions(self.instructions.unwrap_or_default());
        bundle.title = self.title;
        bundle
    }

    /// Replace the surfaces of `previous` wholesale, keeping its metadata
    /// where this response gives none
    #[must_use]
    pub fn replace_in(self, previous: &CodeBundle) -> CodeBundle {
        let mut bundle = previous.with_surfaces(self.markup, self.style, self.behavior);
        if let Some(title) = self.title {
            bundle.title = Some(title);
        }
        if let Some(description) = self.description {
            bundle.description = description;
        }
        if let Some(instructions) = self.instructions {
            bundle.instructions = instructions;
        }
        bundle
    }
}

/// Adapter state
#[derive(Debug)]
pub enum AdapterState {
    /// Waiting for a first draft
    Generating,
    /// Bundle post-processed, not yet scanned
    Validating(CodeBundle),
    /// Last scan was critical; `previous` is the last-known bundle
    Repairing {
        /// Immutable snapshot the corrective prompt is built from
        previous: Arc<CodeBundle>,
        /// Findings of the scan of `previous`
        report: ScanReport,
    },
    /// Accepted bundle
    Done(CodeBundle),
    /// Terminal failure
    Failed(ArtisanError),
}

impl AdapterState {
    /// Whether no further transition exists
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, AdapterState::Done(_) | AdapterState::Failed(_))
    }

    fn name(&self) -> &'static str {
        match self {
            AdapterState::Generating => "generating",
            AdapterState::Validating(_) => "validating",
            AdapterState::Repairing { .. } => "repairing",
            AdapterState::Done(_) => "done",
            AdapterState::Failed(_) => "failed",
        }
    }
}

/// Successful adaptation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adaptation {
    /// Accepted bundle, fallback stubs included
    pub bundle: CodeBundle,
    /// Budget units spent (repairs plus regenerations)
    pub repair_attempts: u32,
    /// Findings of every scan, in order
    pub history: Vec<Vec<ScanIssue>>,
}

/// Per-run bookkeeping
struct Run<'a> {
    intent: &'a Intent,
    references: &'a ReferenceSet,
    attempts: u32,
    history: Vec<Vec<ScanIssue>>,
}

/// Generation, post-processing, scanning and repair
#[derive(Clone)]
pub struct CodeAdapter {
    model: Arc<dyn ModelClient>,
    scanner: StaticScanner,
    config: AdapterConfig,
    call_timeout: Duration,
}

impl std::fmt::Debug for CodeAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeAdapter")
            .field("config", &self.config)
            .field("call_timeout", &self.call_timeout)
            .field("rules", &self.scanner.rules().len())
            .finish_non_exhaustive()
    }
}

impl CodeAdapter {
    /// Create new adapter with the built-in scanner
    #[inline]
    #[must_use]
    pub fn new(model: Arc<dyn ModelClient>, config: AdapterConfig, call_timeout: Duration) -> Self {
        Self {
            model,
            scanner: StaticScanner::default(),
            config,
            call_timeout,
        }
    }

    /// With a custom scanner
    #[inline]
    #[must_use]
    pub fn with_scanner(mut self, scanner: StaticScanner) -> Self {
        self.scanner = scanner;
        self
    }

    /// Repair budget
    #[inline]
    #[must_use]
    pub fn max_repair_attempts(&self) -> u32 {
        self.config.max_repair_attempts
    }

    /// Run the state machine to completion
    ///
    /// # Errors
    /// - [`ArtisanError::AdaptationFailure`] when no parseable draft arrives
    ///   within budget
    /// - [`ArtisanError::SecurityScanFailure`] when the budget runs out with
    ///   critical findings left
    /// - [`ArtisanError::Timeout`] when the first generation call times out
    #[tracing::instrument(skip_all, fields(category = %intent.category, budget = self.config.max_repair_attempts))]
    pub async fn adapt(&self, intent: &Intent, references: &ReferenceSet) -> Result<Adaptation> {
        let mut run = Run {
            intent,
            references,
            attempts: 0,
            history: Vec::new(),
        };

        let mut state = AdapterState::Generating;
        while !state.is_terminal() {
            let from = state.name();
            state = self.step(state, &mut run).await;
            tracing::debug!(from, to = state.name(), attempts = run.attempts, "adapter transition");
        }

        match state {
            AdapterState::Done(bundle) => {
                tracing::info!(
                    attempts = run.attempts,
                    warnings = bundle.scan_issues.len(),
                    "bundle accepted"
                );
                Ok(Adaptation {
                    bundle,
                    repair_attempts: run.attempts,
                    history: run.history,
                })
            }
            AdapterState::Failed(err) => {
                tracing::error!(attempts = run.attempts, error = %err, "adaptation failed");
                Err(err)
            }
            AdapterState::Generating
            | AdapterState::Validating(_)
            | AdapterState::Repairing { .. } => Err(ArtisanError::AdaptationFailure(
                "adapter stopped in a non-terminal state".to_string(),
            )),
        }
    }

    async fn step(&self, state: AdapterState, run: &mut Run<'_>) -> AdapterState {
        match state {
            AdapterState::Generating => self.generate(run).await,
            AdapterState::Validating(bundle) => self.validate(bundle, run),
            AdapterState::Repairing { previous, report } => {
                self.repair(previous, report, run).await
            }
            terminal @ (AdapterState::Done(_) | AdapterState::Failed(_)) => terminal,
        }
    }

    fn has_budget(&self, run: &Run<'_>) -> bool {
        run.attempts < self.config.max_repair_attempts
    }

    async fn generate(&self, run: &mut Run<'_>) -> AdapterState {
        let system = generation_system_prompt(run.intent, run.references);
        let user = generation_user_content(run.intent);
        let options = InvokeOptions::json(Stage::Generation)
            .with_max_tokens(self.config.generation_max_tokens)
            .with_temperature(0.4);

        let failure = match tokio::time::timeout(
            self.call_timeout,
            self.model.invoke(&system, &user, &options),
        )
        .await
        {
            Err(_) => return AdapterState::Failed(ArtisanError::timeout(Stage::Generation, self.call_timeout)),
            Ok(Ok(response)) => match GeneratedBundle::parse(&response) {
                Some(generated) => {
                    let bundle = generated.into_bundle();
                    return AdapterState::Validating(self.post_process(&bundle));
                }
                None => "response is not a JSON object with html, css and js".to_string(),
            },
            Ok(Err(e)) => format!("model call failed: {e}"),
        };

        if self.has_budget(run) {
            run.attempts += 1;
            tracing::warn!(attempt = run.attempts, reason = %failure, "draft unusable; regenerating");
            AdapterState::Generating
        } else {
            AdapterState::Failed(ArtisanError::AdaptationFailure(failure))
        }
    }

    fn post_process(&self, bundle: &CodeBundle) -> CodeBundle {
        let (processed, summary) = post_process(bundle);
        if summary.replaced_calls > 0 || !summary.placeholder_ids.is_empty() {
            tracing::info!(
                replaced_calls = summary.replaced_calls,
                helper_inserted = summary.helper_inserted,
                placeholders = ?summary.placeholder_ids,
                "bundle post-processed"
            );
        }
        processed
    }

    fn validate(&self, mut bundle: CodeBundle, run: &mut Run<'_>) -> AdapterState {
        let report = self.scanner.scan(&bundle);
        run.history.push(report.issues.clone());
        bundle.scan_issues = report.issues.clone();

        tracing::info!(
            attempt = run.attempts,
            critical = report.critical_issues().count(),
            warnings = report.warnings().count(),
            "bundle scanned"
        );

        if !report.critical {
            let (finalized, appended) = finalize(&bundle);
            tracing::debug!(
                self_test_stub = appended.self_test,
                error_forwarding_stub = appended.error_forwarding,
                "fallback stubs"
            );
            return AdapterState::Done(finalized);
        }

        if self.has_budget(run) {
            AdapterState::Repairing {
                previous: Arc::new(bundle),
                report,
            }
        } else {
            AdapterState::Failed(ArtisanError::SecurityScanFailure {
                issues: report.issues,
                history: std::mem::take(&mut run.history),
                attempts: run.attempts,
            })
        }
    }

    async fn repair(
        &self,
        previous: Arc<CodeBundle>,
        report: ScanReport,
        run: &mut Run<'_>,
    ) -> AdapterState {
        run.attempts += 1;
        let attempt = run.attempts;
        tracing::info!(attempt, critical = report.critical_issues().count(), "repair attempt");

        let system = repair_system_prompt();
        let user = repair_user_content(run.intent, &previous, &report);
        let options = InvokeOptions::json(Stage::Repair)
            .with_max_tokens(self.config.generation_max_tokens)
            .with_temperature(0.2);

        let skipped = match tokio::time::timeout(
            self.call_timeout,
            self.model.invoke(&system, &user, &options),
        )
        .await
        {
            Ok(Ok(response)) => match GeneratedBundle::parse(&response) {
                Some(generated) => {
                    let replaced = generated.replace_in(&previous);
                    return AdapterState::Validating(self.post_process(&replaced));
                }
                None => "unparsable response",
            },
            Ok(Err(e)) => {
                tracing::warn!(attempt, error = %e, "repair call failed");
                "model error"
            }
            Err(_) => "timed out",
        };

        tracing::warn!(attempt, reason = skipped, "repair attempt skipped; keeping previous bundle");
        if self.has_budget(run) {
            AdapterState::Repairing { previous, report }
        } else {
            AdapterState::Failed(ArtisanError::SecurityScanFailure {
                issues: report.issues,
                history: std::mem::take(&mut run.history),
                attempts: run.attempts,
            })
        }
    }
}
