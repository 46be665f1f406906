//! Bundle post-processing
//!
//! Two passes run on every generated bundle:
//!
//! 1. [`post_process`] after each generation or repair response: evaluator
//!    injection on the behavior surface, then element reconciliation.
//! 2. [`finalize`] once the scan is clean: fallback self-check and error
//!    forwarding stubs.

use crate::inject::inject_safe_evaluator;
use crate::reconcile::reconcile_elements;
use crate::stubs::{append_fallback_stubs, StubsAppended};
use artisan_artifact::CodeBundle;

/// What [`post_process`] changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostProcessSummary {
    /// Dynamic evaluation call sites rewritten
    pub replaced_calls: usize,
    /// Safe evaluator helper prepended
    pub helper_inserted: bool,
    /// Placeholder elements appended to the markup
    pub placeholder_ids: Vec<String>,
}

/// Inject the safe evaluator and reconcile element lookups
///
/// Returns a new bundle; the input is left untouched.
#[must_use]
pub fn post_process(bundle: &CodeBundle) -> (CodeBundle, PostProcessSummary) {
    let injection = inject_safe_evaluator(&bundle.behavior);
    let reconciliation = reconcile_elements(&bundle.markup, &injection.code);

    let processed = bundle.with_surfaces(
        reconciliation.markup,
        bundle.style.clone(),
        injection.code,
    );

    let summary = PostProcessSummary {
        replaced_calls: injection.replaced_calls,
        helper_inserted: injection.helper_inserted,
        placeholder_ids: reconciliation.added_ids,
    };
    (processed, summary)
}

/// Append fallback stubs to an accepted bundle
///
/// Scan findings recorded on the input are preserved.
#[must_use]
pub fn finalize(bundle: &CodeBundle) -> (CodeBundle, StubsAppended) {
    let (behavior, appended) = append_fallback_stubs(&bundle.behavior);
    let mut finalized = bundle.clone();
    finalized.behavior = behavior;
    (finalized, appended)
}
