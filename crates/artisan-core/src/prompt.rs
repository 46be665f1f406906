//! Prompt construction
//!
//! Every prompt the pipeline sends is built here so the wording of the
//! contract with the model lives in one place.

use crate::types::{Intent, ReferenceSet, Request};
use artisan_artifact::CodeBundle;
use artisan_guard::{ScanReport, ARTIFACT_ERROR_EVENT, SAFE_EVALUATOR_NAME, SELF_TEST_ROUTINE};
use std::fmt::Write;

/// System prompt for intent extraction
pub const INTENT_SYSTEM_PROMPT: &str = "You analyze requests for small, self-contained \
interactive web artifacts. Respond with a single JSON object and nothing else, with keys:
  \"action\": what the user wants done, e.g. \"create\"
  \"category\": one lowercase word, e.g. \"utilities\", \"games\", \"productivity\", \"education\", \"visualization\"
  \"successCriteria\": array of observable conditions the artifact must satisfy
  \"testingHints\": array of checks a self-test routine should perform
  \"errorHandlingNotes\": how the artifact should handle bad input and failures
  \"dataNeeds\": array of data the artifact needs
  \"confidence\": number between 0 and 1
  \"archetype\": optional tag such as \"calculator\", \"todo-list\", \"timer\", \"quiz\", \"game\", \"chart\"";

/// System prompt for reference candidate selection
pub const CANDIDATE_SYSTEM_PROMPT: &str = "You suggest open-source repositories whose code \
could serve as a reference for a small browser artifact. Respond with a JSON array of at most \
3 objects with keys \"url\", \"description\", \"referencedFiles\" (paths inside the repository), \
\"license\" and \"complexity\" (\"low\", \"medium\" or \"high\"). Only name repositories you are \
certain exist. Respond with [] when none fit.";

/// User content for intent extraction
#[must_use]
pub fn intent_user_content(request: &Request) -> String {
    let mut out = format!("Request: {}", request.text);
    if !request.context.is_empty() {
        out.push_str("\nContext:");
        for (key, value) in &request.context {
            let _ = write!(out, "\n  {key}: {value}");
        }
    }
    out
}

/// User content for reference candidate selection
#[must_use]
pub fn candidate_user_content(intent: &Intent) -> String {
    let mut out = format!(
        "Category: {}\nRequest: {}",
        intent.category, intent.original_prompt
    );
    if let Some(preset) = intent.archetype_preset {
        let _ = write!(out, "\nArchetype: {}", preset.id);
    }
    out
}

fn bullet_list(out: &mut String, heading: &str, items: &[impl AsRef<str>]) {
    if items.is_empty() {
        return;
    }
    let _ = write!(out, "\n\n{heading}:");
    for item in items {
        let _ = write!(out, "\n- {}", item.as_ref());
    }
}

fn output_contract(out: &mut String) {
    let _ = write!(
        out,
        "Respond with a single JSON object with keys \"title\", \"description\", \
\"instructions\", \"html\", \"css\" and \"js\". All three code keys are required.

Hard rules for the js:
- Never use eval, new Function, or setTimeout/setInterval with a string argument.
- Evaluate arithmetic only through window.{SAFE_EVALUATOR_NAME}(expression).
- Define window.{SELF_TEST_ROUTINE} = function () {{ ... }} returning {{ pass: boolean, details: object }}, \
synchronously or as a Promise, that exercises the core functionality.
- Catch uncaught errors and post them to the parent window as {{ type: '{ARTIFACT_ERROR_EVENT}', message }}.
- Every element the js looks up by id must exist in the html."
    );
}

/// System prompt for the first generation
#[must_use]
pub fn generation_system_prompt(intent: &Intent, references: &ReferenceSet) -> String {
    let mut out = String::from(
        "You build small, self-contained interactive web artifacts from plain HTML, CSS and \
JavaScript with no external dependencies.\n\n",
    );
    output_contract(&mut out);

    if let Some(preset) = intent.archetype_preset {
        let _ = write!(out, "\n\nArchetype '{}': {}", preset.id, preset.prompt_addendum);
        bullet_list(&mut out, "The self-test must cover", preset.self_test_checklist);
    }

    bullet_list(&mut out, "Success criteria", &intent.success_criteria);
    bullet_list(&mut out, "Testing hints", &intent.testing_hints);
    bullet_list(&mut out, "Data needs", &intent.data_needs);
    if !intent.error_handling_notes.is_empty() {
        let _ = write!(out, "\n\nError handling: {}", intent.error_handling_notes);
    }

    if !references.is_empty() {
        let _ = write!(
            out,
            "\n\nReference code from {} (adapt, do not copy verbatim):",
            references.source.as_deref().unwrap_or("an unnamed source")
        );
        for excerpt in &references.excerpts {
            let _ = write!(out, "\n\n--- {} ---\n{}", excerpt.path, excerpt.content);
        }
    }
    out
}

/// User content for the first generation
#[must_use]
pub fn generation_user_content(intent: &Intent) -> String {
    let mut out = format!(
        "Build this ({} / {}): {}",
        intent.action, intent.category, intent.original_prompt
    );
    let context: Vec<String> = intent
        .context
        .iter()
        .map(|(k, v)| format!("{k}: {v}"))
        .collect();
    bullet_list(&mut out, "Context", &context);
    out
}

/// System prompt for a corrective re-generation
#[must_use]
pub fn repair_system_prompt() -> String {
    let mut out = String::from(
        "You fix security findings in a generated web artifact. Return a full replacement of \
all three code surfaces; partial patches are not accepted. Keep the behavior the user asked \
for.\n\n",
    );
    output_contract(&mut out);
    out
}

/// User content for a corrective re-generation
///
/// Carries the original request, the current surfaces and every finding of
/// the last scan.
#[must_use]
pub fn repair_user_content(intent: &Intent, previous: &CodeBundle, report: &ScanReport) -> String {
    format!(
        "Original request: {}\n\nFindings:\n{}\n\n--- html ---\n{}\n\n--- css ---\n{}\n\n--- js ---\n{}",
        intent.original_prompt,
        report.render(),
        previous.markup,
        previous.style,
        previous.behavior,
    )
}
