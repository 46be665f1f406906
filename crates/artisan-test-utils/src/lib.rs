//! Testing utilities for the Artisan workspace
//!
//! Scripted collaborators, a stub artifact runtime and canned model
//! responses.

#![allow(missing_docs)]

use artisan_artifact::{ArtifactId, CodeBundle, SelfTestResult};
use artisan_core::{FetchError, InvokeOptions, ModelClient, ModelError, ReferenceFetcher, Stage};
use artisan_harness::{ArtifactRuntime, HarnessError, ReportingSink, SelfCheckOutcome};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Intent response for "Create a simple calculator"
pub const CALCULATOR_INTENT: &str = r#"{
    "action": "create",
    "category": "utilities",
    "successCriteria": ["2+2 shows 4", "invalid input shows Error"],
    "testingHints": ["evaluate 2+2", "evaluate (2+3)*4"],
    "errorHandlingNotes": "show Error in the display",
    "dataNeeds": [],
    "confidence": 0.9,
    "archetype": "calculator"
}"#;

/// Clean calculator bundle with its own self-check
pub const CALCULATOR_BUNDLE: &str = r##"{
    "title": "Calculator",
    "description": "A keypad calculator",
    "instructions": "Type an expression and press =",
    "html": "<input id=\"display\"><button id=\"equals\">=</button>",
    "css": "#display { width: 100%; font-size: 1.5rem; }",
    "js": "var display = document.getElementById('display');\ndocument.getElementById('equals').addEventListener('click', function () {\n  try { display.value = String(window.__safeEvaluate(display.value)); } catch (e) { display.value = 'Error'; }\n});\nwindow.runSelfTest = function () {\n  var ok = window.__safeEvaluate('2+2') === 4 && window.__safeEvaluate('(2+3)*4') === 20;\n  return { pass: ok, details: { checks: 2 } };\n};"
}"##;

/// Calculator draft that evaluates input with `eval`
pub const EVAL_CALCULATOR_BUNDLE: &str = r#"{
    "title": "Calculator",
    "html": "<input id=\"display\"><button id=\"equals\">=</button>",
    "css": "",
    "js": "document.getElementById('equals').onclick = function () { var d = document.getElementById('display'); d.value = eval(d.value); };"
}"#;

/// Draft that builds code with the `Function` constructor
pub const FUNCTION_CONSTRUCTOR_BUNDLE: &str = r#"{
    "html": "<input id=\"display\">",
    "css": "",
    "js": "var d = document.getElementById('display'); var f = new Function('a', 'return a'); d.value = f(1);"
}"#;

/// One recorded model call
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub stage: Stage,
    pub system_prompt: String,
    pub user_content: String,
}

/// Model that answers from a queue of scripted responses
///
/// An exhausted queue answers [`ModelError::Empty`].
#[derive(Debug, Default)]
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<String, ModelError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response
    #[must_use]
    pub fn then(self, response: impl Into<String>) -> Self {
        self.responses.lock().push_back(Ok(response.into()));
        self
    }

    /// Queue a failure
    #[must_use]
    pub fn then_fail(self, error: ModelError) -> Self {
        self.responses.lock().push_back(Err(error));
        self
    }

    /// Calls received so far
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Stages of the calls received so far
    #[must_use]
    pub fn stages(&self) -> Vec<Stage> {
        self.calls.lock().iter().map(|c| c.stage).collect()
    }

    /// Responses not consumed yet
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.responses.lock().len()
    }
}

#[async_trait::async_trait]
impl ModelClient for ScriptedModel {
    async fn invoke(
        &self,
        system_prompt: &str,
        user_content: &str,
        options: &InvokeOptions,
    ) -> Result<String, ModelError> {
        self.calls.lock().push(RecordedCall {
            stage: options.stage,
            system_prompt: system_prompt.to_string(),
            user_content: user_content.to_string(),
        });
        self.responses.lock().pop_front().unwrap_or(Err(ModelError::Empty))
    }
}

/// Model that never answers
#[derive(Debug, Default, Clone, Copy)]
pub struct StalledModel;

#[async_trait::async_trait]
impl ModelClient for StalledModel {
    async fn invoke(&self, _: &str, _: &str, _: &InvokeOptions) -> Result<String, ModelError> {
        std::future::pending().await
    }
}

/// Fetcher serving files from memory
#[derive(Debug, Default)]
pub struct StaticFetcher {
    sources: HashMap<String, HashMap<String, String>>,
    requests: Mutex<Vec<String>>,
}

impl StaticFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `content` at `path` of `locator`
    #[must_use]
    pub fn with_file(
        mut self,
        locator: impl Into<String>,
        path: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        self.sources
            .entry(locator.into())
            .or_default()
            .insert(path.into(), content.into());
        self
    }

    /// Locators requested so far
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

#[async_trait::async_trait]
impl ReferenceFetcher for StaticFetcher {
    async fn fetch_files(
        &self,
        locator: &str,
        paths: &[String],
    ) -> Result<HashMap<String, String>, FetchError> {
        self.requests.lock().push(locator.to_string());
        let files = self
            .sources
            .get(locator)
            .ok_or_else(|| FetchError::NotFound(locator.to_string()))?;
        Ok(paths
            .iter()
            .filter_map(|p| files.get(p).map(|c| (p.clone(), c.clone())))
            .collect())
    }
}

/// Artifact runtime answering with a fixed outcome
#[derive(Debug)]
pub struct StubRuntime {
    outcome: SelfCheckOutcome,
    scripts: Mutex<Vec<String>>,
    checks: AtomicUsize,
    teardowns: AtomicUsize,
}

impl StubRuntime {
    #[must_use]
    pub fn new(outcome: SelfCheckOutcome) -> Self {
        Self {
            outcome,
            scripts: Mutex::new(Vec::new()),
            checks: AtomicUsize::new(0),
            teardowns: AtomicUsize::new(0),
        }
    }

    /// Runtime whose self-check passes iff `bundle` declares one
    #[must_use]
    pub fn for_bundle(bundle: &CodeBundle) -> Self {
        if artisan_guard::stubs::declares_self_test(&bundle.behavior) {
            Self::new(SelfCheckOutcome::Returned(json!({"pass": true, "details": {}})))
        } else {
            Self::new(SelfCheckOutcome::Missing)
        }
    }

    /// Scripts injected so far, in order
    #[must_use]
    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().clone()
    }

    #[must_use]
    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn teardowns(&self) -> usize {
        self.teardowns.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ArtifactRuntime for StubRuntime {
    async fn inject_script(&self, script: &str) {
        self.scripts.lock().push(script.to_string());
    }

    async fn invoke_self_check(&self, _routine: &str) -> SelfCheckOutcome {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }

    async fn teardown(&self) {
        self.teardowns.fetch_add(1, Ordering::SeqCst);
    }
}

/// Sink that keeps every report
#[derive(Debug, Default)]
pub struct RecordingSink {
    reports: Mutex<Vec<(ArtifactId, SelfTestResult)>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn reports(&self) -> Vec<(ArtifactId, SelfTestResult)> {
        self.reports.lock().clone()
    }
}

#[async_trait::async_trait]
impl ReportingSink for RecordingSink {
    async fn report(
        &self,
        artifact_id: &ArtifactId,
        result: &SelfTestResult,
    ) -> Result<(), HarnessError> {
        self.reports.lock().push((*artifact_id, result.clone()));
        Ok(())
    }
}
