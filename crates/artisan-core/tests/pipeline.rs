//! End-to-end pipeline runs against scripted collaborators

use artisan_artifact::ArtifactId;
use artisan_core::prelude::*;
use artisan_core::{Stage, REFERENCES_CONTEXT_KEY, REFERENCES_UNAVAILABLE};
use artisan_guard::scanner::{RULE_EVAL, RULE_FUNCTION_CONSTRUCTOR};
use artisan_harness::{
    EventBus, MemoryResultStore, RuntimeRegistry, SelfTestHarness, SELF_TEST_TRIGGER_JS,
};
use artisan_test_utils::{
    RecordingSink, ScriptedModel, StalledModel, StaticFetcher, StubRuntime, CALCULATOR_BUNDLE,
    CALCULATOR_INTENT, EVAL_CALCULATOR_BUNDLE, FUNCTION_CONSTRUCTOR_BUNDLE,
};
use std::sync::Arc;
use std::time::Duration;

const CALCULATOR_REQUEST: &str = "Create a simple calculator";

fn pipeline(model: Arc<ScriptedModel>) -> ArtifactPipeline {
    ArtifactPipeline::new(model, ArtisanConfig::default()).unwrap()
}

#[tokio::test]
async fn calculator_end_to_end() {
    let model = Arc::new(
        ScriptedModel::new()
            .then(CALCULATOR_INTENT)
            .then(CALCULATOR_BUNDLE),
    );
    let output = pipeline(model.clone())
        .run(Request::new(CALCULATOR_REQUEST))
        .await
        .unwrap();

    assert_eq!(output.scope.decision, Decision::Allow);
    assert_eq!(output.intent.category, "utilities");
    assert_eq!(output.intent.archetype_preset.map(|p| p.id), Some("calculator"));
    assert_eq!(
        output.intent.context.get(REFERENCES_CONTEXT_KEY).map(String::as_str),
        Some(REFERENCES_UNAVAILABLE)
    );
    assert_eq!(output.repair_attempts, 0);
    assert!(!output.bundle.has_critical_issues());
    assert_eq!(output.bundle.title.as_deref(), Some("Calculator"));
    assert_eq!(model.stages(), vec![Stage::Intent, Stage::Generation]);

    let harness = Arc::new(
        SelfTestHarness::new(
            Arc::new(EventBus::new("host")),
            Arc::new(MemoryResultStore::new()),
        )
        .with_sink(Arc::new(RecordingSink::new())),
    );
    let registry = RuntimeRegistry::new(Arc::clone(&harness));
    let id = ArtifactId::new();
    let runtime = Arc::new(StubRuntime::for_bundle(&output.bundle));
    registry.register(id, runtime.clone()).await.unwrap();
    assert_eq!(runtime.scripts(), vec![SELF_TEST_TRIGGER_JS.to_string()]);

    let result = registry.retry(&id).await.unwrap();
    assert!(result.pass);
    assert_eq!(
        harness.debug_surface(&id).unwrap().status_line().as_deref(),
        Some("Self-test: PASS")
    );
}

#[tokio::test]
async fn eval_draft_is_rewritten_without_repair() {
    let model = Arc::new(
        ScriptedModel::new()
            .then(CALCULATOR_INTENT)
            .then(EVAL_CALCULATOR_BUNDLE),
    );
    let output = pipeline(model.clone())
        .run(Request::new(CALCULATOR_REQUEST))
        .await
        .unwrap();

    assert_eq!(output.repair_attempts, 0);
    assert!(output.bundle.behavior.contains("__safeEvaluate("));
    assert!(!output.bundle.scan_issues.iter().any(|i| i.rule_id == RULE_EVAL));
    assert!(artisan_guard::stubs::declares_self_test(&output.bundle.behavior));
    assert_eq!(model.remaining(), 0);
}

#[tokio::test]
async fn critical_draft_is_repaired() {
    let model = Arc::new(
        ScriptedModel::new()
            .then(CALCULATOR_INTENT)
            .then(FUNCTION_CONSTRUCTOR_BUNDLE)
            .then(CALCULATOR_BUNDLE),
    );
    let output = pipeline(model.clone())
        .run(Request::new(CALCULATOR_REQUEST))
        .await
        .unwrap();

    assert_eq!(output.repair_attempts, 1);
    assert!(!output.bundle.has_critical_issues());
    assert_eq!(
        model.stages(),
        vec![Stage::Intent, Stage::Generation, Stage::Repair]
    );
    let repair = &model.calls()[2];
    assert!(repair.user_content.contains(RULE_FUNCTION_CONSTRUCTOR));
    assert!(repair.user_content.contains(CALCULATOR_REQUEST));
}

#[tokio::test]
async fn exhausted_budget_reports_every_scan() {
    let model = Arc::new(
        ScriptedModel::new()
            .then(CALCULATOR_INTENT)
            .then(FUNCTION_CONSTRUCTOR_BUNDLE)
            .then(FUNCTION_CONSTRUCTOR_BUNDLE)
            .then(FUNCTION_CONSTRUCTOR_BUNDLE),
    );
    let err = pipeline(model.clone())
        .run(Request::new(CALCULATOR_REQUEST))
        .await
        .unwrap_err();

    match err {
        ArtisanError::SecurityScanFailure {
            issues,
            history,
            attempts,
        } => {
            assert_eq!(attempts, 2);
            assert_eq!(history.len(), 3);
            assert!(issues.iter().any(|i| i.rule_id == RULE_FUNCTION_CONSTRUCTOR));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(model.remaining(), 0);
}

#[tokio::test]
async fn unparsable_intent_is_a_parse_failure() {
    let model = Arc::new(ScriptedModel::new().then("I would rather chat"));
    let err = pipeline(model)
        .run(Request::new(CALCULATOR_REQUEST))
        .await
        .unwrap_err();
    assert!(matches!(err, ArtisanError::ParseFailure(_)));
    assert_eq!(err.stage(), Stage::Intent);
}

#[tokio::test(start_paused = true)]
async fn stalled_model_times_out_intent() {
    let pipeline = ArtifactPipeline::new(Arc::new(StalledModel), ArtisanConfig::default()).unwrap();
    let err = pipeline
        .run(Request::new(CALCULATOR_REQUEST))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ArtisanError::Timeout {
            stage: Stage::Intent,
            after_ms: 60_000
        }
    ));
    assert!(err.is_retryable());
}

#[tokio::test(start_paused = true)]
async fn pipeline_deadline_wins_over_call_timeout() {
    let config = ArtisanConfig::default().with_pipeline_timeout(Duration::from_secs(10));
    let pipeline = ArtifactPipeline::new(Arc::new(StalledModel), config).unwrap();
    let err = pipeline
        .run(Request::new(CALCULATOR_REQUEST))
        .await
        .unwrap_err();
    assert_eq!(err.stage(), Stage::Pipeline);
}

#[tokio::test]
async fn fetched_references_reach_the_generation_prompt() {
    const LOCATOR: &str = "https://github.com/acme/calc-kit";
    let candidates = format!(
        r#"{{"candidates": [
            {{"url": "https://github.com/user/repo", "referencedFiles": ["index.html"]}},
            {{"url": "{LOCATOR}", "referencedFiles": ["index.html", "src/keypad.js", "README.md"], "license": "MIT"}}
        ]}}"#
    );
    let model = Arc::new(
        ScriptedModel::new()
            .then(CALCULATOR_INTENT)
            .then(candidates)
            .then(CALCULATOR_BUNDLE),
    );
    let fetcher = Arc::new(
        StaticFetcher::new()
            .with_file(LOCATOR, "index.html", "<main id=\"keypad-root\"></main>")
            .with_file(LOCATOR, "src/keypad.js", "export function keypad() {}"),
    );
    let pipeline =
        ArtifactPipeline::with_fetcher(model.clone(), fetcher.clone(), ArtisanConfig::default())
            .unwrap();

    let output = pipeline.run(Request::new(CALCULATOR_REQUEST)).await.unwrap();

    assert_eq!(fetcher.requests(), vec![LOCATOR.to_string()]);
    assert_eq!(output.bundle.reference_source.as_deref(), Some(LOCATOR));
    assert!(!output.intent.context.contains_key(REFERENCES_CONTEXT_KEY));
    assert_eq!(
        model.stages(),
        vec![Stage::Intent, Stage::References, Stage::Generation]
    );
    assert!(model.calls()[2].system_prompt.contains("keypad-root"));
}

#[tokio::test]
async fn failed_fetch_marks_references_unavailable() {
    let model = Arc::new(
        ScriptedModel::new()
            .then(CALCULATOR_INTENT)
            .then(r#"[{"url": "https://github.com/acme/missing", "files": ["main.js"]}]"#)
            .then(CALCULATOR_BUNDLE),
    );
    let pipeline = ArtifactPipeline::with_fetcher(
        model,
        Arc::new(StaticFetcher::new()),
        ArtisanConfig::default(),
    )
    .unwrap();

    let output = pipeline.run(Request::new(CALCULATOR_REQUEST)).await.unwrap();
    assert_eq!(output.bundle.reference_source, None);
    assert_eq!(
        output.intent.context.get(REFERENCES_CONTEXT_KEY).map(String::as_str),
        Some(REFERENCES_UNAVAILABLE)
    );
}
