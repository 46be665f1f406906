//! Post-process, scan and finalize a draft the way the code adapter does

use artisan_artifact::{CodeBundle, Surface};
use artisan_guard::scanner::{RULE_EVAL, RULE_INNER_HTML, RULE_STRING_TIMER};
use artisan_guard::stubs::{declares_self_test, forwards_errors};
use artisan_guard::{evaluate, finalize, post_process, scan, EvaluationError, SAFE_EVALUATOR_NAME};
use pretty_assertions::assert_eq;

fn calculator_draft() -> CodeBundle {
    CodeBundle::new(
        "<input id=\"display\"><button id=\"equals\">=</button>",
        "#display { width: 100%; }",
        "document.getElementById('equals').onclick = function () {\n  \
         var d = document.getElementById('display');\n  \
         d.value = eval(d.value);\n  \
         document.getElementById('history').innerHTML = d.value;\n};",
    )
}

#[test]
fn eval_draft_becomes_deliverable() {
    let draft = calculator_draft();
    let before = scan(&draft);
    assert!(before.critical);
    assert!(before.has_rule(RULE_EVAL));

    let (processed, summary) = post_process(&draft);
    assert_eq!(summary.replaced_calls, 1);
    assert!(summary.helper_inserted);
    assert_eq!(summary.placeholder_ids, vec!["history".to_string()]);
    assert!(processed.behavior.contains(&format!("{SAFE_EVALUATOR_NAME}(d.value)")));
    assert!(processed.markup.contains("id=\"history\""));

    let after = scan(&processed);
    assert!(!after.critical);
    assert!(after.has_rule(RULE_INNER_HTML));
    assert!(after.warnings().all(|i| i.surface == Surface::Behavior));

    let (delivered, appended) = finalize(&processed);
    assert!(appended.self_test);
    assert!(appended.error_forwarding);
    assert!(declares_self_test(&delivered.behavior));
    assert!(forwards_errors(&delivered.behavior));
    assert!(!scan(&delivered).critical);
}

#[test]
fn member_and_nested_eval_agree_with_the_scanner() {
    let draft = CodeBundle::new(
        "",
        "",
        "var r = math.eval('1+2'); var s = eval(eval('x'));",
    );
    let (processed, summary) = post_process(&draft);
    assert_eq!(summary.replaced_calls, 2);
    assert!(processed.behavior.contains("var r = math.eval('1+2');"));
    assert!(processed
        .behavior
        .contains(&format!("{SAFE_EVALUATOR_NAME}({SAFE_EVALUATOR_NAME}('x'))")));

    let report = scan(&processed);
    assert!(!report.critical, "{}", report.render());
    assert!(!report.has_rule(RULE_EVAL));
}

#[test]
fn passes_are_idempotent() {
    let (once, _) = post_process(&calculator_draft());
    let (twice, summary) = post_process(&once);
    assert_eq!(twice, once);
    assert_eq!(summary.replaced_calls, 0);
    assert!(!summary.helper_inserted);
    assert!(summary.placeholder_ids.is_empty());

    let (final_once, _) = finalize(&once);
    let (final_twice, appended) = finalize(&final_once);
    assert_eq!(final_twice, final_once);
    assert!(!appended.self_test && !appended.error_forwarding);
}

#[test]
fn string_timers_are_left_for_repair() {
    let draft = CodeBundle::new("<div id=\"t\"></div>", "", "setInterval('tick()', 1000);");
    let (processed, _) = post_process(&draft);
    let report = scan(&processed);
    assert!(report.critical);
    assert!(report.has_rule(RULE_STRING_TIMER));
}

#[test]
fn evaluator_matches_calculator_checklist() {
    assert_eq!(evaluate("2+2"), Ok(4.0));
    assert_eq!(evaluate("(2+3)*4"), Ok(20.0));
    assert_eq!(evaluate("1/0"), Err(EvaluationError::DivisionByZero));
    assert!(evaluate("alert(1)").is_err());
}
