//! Safe evaluator injection
//!
//! Rewrites dynamic evaluation call sites in generated behavior code into
//! calls to the safe evaluator helper, and prepends the helper itself. The
//! helper is a JavaScript port of [`crate::evaluate`], exposed globally as
//! [`SAFE_EVALUATOR_NAME`].

use once_cell::sync::Lazy;
use regex::Regex;

/// Global name the helper is exposed under inside an artifact
pub const SAFE_EVALUATOR_NAME: &str = "__safeEvaluate";

/// Marker line that identifies an inserted helper
pub const SAFE_EVALUATOR_MARKER: &str = "/* artisan:safe-evaluator */";

/// JavaScript source of the injected helper
///
/// Mirrors the Rust evaluator token for token: same whitelist, same
/// tokenizer, same precedence table and the same error conditions.
pub const SAFE_EVALUATOR_JS: &str = r#"/* artisan:safe-evaluator */
(function (root) {
  if (typeof root.__safeEvaluate === 'function') { return; }
  var PRECEDENCE = { '+': 1, '-': 1, '*': 2, '/': 2, '%': 2 };
  function fail(message) {
    var err = new Error(message);
    err.name = 'EvaluationError';
    throw err;
  }
  function reduce(values, op) {
    if (values.length < 2) { fail('incomplete expression'); }
    var b = values.pop();
    var a = values.pop();
    var r;
    if (op === '+') { r = a + b; }
    else if (op === '-') { r = a - b; }
    else if (op === '*') { r = a * b; }
    else {
      if (b === 0) { fail('division by zero'); }
      r = op === '/' ? a / b : a % b;
    }
    if (!isFinite(r)) { fail('result is not finite'); }
    values.push(r);
  }
  function safeEvaluate(expression) {
    var source = String(expression);
    if (/[^0-9.()+\-*\/%\s]/.test(source)) { fail('invalid character'); }
    var tokens = source.match(/\d+(?:\.\d*)?|\.\d+|[+\-*\/%()]/g);
    if (!tokens) { fail(source.trim() ? 'malformed number' : 'expression is empty'); }
    if (tokens.join('').length !== source.replace(/\s+/g, '').length) { fail('malformed number'); }
    var values = [];
    var ops = [];
    var expectOperand = true;
    for (var i = 0; i < tokens.length; i++) {
      var t = tokens[i];
      if (t === '(') {
        if (!expectOperand) { fail('unexpected token'); }
        ops.push(t);
      } else if (t === ')') {
        if (expectOperand) { fail('incomplete expression'); }
        while (ops.length && ops[ops.length - 1] !== '(') { reduce(values, ops.pop()); }
        if (!ops.length) { fail('mismatched parentheses'); }
        ops.pop();
      } else if (PRECEDENCE[t]) {
        if (expectOperand) { fail('unexpected token'); }
        while (ops.length && ops[ops.length - 1] !== '(' &&
               PRECEDENCE[ops[ops.length - 1]] >= PRECEDENCE[t]) {
          reduce(values, ops.pop());
        }
        ops.push(t);
        expectOperand = true;
      } else {
        if (!expectOperand) { fail('unexpected token'); }
        values.push(parseFloat(t));
        expectOperand = false;
      }
    }
    if (expectOperand) { fail('incomplete expression'); }
    while (ops.length) {
      var op = ops.pop();
      if (op === '(') { fail('mismatched parentheses'); }
      reduce(values, op);
    }
    if (values.length !== 1) { fail('incomplete expression'); }
    return values[0];
  }
  root.__safeEvaluate = safeEvaluate;
})(typeof window !== 'undefined' ? window : globalThis);
var __safeEvaluate = (typeof window !== 'undefined' ? window : globalThis).__safeEvaluate;
"#;

// `eval(` not preceded by an identifier character or a property dot
static BARE_EVAL_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|[^\w$.])eval\s*\(").expect("eval pattern is valid"));

static GLOBAL_EVAL_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:window|globalThis|self)\s*\.\s*eval\s*\(").expect("global eval pattern is valid")
});

// `new Function('return ' + expr)()` and the `Function(...)()` spelling
static RETURN_FUNCTION_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?:\bnew\s+)?\bFunction\s*\(\s*['"`]return\s+['"`]\s*\+\s*([^()]+?)\s*\)\s*\(\s*\)"#,
    )
    .expect("function constructor pattern is valid")
});

/// Result of [`inject_safe_evaluator`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Injection {
    /// Rewritten behavior code
    pub code: String,
    /// Number of call sites rewritten
    pub replaced_calls: usize,
    /// Whether the helper was prepended by this call
    pub helper_inserted: bool,
}

/// Whether the helper has already been inserted into `code`
#[inline]
#[must_use]
pub fn has_safe_evaluator(code: &str) -> bool {
    code.contains(SAFE_EVALUATOR_MARKER)
}

/// Rewrite dynamic evaluation call sites and insert the helper
///
/// The helper is prepended when a call site was rewritten or when the code
/// already references [`SAFE_EVALUATOR_NAME`]. Insertion is idempotent: a
/// second pass over the output changes nothing.
#[must_use]
pub fn inject_safe_evaluator(code: &str) -> Injection {
    let mut replaced_calls = 0usize;

    replaced_calls += GLOBAL_EVAL_CALL.find_iter(code).count();
    let mut rewritten = GLOBAL_EVAL_CALL
        .replace_all(code, format!("{SAFE_EVALUATOR_NAME}(").as_str())
        .into_owned();

    // A match consumes its leading separator, so `eval(eval(` needs a second pass
    let bare_replacement = format!("${{1}}{SAFE_EVALUATOR_NAME}(");
    loop {
        let found = BARE_EVAL_CALL.find_iter(&rewritten).count();
        if found == 0 {
            break;
        }
        replaced_calls += found;
        rewritten = BARE_EVAL_CALL
            .replace_all(&rewritten, bare_replacement.as_str())
            .into_owned();
    }

    replaced_calls += RETURN_FUNCTION_CALL.find_iter(&rewritten).count();
    let rewritten = RETURN_FUNCTION_CALL.replace_all(
        &rewritten,
        format!("{SAFE_EVALUATOR_NAME}(${{1}})").as_str(),
    );

    let needs_helper = replaced_calls > 0 || rewritten.contains(SAFE_EVALUATOR_NAME);
    let helper_inserted = needs_helper && !has_safe_evaluator(&rewritten);

    let code = if helper_inserted {
        format!("{SAFE_EVALUATOR_JS}\n{rewritten}")
    } else {
        rewritten.into_owned()
    };

    if replaced_calls > 0 {
        tracing::debug!(replaced_calls, helper_inserted, "rewrote dynamic evaluation call sites");
    }

    Injection {
        code,
        replaced_calls,
        helper_inserted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::scan_source;
    use artisan_artifact::Surface;

    #[test]
    fn rewrites_bare_eval() {
        let out = inject_safe_evaluator("display.value = eval(display.value);");
        assert_eq!(out.replaced_calls, 1);
        assert!(out.helper_inserted);
        assert!(out.code.contains("display.value = __safeEvaluate(display.value);"));
        assert!(out.code.starts_with(SAFE_EVALUATOR_MARKER));
    }

    #[test]
    fn rewrites_nested_eval() {
        let out = inject_safe_evaluator("var s = eval(eval('x'));");
        assert_eq!(out.replaced_calls, 2);
        assert!(out.code.contains("var s = __safeEvaluate(__safeEvaluate('x'));"));
        assert!(scan_source(Surface::Behavior, &out.code).is_empty());
    }

    #[test]
    fn rewrites_window_eval() {
        let out = inject_safe_evaluator("const r = window.eval(expr);");
        assert_eq!(out.replaced_calls, 1);
        assert!(out.code.contains("const r = __safeEvaluate(expr);"));
    }

    #[test]
    fn rewrites_return_function_constructor() {
        let out = inject_safe_evaluator("const r = new Function('return ' + expr)();");
        assert_eq!(out.replaced_calls, 1);
        assert!(out.code.contains("const r = __safeEvaluate(expr);"));
    }

    #[test]
    fn leaves_property_eval_and_lookalikes_alone() {
        let src = "math.eval(x); medieval(y); retrieval(z);";
        let out = inject_safe_evaluator(src);
        assert_eq!(out.replaced_calls, 0);
        assert!(!out.helper_inserted);
        assert_eq!(out.code, src);
    }

    #[test]
    fn idempotent() {
        let once = inject_safe_evaluator("let v = eval(a) + eval(b);");
        assert_eq!(once.replaced_calls, 2);
        let twice = inject_safe_evaluator(&once.code);
        assert_eq!(twice.replaced_calls, 0);
        assert!(!twice.helper_inserted);
        assert_eq!(twice.code, once.code);
        assert_eq!(once.code.matches(SAFE_EVALUATOR_MARKER).count(), 1);
    }

    #[test]
    fn inserts_helper_for_existing_references() {
        let out = inject_safe_evaluator("function calc(s) { return __safeEvaluate(s); }");
        assert_eq!(out.replaced_calls, 0);
        assert!(out.helper_inserted);
    }

    #[test]
    fn helper_passes_the_scanner() {
        let issues = scan_source(Surface::Behavior, SAFE_EVALUATOR_JS);
        assert!(issues.is_empty(), "helper tripped rules: {issues:?}");
    }

    #[test]
    fn rewritten_code_passes_the_scanner() {
        let out = inject_safe_evaluator("out.textContent = eval(input.value);");
        assert!(scan_source(Surface::Behavior, &out.code).is_empty());
    }
}
