//! Fallback stubs appended to accepted bundles
//!
//! Every delivered artifact must expose a self-check routine and forward
//! uncaught failures to its host. When the generated behavior already does
//! either, the corresponding stub is not appended.

use once_cell::sync::Lazy;
use regex::Regex;

/// Global name of the artifact's zero-argument self-check routine
pub const SELF_TEST_ROUTINE: &str = "runSelfTest";

/// Event name artifacts use to forward uncaught failures
pub const ARTIFACT_ERROR_EVENT: &str = "artifact-error";

/// Fallback self-check: passes when the artifact rendered any content
pub const FALLBACK_SELF_TEST_JS: &str = r#"/* artisan:fallback-self-test */
window.runSelfTest = function () {
  var body = document.body;
  var rendered = !!(body && body.children.length);
  var placeholders = document.querySelectorAll('[data-artisan-placeholder]').length;
  return {
    pass: rendered,
    details: { fallback: true, rendered: rendered, placeholders: placeholders }
  };
};
"#;

/// Fallback forwarding of uncaught errors and rejections to the host
pub const FALLBACK_ERROR_FORWARDING_JS: &str = r#"/* artisan:error-forwarding */
(function () {
  function forward(message, source) {
    var payload = {
      type: 'artifact-error',
      message: String(message),
      source: source || null,
      at: Date.now()
    };
    try { window.dispatchEvent(new CustomEvent('artifact-error', { detail: payload })); } catch (_) {}
    try {
      if (window.parent && window.parent !== window) { window.parent.postMessage(payload, '*'); }
    } catch (_) {}
  }
  window.addEventListener('error', function (e) { forward(e.message, e.filename); });
  window.addEventListener('unhandledrejection', function (e) {
    var reason = e.reason && e.reason.message ? e.reason.message : e.reason;
    forward(reason, 'unhandledrejection');
  });
})();
"#;

static SELF_TEST_DECLARATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bfunction\s+runSelfTest\b|\brunSelfTest\s*[:=][^=]")
        .expect("self-test declaration pattern is valid")
});

static ERROR_FORWARDING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"addEventListener\(\s*['"`](?:error|unhandledrejection)['"`]|\bonerror\s*="#)
        .expect("error forwarding pattern is valid")
});

/// Whether behavior code declares the self-check routine
#[inline]
#[must_use]
pub fn declares_self_test(behavior: &str) -> bool {
    SELF_TEST_DECLARATION.is_match(behavior)
}

/// Whether behavior code already forwards uncaught failures
#[inline]
#[must_use]
pub fn forwards_errors(behavior: &str) -> bool {
    ERROR_FORWARDING.is_match(behavior)
}

/// Which stubs [`append_fallback_stubs`] added
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StubsAppended {
    /// Fallback self-check appended
    pub self_test: bool,
    /// Fallback error forwarding appended
    pub error_forwarding: bool,
}

/// Append whichever fallback stubs the behavior code is missing
#[must_use]
pub fn append_fallback_stubs(behavior: &str) -> (String, StubsAppended) {
    let mut code = behavior.to_string();
    let mut appended = StubsAppended::default();

    if !declares_self_test(&code) {
        push_block(&mut code, FALLBACK_SELF_TEST_JS);
        appended.self_test = true;
    }
    if !forwards_errors(&code) {
        push_block(&mut code, FALLBACK_ERROR_FORWARDING_JS);
        appended.error_forwarding = true;
    }
    (code, appended)
}

fn push_block(code: &mut String, block: &str) {
    if !code.is_empty() && !code.ends_with('\n') {
        code.push('\n');
    }
    code.push_str(block);
}
