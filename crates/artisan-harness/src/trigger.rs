//! Injected trigger routine and the messages it posts
//!
//! [`SELF_TEST_TRIGGER_JS`] runs inside the artifact. It calls the
//! self-check routine, normalizes whatever comes back (including a missing
//! routine, a throw or a rejected promise), dispatches a `self-test-result`
//! event on the artifact's own window and posts the same payload to the
//! host. Error forwarding stubs post `artifact-error` messages the same way.
//! [`parse_artifact_message`] turns either message back into a typed value on
//! the host side.

use crate::bus::Topic;
use artisan_artifact::SelfTestResult;
use serde_json::Value;

/// Global name under which [`SELF_TEST_TRIGGER_JS`] installs itself
pub const TRIGGER_ROUTINE: &str = "__artisanTriggerSelfTest";

/// Trigger routine injected into the artifact's execution context
pub const SELF_TEST_TRIGGER_JS: &str = r#"/* artisan:self-test-trigger */
(function (root) {
  function normalize(raw) {
    if (!raw || typeof raw !== 'object') {
      return { pass: false, details: { error: 'self-check returned a non-object value', returned: raw } };
    }
    var flag = typeof raw.pass === 'boolean' ? raw.pass
      : (typeof raw.success === 'boolean' ? raw.success : null);
    if (flag === null) {
      return { pass: false, details: { error: 'self-check result has no boolean pass/success field', returned: raw } };
    }
    return { pass: flag, details: raw.details === undefined ? null : raw.details };
  }
  function publish(result) {
    var message = { type: 'self-test-result', payload: result };
    try { root.dispatchEvent(new CustomEvent('self-test-result', { detail: result })); } catch (_) {}
    try {
      if (root.parent && root.parent !== root) { root.parent.postMessage(message, '*'); }
    } catch (_) {}
    return result;
  }
  function fail(message) {
    return publish({ pass: false, details: { error: message } });
  }
  root.__artisanTriggerSelfTest = function () {
    if (typeof root.runSelfTest !== 'function') {
      return Promise.resolve(fail('self-check routine window.runSelfTest is not defined'));
    }
    try {
      return Promise.resolve(root.runSelfTest()).then(
        function (raw) { return publish(normalize(raw)); },
        function (err) { return fail('self-check threw: ' + (err && err.message ? err.message : String(err))); }
      );
    } catch (err) {
      return Promise.resolve(fail('self-check threw: ' + (err && err.message ? err.message : String(err))));
    }
  };
})(window);
"#;

/// A message posted by an artifact to its host
#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactMessage {
    /// Outcome of the trigger routine
    SelfTestResult(SelfTestResult),
    /// Forwarded uncaught failure
    ArtifactError(String),
}

/// Parse a message an artifact posted to its host
///
/// Returns `None` for messages that are not from the trigger routine or the
/// error forwarding stub. The self-test payload is normalized again on this
/// side, so a tampered payload still yields a well-formed result.
#[must_use]
pub fn parse_artifact_message(message: &Value) -> Option<ArtifactMessage> {
    let kind = message.get("type").and_then(Value::as_str)?;
    match Topic::from_name(kind)? {
        Topic::SelfTestResult => {
            let payload = message.get("payload").unwrap_or(&Value::Null);
            Some(ArtifactMessage::SelfTestResult(SelfTestResult::from_raw(
                payload,
            )))
        }
        Topic::ArtifactError => {
            let text = match message.get("message") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => "unknown error".to_string(),
                Some(other) => other.to_string(),
            };
            Some(ArtifactMessage::ArtifactError(text))
        }
    }
}
