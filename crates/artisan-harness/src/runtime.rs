//! The boundary to a running artifact
//!
//! A host renders an artifact somewhere (an iframe, a webview, a headless
//! page) and exposes it to the harness as an [`ArtifactRuntime`]. The
//! harness injects the trigger routine into it once and then only ever asks
//! it to run the self-check routine.

use artisan_artifact::SelfTestResult;
use serde_json::Value;

/// What happened when the self-check routine was invoked
#[derive(Debug, Clone, PartialEq)]
pub enum SelfCheckOutcome {
    /// The artifact defines no self-check routine
    Missing,
    /// The routine threw or its deferred value rejected
    Threw(String),
    /// The routine returned, possibly after awaiting a deferred value
    Returned(Value),
}

impl SelfCheckOutcome {
    /// Normalize into a [`SelfTestResult`]
    ///
    /// Never fails: a missing or throwing routine becomes a failing result
    /// with a diagnostic.
    #[must_use]
    pub fn normalize(&self) -> SelfTestResult {
        match self {
            SelfCheckOutcome::Missing => SelfTestResult::diagnostic(format!(
                "self-check routine window.{} is not defined",
                artisan_guard::SELF_TEST_ROUTINE
            )),
            SelfCheckOutcome::Threw(message) => {
                SelfTestResult::diagnostic(format!("self-check threw: {message}"))
            }
            SelfCheckOutcome::Returned(raw) => SelfTestResult::from_raw(raw),
        }
    }
}

/// A rendered, running artifact
#[async_trait::async_trait]
pub trait ArtifactRuntime: Send + Sync {
    /// Evaluate `script` in the artifact's execution context, once, before
    /// any self-check is requested
    async fn inject_script(&self, script: &str);

    /// Invoke the zero-argument routine `routine` on the artifact's global
    /// scope and wait for its (possibly deferred) value
    async fn invoke_self_check(&self, routine: &str) -> SelfCheckOutcome;

    /// Release host resources held for the artifact
    async fn teardown(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_routine_is_a_diagnostic_failure() {
        let result = SelfCheckOutcome::Missing.normalize();
        assert!(!result.pass);
        assert_eq!(
            result.details["error"],
            "self-check routine window.runSelfTest is not defined"
        );
    }

    #[test]
    fn thrown_error_is_a_failure() {
        let result = SelfCheckOutcome::Threw("TypeError: x is undefined".into()).normalize();
        assert!(!result.pass);
        assert!(result.details["error"]
            .as_str()
            .unwrap()
            .contains("TypeError"));
    }

    #[test]
    fn returned_value_accepts_success_alias() {
        let result = SelfCheckOutcome::Returned(json!({"success": true, "details": {"n": 3}}))
            .normalize();
        assert!(result.pass);
        assert_eq!(result.details, json!({"n": 3}));
    }
}
