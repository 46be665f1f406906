//! Intent extraction
//!
//! Turns request text into a structured [`Intent`] through one model call.
//! Only a response with no JSON object in it is a hard failure; missing or
//! mistyped fields fall back to the defaults below.

use crate::error::{ArtisanError, Result, Stage};
use crate::model::{parse_json_object, InvokeOptions, ModelClient};
use crate::payload::{number_field, string_field, string_list, Object};
use crate::presets::resolve_preset;
use crate::prompt::{intent_user_content, INTENT_SYSTEM_PROMPT};
use crate::types::{Intent, Request};
use std::sync::Arc;
use std::time::Duration;

/// Action used when the model names none
pub const DEFAULT_ACTION: &str = "create";
/// Category used when the model names none and no preset applies
pub const DEFAULT_CATEGORY: &str = "general";
/// Confidence used when the model reports none
pub const DEFAULT_CONFIDENCE: f64 = 0.5;
/// Error handling used when the model gives no notes
pub const DEFAULT_ERROR_HANDLING: &str =
    "Validate input, show a readable message on failure and never leave an uncaught error.";

/// Model-backed intent extractor
#[derive(Clone)]
pub struct IntentExtractor {
    model: Arc<dyn ModelClient>,
    call_timeout: Duration,
}

impl std::fmt::Debug for IntentExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentExtractor")
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

impl IntentExtractor {
    /// Create new extractor
    #[inline]
    #[must_use]
    pub fn new(model: Arc<dyn ModelClient>, call_timeout: Duration) -> Self {
        Self {
            model,
            call_timeout,
        }
    }

    /// Extract the intent of `request`
    ///
    /// # Errors
    /// - [`ArtisanError::ParseFailure`] when the model call fails or its
    ///   response holds no JSON object
    /// - [`ArtisanError::Timeout`] when the call exceeds its deadline
    pub async fn extract(&self, request: &Request) -> Result<Intent> {
        let options = InvokeOptions::json(Stage::Intent).with_max_tokens(1024);
        let content = intent_user_content(request);
        let call = self.model.invoke(INTENT_SYSTEM_PROMPT, &content, &options);

        let response = tokio::time::timeout(self.call_timeout, call)
            .await
            .map_err(|_| ArtisanError::timeout(Stage::Intent, self.call_timeout))?
            .map_err(|e| ArtisanError::ParseFailure(format!("model call failed: {e}")))?;

        let object = parse_json_object(&response).ok_or_else(|| {
            ArtisanError::ParseFailure("response is not a JSON object".to_string())
        })?;

        let intent = intent_from_object(&object, request);
        tracing::info!(
            category = %intent.category,
            archetype = intent.archetype_preset.map_or("none", |p| p.id),
            confidence = intent.confidence,
            "intent extracted"
        );
        Ok(intent)
    }
}

/// Build an intent from a parsed payload, applying defaults
fn intent_from_object(object: &Object, request: &Request) -> Intent {
    let archetype_preset = string_field(object, &["archetype", "archetypePreset", "archetype_preset"])
        .as_deref()
        .and_then(resolve_preset);

    let category = string_field(object, &["category"])
        .map(|c| c.to_lowercase())
        .or_else(|| archetype_preset.map(|p| p.category.to_string()))
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

    Intent {
        action: string_field(object, &["action"])
            .map(|a| a.to_lowercase())
            .unwrap_or_else(|| DEFAULT_ACTION.to_string()),
        category,
        success_criteria: string_list(object, &["successCriteria", "success_criteria"]),
        testing_hints: string_list(object, &["testingHints", "testing_hints"]),
        error_handling_notes: string_field(object, &["errorHandlingNotes", "error_handling_notes"])
            .unwrap_or_else(|| DEFAULT_ERROR_HANDLING.to_string()),
        data_needs: string_list(object, &["dataNeeds", "data_needs"]),
        confidence: number_field(object, &["confidence"])
            .map_or(DEFAULT_CONFIDENCE, |c| c.clamp(0.0, 1.0)),
        archetype_preset,
        original_prompt: request.text.clone(),
        context: request.context.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::model::MockModelClient;
    use pretty_assertions::assert_eq;

    fn extractor(response: std::result::Result<String, ModelError>) -> IntentExtractor {
        let mut mock = MockModelClient::new();
        mock.expect_invoke()
            .times(1)
            .returning(move |_, _, _| response.clone());
        IntentExtractor::new(Arc::new(mock), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn full_response() {
        let response = r#"{
            "action": "Create",
            "category": "Utilities",
            "successCriteria": ["2+2 shows 4"],
            "testing_hints": ["press keys"],
            "errorHandlingNotes": "show Error",
            "dataNeeds": [],
            "confidence": 0.92,
            "archetype": "calc"
        }"#;
        let request = Request::new("Create a simple calculator").with_context("locale", "en");
        let intent = extractor(Ok(response.into())).extract(&request).await.unwrap();

        assert_eq!(intent.action, "create");
        assert_eq!(intent.category, "utilities");
        assert_eq!(intent.success_criteria, vec!["2+2 shows 4"]);
        assert_eq!(intent.testing_hints, vec!["press keys"]);
        assert_eq!(intent.archetype_preset.map(|p| p.id), Some("calculator"));
        assert!((intent.confidence - 0.92).abs() < f64::EPSILON);
        assert_eq!(intent.original_prompt, "Create a simple calculator");
        assert_eq!(intent.context.get("locale").map(String::as_str), Some("en"));
    }

    #[tokio::test]
    async fn missing_fields_use_defaults() {
        let intent = extractor(Ok("```json\n{}\n```".into()))
            .extract(&Request::new("something"))
            .await
            .unwrap();
        assert_eq!(intent.action, DEFAULT_ACTION);
        assert_eq!(intent.category, DEFAULT_CATEGORY);
        assert_eq!(intent.error_handling_notes, DEFAULT_ERROR_HANDLING);
        assert!((intent.confidence - DEFAULT_CONFIDENCE).abs() < f64::EPSILON);
        assert!(intent.archetype_preset.is_none());
    }

    #[tokio::test]
    async fn confidence_is_clamped_and_unknown_archetype_ignored() {
        let intent = extractor(Ok(r#"{"confidence": 7, "archetype": "spreadsheet"}"#.into()))
            .extract(&Request::new("x"))
            .await
            .unwrap();
        assert!((intent.confidence - 1.0).abs() < f64::EPSILON);
        assert!(intent.archetype_preset.is_none());
    }

    #[tokio::test]
    async fn category_falls_back_to_preset() {
        let intent = extractor(Ok(r#"{"archetype": "todo"}"#.into()))
            .extract(&Request::new("x"))
            .await
            .unwrap();
        assert_eq!(intent.category, "productivity");
    }

    #[tokio::test]
    async fn unparsable_response_fails() {
        let err = extractor(Ok("I cannot help with that".into()))
            .extract(&Request::new("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ArtisanError::ParseFailure(_)));
    }

    #[tokio::test]
    async fn model_error_fails() {
        let err = extractor(Err(ModelError::Empty))
            .extract(&Request::new("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ArtisanError::ParseFailure(msg) if msg.contains("empty")));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_model_times_out() {
        struct Stalled;

        #[async_trait::async_trait]
        impl ModelClient for Stalled {
            async fn invoke(
                &self,
                _: &str,
                _: &str,
                _: &InvokeOptions,
            ) -> std::result::Result<String, ModelError> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok("{}".into())
            }
        }

        let extractor = IntentExtractor::new(Arc::new(Stalled), Duration::from_millis(100));
        let err = extractor.extract(&Request::new("x")).await.unwrap_err();
        assert!(matches!(
            err,
            ArtisanError::Timeout {
                stage: Stage::Intent,
                after_ms: 100
            }
        ));
    }
}
