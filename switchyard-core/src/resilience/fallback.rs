//! Fallback responses after the resilience layer gives up
//!
//! A cached answer for the same request wins. Otherwise an outage is reported
//! as such, and any other failure is masked with a short placeholder that
//! fits what the client asked for.

use super::degradation::GracefulDegradation;
use crate::config::FallbackConfig;
use crate::error::ClientError;
use crate::protocol::{CanonicalRequest, CanonicalResponse, OutputBlock, Usage};
use crate::providers::ProviderError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::fmt;
use tracing::{info, warn};

/// Metadata key recording how a fallback answer was produced
pub const FALLBACK_KEY: &str = "fallback";

/// Rough kind of request, picked from its text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestCategory {
    Coding,
    Summarization,
    Translation,
    Question,
    General,
}

impl RequestCategory {
    /// Classify prompt text; the first matching rule wins
    pub fn classify(text: &str) -> Self {
        let lower = text.to_lowercase();

        if text.contains("```") {
            RequestCategory::Coding
        } else if lower.contains("summarize") || lower.contains("summarise") {
            RequestCategory::Summarization
        } else if lower.contains("translate") {
            RequestCategory::Translation
        } else if text.trim_end().ends_with('?') {
            RequestCategory::Question
        } else {
            RequestCategory::General
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestCategory::Coding => "coding",
            RequestCategory::Summarization => "summarization",
            RequestCategory::Translation => "translation",
            RequestCategory::Question => "question",
            RequestCategory::General => "general",
        }
    }

    fn placeholder(&self) -> &'static str {
        match self {
            RequestCategory::Coding => {
                "I can't work on code right now because the service is temporarily degraded. Please try again in a few moments."
            }
            RequestCategory::Summarization => {
                "I can't produce a summary right now because the service is temporarily degraded. Please try again in a few moments."
            }
            RequestCategory::Translation => {
                "Translation is temporarily unavailable. Please try again in a few moments."
            }
            RequestCategory::Question => {
                "I'm unable to answer your question right now. Please try again in a few moments."
            }
            RequestCategory::General => {
                "The service is under heavy load and could not complete your request. Please try again in a few moments."
            }
        }
    }
}

impl fmt::Display for RequestCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token estimate of four characters per token, rounded up
pub fn estimate_tokens(text: &str) -> u32 {
    let chars = text.chars().count();
    u32::try_from(chars.div_ceil(4)).unwrap_or(u32::MAX)
}

/// What the fallback handler decided
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackOutcome {
    /// Earlier answer to the same request
    Cached(CanonicalResponse),

    /// Placeholder answer
    Synthetic(CanonicalResponse),

    /// Failure the client has to see
    Rejected(ClientError),
}

impl FallbackOutcome {
    pub fn into_result(self) -> Result<CanonicalResponse, ClientError> {
        match self {
            FallbackOutcome::Cached(response) | FallbackOutcome::Synthetic(response) => Ok(response),
            FallbackOutcome::Rejected(error) => Err(error),
        }
    }
}

/// Decides how a request that exhausted its retries is answered
#[derive(Debug, Clone)]
pub struct FallbackHandler {
    enabled: bool,
}

impl FallbackHandler {
    pub fn new(config: &FallbackConfig) -> Self {
        Self {
            enabled: config.enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn handle(
        &self,
        request: &CanonicalRequest,
        error: &ProviderError,
        degradation: &GracefulDegradation,
        correlation_id: &str,
    ) -> FallbackOutcome {
        if !self.enabled {
            return FallbackOutcome::Rejected(ClientError::from_provider(error, correlation_id));
        }

        if let Some(mut cached) = degradation.cached_response(request) {
            info!(correlation_id = %correlation_id, model = %request.model, error = error.name(), "serving cached response");
            cached.metadata.insert(FALLBACK_KEY.to_string(), json!("cached"));
            return FallbackOutcome::Cached(cached);
        }

        if error.is_service_unavailable() {
            warn!(correlation_id = %correlation_id, error = %error, "backend unavailable, no cached response");
            return FallbackOutcome::Rejected(ClientError::service_unavailable(error, correlation_id));
        }

        let response = synthesize(request);
        warn!(
            correlation_id = %correlation_id,
            model = %request.model,
            error = error.name(),
            category = response.metadata.get("category").and_then(|c| c.as_str()).unwrap_or_default(),
            "serving synthetic fallback response"
        );
        FallbackOutcome::Synthetic(response)
    }
}

/// Placeholder response for a request
pub fn synthesize(request: &CanonicalRequest) -> CanonicalResponse {
    let prompt = request.input.prompt_text();
    let category = RequestCategory::classify(&prompt);
    let text = category.placeholder();

    let mut metadata = HashMap::new();
    metadata.insert(FALLBACK_KEY.to_string(), json!("synthetic"));
    metadata.insert("category".to_string(), json!(category.as_str()));

    CanonicalResponse {
        id: format!("fallback-{}", uuid::Uuid::new_v4()),
        model: request.model.clone(),
        output: vec![OutputBlock::text(text)],
        usage: Usage::new(estimate_tokens(&prompt), estimate_tokens(text)),
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorType;
    use crate::protocol::Input;
    use test_case::test_case;

    #[test_case("Fix this:\n```rust\nfn main() {}\n```", RequestCategory::Coding ; "fenced code")]
    #[test_case("Please summarize the following report", RequestCategory::Summarization ; "summarize")]
    #[test_case("Translate 'hello' into French", RequestCategory::Translation ; "translate")]
    #[test_case("What is the capital of France?  ", RequestCategory::Question ; "question")]
    #[test_case("Tell me a story", RequestCategory::General ; "general")]
    fn classifies_requests(text: &str, expected: RequestCategory) {
        assert_eq!(RequestCategory::classify(text), expected);
    }

    #[test_case("", 0)]
    #[test_case("abcd", 1)]
    #[test_case("abcde", 2)]
    fn estimates_tokens(text: &str, expected: u32) {
        assert_eq!(estimate_tokens(text), expected);
    }

    fn request(text: &str) -> CanonicalRequest {
        CanonicalRequest::new("gpt-5", Input::Text(text.to_string()))
    }

    fn network() -> ProviderError {
        ProviderError::Network {
            message: "connection reset".to_string(),
        }
    }

    #[test]
    fn synthetic_response_for_transient_failure() {
        let handler = FallbackHandler::new(&FallbackConfig::default());
        let degradation = GracefulDegradation::new(&FallbackConfig::default());

        match handler.handle(&request("Why is the sky blue?"), &network(), &degradation, "corr") {
            FallbackOutcome::Synthetic(response) => {
                assert!(response.id.starts_with("fallback-"));
                assert_eq!(response.usage.prompt_tokens, 5);
                assert_eq!(response.metadata["category"], json!("question"));
                assert_eq!(response.metadata[FALLBACK_KEY], json!("synthetic"));
            }
            other => panic!("expected synthetic response, got {other:?}"),
        }
    }

    #[test]
    fn outage_is_reported() {
        let handler = FallbackHandler::new(&FallbackConfig::default());
        let degradation = GracefulDegradation::new(&FallbackConfig::default());
        let error = ProviderError::ServerError {
            status_code: 503,
            message: "Service Unavailable".to_string(),
        };

        match handler.handle(&request("hello"), &error, &degradation, "corr") {
            FallbackOutcome::Rejected(client) => {
                assert_eq!(client.error_type, ErrorType::ServiceUnavailableError);
                assert_eq!(client.correlation_id, "corr");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn cache_beats_outage() {
        let handler = FallbackHandler::new(&FallbackConfig::default());
        let degradation = GracefulDegradation::new(&FallbackConfig::default());
        let req = request("hello");
        let mut previous = synthesize(&req);
        previous.metadata.clear();
        previous.output = vec![OutputBlock::text("real answer")];
        degradation.store(&req, &previous);

        let error = ProviderError::CircuitOpen {
            breaker: "azure".to_string(),
            retry_in_ms: 1_000,
            next_attempt_at_ms: 0,
        };
        let outcome = handler.handle(&req, &error, &degradation, "corr");
        let FallbackOutcome::Cached(response) = outcome else {
            panic!("expected cached response");
        };
        assert_eq!(response.text(), "real answer");
        assert_eq!(response.metadata[FALLBACK_KEY], json!("cached"));
    }

    #[test]
    fn disabled_handler_rejects() {
        let config = FallbackConfig {
            enabled: false,
            ..Default::default()
        };
        let handler = FallbackHandler::new(&config);
        let degradation = GracefulDegradation::new(&config);
        let outcome = handler.handle(&request("hello"), &network(), &degradation, "corr");
        assert!(matches!(outcome, FallbackOutcome::Rejected(_)));
    }
}
