//! Graceful degradation
//!
//! Remembers recent successful answers so a failed call can be served from
//! cache, and summarizes breaker states into a coarse service level.

use super::circuit_breaker::{CircuitBreakerRegistry, CircuitState};
use crate::config::FallbackConfig;
use crate::protocol::{CanonicalRequest, CanonicalResponse, Input};
use mini_moka::sync::Cache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Coarse health of the gateway as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceLevel {
    Full,
    Degraded,
    Minimal,
    Unavailable,
}

impl ServiceLevel {
    /// Derive the level from breaker states
    ///
    /// No open breaker is full service and all open is unavailable. Between
    /// those, half or more open is minimal and anything less is degraded.
    /// Half-open breakers count as open.
    pub fn from_states(states: &[CircuitState]) -> Self {
        let open = states
            .iter()
            .filter(|state| **state != CircuitState::Closed)
            .count();

        if open == 0 {
            ServiceLevel::Full
        } else if open == states.len() {
            ServiceLevel::Unavailable
        } else if open * 2 >= states.len() {
            ServiceLevel::Minimal
        } else {
            ServiceLevel::Degraded
        }
    }
}

impl fmt::Display for ServiceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ServiceLevel::Full => "full",
            ServiceLevel::Degraded => "degraded",
            ServiceLevel::Minimal => "minimal",
            ServiceLevel::Unavailable => "unavailable",
        })
    }
}

/// Response cache and service level view
pub struct GracefulDegradation {
    cache: Option<Cache<String, CanonicalResponse>>,
}

impl fmt::Debug for GracefulDegradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GracefulDegradation")
            .field("cache_enabled", &self.cache.is_some())
            .finish()
    }
}

impl GracefulDegradation {
    pub fn new(config: &FallbackConfig) -> Self {
        let cache = config.cache_enabled.then(|| {
            Cache::builder()
                .max_capacity(config.cache_capacity)
                .time_to_live(Duration::from_secs(config.cache_ttl_secs))
                .build()
        });

        Self { cache }
    }

    /// Remember a successful answer
    pub fn store(&self, request: &CanonicalRequest, response: &CanonicalResponse) {
        if let Some(cache) = &self.cache {
            cache.insert(cache_key(&request.model, &request.input), response.clone());
        }
    }

    /// Previously stored answer for the same model and input
    pub fn cached_response(&self, request: &CanonicalRequest) -> Option<CanonicalResponse> {
        let cache = self.cache.as_ref()?;
        let hit = cache.get(&cache_key(&request.model, &request.input));
        if hit.is_some() {
            debug!(model = %request.model, "degradation cache hit");
        }
        hit
    }

    pub fn service_level(&self, breakers: &CircuitBreakerRegistry) -> ServiceLevel {
        ServiceLevel::from_states(&breakers.states())
    }

    pub fn clear(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate_all();
        }
    }
}

/// Digest of model and input
fn cache_key(model: &str, input: &Input) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model.as_bytes());
    hasher.update(b"\0");

    match input {
        Input::Text(text) => {
            hasher.update(b"text:");
            hasher.update(text.as_bytes());
        }
        Input::Messages(messages) => {
            for message in messages {
                hasher.update(message.role.as_str().as_bytes());
                hasher.update(b":");
                hasher.update(message.content.as_bytes());
                hasher.update(b"\0");
            }
        }
    }

    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Message, OutputBlock, Usage};
    use std::collections::HashMap;
    use test_case::test_case;

    use super::CircuitState::{Closed, HalfOpen, Open};

    #[test_case(&[], ServiceLevel::Full ; "no breakers")]
    #[test_case(&[Closed, Closed], ServiceLevel::Full ; "all closed")]
    #[test_case(&[Open, Closed, Closed], ServiceLevel::Degraded ; "one of three open")]
    #[test_case(&[HalfOpen, Closed], ServiceLevel::Minimal ; "half open")]
    #[test_case(&[Open, Open], ServiceLevel::Unavailable ; "all open")]
    fn service_level_from_states(states: &[CircuitState], expected: ServiceLevel) {
        assert_eq!(ServiceLevel::from_states(states), expected);
    }

    fn response() -> CanonicalResponse {
        CanonicalResponse {
            id: "resp-1".to_string(),
            model: "gpt-5".to_string(),
            output: vec![OutputBlock::text("cached answer")],
            usage: Usage::new(3, 2),
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn cache_is_keyed_by_model_and_input() {
        let degradation = GracefulDegradation::new(&FallbackConfig::default());
        let request = CanonicalRequest::new("gpt-5", Input::Messages(vec![Message::user("hi")]));
        degradation.store(&request, &response());

        assert_eq!(degradation.cached_response(&request), Some(response()));

        let other_model = CanonicalRequest::new("o3", request.input.clone());
        assert_eq!(degradation.cached_response(&other_model), None);

        let other_input = CanonicalRequest::new("gpt-5", Input::Text("hi".to_string()));
        assert_eq!(degradation.cached_response(&other_input), None);
    }

    #[test]
    fn disabled_cache_never_hits() {
        let config = FallbackConfig {
            cache_enabled: false,
            ..Default::default()
        };
        let degradation = GracefulDegradation::new(&config);
        let request = CanonicalRequest::new("gpt-5", Input::Text("hi".to_string()));
        degradation.store(&request, &response());
        assert_eq!(degradation.cached_response(&request), None);
    }
}
