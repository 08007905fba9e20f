//! Provider error types and handling

use crate::protocol::RequestValidationError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors that can occur between the gateway and a backend
///
/// Clone and serializable so retry history and circuit metrics can keep a
/// copy of every failure.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ProviderError {
    /// Request rejected before any backend call
    #[error("{0}")]
    Validation(RequestValidationError),

    /// Credentials refused by the backend
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Backend rejected the request as malformed
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// Backend does not serve the routed model
    #[error("Model '{model}' not available")]
    ModelNotAvailable { model: String },

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimit { retry_after: Option<Duration> },

    /// Call exceeded its time budget
    #[error("Request timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    /// Connection-level failure
    #[error("Network error: {message}")]
    Network { message: String },

    /// 5xx from the backend
    #[error("Server error ({status_code}): {message}")]
    ServerError { status_code: u16, message: String },

    /// Admission refused by an open circuit breaker
    #[error("Circuit breaker '{breaker}' is open; next attempt in {retry_in_ms}ms")]
    CircuitOpen {
        breaker: String,
        retry_in_ms: u64,
        next_attempt_at_ms: u64,
    },

    /// Structured error reported by the backend
    #[error("Provider error [{code}]: {message}")]
    Provider {
        provider: String,
        code: String,
        message: String,
    },

    /// Backend answered with something we could not decode
    #[error("Failed to parse provider response: {message}")]
    Parse { message: String },

    /// Routed backend has no credentials in this deployment
    #[error("Backend '{0}' is not configured")]
    NotConfigured(String),

    /// Bug or invariant violation inside the gateway
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ProviderError {
    /// Stable error name, matched by retry and breaker allow-lists
    pub fn name(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::Authentication { .. } => "AuthenticationError",
            Self::InvalidRequest { .. } => "InvalidRequestError",
            Self::ModelNotAvailable { .. } => "ModelNotAvailableError",
            Self::RateLimit { .. } => "RateLimitError",
            Self::Timeout { .. } => "TimeoutError",
            Self::Network { .. } => "NetworkError",
            Self::ServerError { .. } => "ServerError",
            Self::CircuitOpen { .. } => "CircuitBreakerError",
            Self::Provider { .. } => "ProviderError",
            Self::Parse { .. } => "ParseError",
            Self::NotConfigured(_) => "NotConfiguredError",
            Self::Internal { .. } => "InternalError",
        }
    }

    /// Machine-readable code (HTTP status where one exists)
    pub fn code(&self) -> String {
        match self {
            Self::Validation(_) | Self::InvalidRequest { .. } => "400".to_string(),
            Self::Authentication { .. } => "401".to_string(),
            Self::ModelNotAvailable { .. } => "404".to_string(),
            Self::RateLimit { .. } => "429".to_string(),
            Self::Timeout { .. } => "ETIMEDOUT".to_string(),
            Self::Network { .. } => "ECONNRESET".to_string(),
            Self::ServerError { status_code, .. } => status_code.to_string(),
            Self::CircuitOpen { .. } => "CIRCUIT_OPEN".to_string(),
            Self::Provider { code, .. } => code.clone(),
            Self::Parse { .. } => "PARSE_ERROR".to_string(),
            Self::NotConfigured(_) => "NOT_CONFIGURED".to_string(),
            Self::Internal { .. } => "INTERNAL".to_string(),
        }
    }

    /// Whether the error is the client's fault; these skip fallback
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Authentication { .. } | Self::InvalidRequest { .. }
        )
    }

    /// Expected operating condition rather than a gateway bug
    ///
    /// An unreadable backend body is not; it surfaces as an internal error.
    pub fn is_operational(&self) -> bool {
        !matches!(self, Self::Parse { .. } | Self::Internal { .. })
    }

    /// Whether the failure means the backend is categorically unreachable
    pub fn is_service_unavailable(&self) -> bool {
        match self {
            Self::ServerError {
                status_code: 503, ..
            }
            | Self::CircuitOpen { .. }
            | Self::NotConfigured(_) => true,
            other => other
                .to_string()
                .to_ascii_lowercase()
                .contains("service unavailable"),
        }
    }

    /// Transient failure worth another attempt
    ///
    /// Retry policies carry their own allow-list; this is the classification
    /// used when no policy is involved.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimit { .. } | Self::Timeout { .. } | Self::Network { .. } => true,
            Self::ServerError { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }

    /// Suggested wait before the next attempt, if the backend gave one
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit { retry_after } => *retry_after,
            Self::CircuitOpen { retry_in_ms, .. } => Some(Duration::from_millis(*retry_in_ms)),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Parse {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_and_codes() {
        let err = ProviderError::ServerError {
            status_code: 502,
            message: "bad gateway".to_string(),
        };
        assert_eq!(err.name(), "ServerError");
        assert_eq!(err.code(), "502");
        assert!(!err.is_service_unavailable());
    }

    #[test]
    fn unavailable_classification() {
        assert!(ProviderError::ServerError {
            status_code: 503,
            message: String::new()
        }
        .is_service_unavailable());
        assert!(ProviderError::Provider {
            provider: "azure".to_string(),
            code: "overloaded".to_string(),
            message: "Service Unavailable".to_string(),
        }
        .is_service_unavailable());
        assert!(!ProviderError::Timeout { after_ms: 10 }.is_service_unavailable());
    }

    #[test]
    fn client_errors_are_flagged() {
        assert!(ProviderError::Authentication {
            message: "bad key".to_string()
        }
        .is_client_error());
        assert!(!ProviderError::RateLimit { retry_after: None }.is_client_error());
    }
}
