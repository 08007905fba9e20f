//! Client-facing error taxonomy
//!
//! Every failure that reaches a client is a [`ClientError`]: a category, a
//! sanitized message and the request's correlation id. Provider errors are
//! folded into this shape by [`ClientError::from_provider`].

use crate::config::ConfigError;
use crate::protocol::RequestValidationError;
use crate::providers::ProviderError;
use crate::sanitize::sanitize_message;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::error;

/// Category of a client-visible error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    InvalidRequestError,
    AuthenticationError,
    NotFoundError,
    RateLimitError,
    TimeoutError,
    ServiceUnavailableError,
    ProviderError,
    ApiError,
}

impl ErrorType {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::InvalidRequestError => "invalid_request_error",
            ErrorType::AuthenticationError => "authentication_error",
            ErrorType::NotFoundError => "not_found_error",
            ErrorType::RateLimitError => "rate_limit_error",
            ErrorType::TimeoutError => "timeout_error",
            ErrorType::ServiceUnavailableError => "service_unavailable_error",
            ErrorType::ProviderError => "provider_error",
            ErrorType::ApiError => "api_error",
        }
    }

    /// HTTP status a transport should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorType::InvalidRequestError => 400,
            ErrorType::AuthenticationError => 401,
            ErrorType::NotFoundError => 404,
            ErrorType::RateLimitError => 429,
            ErrorType::TimeoutError => 504,
            ErrorType::ServiceUnavailableError => 503,
            ErrorType::ProviderError => 502,
            ErrorType::ApiError => 500,
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error as presented to a client
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{error_type}: {message}")]
pub struct ClientError {
    #[serde(rename = "type")]
    pub error_type: ErrorType,

    /// Sanitized, human-readable message
    pub message: String,

    /// Backend or gateway error code, when one is meaningful to clients
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Offending request field, for validation failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,

    #[serde(rename = "correlationId")]
    pub correlation_id: String,
}

impl ClientError {
    /// Build an error; the message is sanitized here
    pub fn new(error_type: ErrorType, message: impl AsRef<str>, correlation_id: impl Into<String>) -> Self {
        Self {
            error_type,
            message: sanitize_message(message.as_ref()),
            code: None,
            param: None,
            correlation_id: correlation_id.into(),
        }
    }

    /// Attach an error code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// HTTP status for this error
    pub fn status_code(&self) -> u16 {
        self.error_type.status_code()
    }

    /// Generic internal error; details stay in the logs
    pub fn internal(correlation_id: impl Into<String>) -> Self {
        Self::new(ErrorType::ApiError, "An internal error occurred", correlation_id)
    }

    /// Convert a rejected request field
    pub fn from_validation(err: &RequestValidationError) -> Self {
        let mut client = Self::new(
            ErrorType::InvalidRequestError,
            err.to_string(),
            err.correlation_id.clone(),
        );
        client.param = Some(err.field_path.clone());
        client
    }

    /// Convert a provider failure
    ///
    /// Backend payloads are never forwarded; only the extracted message is
    /// kept, and it is sanitized.
    pub fn from_provider(err: &ProviderError, correlation_id: &str) -> Self {
        match err {
            ProviderError::Validation(validation) => {
                let mut client = Self::from_validation(validation);
                client.correlation_id = correlation_id.to_string();
                client
            }
            ProviderError::Authentication { .. } => Self::new(
                ErrorType::AuthenticationError,
                "Authentication with the upstream provider failed",
                correlation_id,
            ),
            ProviderError::InvalidRequest { message } => {
                Self::new(ErrorType::InvalidRequestError, message, correlation_id)
            }
            ProviderError::ModelNotAvailable { model } => Self::new(
                ErrorType::NotFoundError,
                format!("Model '{model}' is not available"),
                correlation_id,
            ),
            ProviderError::RateLimit { retry_after } => {
                let message = match retry_after {
                    Some(delay) => format!("Rate limit exceeded, retry after {}s", delay.as_secs().max(1)),
                    None => "Rate limit exceeded".to_string(),
                };
                Self::new(ErrorType::RateLimitError, message, correlation_id)
            }
            ProviderError::Timeout { .. } => {
                Self::new(ErrorType::TimeoutError, err.to_string(), correlation_id)
            }
            ProviderError::Network { .. } => Self::new(
                ErrorType::ProviderError,
                "Upstream provider could not be reached",
                correlation_id,
            )
            .with_code(err.code()),
            ProviderError::ServerError { status_code: 503, .. }
            | ProviderError::CircuitOpen { .. }
            | ProviderError::NotConfigured(_) => Self::service_unavailable(err, correlation_id),
            ProviderError::ServerError { status_code, message } => Self::new(
                ErrorType::ProviderError,
                format!("Upstream provider error: {message}"),
                correlation_id,
            )
            .with_code(status_code.to_string()),
            ProviderError::Provider { code, message, .. } => {
                if err.is_service_unavailable() {
                    return Self::service_unavailable(err, correlation_id);
                }
                Self::new(ErrorType::ProviderError, message, correlation_id).with_code(code.clone())
            }
            ProviderError::Parse { .. } | ProviderError::Internal { .. } => {
                error!(
                    correlation_id = %correlation_id,
                    error = %err,
                    kind = err.name(),
                    "unexpected failure while serving request"
                );
                Self::internal(correlation_id)
            }
        }
    }

    /// Service-level outage
    pub fn service_unavailable(err: &ProviderError, correlation_id: &str) -> Self {
        let message = match err.retry_after() {
            Some(delay) => format!(
                "Service temporarily unavailable, retry after {}s",
                delay.as_secs().max(1)
            ),
            None => "Service temporarily unavailable".to_string(),
        };
        Self::new(ErrorType::ServiceUnavailableError, message, correlation_id).with_code(err.code())
    }
}

/// Errors raised while assembling a gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("No backend is configured")]
    NoBackends,

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}
