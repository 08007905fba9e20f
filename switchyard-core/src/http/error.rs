//! HTTP error mapping utilities

use crate::providers::ProviderError;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

/// Header Bedrock uses to name the exception type
const AMZN_ERROR_TYPE: &str = "x-amzn-errortype";

/// Map HTTP status code and response body to a ProviderError
///
/// Only the message extracted from the error payload is kept; an unparseable
/// body is replaced by a generic status description.
pub fn map_http_error(
    provider: &str,
    status: StatusCode,
    headers: Option<&HeaderMap>,
    body: Option<String>,
) -> ProviderError {
    let mut details = body
        .as_deref()
        .and_then(|b| serde_json::from_str::<Value>(b).ok())
        .and_then(|v| extract_error_details(&v))
        .unwrap_or_default();

    if details.code.is_none() {
        details.code = headers
            .and_then(|h| h.get(AMZN_ERROR_TYPE))
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(':').next().unwrap_or(v).to_string());
    }

    let error_message = details
        .message
        .clone()
        .unwrap_or_else(|| format!("HTTP error {}", status.as_u16()));

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Authentication {
            message: error_message,
        },

        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = headers
                .and_then(|h| h.get(reqwest::header::RETRY_AFTER))
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after)
                .or_else(|| details.retry_after_seconds.map(Duration::from_secs));

            ProviderError::RateLimit { retry_after }
        }

        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            ProviderError::InvalidRequest {
                message: error_message,
            }
        }

        StatusCode::NOT_FOUND => ProviderError::ModelNotAvailable {
            model: extract_model_from_error(&error_message).unwrap_or_else(|| "unknown".to_string()),
        },

        status if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT => {
            ProviderError::ServerError {
                status_code: status.as_u16(),
                message: error_message,
            }
        }

        status => ProviderError::Provider {
            provider: provider.to_string(),
            code: details
                .code
                .unwrap_or_else(|| format!("HTTP_{}", status.as_u16())),
            message: error_message,
        },
    }
}

/// Classify an error that arrived without an HTTP status
///
/// Used for in-band stream errors, which carry only a code and a message.
pub fn classify_error_message(provider: &str, code: Option<&str>, message: &str) -> ProviderError {
    let lower_msg = message.to_lowercase();
    let lower_code = code.unwrap_or_default().to_lowercase();

    if lower_code.contains("rate_limit")
        || lower_code.contains("throttl")
        || lower_msg.contains("rate limit")
        || lower_msg.contains("too many requests")
    {
        return ProviderError::RateLimit { retry_after: None };
    }

    if lower_msg.contains("timeout") || lower_msg.contains("timed out") {
        return ProviderError::Timeout { after_ms: 0 };
    }

    if lower_code.contains("unauthorized")
        || lower_code.contains("invalid_api_key")
        || lower_msg.contains("unauthorized")
    {
        return ProviderError::Authentication {
            message: message.to_string(),
        };
    }

    if lower_code.contains("overloaded")
        || lower_code.contains("serviceunavailable")
        || lower_msg.contains("service unavailable")
    {
        return ProviderError::ServerError {
            status_code: 503,
            message: message.to_string(),
        };
    }

    if lower_code.contains("server_error") || lower_code.contains("internalserver") {
        return ProviderError::ServerError {
            status_code: 500,
            message: message.to_string(),
        };
    }

    ProviderError::Provider {
        provider: provider.to_string(),
        code: code.map(str::to_string).unwrap_or_else(|| format!("{}_error", provider)),
        message: message.to_string(),
    }
}

/// Error details extracted from response body
#[derive(Debug, Default)]
struct ErrorDetails {
    message: Option<String>,
    code: Option<String>,
    retry_after_seconds: Option<u64>,
}

/// Extract error details from JSON response
fn extract_error_details(json: &Value) -> Option<ErrorDetails> {
    // Azure / OpenAI: { "error": { "code": "...", "message": "..." } }
    if let Some(error) = json.get("error").filter(|e| e.is_object()) {
        if let Some(message) = error.get("message").and_then(Value::as_str) {
            return Some(ErrorDetails {
                message: Some(message.to_string()),
                code: error
                    .get("code")
                    .or_else(|| error.get("type"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
                retry_after_seconds: error.get("retry_after").and_then(Value::as_u64),
            });
        }
    }

    // Bedrock: { "message": "..." } or { "Message": "..." }
    if let Some(message) = json
        .get("message")
        .or_else(|| json.get("Message"))
        .and_then(Value::as_str)
    {
        return Some(ErrorDetails {
            message: Some(message.to_string()),
            code: json
                .get("__type")
                .and_then(Value::as_str)
                .map(|t| t.rsplit('#').next().unwrap_or(t).to_string()),
            retry_after_seconds: json.get("retry_after").and_then(Value::as_u64),
        });
    }

    if let Some(error) = json.get("error").and_then(Value::as_str) {
        return Some(ErrorDetails {
            message: Some(error.to_string()),
            ..Default::default()
        });
    }

    None
}

/// Try to extract model name from error message
fn extract_model_from_error(message: &str) -> Option<String> {
    for (open, close) in [("model '", '\''), ("model \"", '"'), ("deployment '", '\'')] {
        if let Some(start) = message.find(open) {
            let start = start + open.len();
            if let Some(end) = message[start..].find(close) {
                return Some(message[start..start + end].to_string());
            }
        }
    }

    None
}

/// Parse Retry-After header value (delay in seconds)
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    header_value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
