//! Structural validation of canonical requests
//!
//! Runs before routing and before any backend call, so malformed requests
//! never reach a provider. Every rejection names the offending field path and
//! echoes the received value for client-facing diagnostics.

use super::types::{CanonicalRequest, Input, ReasoningEffort};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use thiserror::Error;

/// Maximum number of stop sequences accepted by the backends
pub const MAX_STOP_SEQUENCES: usize = 4;

/// A rejected request field
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub struct RequestValidationError {
    /// Path to the offending field (e.g. `input[2].role`)
    pub field_path: String,

    /// The value that was received
    pub received: Value,

    /// Why the value was rejected
    pub kind: RequestValidationKind,

    /// Correlation id of the request
    pub correlation_id: String,
}

impl fmt::Display for RequestValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid value at '{}': {} (received {})",
            self.field_path, self.kind, self.received
        )
    }
}

/// Specific validation failure
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequestValidationKind {
    #[error("must not be empty")]
    Empty,

    #[error("expected one of {expected}")]
    NotAllowed { expected: String },

    #[error("out of range, expected {expected}")]
    OutOfRange { expected: String },

    #[error("too many entries, at most {max} allowed")]
    TooMany { max: usize },
}

impl RequestValidationError {
    fn new(
        field_path: impl Into<String>,
        received: Value,
        kind: RequestValidationKind,
        correlation_id: &str,
    ) -> Self {
        Self {
            field_path: field_path.into(),
            received,
            kind,
            correlation_id: correlation_id.to_string(),
        }
    }
}

/// Validate a canonical request
///
/// Pure check; returns the first violation found in field order.
pub fn validate(request: &CanonicalRequest, correlation_id: &str) -> Result<(), RequestValidationError> {
    let fail = |path: String, received: Value, kind: RequestValidationKind| {
        Err(RequestValidationError::new(path, received, kind, correlation_id))
    };

    if request.model.trim().is_empty() {
        return fail("model".into(), json!(request.model), RequestValidationKind::Empty);
    }

    match &request.input {
        Input::Text(text) => {
            if text.trim().is_empty() {
                return fail("input".into(), json!(text), RequestValidationKind::Empty);
            }
        }
        Input::Messages(messages) => {
            if messages.is_empty() {
                return fail("input".into(), json!([]), RequestValidationKind::Empty);
            }
            for (i, message) in messages.iter().enumerate() {
                if !message.role.is_known() {
                    return fail(
                        format!("input[{i}].role"),
                        json!(message.role.as_str()),
                        RequestValidationKind::NotAllowed {
                            expected: "user, assistant, system".to_string(),
                        },
                    );
                }
                if message.content.trim().is_empty() {
                    return fail(
                        format!("input[{i}].content"),
                        json!(message.content),
                        RequestValidationKind::Empty,
                    );
                }
            }
        }
    }

    if let Some(max) = request.max_output_tokens {
        if max == 0 {
            return fail(
                "max_output_tokens".into(),
                json!(max),
                RequestValidationKind::OutOfRange {
                    expected: "a positive integer".to_string(),
                },
            );
        }
    }

    if let Some(temperature) = request.temperature {
        if !temperature.is_finite() || !(0.0..=2.0).contains(&temperature) {
            return fail(
                "temperature".into(),
                float_value(temperature),
                RequestValidationKind::OutOfRange {
                    expected: "0.0 to 2.0".to_string(),
                },
            );
        }
    }

    if let Some(top_p) = request.top_p {
        if !top_p.is_finite() || !(0.0..=1.0).contains(&top_p) {
            return fail(
                "top_p".into(),
                float_value(top_p),
                RequestValidationKind::OutOfRange {
                    expected: "0.0 to 1.0".to_string(),
                },
            );
        }
    }

    if let Some(reasoning) = &request.reasoning {
        if let ReasoningEffort::Other(raw) = &reasoning.effort {
            return fail(
                "reasoning.effort".into(),
                json!(raw),
                RequestValidationKind::NotAllowed {
                    expected: "minimal, low, medium, high".to_string(),
                },
            );
        }
    }

    if request.stop.len() > MAX_STOP_SEQUENCES {
        return fail(
            "stop".into(),
            json!(request.stop),
            RequestValidationKind::TooMany {
                max: MAX_STOP_SEQUENCES,
            },
        );
    }
    for (i, sequence) in request.stop.iter().enumerate() {
        if sequence.is_empty() {
            return fail(format!("stop[{i}]"), json!(sequence), RequestValidationKind::Empty);
        }
    }

    Ok(())
}

// NaN and infinities have no JSON representation
fn float_value(value: f32) -> Value {
    serde_json::Number::from_f64(f64::from(value))
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(value.to_string()))
}
