//! Conversion between client wire formats and the canonical model
//!
//! Each client protocol implements [`ClientProtocol`]: one normalizer from
//! its request shape into [`CanonicalRequest`], and renderers from canonical
//! responses, stream chunks and errors back into its own shapes. The gateway
//! pipeline is generic over this trait, so adding a client format never
//! touches routing or resilience code.

pub mod claude;
pub mod openai;

pub use claude::ClaudeProtocol;
pub use openai::OpenAIProtocol;

use crate::error::ClientError;
use crate::protocol::{CanonicalRequest, CanonicalResponse, CanonicalStreamChunk};
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};

/// Per-stream rendering state
///
/// Created once per streamed request and threaded through every
/// [`ClientProtocol::stream_events`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamState {
    /// Response id echoed on every event
    pub id: String,

    /// Model name echoed on every event
    pub model: String,

    /// Unix timestamp of the stream start
    pub created: i64,

    /// Index the next opened content block gets
    pub next_block_index: u32,

    /// Whether a tool call has been emitted
    pub saw_tool_call: bool,
}

impl StreamState {
    pub fn new(id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            created: unix_timestamp(),
            next_block_index: 0,
            saw_tool_call: false,
        }
    }

    /// Reserve a content block index
    pub fn open_block(&mut self) -> u32 {
        let index = self.next_block_index;
        self.next_block_index += 1;
        index
    }
}

/// A client-facing wire protocol
pub trait ClientProtocol: Send + Sync + 'static {
    /// Inbound request body
    type Request: Send + Sync;

    /// Complete (non-streaming) response body
    type Response: Serialize + Send;

    /// One streamed event
    type StreamEvent: Serialize + Send;

    /// Protocol name for logs
    const NAME: &'static str;

    /// Normalize an inbound request
    fn to_canonical(request: &Self::Request) -> CanonicalRequest;

    /// Render a complete response
    fn from_canonical_response(response: &CanonicalResponse) -> Self::Response;

    /// Events sent before the first chunk
    fn stream_prologue(state: &mut StreamState) -> Vec<Self::StreamEvent>;

    /// Events for one canonical chunk
    fn stream_events(chunk: &CanonicalStreamChunk, state: &mut StreamState) -> Vec<Self::StreamEvent>;

    /// In-band error event; terminates the stream
    fn error_event(error: &ClientError) -> Self::StreamEvent;

    /// JSON error body for a non-streaming answer
    fn error_body(error: &ClientError) -> Value;
}

/// Decode tool-call arguments into a JSON object
///
/// Malformed or non-object arguments become `{}`.
pub fn parse_tool_arguments(arguments: &str) -> Value {
    match serde_json::from_str::<Value>(arguments) {
        Ok(value @ Value::Object(_)) => value,
        Ok(_) | Err(_) => {
            tracing::debug!("tool arguments are not a JSON object, substituting {{}}");
            Value::Object(Map::new())
        }
    }
}

/// Render tool output that may be a string, a list of text blocks or JSON
pub(crate) fn tool_result_text(content: &Value) -> String {
    match content {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(text) => Some(text.clone()),
                Value::Object(block) => block.get("text").and_then(Value::as_str).map(str::to_string),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

pub(crate) fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn malformed_arguments_become_empty_object() {
        assert_eq!(parse_tool_arguments("{not json"), json!({}));
        assert_eq!(parse_tool_arguments("[1,2]"), json!({}));
        assert_eq!(parse_tool_arguments(r#"{"city":"Oslo"}"#), json!({"city": "Oslo"}));
    }

    #[test]
    fn tool_result_text_flattens_blocks() {
        let content = json!([{"type": "text", "text": "a"}, {"type": "text", "text": "b"}]);
        assert_eq!(tool_result_text(&content), "a\nb");
        assert_eq!(tool_result_text(&json!("plain")), "plain");
        assert_eq!(tool_result_text(&json!({"ok": true})), r#"{"ok":true}"#);
    }

    #[test]
    fn block_indices_increase() {
        let mut state = StreamState::new("id", "model");
        assert_eq!(state.open_block(), 0);
        assert_eq!(state.open_block(), 1);
    }
}
