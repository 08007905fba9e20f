//! Claude Messages API wire types
//!
//! Inbound request bodies and the outbound message, stream-event and error
//! shapes a Claude-style client expects.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Claude Messages request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClaudeRequest {
    pub model: String,

    #[serde(default)]
    pub messages: Vec<ClaudeMessage>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<ClaudeSystem>,

    /// Legacy text-completions prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<ClaudeThinking>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// System prompt (string or text blocks)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaudeSystem {
    Text(String),
    Blocks(Vec<ClaudeTextBlock>),
}

/// A plain text block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudeTextBlock {
    #[serde(rename = "type", default = "text_type")]
    pub block_type: String,
    pub text: String,
}

fn text_type() -> String {
    "text".to_string()
}

/// Extended thinking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudeThinking {
    #[serde(rename = "type")]
    pub thinking_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_tokens: Option<u32>,
}

/// Inbound conversation message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudeMessage {
    pub role: String,
    pub content: ClaudeContent,
}

/// Message content (string or blocks)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaudeContent {
    Text(String),
    Blocks(Vec<ClaudeContentBlock>),
}

/// Inbound content block
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClaudeContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: Value,
        #[serde(default)]
        is_error: bool,
    },
    /// Images, documents, thinking and other blocks carry no plain text
    #[serde(other)]
    Unsupported,
}

/// Why the model stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaudeStopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
}

/// Outbound content block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClaudeResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        is_error: bool,
    },
}

/// Token usage as reported to Claude clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClaudeUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Complete assistant message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaudeMessageResponse {
    pub id: String,

    #[serde(rename = "type")]
    pub object_type: String,

    pub role: String,

    pub model: String,

    pub content: Vec<ClaudeResponseBlock>,

    /// Absent on the `message_start` snapshot
    pub stop_reason: Option<ClaudeStopReason>,

    pub stop_sequence: Option<String>,

    pub usage: ClaudeUsage,
}

/// Streaming delta payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClaudeDelta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
}

/// Message-level delta sent before `message_stop`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaudeMessageDelta {
    pub stop_reason: ClaudeStopReason,
    pub stop_sequence: Option<String>,
}

/// Claude streaming event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClaudeStreamEvent {
    MessageStart {
        message: ClaudeMessageResponse,
    },
    ContentBlockStart {
        index: u32,
        content_block: ClaudeResponseBlock,
    },
    ContentBlockDelta {
        index: u32,
        delta: ClaudeDelta,
    },
    ContentBlockStop {
        index: u32,
    },
    MessageDelta {
        delta: ClaudeMessageDelta,
        usage: ClaudeUsage,
    },
    MessageStop {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<ClaudeUsage>,
    },
    Ping,
    Error {
        error: ClaudeErrorBody,
    },
}

/// Error detail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaudeErrorBody {
    #[serde(rename = "type")]
    pub error_type: String,

    pub message: String,

    #[serde(rename = "correlationId", skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

/// Error response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaudeErrorResponse {
    #[serde(rename = "type")]
    pub object_type: String,

    pub error: ClaudeErrorBody,
}
