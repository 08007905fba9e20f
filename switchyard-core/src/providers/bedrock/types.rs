//! Bedrock Converse API types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Converse request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConverseRequest {
    pub messages: Vec<ConverseMessage>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub system: Vec<ConverseSystemBlock>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inference_config: Option<InferenceConfig>,
}

/// System prompt block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConverseSystemBlock {
    pub text: String,
}

/// Conversation message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConverseMessage {
    pub role: String,
    pub content: Vec<ConverseContentBlock>,
}

/// Content block; exactly one member is set
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConverseContentBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_use: Option<ConverseToolUse>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<ConverseToolResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<ConverseReasoningContent>,
}

impl ConverseContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

/// Tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConverseToolUse {
    pub tool_use_id: String,
    pub name: String,
    #[serde(default)]
    pub input: Value,
}

/// Result of a tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConverseToolResult {
    pub tool_use_id: String,

    #[serde(default)]
    pub content: Vec<ConverseToolResultContent>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Tool result content part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConverseToolResultContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<Value>,
}

/// Reasoning emitted by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConverseReasoningContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_text: Option<ConverseReasoningText>,
}

/// Reasoning text with its signature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConverseReasoningText {
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Sampling parameters
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
}

impl InferenceConfig {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Converse response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConverseResponse {
    #[serde(default)]
    pub response_id: Option<String>,

    pub output: ConverseOutput,

    #[serde(default)]
    pub stop_reason: Option<String>,

    #[serde(default)]
    pub usage: Option<ConverseUsage>,

    #[serde(default)]
    pub metrics: Option<ConverseMetrics>,
}

/// Output wrapper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConverseOutput {
    #[serde(default)]
    pub message: Option<ConverseMessage>,
}

/// Token usage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConverseUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    #[serde(default)]
    pub total_tokens: Option<u32>,
}

/// Call metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConverseMetrics {
    pub latency_ms: u64,
}
