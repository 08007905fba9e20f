//! Azure OpenAI Responses API types

use serde::{Deserialize, Serialize};

/// Responses API request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsesRequest {
    pub model: String,

    pub input: ResponsesInput,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ResponsesReasoning>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

/// Prompt string or role-tagged input messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponsesInput {
    Text(String),
    Messages(Vec<ResponsesInputMessage>),
}

/// Input message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsesInputMessage {
    pub role: String,
    pub content: String,
}

/// Reasoning configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsesReasoning {
    pub effort: String,
}

/// Complete response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsesResponse {
    pub id: String,

    #[serde(default)]
    pub object: Option<String>,

    #[serde(default, alias = "created")]
    pub created_at: Option<i64>,

    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub model: String,

    #[serde(default)]
    pub output: Vec<ResponsesOutputItem>,

    #[serde(default)]
    pub usage: Option<ResponsesUsage>,

    #[serde(default)]
    pub incomplete_details: Option<ResponsesIncompleteDetails>,
}

/// Why a response stopped early
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsesIncompleteDetails {
    pub reason: String,
}

/// Output item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsesOutputItem {
    Message {
        #[serde(default)]
        content: Vec<ResponsesOutputContent>,
    },
    Reasoning {
        #[serde(default)]
        summary: Vec<ResponsesSummaryText>,
        #[serde(default)]
        status: Option<String>,
    },
    FunctionCall {
        call_id: String,
        name: String,
        arguments: String,
    },
    FunctionCallOutput {
        call_id: String,
        output: String,
    },
    #[serde(other)]
    Unknown,
}

/// Content of an output message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsesOutputContent {
    OutputText { text: String },
    Refusal { refusal: String },
    #[serde(other)]
    Unknown,
}

/// Reasoning summary part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsesSummaryText {
    pub text: String,
}

/// Token usage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResponsesUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,

    #[serde(default)]
    pub total_tokens: Option<u32>,

    #[serde(default)]
    pub output_tokens_details: Option<ResponsesOutputTokensDetails>,
}

/// Breakdown of output tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResponsesOutputTokensDetails {
    #[serde(default)]
    pub reasoning_tokens: u32,
}

/// Server-sent event on a streamed response
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ResponsesStreamEvent {
    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta { delta: String },

    #[serde(rename = "response.reasoning_summary_text.delta")]
    ReasoningSummaryDelta { delta: String },

    #[serde(rename = "response.reasoning_text.delta")]
    ReasoningTextDelta { delta: String },

    #[serde(rename = "response.output_item.done")]
    OutputItemDone { item: ResponsesOutputItem },

    #[serde(rename = "response.completed", alias = "response.incomplete")]
    Completed { response: ResponsesResponse },

    #[serde(rename = "response.failed")]
    Failed { response: ResponsesFailure },

    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        code: Option<String>,
        message: String,
    },

    #[serde(other)]
    Other,
}

/// Payload of a `response.failed` event
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResponsesFailure {
    #[serde(default)]
    pub error: Option<ResponsesErrorBody>,
}

/// Error detail
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResponsesErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}
