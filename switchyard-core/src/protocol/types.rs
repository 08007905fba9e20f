//! Canonical protocol types shared by every client format and backend
//!
//! Client requests (Claude Messages, OpenAI Chat/Completions) are normalized
//! into [`CanonicalRequest`]; backends answer with [`CanonicalResponse`] or a
//! sequence of [`CanonicalStreamChunk`]s, which are then rendered back into the
//! client's wire format. The design prioritizes:
//! - One provider-agnostic shape at the routing seam
//! - Keeping unrecognized values representable so validation can report them
//! - A closed set of output blocks so transformers stay exhaustive

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Role of a message in the conversation
///
/// Unrecognized roles are preserved in [`Role::Other`] so the validator can
/// reject them with the received value instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    /// End-user input
    User,
    /// Model output from an earlier turn
    Assistant,
    /// Instructions that steer the model
    System,
    /// Anything else a client sent
    Other(String),
}

impl Role {
    /// Wire name of the role
    pub fn as_str(&self) -> &str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Other(raw) => raw,
        }
    }

    /// Whether this is one of the three canonical roles
    pub fn is_known(&self) -> bool {
        !matches!(self, Role::Other(_))
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.as_str() {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            "system" => Role::System,
            _ => Role::Other(value),
        }
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        Role::from(value.to_string())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single role-tagged message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: Role,

    /// Plain text content
    pub content: String,
}

impl Message {
    /// Create a new message
    pub fn new(role: impl Into<Role>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    /// Shorthand for a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Shorthand for a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Shorthand for an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Request input: either a bare prompt or an ordered conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Input {
    /// Single prompt string
    Text(String),
    /// Ordered role-tagged messages
    Messages(Vec<Message>),
}

impl Input {
    /// View the input as a message list; a bare prompt becomes one user message
    pub fn to_messages(&self) -> Vec<Message> {
        match self {
            Input::Text(text) => vec![Message::user(text.clone())],
            Input::Messages(messages) => messages.clone(),
        }
    }

    /// Concatenated text of every message, used for heuristics and estimates
    pub fn prompt_text(&self) -> String {
        match self {
            Input::Text(text) => text.clone(),
            Input::Messages(messages) => messages
                .iter()
                .map(|m| m.content.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl Default for Input {
    fn default() -> Self {
        Input::Messages(Vec::new())
    }
}

/// Reasoning effort level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReasoningEffort {
    Minimal,
    Low,
    Medium,
    High,
    /// Unrecognized level, rejected by validation
    Other(String),
}

impl ReasoningEffort {
    /// Wire name of the effort level
    pub fn as_str(&self) -> &str {
        match self {
            ReasoningEffort::Minimal => "minimal",
            ReasoningEffort::Low => "low",
            ReasoningEffort::Medium => "medium",
            ReasoningEffort::High => "high",
            ReasoningEffort::Other(raw) => raw,
        }
    }
}

impl From<String> for ReasoningEffort {
    fn from(value: String) -> Self {
        match value.as_str() {
            "minimal" => ReasoningEffort::Minimal,
            "low" => ReasoningEffort::Low,
            "medium" => ReasoningEffort::Medium,
            "high" => ReasoningEffort::High,
            _ => ReasoningEffort::Other(value),
        }
    }
}

impl From<ReasoningEffort> for String {
    fn from(effort: ReasoningEffort) -> Self {
        match effort {
            ReasoningEffort::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

/// Reasoning configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reasoning {
    pub effort: ReasoningEffort,
}

/// Provider-agnostic chat request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CanonicalRequest {
    /// Model alias requested by the client
    #[serde(default)]
    pub model: String,

    /// Prompt or conversation
    #[serde(default)]
    pub input: Input,

    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,

    /// Sampling temperature (0.0 to 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Nucleus sampling parameter (0.0 to 1.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Reasoning configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<Reasoning>,

    /// Whether the client asked for a streamed answer
    #[serde(default)]
    pub stream: bool,

    /// Stop sequences
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

impl CanonicalRequest {
    /// Create a request for a model and input
    pub fn new(model: impl Into<String>, input: Input) -> Self {
        Self {
            model: model.into(),
            input,
            ..Default::default()
        }
    }
}

/// Progress of a reasoning block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningStatus {
    InProgress,
    Completed,
}

/// Typed output block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputBlock {
    /// Visible assistant text
    Text { text: String },

    /// Internal deliberation; never shown verbatim to clients
    Reasoning {
        content: String,
        status: ReasoningStatus,
    },

    /// Tool invocation with JSON-encoded arguments
    ToolCall {
        id: String,
        name: String,
        arguments: String,
    },

    /// Result of a tool invocation
    ToolResult {
        tool_call_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
}

impl OutputBlock {
    /// Shorthand for a text block
    pub fn text(text: impl Into<String>) -> Self {
        OutputBlock::Text { text: text.into() }
    }
}

/// Token accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_tokens: Option<u32>,
}

impl Usage {
    /// Build usage with a computed total
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
            reasoning_tokens: None,
        }
    }
}

/// Metadata key carrying the backend's normalized stop reason
pub const STOP_REASON_KEY: &str = "stop_reason";

/// Stop reason value for truncation at the token limit
pub const STOP_REASON_MAX_TOKENS: &str = "max_tokens";

/// Provider-agnostic complete response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalResponse {
    /// Response identifier
    pub id: String,

    /// Model that produced the response
    pub model: String,

    /// Ordered output blocks
    #[serde(default)]
    pub output: Vec<OutputBlock>,

    /// Token usage
    #[serde(default)]
    pub usage: Usage,

    /// Gateway annotations (routing outcome, fallback source)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

impl CanonicalResponse {
    /// Ensure at least one output block exists
    ///
    /// An empty output becomes a single empty text block so clients can always
    /// assume one content entry.
    pub fn normalize_output(&mut self) {
        if self.output.is_empty() {
            self.output.push(OutputBlock::text(""));
        }
    }

    /// Whether any block is a tool call
    pub fn has_tool_call(&self) -> bool {
        self.output
            .iter()
            .any(|block| matches!(block, OutputBlock::ToolCall { .. }))
    }

    /// Whether the backend stopped because the token limit was reached
    pub fn hit_token_limit(&self) -> bool {
        self.metadata
            .get(STOP_REASON_KEY)
            .and_then(Value::as_str)
            .is_some_and(|reason| reason == STOP_REASON_MAX_TOKENS)
    }

    /// Concatenated visible text
    pub fn text(&self) -> String {
        self.output
            .iter()
            .filter_map(|block| match block {
                OutputBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// One incremental unit of a streamed response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CanonicalStreamChunk {
    /// Delta blocks
    #[serde(default)]
    pub output: Vec<OutputBlock>,

    /// Final usage; only present on the terminal chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl CanonicalStreamChunk {
    /// A text delta
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            output: vec![OutputBlock::text(text)],
            usage: None,
        }
    }

    /// A reasoning delta that is still in progress
    pub fn reasoning_delta(content: impl Into<String>) -> Self {
        Self {
            output: vec![OutputBlock::Reasoning {
                content: content.into(),
                status: ReasoningStatus::InProgress,
            }],
            usage: None,
        }
    }

    /// The end-of-stream marker carrying final usage
    pub fn terminal(usage: Usage) -> Self {
        Self {
            output: vec![OutputBlock::Reasoning {
                content: String::new(),
                status: ReasoningStatus::Completed,
            }],
            usage: Some(usage),
        }
    }

    /// A completed reasoning block plus usage signals end-of-stream
    pub fn is_terminal(&self) -> bool {
        self.usage.is_some()
            && self.output.iter().any(|block| {
                matches!(
                    block,
                    OutputBlock::Reasoning {
                        status: ReasoningStatus::Completed,
                        ..
                    }
                )
            })
    }

    /// Whether the chunk only carries in-progress reasoning
    pub fn is_reasoning_only(&self) -> bool {
        !self.output.is_empty()
            && self.output.iter().all(|block| {
                matches!(
                    block,
                    OutputBlock::Reasoning {
                        status: ReasoningStatus::InProgress,
                        ..
                    }
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_role_round_trips() {
        let message: Message = serde_json::from_value(json!({"role": "tool", "content": "x"})).unwrap();
        assert_eq!(message.role, Role::Other("tool".to_string()));
        assert!(!message.role.is_known());
        assert_eq!(serde_json::to_value(&message).unwrap()["role"], "tool");
    }

    #[test]
    fn input_accepts_string_or_messages() {
        let text: Input = serde_json::from_value(json!("hello")).unwrap();
        assert_eq!(text, Input::Text("hello".to_string()));

        let messages: Input =
            serde_json::from_value(json!([{"role": "user", "content": "hi"}])).unwrap();
        assert_eq!(messages.to_messages(), vec![Message::user("hi")]);
    }

    #[test]
    fn terminal_chunk_detection() {
        let terminal = CanonicalStreamChunk::terminal(Usage::new(3, 4));
        assert!(terminal.is_terminal());
        assert_eq!(terminal.usage.unwrap().total_tokens, 7);

        let text = CanonicalStreamChunk::text("hi");
        assert!(!text.is_terminal());

        let reasoning = CanonicalStreamChunk::reasoning_delta("thinking");
        assert!(reasoning.is_reasoning_only());
        assert!(!reasoning.is_terminal());
    }

    #[test]
    fn empty_output_normalizes_to_empty_text() {
        let mut response = CanonicalResponse {
            id: "r".to_string(),
            model: "m".to_string(),
            output: vec![],
            usage: Usage::default(),
            metadata: HashMap::new(),
        };
        response.normalize_output();
        assert_eq!(response.output, vec![OutputBlock::text("")]);
    }

    #[test]
    fn output_block_wire_shape() {
        let block = OutputBlock::ToolCall {
            id: "call_1".to_string(),
            name: "lookup".to_string(),
            arguments: "{\"q\":1}".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&block).unwrap(),
            json!({"type": "tool_call", "id": "call_1", "name": "lookup", "arguments": "{\"q\":1}"})
        );
    }
}
