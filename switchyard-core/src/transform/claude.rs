//! Conversion between the Claude Messages format and the canonical model

use super::{parse_tool_arguments, tool_result_text, ClientProtocol, StreamState};
use crate::error::ClientError;
use crate::protocol::claude::*;
use crate::protocol::{
    CanonicalRequest, CanonicalResponse, CanonicalStreamChunk, Input, Message, OutputBlock,
    Reasoning, ReasoningEffort, ReasoningStatus, Role, Usage,
};
use serde_json::{json, Value};

/// The text block opened by the stream prologue
const TEXT_BLOCK_INDEX: u32 = 0;

/// Thinking budgets below this map to `low` effort
const LOW_EFFORT_BUDGET: u32 = 2048;

/// Thinking budgets below this (and at least `LOW_EFFORT_BUDGET`) map to `medium`
const MEDIUM_EFFORT_BUDGET: u32 = 8192;

/// Claude Messages client protocol
#[derive(Debug, Clone, Copy, Default)]
pub struct ClaudeProtocol;

impl ClientProtocol for ClaudeProtocol {
    type Request = ClaudeRequest;
    type Response = ClaudeMessageResponse;
    type StreamEvent = ClaudeStreamEvent;

    const NAME: &'static str = "claude";

    fn to_canonical(request: &ClaudeRequest) -> CanonicalRequest {
        to_canonical(request)
    }

    fn from_canonical_response(response: &CanonicalResponse) -> ClaudeMessageResponse {
        to_claude(response)
    }

    fn stream_prologue(state: &mut StreamState) -> Vec<ClaudeStreamEvent> {
        stream_prologue(state)
    }

    fn stream_events(chunk: &CanonicalStreamChunk, state: &mut StreamState) -> Vec<ClaudeStreamEvent> {
        to_claude_stream_events(chunk, state)
    }

    fn error_event(error: &ClientError) -> ClaudeStreamEvent {
        ClaudeStreamEvent::Error {
            error: error_body(error),
        }
    }

    fn error_body(error: &ClientError) -> Value {
        json!(to_claude_error(error))
    }
}

/// Normalize a Claude request
///
/// The system prompt becomes a leading system message; a bare `prompt` with
/// no messages becomes a single user message.
pub fn to_canonical(request: &ClaudeRequest) -> CanonicalRequest {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);

    if let Some(system) = request.system.as_ref().map(system_text) {
        if !system.trim().is_empty() {
            messages.push(Message::system(system));
        }
    }

    if request.messages.is_empty() {
        if let Some(prompt) = &request.prompt {
            messages.push(Message::user(prompt.clone()));
        }
    } else {
        messages.extend(
            request
                .messages
                .iter()
                .map(|message| Message::new(message.role.as_str(), content_text(&message.content))),
        );
    }

    CanonicalRequest {
        model: request.model.clone(),
        input: Input::Messages(messages),
        max_output_tokens: request.max_tokens,
        temperature: request.temperature,
        top_p: request.top_p,
        reasoning: request.thinking.as_ref().and_then(thinking_to_reasoning),
        stream: request.stream.unwrap_or(false),
        stop: request.stop_sequences.clone().unwrap_or_default(),
    }
}

/// Render a canonical request as a Claude request
///
/// Leading system messages collapse into the `system` field.
pub fn from_canonical_request(request: &CanonicalRequest) -> ClaudeRequest {
    let mut messages = request.input.to_messages();
    let leading_system = messages
        .iter()
        .take_while(|message| message.role == Role::System)
        .count();
    let system: Vec<String> = messages
        .drain(..leading_system)
        .map(|message| message.content)
        .collect();

    ClaudeRequest {
        model: request.model.clone(),
        messages: messages
            .into_iter()
            .map(|message| ClaudeMessage {
                role: message.role.as_str().to_string(),
                content: ClaudeContent::Text(message.content),
            })
            .collect(),
        system: (!system.is_empty()).then(|| ClaudeSystem::Text(system.join("\n"))),
        prompt: None,
        max_tokens: request.max_output_tokens,
        temperature: request.temperature,
        top_p: request.top_p,
        stop_sequences: (!request.stop.is_empty()).then(|| request.stop.clone()),
        stream: Some(request.stream),
        thinking: request.reasoning.as_ref().and_then(reasoning_to_thinking),
        metadata: None,
    }
}

/// Render a complete canonical response
pub fn to_claude(response: &CanonicalResponse) -> ClaudeMessageResponse {
    let mut content: Vec<ClaudeResponseBlock> = response
        .output
        .iter()
        .filter_map(|block| match block {
            OutputBlock::Text { text } => Some(ClaudeResponseBlock::Text { text: text.clone() }),
            OutputBlock::Reasoning { .. } => None,
            OutputBlock::ToolCall { id, name, arguments } => Some(ClaudeResponseBlock::ToolUse {
                id: id.clone(),
                name: name.clone(),
                input: parse_tool_arguments(arguments),
            }),
            OutputBlock::ToolResult {
                tool_call_id,
                content,
                is_error,
            } => Some(ClaudeResponseBlock::ToolResult {
                tool_use_id: tool_call_id.clone(),
                content: content.clone(),
                is_error: *is_error,
            }),
        })
        .collect();

    if content.is_empty() {
        content.push(ClaudeResponseBlock::Text {
            text: String::new(),
        });
    }

    let stop_reason = if response.has_tool_call() {
        ClaudeStopReason::ToolUse
    } else if response.hit_token_limit() {
        ClaudeStopReason::MaxTokens
    } else {
        ClaudeStopReason::EndTurn
    };

    ClaudeMessageResponse {
        id: response.id.clone(),
        object_type: "message".to_string(),
        role: "assistant".to_string(),
        model: response.model.clone(),
        content,
        stop_reason: Some(stop_reason),
        stop_sequence: None,
        usage: to_claude_usage(&response.usage),
    }
}

/// `message_start` followed by the opening of the text block
pub fn stream_prologue(state: &mut StreamState) -> Vec<ClaudeStreamEvent> {
    let index = state.open_block();
    vec![
        ClaudeStreamEvent::MessageStart {
            message: ClaudeMessageResponse {
                id: state.id.clone(),
                object_type: "message".to_string(),
                role: "assistant".to_string(),
                model: state.model.clone(),
                content: Vec::new(),
                stop_reason: None,
                stop_sequence: None,
                usage: ClaudeUsage::default(),
            },
        },
        ClaudeStreamEvent::ContentBlockStart {
            index,
            content_block: ClaudeResponseBlock::Text {
                text: String::new(),
            },
        },
    ]
}

/// Render one canonical chunk as Claude stream events
///
/// In-progress reasoning becomes an empty text delta so clients see
/// liveness. A terminal chunk closes the text block and ends the message.
pub fn to_claude_stream_events(chunk: &CanonicalStreamChunk, state: &mut StreamState) -> Vec<ClaudeStreamEvent> {
    let mut events = Vec::new();

    for block in &chunk.output {
        match block {
            OutputBlock::Text { text } => events.push(text_delta(text.clone())),
            OutputBlock::Reasoning {
                status: ReasoningStatus::InProgress,
                ..
            } => events.push(text_delta(String::new())),
            OutputBlock::Reasoning {
                status: ReasoningStatus::Completed,
                ..
            } => {}
            OutputBlock::ToolCall { id, name, arguments } => {
                state.saw_tool_call = true;
                let index = state.open_block();
                events.push(ClaudeStreamEvent::ContentBlockStart {
                    index,
                    content_block: ClaudeResponseBlock::ToolUse {
                        id: id.clone(),
                        name: name.clone(),
                        input: json!({}),
                    },
                });
                events.push(ClaudeStreamEvent::ContentBlockDelta {
                    index,
                    delta: ClaudeDelta::InputJsonDelta {
                        partial_json: parse_tool_arguments(arguments).to_string(),
                    },
                });
                events.push(ClaudeStreamEvent::ContentBlockStop { index });
            }
            OutputBlock::ToolResult { .. } => {}
        }
    }

    if chunk.is_terminal() {
        let usage = chunk.usage.as_ref().map(to_claude_usage).unwrap_or_default();
        let stop_reason = if state.saw_tool_call {
            ClaudeStopReason::ToolUse
        } else {
            ClaudeStopReason::EndTurn
        };
        events.push(ClaudeStreamEvent::ContentBlockStop {
            index: TEXT_BLOCK_INDEX,
        });
        events.push(ClaudeStreamEvent::MessageDelta {
            delta: ClaudeMessageDelta {
                stop_reason,
                stop_sequence: None,
            },
            usage,
        });
        events.push(ClaudeStreamEvent::MessageStop { usage: Some(usage) });
    }

    if events.is_empty() {
        events.push(ClaudeStreamEvent::Ping);
    }
    events
}

/// Claude error envelope
pub fn to_claude_error(error: &ClientError) -> ClaudeErrorResponse {
    ClaudeErrorResponse {
        object_type: "error".to_string(),
        error: error_body(error),
    }
}

fn error_body(error: &ClientError) -> ClaudeErrorBody {
    ClaudeErrorBody {
        error_type: error.error_type.as_str().to_string(),
        message: error.message.clone(),
        correlation_id: Some(error.correlation_id.clone()),
    }
}

fn text_delta(text: String) -> ClaudeStreamEvent {
    ClaudeStreamEvent::ContentBlockDelta {
        index: TEXT_BLOCK_INDEX,
        delta: ClaudeDelta::TextDelta { text },
    }
}

fn to_claude_usage(usage: &Usage) -> ClaudeUsage {
    ClaudeUsage {
        input_tokens: usage.prompt_tokens,
        output_tokens: usage.completion_tokens,
    }
}

fn system_text(system: &ClaudeSystem) -> String {
    match system {
        ClaudeSystem::Text(text) => text.clone(),
        ClaudeSystem::Blocks(blocks) => blocks
            .iter()
            .map(|block| block.text.as_str())
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn content_text(content: &ClaudeContent) -> String {
    match content {
        ClaudeContent::Text(text) => text.clone(),
        ClaudeContent::Blocks(blocks) => blocks
            .iter()
            .filter_map(|block| match block {
                ClaudeContentBlock::Text { text } => Some(text.clone()),
                ClaudeContentBlock::ToolUse { name, input, .. } => {
                    Some(format!("[tool_use {name}] {input}"))
                }
                ClaudeContentBlock::ToolResult { content, .. } => Some(tool_result_text(content)),
                ClaudeContentBlock::Unsupported => None,
            })
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn thinking_to_reasoning(thinking: &ClaudeThinking) -> Option<Reasoning> {
    if thinking.thinking_type != "enabled" {
        return None;
    }
    let effort = match thinking.budget_tokens {
        Some(budget) if budget < LOW_EFFORT_BUDGET => ReasoningEffort::Low,
        Some(budget) if budget < MEDIUM_EFFORT_BUDGET => ReasoningEffort::Medium,
        Some(_) => ReasoningEffort::High,
        None => ReasoningEffort::Medium,
    };
    Some(Reasoning { effort })
}

fn reasoning_to_thinking(reasoning: &Reasoning) -> Option<ClaudeThinking> {
    let budget = match reasoning.effort {
        ReasoningEffort::Minimal | ReasoningEffort::Low => 1024,
        ReasoningEffort::Medium => 4096,
        ReasoningEffort::High => 16384,
        ReasoningEffort::Other(_) => return None,
    };
    Some(ClaudeThinking {
        thinking_type: "enabled".to_string(),
        budget_tokens: Some(budget),
    })
}
