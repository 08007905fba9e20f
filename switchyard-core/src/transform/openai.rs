//! Conversion between the OpenAI Chat/Completions format and the canonical model

use super::{parse_tool_arguments, unix_timestamp, ClientProtocol, StreamState};
use crate::error::ClientError;
use crate::protocol::openai::*;
use crate::protocol::{
    CanonicalRequest, CanonicalResponse, CanonicalStreamChunk, Input, Message, OutputBlock,
    Reasoning, ReasoningEffort, ReasoningStatus, Role, Usage,
};
use serde_json::{json, Value};

/// OpenAI Chat/Completions client protocol
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAIProtocol;

impl ClientProtocol for OpenAIProtocol {
    type Request = OpenAIRequest;
    type Response = OpenAIResponse;
    type StreamEvent = OpenAIStreamEvent;

    const NAME: &'static str = "openai";

    fn to_canonical(request: &OpenAIRequest) -> CanonicalRequest {
        to_canonical(request)
    }

    fn from_canonical_response(response: &CanonicalResponse) -> OpenAIResponse {
        to_openai(response)
    }

    fn stream_prologue(state: &mut StreamState) -> Vec<OpenAIStreamEvent> {
        vec![OpenAIStreamEvent::Chunk(stream_chunk(
            state,
            OpenAIDelta {
                role: Some("assistant".to_string()),
                content: Some(String::new()),
                tool_calls: None,
            },
            None,
            None,
        ))]
    }

    fn stream_events(chunk: &CanonicalStreamChunk, state: &mut StreamState) -> Vec<OpenAIStreamEvent> {
        to_openai_stream_chunks(chunk, state)
            .into_iter()
            .map(OpenAIStreamEvent::Chunk)
            .collect()
    }

    fn error_event(error: &ClientError) -> OpenAIStreamEvent {
        OpenAIStreamEvent::Error(to_openai_error(error))
    }

    fn error_body(error: &ClientError) -> Value {
        json!(to_openai_error(error))
    }
}

/// One `data:` payload on an OpenAI stream
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum OpenAIStreamEvent {
    Chunk(OpenAIStreamChunk),
    Error(OpenAIError),
}

/// Normalize an OpenAI request
///
/// `developer` messages count as system instructions; `tool` and `function`
/// results are folded into user turns as text.
pub fn to_canonical(request: &OpenAIRequest) -> CanonicalRequest {
    let messages = if request.messages.is_empty() {
        request
            .prompt
            .as_ref()
            .map(|prompt| vec![Message::user(prompt_text(prompt))])
            .unwrap_or_default()
    } else {
        request.messages.iter().map(to_canonical_message).collect()
    };

    CanonicalRequest {
        model: request.model.clone(),
        input: Input::Messages(messages),
        max_output_tokens: request.max_completion_tokens.or(request.max_tokens),
        temperature: request.temperature,
        top_p: request.top_p,
        reasoning: request.reasoning_effort.as_ref().map(|effort| Reasoning {
            effort: ReasoningEffort::from(effort.clone()),
        }),
        stream: request.stream.unwrap_or(false),
        stop: match &request.stop {
            Some(OpenAIStop::Single(stop)) => vec![stop.clone()],
            Some(OpenAIStop::Many(stops)) => stops.clone(),
            None => Vec::new(),
        },
    }
}

/// Render a canonical request as an OpenAI chat request
pub fn from_canonical_request(request: &CanonicalRequest) -> OpenAIRequest {
    OpenAIRequest {
        model: request.model.clone(),
        messages: request
            .input
            .to_messages()
            .into_iter()
            .map(|message| OpenAIMessage {
                role: message.role.as_str().to_string(),
                content: Some(OpenAIContent::Text(message.content)),
                name: None,
                tool_calls: None,
                tool_call_id: None,
            })
            .collect(),
        prompt: None,
        temperature: request.temperature,
        max_tokens: request.max_output_tokens,
        max_completion_tokens: None,
        top_p: request.top_p,
        stop: (!request.stop.is_empty()).then(|| OpenAIStop::Many(request.stop.clone())),
        stream: Some(request.stream),
        reasoning_effort: request
            .reasoning
            .as_ref()
            .map(|reasoning| reasoning.effort.as_str().to_string()),
        user: None,
    }
}

/// Render a complete canonical response as a chat completion
pub fn to_openai(response: &CanonicalResponse) -> OpenAIResponse {
    let tool_calls: Vec<OpenAIToolCall> = response
        .output
        .iter()
        .filter_map(|block| match block {
            OutputBlock::ToolCall { id, name, arguments } => Some(OpenAIToolCall {
                id: id.clone(),
                tool_type: "function".to_string(),
                function: OpenAIFunctionCall {
                    name: name.clone(),
                    arguments: parse_tool_arguments(arguments).to_string(),
                },
            }),
            _ => None,
        })
        .collect();

    let finish_reason = if !tool_calls.is_empty() {
        "tool_calls"
    } else if response.hit_token_limit() {
        "length"
    } else {
        "stop"
    };

    OpenAIResponse {
        id: response.id.clone(),
        object: "chat.completion".to_string(),
        created: unix_timestamp(),
        model: response.model.clone(),
        choices: vec![OpenAIChoice {
            index: 0,
            message: OpenAIMessage {
                role: "assistant".to_string(),
                content: Some(OpenAIContent::Text(response.text())),
                name: None,
                tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                tool_call_id: None,
            },
            finish_reason: Some(finish_reason.to_string()),
        }],
        usage: Some(to_openai_usage(&response.usage)),
    }
}

/// Render one canonical chunk as OpenAI stream chunks
pub fn to_openai_stream_chunks(chunk: &CanonicalStreamChunk, state: &mut StreamState) -> Vec<OpenAIStreamChunk> {
    let mut chunks = Vec::new();

    for block in &chunk.output {
        match block {
            OutputBlock::Text { text } => {
                chunks.push(stream_chunk(state, content_delta(text.clone()), None, None))
            }
            OutputBlock::Reasoning {
                status: ReasoningStatus::InProgress,
                ..
            } => chunks.push(stream_chunk(state, content_delta(String::new()), None, None)),
            OutputBlock::ToolCall { id, name, arguments } => {
                state.saw_tool_call = true;
                let index = state.open_block() as usize;
                let delta = OpenAIDelta {
                    role: None,
                    content: None,
                    tool_calls: Some(vec![OpenAIToolCallDelta {
                        index,
                        id: Some(id.clone()),
                        tool_type: Some("function".to_string()),
                        function: Some(OpenAIFunctionCallDelta {
                            name: Some(name.clone()),
                            arguments: Some(parse_tool_arguments(arguments).to_string()),
                        }),
                    }]),
                };
                chunks.push(stream_chunk(state, delta, None, None));
            }
            OutputBlock::Reasoning { .. } | OutputBlock::ToolResult { .. } => {}
        }
    }

    if chunk.is_terminal() {
        let finish_reason = if state.saw_tool_call { "tool_calls" } else { "stop" };
        let usage = chunk.usage.as_ref().map(to_openai_usage);
        chunks.push(stream_chunk(
            state,
            OpenAIDelta::default(),
            Some(finish_reason.to_string()),
            usage,
        ));
    }

    chunks
}

/// OpenAI error envelope
pub fn to_openai_error(error: &ClientError) -> OpenAIError {
    OpenAIError {
        error: OpenAIErrorDetail {
            message: error.message.clone(),
            error_type: error.error_type.as_str().to_string(),
            code: error.code.clone(),
            param: error.param.clone(),
            correlation_id: Some(error.correlation_id.clone()),
        },
    }
}

fn to_canonical_message(message: &OpenAIMessage) -> Message {
    let mut text = message.content.as_ref().map(content_text).unwrap_or_default();

    if let Some(tool_calls) = &message.tool_calls {
        let rendered = tool_calls
            .iter()
            .map(|call| format!("[tool_call {}] {}", call.function.name, call.function.arguments));
        text = std::iter::once(text)
            .chain(rendered)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
    }

    let role = match message.role.as_str() {
        "developer" => Role::System,
        "tool" | "function" => Role::User,
        other => Role::from(other),
    };
    Message::new(role, text)
}

fn content_text(content: &OpenAIContent) -> String {
    match content {
        OpenAIContent::Text(text) => text.clone(),
        OpenAIContent::Parts(parts) => parts
            .iter()
            .filter_map(|part| match part {
                OpenAIContentPart::Text { text } => Some(text.as_str()),
                OpenAIContentPart::ImageUrl { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn prompt_text(prompt: &OpenAIPrompt) -> String {
    match prompt {
        OpenAIPrompt::Text(text) => text.clone(),
        OpenAIPrompt::Batch(texts) => texts.join("\n"),
    }
}

fn content_delta(text: String) -> OpenAIDelta {
    OpenAIDelta {
        role: None,
        content: Some(text),
        tool_calls: None,
    }
}

fn stream_chunk(
    state: &StreamState,
    delta: OpenAIDelta,
    finish_reason: Option<String>,
    usage: Option<OpenAIUsage>,
) -> OpenAIStreamChunk {
    OpenAIStreamChunk {
        id: state.id.clone(),
        object: "chat.completion.chunk".to_string(),
        created: state.created,
        model: state.model.clone(),
        choices: vec![OpenAIStreamChoice {
            index: 0,
            delta,
            finish_reason,
        }],
        usage,
    }
}

fn to_openai_usage(usage: &Usage) -> OpenAIUsage {
    OpenAIUsage {
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
        total_tokens: usage.total_tokens,
        completion_tokens_details: usage
            .reasoning_tokens
            .map(|reasoning_tokens| OpenAICompletionTokensDetails { reasoning_tokens }),
    }
}
