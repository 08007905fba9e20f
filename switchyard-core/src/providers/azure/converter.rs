//! Conversion between the canonical model and the Responses API

use super::types::*;
use crate::http::classify_error_message;
use crate::protocol::{
    CanonicalRequest, CanonicalResponse, CanonicalStreamChunk, Input, OutputBlock, ReasoningStatus,
    Usage, STOP_REASON_KEY, STOP_REASON_MAX_TOKENS,
};
use crate::providers::adapter::stream_error;
use crate::providers::ProviderError;
use serde_json::json;
use std::collections::HashMap;

/// Build a Responses API request
///
/// Stop sequences have no Responses API counterpart and are dropped.
pub fn to_responses_request(request: &CanonicalRequest) -> ResponsesRequest {
    let input = match &request.input {
        Input::Text(text) => ResponsesInput::Text(text.clone()),
        Input::Messages(messages) => ResponsesInput::Messages(
            messages
                .iter()
                .map(|message| ResponsesInputMessage {
                    role: message.role.as_str().to_string(),
                    content: message.content.clone(),
                })
                .collect(),
        ),
    };

    if !request.stop.is_empty() {
        tracing::debug!(
            count = request.stop.len(),
            "stop sequences are not forwarded to the Responses API"
        );
    }

    ResponsesRequest {
        model: request.model.clone(),
        input,
        max_output_tokens: request.max_output_tokens,
        temperature: request.temperature,
        top_p: request.top_p,
        reasoning: request.reasoning.as_ref().map(|reasoning| ResponsesReasoning {
            effort: reasoning.effort.as_str().to_string(),
        }),
        stream: request.stream,
    }
}

/// Convert a complete Responses API answer
pub fn from_responses_response(response: ResponsesResponse) -> CanonicalResponse {
    let mut output = Vec::with_capacity(response.output.len());
    for item in response.output {
        output.extend(output_blocks(item));
    }

    let mut metadata = HashMap::new();
    if let Some(details) = &response.incomplete_details {
        if details.reason == "max_output_tokens" {
            metadata.insert(STOP_REASON_KEY.to_string(), json!(STOP_REASON_MAX_TOKENS));
        }
    }
    if let Some(created_at) = response.created_at {
        metadata.insert("created".to_string(), json!(created_at));
    }

    CanonicalResponse {
        id: response.id,
        model: response.model,
        output,
        usage: response.usage.map(to_usage).unwrap_or_default(),
        metadata,
    }
}

/// Convert one stream event
///
/// Returns `None` for events that carry nothing the client needs.
pub fn from_stream_event(event: ResponsesStreamEvent) -> Option<Result<CanonicalStreamChunk, ProviderError>> {
    match event {
        ResponsesStreamEvent::OutputTextDelta { delta } => Some(Ok(CanonicalStreamChunk::text(delta))),
        ResponsesStreamEvent::ReasoningSummaryDelta { delta }
        | ResponsesStreamEvent::ReasoningTextDelta { delta } => {
            Some(Ok(CanonicalStreamChunk::reasoning_delta(delta)))
        }
        ResponsesStreamEvent::OutputItemDone {
            item: item @ ResponsesOutputItem::FunctionCall { .. },
        } => Some(Ok(CanonicalStreamChunk {
            output: output_blocks(item),
            usage: None,
        })),
        ResponsesStreamEvent::Completed { response } => Some(Ok(CanonicalStreamChunk::terminal(
            response.usage.map(to_usage).unwrap_or_default(),
        ))),
        ResponsesStreamEvent::Failed { response } => {
            let error = match response.error {
                Some(body) => classify_error_message("azure", body.code.as_deref(), &body.message),
                None => stream_error("azure", "response failed"),
            };
            Some(Err(error))
        }
        ResponsesStreamEvent::Error { code, message } => {
            Some(Err(classify_error_message("azure", code.as_deref(), &message)))
        }
        ResponsesStreamEvent::OutputItemDone { .. } | ResponsesStreamEvent::Other => None,
    }
}

fn output_blocks(item: ResponsesOutputItem) -> Vec<OutputBlock> {
    match item {
        ResponsesOutputItem::Message { content } => content
            .into_iter()
            .filter_map(|part| match part {
                ResponsesOutputContent::OutputText { text } => Some(OutputBlock::Text { text }),
                ResponsesOutputContent::Refusal { refusal } => Some(OutputBlock::Text { text: refusal }),
                ResponsesOutputContent::Unknown => None,
            })
            .collect(),
        ResponsesOutputItem::Reasoning { summary, status } => {
            let status = match status.as_deref() {
                Some("in_progress") => ReasoningStatus::InProgress,
                _ => ReasoningStatus::Completed,
            };
            vec![OutputBlock::Reasoning {
                content: summary
                    .into_iter()
                    .map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("\n"),
                status,
            }]
        }
        ResponsesOutputItem::FunctionCall {
            call_id,
            name,
            arguments,
        } => vec![OutputBlock::ToolCall {
            id: call_id,
            name,
            arguments,
        }],
        ResponsesOutputItem::FunctionCallOutput { call_id, output } => vec![OutputBlock::ToolResult {
            tool_call_id: call_id,
            content: output,
            is_error: false,
        }],
        ResponsesOutputItem::Unknown => Vec::new(),
    }
}

fn to_usage(usage: ResponsesUsage) -> Usage {
    let mut converted = Usage::new(usage.input_tokens, usage.output_tokens);
    if let Some(total) = usage.total_tokens {
        converted.total_tokens = total;
    }
    converted.reasoning_tokens = usage
        .output_tokens_details
        .map(|details| details.reasoning_tokens);
    converted
}
