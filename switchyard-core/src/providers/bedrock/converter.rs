//! Conversion between the canonical model and the Converse API

use super::types::*;
use crate::protocol::{
    CanonicalRequest, CanonicalResponse, OutputBlock, ReasoningStatus, Role, Usage, STOP_REASON_KEY,
    STOP_REASON_MAX_TOKENS,
};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Build a Converse request
///
/// System messages move to the `system` list. Consecutive messages with the
/// same role are merged into one message with several content blocks, since
/// Converse requires alternating turns.
pub fn to_converse_request(request: &CanonicalRequest) -> ConverseRequest {
    let mut system = Vec::new();
    let mut messages: Vec<ConverseMessage> = Vec::new();

    for message in request.input.to_messages() {
        if message.role == Role::System {
            system.push(ConverseSystemBlock {
                text: message.content,
            });
            continue;
        }

        let role = match message.role {
            Role::Assistant => "assistant",
            _ => "user",
        };
        let block = ConverseContentBlock::text(message.content);

        match messages.last_mut() {
            Some(last) if last.role == role => last.content.push(block),
            _ => messages.push(ConverseMessage {
                role: role.to_string(),
                content: vec![block],
            }),
        }
    }

    if request.reasoning.is_some() {
        tracing::debug!("reasoning effort is not forwarded to Converse");
    }

    let inference_config = InferenceConfig {
        max_tokens: request.max_output_tokens,
        temperature: request.temperature,
        top_p: request.top_p,
        stop_sequences: request.stop.clone(),
    };

    ConverseRequest {
        messages,
        system,
        inference_config: (!inference_config.is_empty()).then_some(inference_config),
    }
}

/// Convert a Converse answer
///
/// Converse does not always return an id; one is generated when missing.
pub fn from_converse_response(response: ConverseResponse, model: &str) -> CanonicalResponse {
    let output = response
        .output
        .message
        .map(|message| message.content.into_iter().filter_map(output_block).collect())
        .unwrap_or_default();

    let mut metadata = HashMap::new();
    if let Some(stop_reason) = &response.stop_reason {
        let normalized = match stop_reason.as_str() {
            "max_tokens" => STOP_REASON_MAX_TOKENS,
            other => other,
        };
        metadata.insert(STOP_REASON_KEY.to_string(), json!(normalized));
    }
    if let Some(metrics) = response.metrics {
        metadata.insert("latency_ms".to_string(), json!(metrics.latency_ms));
    }

    let usage = response
        .usage
        .map(|usage| {
            let mut converted = Usage::new(usage.input_tokens, usage.output_tokens);
            if let Some(total) = usage.total_tokens {
                converted.total_tokens = total;
            }
            converted
        })
        .unwrap_or_default();

    CanonicalResponse {
        id: response
            .response_id
            .unwrap_or_else(|| format!("bedrock-{}", uuid::Uuid::new_v4())),
        model: model.to_string(),
        output,
        usage,
        metadata,
    }
}

fn output_block(block: ConverseContentBlock) -> Option<OutputBlock> {
    if let Some(text) = block.text {
        return Some(OutputBlock::Text { text });
    }

    if let Some(reasoning) = block.reasoning_content.and_then(|r| r.reasoning_text) {
        return Some(OutputBlock::Reasoning {
            content: reasoning.text,
            status: ReasoningStatus::Completed,
        });
    }

    if let Some(tool_use) = block.tool_use {
        let arguments = match tool_use.input {
            Value::Null => "{}".to_string(),
            input => input.to_string(),
        };
        return Some(OutputBlock::ToolCall {
            id: tool_use.tool_use_id,
            name: tool_use.name,
            arguments,
        });
    }

    block.tool_result.map(|result| OutputBlock::ToolResult {
        tool_call_id: result.tool_use_id,
        content: result
            .content
            .into_iter()
            .filter_map(|part| part.text.or_else(|| part.json.map(|json| json.to_string())))
            .collect::<Vec<_>>()
            .join("\n"),
        is_error: result.status.as_deref() == Some("error"),
    })
}
