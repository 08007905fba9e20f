//! End-to-end gateway tests against mocked backends

use futures::StreamExt;
use serde_json::{json, Value};
use switchyard_core::config::{AzureConfig, BedrockConfig, GatewayConfig};
use switchyard_core::protocol::claude::ClaudeRequest;
use switchyard_core::protocol::openai::OpenAIRequest;
use switchyard_core::resilience::{CircuitState, ServiceLevel, FALLBACK_KEY};
use switchyard_core::transform::{ClaudeProtocol, ClientProtocol, OpenAIProtocol};
use switchyard_core::{ErrorType, Gateway, RequestContext, DONE_FRAME};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn azure_config(server: &MockServer) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.backends.azure = Some(AzureConfig::new(server.uri(), "az-test-key-0001"));
    config.resilience.retry.base_delay_ms = 1;
    config.resilience.retry.max_delay_ms = 5;
    config
}

fn hello_response() -> Value {
    json!({
        "id": "resp-123",
        "object": "response",
        "output": [{
            "type": "message",
            "content": [{"type": "output_text", "text": "Hello, world!"}]
        }],
        "usage": {"input_tokens": 10, "output_tokens": 5, "total_tokens": 15}
    })
}

fn claude_request(model: &str) -> ClaudeRequest {
    serde_json::from_value(json!({
        "model": model,
        "max_tokens": 256,
        "messages": [{"role": "user", "content": "Say hello"}]
    }))
    .unwrap()
}

fn openai_request(model: &str) -> OpenAIRequest {
    serde_json::from_value(json!({
        "model": model,
        "messages": [
            {"role": "system", "content": "Be brief."},
            {"role": "user", "content": "Say hello"}
        ]
    }))
    .unwrap()
}

fn payloads(frames: &[String]) -> Vec<Value> {
    frames
        .iter()
        .filter(|frame| frame.as_str() != DONE_FRAME)
        .map(|frame| {
            assert!(frame.starts_with("data: ") && frame.ends_with("\n\n"));
            serde_json::from_str(frame.trim_start_matches("data: ").trim()).unwrap()
        })
        .collect()
}

#[tokio::test]
async fn claude_request_through_azure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/v1/responses"))
        .and(header("api-key", "az-test-key-0001"))
        .and(body_partial_json(json!({"model": "gpt-5", "max_output_tokens": 256})))
        .respond_with(ResponseTemplate::new(200).set_body_json(hello_response()))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = Gateway::new(azure_config(&server)).unwrap();
    let (status, body) = gateway
        .respond::<ClaudeProtocol>(&claude_request("gpt-5"), &RequestContext::new("corr-1"))
        .await;

    assert_eq!(status, 200);
    assert_eq!(body["id"], "resp-123");
    assert_eq!(body["type"], "message");
    assert_eq!(body["role"], "assistant");
    assert_eq!(body["content"][0]["type"], "text");
    assert_eq!(body["content"][0]["text"], "Hello, world!");
    assert_eq!(body["stop_reason"], "end_turn");
    assert_eq!(body["usage"]["input_tokens"], 10);
    assert_eq!(body["usage"]["output_tokens"], 5);
}

#[tokio::test]
async fn openai_request_through_azure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/v1/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hello_response()))
        .mount(&server)
        .await;

    let gateway = Gateway::new(azure_config(&server)).unwrap();
    let response = gateway
        .handle::<OpenAIProtocol>(&openai_request("gpt-5-mini"), &RequestContext::generate())
        .await
        .unwrap();

    assert_eq!(response.object, "chat.completion");
    assert_eq!(response.choices.len(), 1);
    assert_eq!(response.choices[0].finish_reason.as_deref(), Some("stop"));
    let usage = response.usage.unwrap();
    assert_eq!((usage.prompt_tokens, usage.completion_tokens, usage.total_tokens), (10, 5, 15));

    let stats = gateway.retry_metrics().get("azure.create_response").unwrap();
    assert_eq!(stats.calls, 1);
    assert_eq!(stats.retries, 0);
}

#[tokio::test]
async fn invalid_request_never_reaches_backend() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hello_response()))
        .expect(0)
        .mount(&server)
        .await;

    let gateway = Gateway::new(azure_config(&server)).unwrap();
    let request: ClaudeRequest = serde_json::from_value(json!({
        "model": "gpt-5",
        "temperature": 3.5,
        "messages": [{"role": "user", "content": "hi"}]
    }))
    .unwrap();

    let (status, body) = gateway
        .respond::<ClaudeProtocol>(&request, &RequestContext::new("corr-bad"))
        .await;

    assert_eq!(status, 400);
    assert_eq!(body["type"], "error");
    assert_eq!(body["error"]["type"], "invalid_request_error");
    assert_eq!(body["error"]["correlationId"], "corr-bad");
    assert!(body["error"]["message"].as_str().unwrap().contains("temperature"));
}

#[tokio::test]
async fn server_errors_fall_back_to_placeholder() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/v1/responses"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": {"code": "internal_failure", "message": "boom"}
        })))
        .expect(3)
        .mount(&server)
        .await;

    let gateway = Gateway::new(azure_config(&server)).unwrap();
    let response = gateway
        .handle::<OpenAIProtocol>(&openai_request("gpt-5"), &RequestContext::new("corr-fb"))
        .await
        .unwrap();

    let body = serde_json::to_value(&response).unwrap();
    let text = body["choices"][0]["message"]["content"].as_str().unwrap();
    assert!(!text.is_empty());

    let stats = gateway.retry_metrics().get("azure.create_response").unwrap();
    assert_eq!(stats.attempts, 3);
    assert_eq!(stats.failures, 1);
}

#[tokio::test]
async fn cached_answer_served_when_backend_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/v1/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hello_response()))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/openai/v1/responses"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let gateway = Gateway::new(azure_config(&server)).unwrap();
    let ctx = RequestContext::new("corr-cache");
    let request = claude_request("gpt-5");

    let first = gateway.handle::<ClaudeProtocol>(&request, &ctx).await.unwrap();
    let second = gateway.handle::<ClaudeProtocol>(&request, &ctx).await.unwrap();
    assert_eq!(first.content, second.content);

    let canonical = gateway
        .complete(ClaudeProtocol::to_canonical(&request), &ctx)
        .await
        .unwrap();
    assert_eq!(canonical.metadata[FALLBACK_KEY], "cached");
    assert_eq!(canonical.text(), "Hello, world!");
}

#[tokio::test]
async fn unavailable_backend_is_reported_not_masked() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/v1/responses"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": {"message": "Service Unavailable"}
        })))
        .mount(&server)
        .await;

    let gateway = Gateway::new(azure_config(&server)).unwrap();
    let (status, body) = gateway
        .respond::<OpenAIProtocol>(&openai_request("gpt-5"), &RequestContext::new("corr-503"))
        .await;

    assert_eq!(status, 503);
    assert_eq!(body["error"]["type"], ErrorType::ServiceUnavailableError.as_str());
    assert_eq!(body["error"]["correlationId"], "corr-503");
}

#[tokio::test]
async fn repeated_failures_open_the_breaker() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/v1/responses"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let mut config = azure_config(&server);
    config.resilience.retry.max_attempts = 1;
    config.resilience.circuit_breaker.failure_threshold = 2;
    config.resilience.circuit_breaker.initial_backoff_ms = 60_000;
    config.resilience.circuit_breaker.max_backoff_ms = 60_000;
    let gateway = Gateway::new(config).unwrap();
    let ctx = RequestContext::new("corr-cb");

    for _ in 0..2 {
        gateway
            .handle::<ClaudeProtocol>(&claude_request("gpt-5"), &ctx)
            .await
            .unwrap();
    }
    assert_eq!(
        gateway.circuit_breakers().get("azure").unwrap().state(),
        CircuitState::Open
    );
    assert_eq!(gateway.health().service_level, ServiceLevel::Unavailable);

    // Rejected by the breaker without touching the backend
    let (status, body) = gateway
        .respond::<ClaudeProtocol>(&claude_request("gpt-5"), &ctx)
        .await;
    assert_eq!(status, 503);
    assert_eq!(body["error"]["type"], "service_unavailable_error");

    gateway.reset();
    assert_eq!(gateway.health().service_level, ServiceLevel::Full);
}

#[tokio::test]
async fn claude_stream_from_azure_events() {
    let server = MockServer::start().await;
    let events = concat!(
        "event: response.output_text.delta\n",
        "data: {\"type\":\"response.output_text.delta\",\"delta\":\"Hello\"}\n\n",
        "event: response.reasoning_summary_text.delta\n",
        "data: {\"type\":\"response.reasoning_summary_text.delta\",\"delta\":\"thinking hard\"}\n\n",
        "event: response.output_text.delta\n",
        "data: {\"type\":\"response.output_text.delta\",\"delta\":\", world!\"}\n\n",
        "event: response.completed\n",
        "data: {\"type\":\"response.completed\",\"response\":{\"id\":\"resp-9\",\"model\":\"gpt-5\",",
        "\"usage\":{\"input_tokens\":4,\"output_tokens\":3,\"total_tokens\":7}}}\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/openai/v1/responses"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(events, "text/event-stream"))
        .mount(&server)
        .await;

    let gateway = Gateway::new(azure_config(&server)).unwrap();
    let frames: Vec<String> = gateway
        .stream::<ClaudeProtocol>(&claude_request("gpt-5"), &RequestContext::new("corr-s"))
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(frames.last().map(String::as_str), Some(DONE_FRAME));
    assert!(frames.iter().all(|frame| !frame.contains("thinking hard")));

    let events = payloads(&frames);
    let types: Vec<&str> = events.iter().map(|e| e["type"].as_str().unwrap()).collect();
    assert_eq!(types.first(), Some(&"message_start"));
    assert_eq!(types.last(), Some(&"message_stop"));
    assert_eq!(types.iter().filter(|t| **t == "message_stop").count(), 1);

    let text: String = events
        .iter()
        .filter(|e| e["type"] == "content_block_delta")
        .filter_map(|e| e["delta"]["text"].as_str())
        .collect();
    assert_eq!(text, "Hello, world!");
}

#[tokio::test]
async fn openai_stream_failure_before_first_byte_uses_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/v1/responses"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let gateway = Gateway::new(azure_config(&server)).unwrap();
    let frames: Vec<String> = gateway
        .stream::<OpenAIProtocol>(&openai_request("gpt-5"), &RequestContext::new("corr-sf"))
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(frames.last().map(String::as_str), Some(DONE_FRAME));
    let events = payloads(&frames);
    assert!(events.iter().all(|e| e["object"] == "chat.completion.chunk"));
    let finishes: Vec<&Value> = events
        .iter()
        .map(|e| &e["choices"][0]["finish_reason"])
        .filter(|reason| !reason.is_null())
        .collect();
    assert_eq!(finishes.len(), 1);
}

#[tokio::test]
async fn bedrock_alias_routes_to_converse() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/model/anthropic.claude-sonnet-4-20250514-v1%3A0/converse"))
        .and(header("Authorization", "Bearer br-test-key-0001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "output": {"message": {"role": "assistant", "content": [{"text": "Hi from Bedrock"}]}},
            "stopReason": "max_tokens",
            "usage": {"inputTokens": 12, "outputTokens": 64, "totalTokens": 76}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = GatewayConfig::default();
    let mut bedrock = BedrockConfig::new("us-west-2", "br-test-key-0001");
    bedrock.endpoint = Some(server.uri());
    config.backends.bedrock = Some(bedrock);
    config.routing.primary = switchyard_core::ProviderKind::Bedrock;

    let gateway = Gateway::new(config).unwrap();
    let response = gateway
        .handle::<ClaudeProtocol>(&claude_request("claude-sonnet-4"), &RequestContext::new("corr-b"))
        .await
        .unwrap();

    assert_eq!(serde_json::to_value(&response).unwrap()["stop_reason"], "max_tokens");
    assert_eq!(response.usage.input_tokens, 12);
    assert_eq!(response.usage.output_tokens, 64);
    assert_eq!(gateway.health().unsupported_routes, 0);
}

#[tokio::test]
async fn unreadable_backend_body_is_an_internal_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/v1/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html>upstream proxy page</html>", "application/json"))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = Gateway::new(azure_config(&server)).unwrap();
    let (status, body) = gateway
        .respond::<OpenAIProtocol>(&openai_request("gpt-5"), &RequestContext::new("corr-parse"))
        .await;

    assert_eq!(status, 500);
    assert_eq!(body["error"]["type"], ErrorType::ApiError.as_str());
    assert_eq!(body["error"]["message"], "An internal error occurred");
    assert_eq!(body["error"]["correlationId"], "corr-parse");
    assert!(!body.to_string().contains("upstream proxy page"));
}
