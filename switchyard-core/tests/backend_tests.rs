//! Backend client tests against mocked Azure and Bedrock endpoints

use futures::StreamExt;
use serde_json::json;
use std::time::Duration;
use switchyard_core::config::{AzureConfig, BedrockConfig};
use switchyard_core::http::{HttpClient, RequestOptions};
use switchyard_core::protocol::{
    CanonicalRequest, Input, Message, OutputBlock, Reasoning, ReasoningEffort, ReasoningStatus,
};
use switchyard_core::providers::{AzureResponsesClient, BackendClient, BedrockConverseClient};
use switchyard_core::ProviderError;
use wiremock::matchers::{body_partial_json, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn azure_client(server: &MockServer) -> AzureResponsesClient {
    AzureResponsesClient::new(
        &AzureConfig::new(server.uri(), "az-test-key-0001"),
        HttpClient::new().unwrap(),
    )
}

fn bedrock_client(server: &MockServer) -> BedrockConverseClient {
    let mut config = BedrockConfig::new("us-east-1", "br-test-key-0001");
    config.endpoint = Some(server.uri());
    BedrockConverseClient::new(&config, HttpClient::new().unwrap())
}

fn request(model: &str) -> CanonicalRequest {
    let mut request = CanonicalRequest::new(
        model,
        Input::Messages(vec![
            Message::system("You are terse."),
            Message::user("What is 2 + 2?"),
        ]),
    );
    request.max_output_tokens = Some(128);
    request.temperature = Some(0.2);
    request
}

fn options() -> RequestOptions {
    RequestOptions::new("corr-backend").with_timeout(Duration::from_secs(5))
}

#[tokio::test]
async fn azure_request_shape_and_response_mapping() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/v1/responses"))
        .and(header("api-key", "az-test-key-0001"))
        .and(header("X-Correlation-ID", "corr-backend"))
        .and(header_exists("X-Request-ID"))
        .and(body_partial_json(json!({
            "model": "gpt-5",
            "max_output_tokens": 128,
            "reasoning": {"effort": "high"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "resp_abc",
            "object": "response",
            "created_at": 1_700_000_000,
            "model": "gpt-5",
            "output": [
                {"type": "reasoning", "summary": [{"type": "summary_text", "text": "adding"}]},
                {"type": "message", "content": [{"type": "output_text", "text": "4"}]},
                {"type": "function_call", "call_id": "call_1", "name": "calc", "arguments": "{\"x\":4}"}
            ],
            "usage": {
                "input_tokens": 20,
                "output_tokens": 9,
                "total_tokens": 29,
                "output_tokens_details": {"reasoning_tokens": 6}
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut canonical = request("gpt-5");
    canonical.reasoning = Some(Reasoning {
        effort: ReasoningEffort::High,
    });

    let response = azure_client(&server)
        .create_response(&canonical, &options())
        .await
        .unwrap();

    assert_eq!(response.id, "resp_abc");
    assert_eq!(response.text(), "4");
    assert!(response.has_tool_call());
    assert!(matches!(
        response.output[0],
        OutputBlock::Reasoning {
            status: ReasoningStatus::Completed,
            ..
        }
    ));
    assert_eq!(response.usage.total_tokens, 29);
    assert_eq!(response.usage.reasoning_tokens, Some(6));
}

#[tokio::test]
async fn azure_api_version_is_appended() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/v1/responses"))
        .and(query_param("api-version", "preview"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "resp_v", "model": "gpt-5", "output": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = AzureConfig::new(format!("{}/", server.uri()), "az-test-key-0001");
    config.api_version = Some("preview".to_string());
    let client = AzureResponsesClient::new(&config, HttpClient::new().unwrap());
    assert!(client.url().ends_with("/openai/v1/responses?api-version=preview"));

    let response = client.create_response(&request("gpt-5"), &options()).await.unwrap();
    assert!(response.output.is_empty());
}

#[tokio::test]
async fn azure_incomplete_response_reports_token_limit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/v1/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "resp_cut",
            "model": "gpt-5",
            "status": "incomplete",
            "incomplete_details": {"reason": "max_output_tokens"},
            "output": [{"type": "message", "content": [{"type": "output_text", "text": "Once upon"}]}]
        })))
        .mount(&server)
        .await;

    let response = azure_client(&server)
        .create_response(&request("gpt-5"), &options())
        .await
        .unwrap();
    assert!(response.hit_token_limit());
}

#[tokio::test]
async fn azure_rate_limit_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "2")
                .set_body_json(json!({"error": {"code": "rate_limit_exceeded", "message": "slow down"}})),
        )
        .mount(&server)
        .await;

    let err = azure_client(&server)
        .create_response(&request("gpt-5"), &options())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ProviderError::RateLimit {
            retry_after: Some(Duration::from_secs(2))
        }
    );
}

#[tokio::test]
async fn azure_auth_failure_is_a_client_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"code": "invalid_api_key", "message": "Access denied"}
        })))
        .mount(&server)
        .await;

    let err = azure_client(&server)
        .create_response(&request("gpt-5"), &options())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Authentication { .. }));
    assert!(err.is_client_error());
}

#[tokio::test]
async fn azure_stream_decodes_events() {
    let server = MockServer::start().await;
    let body = concat!(
        "event: response.created\n",
        "data: {\"type\":\"response.created\",\"response\":{\"id\":\"resp_s\"}}\n\n",
        "data: {\"type\":\"response.reasoning_text.delta\",\"delta\":\"hmm\"}\n\n",
        "data: {\"type\":\"response.output_text.delta\",\"delta\":\"4\"}\n\n",
        "data: {\"type\":\"response.completed\",\"response\":{\"id\":\"resp_s\",\"model\":\"gpt-5\",",
        "\"usage\":{\"input_tokens\":5,\"output_tokens\":1}}}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/openai/v1/responses"))
        .and(header("Accept", "text/event-stream"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let chunks: Vec<_> = azure_client(&server)
        .create_response_stream(&request("gpt-5"), &options())
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(chunks.len(), 3);
    assert!(chunks[0].as_ref().unwrap().is_reasoning_only());
    assert_eq!(chunks[1].as_ref().unwrap().output, vec![OutputBlock::text("4")]);
    let terminal = chunks[2].as_ref().unwrap();
    assert!(terminal.is_terminal());
    assert_eq!(terminal.usage.unwrap().total_tokens, 6);
}

#[tokio::test]
async fn azure_stream_failure_event_becomes_error() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"type\":\"response.output_text.delta\",\"delta\":\"par\"}\n\n",
        "data: {\"type\":\"response.failed\",\"response\":{\"error\":",
        "{\"code\":\"server_error\",\"message\":\"model crashed\"}}}\n\n",
    );
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let chunks: Vec<_> = azure_client(&server)
        .create_response_stream(&request("gpt-5"), &options())
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(chunks.len(), 2);
    assert!(matches!(
        chunks[1],
        Err(ProviderError::ServerError { status_code: 500, .. })
    ));
}

#[tokio::test]
async fn bedrock_converse_request_and_tool_use() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/model/anthropic.claude-sonnet-4-20250514-v1%3A0/converse"))
        .and(header("Authorization", "Bearer br-test-key-0001"))
        .and(body_partial_json(json!({
            "system": [{"text": "You are terse."}],
            "messages": [{"role": "user", "content": [{"text": "What is 2 + 2?"}]}],
            "inferenceConfig": {"maxTokens": 128}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "output": {"message": {"role": "assistant", "content": [
                {"reasoningContent": {"reasoningText": {"text": "simple sum"}}},
                {"text": "Let me check."},
                {"toolUse": {"toolUseId": "tu_1", "name": "calc", "input": {"expr": "2+2"}}}
            ]}},
            "stopReason": "tool_use",
            "usage": {"inputTokens": 30, "outputTokens": 12, "totalTokens": 42},
            "metrics": {"latencyMs": 180}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = bedrock_client(&server)
        .create_response(&request("anthropic.claude-sonnet-4-20250514-v1:0"), &options())
        .await
        .unwrap();

    assert!(response.id.starts_with("bedrock-"));
    assert_eq!(response.model, "anthropic.claude-sonnet-4-20250514-v1:0");
    assert_eq!(response.text(), "Let me check.");
    assert!(response.has_tool_call());
    assert_eq!(response.usage.total_tokens, 42);
    assert_eq!(response.metadata["latency_ms"], 180);
}

#[tokio::test]
async fn bedrock_stream_is_synthesized_from_one_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "output": {"message": {"role": "assistant", "content": [{"text": "Four."}]}},
            "stopReason": "end_turn",
            "usage": {"inputTokens": 8, "outputTokens": 2}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let chunks: Vec<_> = bedrock_client(&server)
        .create_response_stream(&request("amazon.nova-pro-v1:0"), &options())
        .await
        .unwrap()
        .collect()
        .await;

    let last = chunks.last().unwrap().as_ref().unwrap();
    assert!(last.is_terminal());
    assert_eq!(last.usage.unwrap().total_tokens, 10);
    assert_eq!(chunks.iter().filter(|c| c.as_ref().unwrap().is_terminal()).count(), 1);
}

#[tokio::test]
async fn bedrock_validation_exception_maps_to_invalid_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(400)
                .insert_header("x-amzn-errortype", "ValidationException:http://internal.amazon.com/coral/")
                .set_body_json(json!({"message": "temperature must be <= 1"})),
        )
        .mount(&server)
        .await;

    let err = bedrock_client(&server)
        .create_response(&request("amazon.nova-pro-v1:0"), &options())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ProviderError::InvalidRequest {
            message: "temperature must be <= 1".to_string()
        }
    );
}

#[tokio::test]
async fn bedrock_unknown_status_keeps_amazon_error_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(424)
                .insert_header("x-amzn-errortype", "ModelErrorException:http://internal.amazon.com/coral/")
                .set_body_json(json!({"message": "model returned an error"})),
        )
        .mount(&server)
        .await;

    let err = bedrock_client(&server)
        .create_response(&request("amazon.nova-pro-v1:0"), &options())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProviderError::Provider { ref code, .. } if code == "ModelErrorException"
    ));
}

#[tokio::test]
async fn malformed_requests_are_rejected_before_sending() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let empty = CanonicalRequest::new("gpt-5", Input::Messages(vec![]));
    match azure_client(&server).create_response(&empty, &options()).await {
        Err(ProviderError::Validation(err)) => {
            assert_eq!(err.field_path, "input");
            assert_eq!(err.correlation_id, "corr-backend");
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert!(matches!(
        azure_client(&server).create_response_stream(&empty, &options()).await,
        Err(ProviderError::Validation(_))
    ));

    let mut hot = request("anthropic.claude-sonnet-4-20250514-v1:0");
    hot.temperature = Some(4.0);
    match bedrock_client(&server).create_response_stream(&hot, &options()).await {
        Err(ProviderError::Validation(err)) => assert_eq!(err.field_path, "temperature"),
        Err(other) => panic!("expected validation error, got {other:?}"),
        Ok(_) => panic!("expected validation error, got a stream"),
    }
}

#[tokio::test]
async fn outbound_headers_are_auth_and_tracing_only() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/v1/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "resp_h", "model": "gpt-5", "output": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    azure_client(&server)
        .create_response(&request("gpt-5"), &options())
        .await
        .unwrap();

    let received = server.received_requests().await.unwrap();
    let headers = &received[0].headers;
    assert!(headers.contains_key("api-key"));
    assert!(headers.contains_key("x-request-id"));
    assert_eq!(headers.get("x-correlation-id").unwrap(), "corr-backend");
    assert!(!headers.contains_key("idempotency-key"));
}
