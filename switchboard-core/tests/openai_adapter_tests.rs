//! HTTP mock tests for the OpenAI adapter

use serde_json::json;
use std::time::Duration;
use switchboard_core::http::HttpClient;
use switchboard_core::protocol::{FinishReason, Message, ParameterSchema, ToolDefinition};
use switchboard_core::providers::{
    Credentials, ModelParameters, OpenAIAdapter, ProviderAdapter, ProviderError, ResiliencePolicy,
};
use wiremock::matchers::{body_partial_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_policy() -> ResiliencePolicy {
    ResiliencePolicy {
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        ..Default::default()
    }
}

fn adapter(server: &MockServer, key: &str) -> OpenAIAdapter {
    let mut adapter = OpenAIAdapter::new(HttpClient::new().unwrap())
        .with_base_url(server.uri())
        .with_resilience(fast_policy());
    adapter.initialize(Credentials::new(key), ModelParameters::default());
    adapter
}

fn completion(message: serde_json::Value) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "model": "gpt-4o-mini",
        "choices": [{"index": 0, "message": message, "finish_reason": "stop"}],
        "usage": {"prompt_tokens": 5, "completion_tokens": 3, "total_tokens": 8}
    })
}

#[tokio::test]
async fn test_text_completion() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer sk-test"))
        .and(header_exists("X-Request-ID"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "messages": [
                {"role": "system", "content": "be brief"},
                {"role": "user", "content": "Hello"}
            ]
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion(json!({"role": "assistant", "content": "Hi there"}))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let result = adapter(&server, "sk-test")
        .generate_response(&[Message::user("Hello")], None, Some("be brief"))
        .await
        .unwrap();

    assert_eq!(result.content, "Hi there");
    assert_eq!(result.finish_reason, FinishReason::Stop);
    assert!(result.tool_calls.is_none());
    assert!(!result.backup_credential);
}

#[tokio::test]
async fn test_tool_call_completion() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "tools": [{"type": "function", "function": {"name": "get_weather"}}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_1",
                "type": "function",
                "function": {"name": "get_weather", "arguments": "{\"city\":\"Quito\"}"}
            }]
        }))))
        .mount(&server)
        .await;

    let tools = vec![ToolDefinition::new("get_weather", "Current weather").with_parameters(
        ParameterSchema::default().with_property("city", json!({"type": "string"}), true),
    )];
    let result = adapter(&server, "sk-test")
        .generate_response(&[Message::user("Weather in Quito?")], Some(&tools), None)
        .await
        .unwrap();

    assert_eq!(result.finish_reason, FinishReason::ToolCalls);
    assert_eq!(result.content, "");
    let calls = result.tool_calls.unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].name, "get_weather");
    assert_eq!(calls[0].arguments["city"], "Quito");
}

#[tokio::test]
async fn test_server_error_is_retried_then_reported() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(json!({"error": {"message": "upstream exploded"}})),
        )
        .expect(3)
        .mount(&server)
        .await;

    let adapter = adapter(&server, "sk-test");
    let err = adapter
        .generate_response(&[Message::user("Hello")], None, None)
        .await
        .unwrap_err();

    match &err {
        ProviderError::Http { status, message } => {
            assert_eq!(*status, 500);
            assert!(message.starts_with("upstream exploded"));
            assert!(message.contains("request_id"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.is_upstream_failure());
    assert_eq!(adapter.circuit_snapshot().unwrap().consecutive_failures, 1);
}

#[tokio::test]
async fn test_recovers_after_transient_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion(json!({"role": "assistant", "content": "ok"}))),
        )
        .mount(&server)
        .await;

    let adapter = adapter(&server, "sk-test");
    let result = adapter
        .generate_response(&[Message::user("Hello")], None, None)
        .await
        .unwrap();

    assert_eq!(result.content, "ok");
    assert_eq!(adapter.circuit_snapshot().unwrap().consecutive_failures, 0);
}

#[tokio::test]
async fn test_malformed_body_is_parse_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": true})))
        .mount(&server)
        .await;

    let err = adapter(&server, "sk-test")
        .generate_response(&[Message::user("Hello")], None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::ParseError(_)));
}

#[tokio::test]
async fn test_uninitialized_adapter_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let adapter = adapter(&server, "   ");
    assert!(!adapter.is_initialized());

    let err = adapter
        .generate_response(&[Message::user("Hello")], None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::NotInitialized(_)));
    assert!(err.is_unavailable());
}

#[tokio::test]
async fn test_duplicate_tool_names_rejected_before_sending() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let tools = vec![
        ToolDefinition::new("search", "a"),
        ToolDefinition::new("search", "b"),
    ];
    let err = adapter(&server, "sk-test")
        .generate_response(&[Message::user("Hello")], Some(&tools), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_health_probe() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .and(header("Authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    assert!(adapter(&server, "sk-test").is_healthy().await);
    assert!(!adapter(&server, "sk-wrong").is_healthy().await);
    assert!(!adapter(&server, "").is_healthy().await);
}

#[tokio::test]
async fn test_model_override_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"model": "gpt-4o", "temperature": 0.2, "max_tokens": 64})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion(json!({"role": "assistant", "content": "ok"}))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut adapter = OpenAIAdapter::new(HttpClient::new().unwrap())
        .with_base_url(server.uri())
        .with_resilience(fast_policy());
    adapter.initialize(
        Credentials::new("sk-test"),
        ModelParameters::default()
            .with_model("gpt-4o")
            .with_temperature(0.2)
            .with_max_output_tokens(64),
    );
    assert_eq!(adapter.settings().model, "gpt-4o");

    adapter
        .generate_response(&[Message::user("Hello")], None, None)
        .await
        .unwrap();
}
