//! OpenAiClient and Responder against a mock Responses API.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use campus_connect::config::LlmConfig;
use campus_connect::error::Error;
use campus_connect::llm::{fallback_response, CompletionClient, OpenAiClient, Responder};

const USER: &str = "Question: due?\n\nKnowledge entries:\n- [k1] FAFSA (finaid): March 1\n\nTasks:\nNo tasks found.";

fn config_for(server: &MockServer, timeout_secs: u64) -> LlmConfig {
    LlmConfig {
        base_url: format!("{}/v1", server.uri()),
        timeout_secs,
        api_key: Some("sk-test".to_string()),
        ..LlmConfig::default()
    }
}

#[tokio::test]
async fn test_complete_returns_message_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/responses"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "input": [
                { "role": "system", "content": "sys" },
                { "role": "user", "content": USER }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "output": [{
                "type": "message",
                "role": "assistant",
                "content": [{ "type": "output_text", "text": "Submit the FAFSA by March 1." }]
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenAiClient::new(&config_for(&server, 5), "sk-test").unwrap();
    let text = client.complete("sys", USER).await.unwrap();
    assert_eq!(text, "Submit the FAFSA by March 1.");
}

#[tokio::test]
async fn test_server_error_is_completion_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/responses"))
        .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let client = OpenAiClient::new(&config_for(&server, 5), "sk-test").unwrap();
    match client.complete("sys", USER).await {
        Err(Error::Completion(msg)) => assert!(msg.contains("500")),
        other => panic!("expected completion error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_body_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "resp_1" })))
        .mount(&server)
        .await;

    let config = config_for(&server, 5);
    let client = OpenAiClient::new(&config, "sk-test").unwrap();
    assert!(matches!(
        client.complete("sys", USER).await,
        Err(Error::Completion(_))
    ));

    let responder = Responder::from_config(&config);
    assert!(responder.has_client());
    assert_eq!(responder.respond("sys", USER).await, fallback_response(USER));
}

#[tokio::test]
async fn test_slow_server_times_out_and_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/responses"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "output_text": "late" }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let config = config_for(&server, 1);
    let responder = Responder::from_config(&config);
    let answer = responder.respond("sys", USER).await;
    assert_eq!(answer, "Knowledge insights: [k1] FAFSA (finaid): March 1.");
}

#[tokio::test]
async fn test_missing_key_never_calls_server() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "output_text": "x" })))
        .expect(0)
        .mount(&server)
        .await;

    let config = LlmConfig {
        api_key: None,
        ..config_for(&server, 5)
    };
    let responder = Responder::from_config(&config);
    assert!(!responder.has_client());
    assert_eq!(responder.respond("sys", USER).await, fallback_response(USER));
}
