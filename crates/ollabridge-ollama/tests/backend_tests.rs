// SPDX-FileCopyrightText: 2026 Ollabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `OllamaBackend` against a wiremock Ollama server.

use std::time::Duration;

use futures::StreamExt;
use ollabridge_core::traits::{InferenceBackend, PluginAdapter};
use ollabridge_core::types::{ChatRequest, HealthStatus, Message};
use ollabridge_ollama::{OllamaBackend, OllamaClient};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend(server: &MockServer) -> OllamaBackend {
    OllamaBackend::with_client(OllamaClient::new(server.uri(), Duration::from_secs(5)).unwrap())
}

fn request(stream: bool) -> ChatRequest {
    ChatRequest {
        model: "llama3.2".into(),
        messages: vec![
            Message::system("be brief", "999"),
            Message::user("what is in this picture?", vec!["aGVsbG8=".into()], "u1"),
        ],
        stream,
    }
}

#[tokio::test]
async fn chat_sends_roles_and_images() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(serde_json::json!({
            "model": "llama3.2",
            "stream": false,
            "messages": [
                {"role": "system", "content": "be brief"},
                {"role": "user", "content": "what is in this picture?", "images": ["aGVsbG8="]}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": "llama3.2",
            "message": {"role": "assistant", "content": "A greeting."},
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = backend(&server).chat(request(false)).await.unwrap();
    assert_eq!(response.model, "llama3.2");
    assert_eq!(response.content.as_deref(), Some("A greeting."));
}

#[tokio::test]
async fn response_without_message_has_no_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"done": true})),
        )
        .mount(&server)
        .await;

    let response = backend(&server).chat(request(false)).await.unwrap();
    assert_eq!(response.content, None);
    assert_eq!(response.model, "llama3.2");
}

#[tokio::test]
async fn mid_stream_error_surfaces_after_fragments() {
    let server = MockServer::start().await;
    let ndjson = concat!(
        r#"{"message":{"role":"assistant","content":"partial"},"done":false}"#,
        "\n",
        r#"{"error":"model runner crashed"}"#,
        "\n",
    );
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(ndjson, "application/x-ndjson"))
        .mount(&server)
        .await;

    let items: Vec<_> = backend(&server)
        .chat_stream(request(true))
        .await
        .unwrap()
        .collect()
        .await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().unwrap(), "partial");
    assert_eq!(items[1].as_ref().unwrap_err().to_string(), "model runner crashed");
}

#[tokio::test]
async fn health_check_reflects_installed_models() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "models": [{"name": "llama3.2:latest"}]
        })))
        .mount(&server)
        .await;

    assert_eq!(
        backend(&server).health_check().await.unwrap(),
        HealthStatus::Healthy
    );
}

#[tokio::test]
async fn health_check_without_models_is_degraded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"models": []})))
        .mount(&server)
        .await;

    assert!(matches!(
        backend(&server).health_check().await.unwrap(),
        HealthStatus::Degraded(_)
    ));
}

#[tokio::test]
async fn unreachable_server_is_unhealthy() {
    let backend =
        OllamaBackend::with_client(OllamaClient::new("http://127.0.0.1:1", Duration::from_secs(2)).unwrap());
    assert!(matches!(
        backend.health_check().await.unwrap(),
        HealthStatus::Unhealthy(_)
    ));
}
