//! Chat completions backend against a mock server.

use serde_json::json;
use skyreply::core::router::Persona;
use skyreply::io::backend::Backend;
use skyreply::io::chat::ChatBackend;
use skyreply::io::config::{ChatAuth, ChatBackendConfig};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer, auth: ChatAuth) -> ChatBackendConfig {
    ChatBackendConfig {
        base_url: format!("{}/v1/", server.uri()),
        model: "test-model".to_string(),
        auth,
        timeout_secs: 5,
        ..ChatBackendConfig::default()
    }
}

async fn complete(config: ChatBackendConfig, prompt: &'static str) -> anyhow::Result<String> {
    tokio::task::spawn_blocking(move || {
        let backend = ChatBackend::new(&config, "sk-test".to_string())?;
        backend.complete(Persona::Strategist, prompt)
    })
    .await
    .expect("blocking task")
}

fn completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }]
    }))
}

#[tokio::test]
async fn bearer_auth_posts_persona_and_prompt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "test-model",
            "messages": [
                { "role": "system", "content": Persona::Strategist.system_message() },
                { "role": "user", "content": "draft a reply" }
            ]
        })))
        .respond_with(completion(r#"{"formatted_message": "hi"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let content = complete(config(&server, ChatAuth::Bearer), "draft a reply")
        .await
        .expect("completion");

    assert_eq!(content, r#"{"formatted_message": "hi"}"#);
}

#[tokio::test]
async fn api_key_header_replaces_bearer_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("api-key", "sk-test"))
        .respond_with(completion("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let content = complete(config(&server, ChatAuth::ApiKey), "hello")
        .await
        .expect("completion");

    assert_eq!(content, "ok");
    let requests = server.received_requests().await.expect("recording enabled");
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn error_status_carries_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limit exceeded\n"))
        .expect(1)
        .mount(&server)
        .await;

    let err = complete(config(&server, ChatAuth::Bearer), "hello")
        .await
        .expect_err("429 is an error");

    let message = format!("{err:#}");
    assert!(message.contains("chat completion failed with 429"), "{message}");
    assert!(message.ends_with("rate limit exceeded"), "{message}");
}

#[tokio::test]
async fn empty_choices_are_an_empty_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let content = complete(config(&server, ChatAuth::Bearer), "hello")
        .await
        .expect("completion");

    assert_eq!(content, "");
}
