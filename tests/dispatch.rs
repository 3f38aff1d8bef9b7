//! Wire-level tests for the three provider families against a mock server.

mod common;

use std::time::Instant;

use common::{MockResponse, chat_completion, closed_port_url, serve};
use reword::config::{CredentialStore, ProviderConfig, ProviderKind};
use reword::dispatch::{ProviderClient, ProviderRequest};
use reword::error::{ErrorKind, ReformatError};
use tokio_test::assert_ok;

fn config(kind: ProviderKind, endpoint: &str) -> ProviderConfig {
    let mut config = ProviderConfig::default();
    config.switch_kind(kind);
    config.endpoint = endpoint.to_string();
    config
}

fn keyed(kind: ProviderKind, key: &str) -> CredentialStore {
    let store = CredentialStore::new();
    store.set(kind, key);
    store
}

fn request() -> ProviderRequest {
    ProviderRequest::new("hello wrld", "Fix grammar.")
}

// ---------------------------------------------------------------------------
// Chat completions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn chat_completions_round_trip() {
    let server = serve(vec![chat_completion("  Hello world.\n")]).await;
    let client = ProviderClient::from_config(
        config(ProviderKind::OpenAi, &server.url("/v1/chat/completions")),
        &keyed(ProviderKind::OpenAi, "sk-test"),
    )
    .unwrap();

    let text = client.send(&request()).await.unwrap();
    assert_eq!(text, "Hello world.");

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let req = &requests[0];
    assert!(req.head.starts_with("post /v1/chat/completions"));
    assert_eq!(req.header("authorization").as_deref(), Some("bearer sk-test"));
    assert_eq!(req.body["model"], "gpt-4o-mini");
    assert_eq!(req.body["messages"][0]["role"], "system");
    assert_eq!(req.body["messages"][0]["content"], "Fix grammar.");
    assert_eq!(req.body["messages"][1]["role"], "user");
    assert_eq!(req.body["messages"][1]["content"], "hello wrld");
    assert_eq!(req.body["max_tokens"], 2048);
    assert_eq!(req.body["temperature"], 0.7);
}

#[tokio::test]
async fn chat_completions_without_key_fails_before_network() {
    let server = serve(vec![chat_completion("never")]).await;
    let client = ProviderClient::from_config(
        config(ProviderKind::OpenAi, &server.url("/v1/chat/completions")),
        &CredentialStore::new(),
    )
    .unwrap();

    let err = client.send(&request()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidApiKey);
    assert_eq!(server.hits(), 0);
}

#[tokio::test]
async fn custom_provider_speaks_chat_completions() {
    let server = serve(vec![chat_completion("ok")]).await;
    let mut cfg = config(ProviderKind::Custom, &server.url("/openai/v1/chat/completions"));
    cfg.model = "my-model".to_string();
    let client =
        ProviderClient::from_config(cfg, &keyed(ProviderKind::Custom, "custom-key")).unwrap();

    assert_eq!(client.wire_name(), "chat_completions");
    assert_ok!(client.send(&request()).await);
    assert_eq!(
        server.requests()[0].header("authorization").as_deref(),
        Some("bearer custom-key")
    );
}

#[tokio::test]
async fn blank_custom_provider_is_not_configured() {
    let err = ProviderClient::from_config(
        config(ProviderKind::Custom, ""),
        &keyed(ProviderKind::Custom, "k"),
    )
    .unwrap_err();
    assert!(matches!(err, ReformatError::NotConfigured));
}

// ---------------------------------------------------------------------------
// Structured messages
// ---------------------------------------------------------------------------

#[tokio::test]
async fn messages_round_trip() {
    let server = serve(vec![MockResponse::json(
        200,
        serde_json::json!({
            "id": "msg_1",
            "type": "message",
            "content": [{"type": "text", "text": "Dear team,\n\n"}]
        }),
    )])
    .await;
    let client = ProviderClient::from_config(
        config(ProviderKind::Anthropic, &server.url("/v1/messages")),
        &keyed(ProviderKind::Anthropic, "ant-key"),
    )
    .unwrap();

    assert_eq!(client.send(&request()).await.unwrap(), "Dear team,");

    let req = &server.requests()[0];
    assert_eq!(req.header("x-api-key").as_deref(), Some("ant-key"));
    assert_eq!(req.header("anthropic-version").as_deref(), Some("2023-06-01"));
    assert!(req.header("authorization").is_none());
    assert_eq!(req.body["system"], "Fix grammar.");
    let messages = req.body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(req.body["max_tokens"], 2048);
}

#[tokio::test]
async fn messages_error_envelope_is_surfaced() {
    let server = serve(vec![MockResponse::json(
        400,
        serde_json::json!({
            "type": "error",
            "error": {"type": "invalid_request_error", "message": "max_tokens: too large"}
        }),
    )])
    .await;
    let client = ProviderClient::from_config(
        config(ProviderKind::Anthropic, &server.url("/v1/messages")),
        &keyed(ProviderKind::Anthropic, "ant-key"),
    )
    .unwrap();

    let err = client.send(&request()).await.unwrap_err();
    match &err {
        ReformatError::RequestFailed { status, message } => {
            assert_eq!(*status, 400);
            assert_eq!(message, "max_tokens: too large");
        }
        other => panic!("expected RequestFailed, got {other:?}"),
    }
    assert_eq!(
        err.user_message(),
        "Request failed (400): max_tokens: too large"
    );
}

#[tokio::test]
async fn messages_missing_text_is_invalid_response() {
    let server = serve(vec![MockResponse::json(
        200,
        serde_json::json!({"content": []}),
    )])
    .await;
    let client = ProviderClient::from_config(
        config(ProviderKind::Anthropic, &server.url("/v1/messages")),
        &keyed(ProviderKind::Anthropic, "ant-key"),
    )
    .unwrap();

    let err = client.send(&request()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidResponse);
}

// ---------------------------------------------------------------------------
// Local compatible
// ---------------------------------------------------------------------------

#[tokio::test]
async fn local_native_chat_shape() {
    let server = serve(vec![MockResponse::json(
        200,
        serde_json::json!({
            "model": "llama3.2",
            "message": {"role": "assistant", "content": " Hi there! "},
            "done": true
        }),
    )])
    .await;
    let client = ProviderClient::from_config(
        config(ProviderKind::Ollama, &server.url("/api/chat")),
        &CredentialStore::new(),
    )
    .unwrap();

    assert_eq!(client.send(&request()).await.unwrap(), "Hi there!");

    let req = &server.requests()[0];
    assert!(req.header("authorization").is_none());
    assert_eq!(req.body["stream"], false);
    assert_eq!(req.body["options"]["num_predict"], 2048);
    assert_eq!(req.body["messages"][0]["role"], "system");
    assert!(req.body.get("max_tokens").is_none());
}

#[tokio::test]
async fn local_shape_follows_endpoint_not_kind() {
    // Ollama kind pointed at its OpenAI-compatible endpoint
    let server = serve(vec![chat_completion("compat")]).await;
    let client = ProviderClient::from_config(
        config(ProviderKind::Ollama, &server.url("/v1/chat/completions")),
        &CredentialStore::new(),
    )
    .unwrap();

    assert_eq!(client.send(&request()).await.unwrap(), "compat");
    let req = &server.requests()[0];
    assert_eq!(req.body["max_tokens"], 2048);
    assert!(req.body.get("stream").is_none());
}

#[tokio::test]
async fn local_error_uses_flat_envelope_or_hint() {
    let server = serve(vec![
        MockResponse::json(404, serde_json::json!({"error": "model 'llama9' not found"})),
        MockResponse::raw(502, "<html>bad gateway</html>"),
    ])
    .await;
    let client = ProviderClient::from_config(
        config(ProviderKind::Ollama, &server.url("/api/chat")),
        &CredentialStore::new(),
    )
    .unwrap();

    match client.send(&request()).await.unwrap_err() {
        ReformatError::RequestFailed { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "model 'llama9' not found");
        }
        other => panic!("expected RequestFailed, got {other:?}"),
    }
    match client.send(&request()).await.unwrap_err() {
        ReformatError::RequestFailed { status, message } => {
            assert_eq!(status, 502);
            assert!(message.contains("Is Ollama/LM Studio running?"));
        }
        other => panic!("expected RequestFailed, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Shared status handling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rate_limit_maps_for_every_family() {
    for kind in [ProviderKind::OpenAi, ProviderKind::Anthropic, ProviderKind::LmStudio] {
        let server = serve(vec![MockResponse::json(
            429,
            serde_json::json!({"error": {"message": "slow down"}}),
        )])
        .await;
        let client =
            ProviderClient::from_config(config(kind, &server.url("/v1/x")), &keyed(kind, "k"))
                .unwrap();
        let err = client.send(&request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimited, "{kind}");
        assert_eq!(err.user_message(), "Rate limited. Please try again later.");
    }
}

#[tokio::test]
async fn unparseable_error_body_gets_generic_message() {
    let server = serve(vec![MockResponse::raw(500, "upstream exploded")]).await;
    let client = ProviderClient::from_config(
        config(ProviderKind::OpenAi, &server.url("/v1/chat/completions")),
        &keyed(ProviderKind::OpenAi, "k"),
    )
    .unwrap();

    match client.send(&request()).await.unwrap_err() {
        ReformatError::RequestFailed { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "Unknown error");
        }
        other => panic!("expected RequestFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn non_json_success_is_invalid_response() {
    let server = serve(vec![MockResponse::raw(200, "definitely not json")]).await;
    let client = ProviderClient::from_config(
        config(ProviderKind::OpenAi, &server.url("/v1/chat/completions")),
        &keyed(ProviderKind::OpenAi, "k"),
    )
    .unwrap();

    let err = client.send(&request()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidResponse);
    assert!(err.user_message().starts_with("Invalid response from API"));
}

#[tokio::test]
async fn connection_refused_is_network_error() {
    let url = closed_port_url("/api/chat").await;
    let client =
        ProviderClient::from_config(config(ProviderKind::Ollama, &url), &CredentialStore::new())
            .unwrap();

    let start = Instant::now();
    let err = client.send(&request()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
    assert!(err.user_message().starts_with("Network error:"));
    assert!(start.elapsed().as_secs() < 10);
}
