pub mod chat;
pub mod client;
pub mod local;
pub mod messages;

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};

use crate::error::ReformatError;

pub use client::ProviderClient;

pub const MAX_RESPONSE_BYTES: usize = 2 * 1024 * 1024; // 2MB

/// Transport timeout for hosted APIs.
pub const REMOTE_TIMEOUT: Duration = Duration::from_secs(60);

/// Local models may be much slower to answer.
pub const LOCAL_TIMEOUT: Duration = Duration::from_secs(120);

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Normalized input every wire variant accepts.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    /// Text to rewrite, sent as the user message.
    pub prompt: String,
    /// Mode instruction plus knowledge context.
    pub system_prompt: String,
}

impl ProviderRequest {
    pub fn new(prompt: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: system_prompt.into(),
        }
    }
}

pub(crate) fn build_http_client(timeout: Duration) -> Result<Client, ReformatError> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(timeout)
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(4)
        .build()
        .map_err(ReformatError::from)
}

/// How a variant reads error bodies.
pub(crate) struct ErrorEnvelope {
    /// Pulls a human-readable message out of a non-2xx body.
    pub parse: fn(&[u8]) -> Option<String>,
    /// Used when the body has no recognizable message.
    pub fallback: &'static str,
}

/// POST a JSON body and return the raw success body.
///
/// Shared status handling for every variant: 429 is `RateLimited`, any other
/// non-2xx is `RequestFailed` with the envelope message, transport errors are
/// `Network`, and oversized bodies are `InvalidResponse`.
pub(crate) async fn post_json(
    http: &Client,
    endpoint: &str,
    headers: HeaderMap,
    body: &serde_json::Value,
    provider: &str,
    envelope: &ErrorEnvelope,
) -> Result<Vec<u8>, ReformatError> {
    let response = http
        .post(endpoint)
        .headers(headers)
        .header("Content-Type", "application/json")
        .json(body)
        .send()
        .await?;

    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ReformatError::RateLimited {
            provider: provider.to_string(),
        });
    }

    if !status.is_success() {
        // Cap error body reads to MAX_RESPONSE_BYTES
        let error_bytes = response.bytes().await.unwrap_or_default();
        let truncated = &error_bytes[..error_bytes.len().min(MAX_RESPONSE_BYTES)];
        let message = (envelope.parse)(truncated)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| envelope.fallback.to_string());
        tracing::debug!(provider, status = status.as_u16(), "provider returned error status");
        return Err(ReformatError::RequestFailed {
            status: status.as_u16(),
            message,
        });
    }

    if let Some(len) = response.content_length()
        && len as usize > MAX_RESPONSE_BYTES
    {
        return Err(ReformatError::invalid_response(format!(
            "response too large: {len} bytes (max {MAX_RESPONSE_BYTES})"
        )));
    }

    let bytes = response.bytes().await?;
    if bytes.len() > MAX_RESPONSE_BYTES {
        return Err(ReformatError::invalid_response(format!(
            "response too large: {} bytes (max {MAX_RESPONSE_BYTES})",
            bytes.len()
        )));
    }

    Ok(bytes.to_vec())
}

/// Parse a success body into `T`, mapping malformed JSON to `InvalidResponse`.
pub(crate) fn parse_body<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, ReformatError> {
    serde_json::from_slice(bytes)
        .map_err(|e| ReformatError::invalid_response(format!("failed to parse response: {e}")))
}

/// Trim a model answer, treating a missing field as `InvalidResponse`.
pub(crate) fn finish_text(text: Option<String>, path: &str) -> Result<String, ReformatError> {
    text.map(|t| t.trim().to_string())
        .ok_or_else(|| ReformatError::invalid_response(format!("missing {path}")))
}

/// `{"error": {"message": "..."}}`, used by hosted chat and messages APIs.
pub(crate) fn nested_error_message(bytes: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(bytes).ok()?;
    value
        .get("error")?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

/// `{"error": "..."}`, used by Ollama's native API. Falls back to the nested
/// shape since OpenAI-compatible local servers use that.
pub(crate) fn flat_error_message(bytes: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(bytes).ok()?;
    match value.get("error")? {
        serde_json::Value::String(s) => Some(s.clone()),
        other => other.get("message")?.as_str().map(str::to_string),
    }
}
