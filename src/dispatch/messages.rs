use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;

use crate::config::ProviderConfig;
use crate::dispatch::{
    ErrorEnvelope, ProviderRequest, REMOTE_TIMEOUT, build_http_client, finish_text,
    nested_error_message, parse_body, post_json,
};
use crate::error::ReformatError;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

const ENVELOPE: ErrorEnvelope = ErrorEnvelope {
    parse: nested_error_message,
    fallback: "Unknown error",
};

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

/// Request body for the Messages API: `system` is a top-level field and the
/// message list carries only the user turn.
pub fn request_body(config: &ProviderConfig, req: &ProviderRequest) -> serde_json::Value {
    serde_json::json!({
        "model": config.model,
        "max_tokens": config.max_tokens,
        "system": req.system_prompt,
        "messages": [
            {"role": "user", "content": req.prompt},
        ],
        "temperature": config.temperature,
    })
}

/// Extract `content[0].text`.
pub fn parse_response(bytes: &[u8]) -> Result<String, ReformatError> {
    let response: MessagesResponse = parse_body(bytes)?;
    let text = response.content.into_iter().next().and_then(|b| b.text);
    finish_text(text, "content[0].text")
}

/// Anthropic Messages backend.
pub struct MessagesClient {
    http: Client,
    config: ProviderConfig,
    api_key: Option<String>,
}

impl MessagesClient {
    pub fn new(config: ProviderConfig, api_key: Option<String>) -> Result<Self, ReformatError> {
        Ok(Self {
            http: build_http_client(REMOTE_TIMEOUT)?,
            config,
            api_key,
        })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub async fn send(&self, req: &ProviderRequest) -> Result<String, ReformatError> {
        let provider = self.config.kind.as_str();
        let invalid_key = || ReformatError::InvalidApiKey {
            provider: provider.to_string(),
        };
        let api_key = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(invalid_key)?;

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key).map_err(|_| invalid_key())?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let body = request_body(&self.config, req);
        let bytes = post_json(
            &self.http,
            &self.config.endpoint,
            headers,
            &body,
            provider,
            &ENVELOPE,
        )
        .await?;
        parse_response(&bytes)
    }
}

impl std::fmt::Debug for MessagesClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessagesClient")
            .field("config", &self.config)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}
