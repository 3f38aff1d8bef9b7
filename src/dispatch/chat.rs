use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;

use crate::config::ProviderConfig;
use crate::dispatch::{
    ErrorEnvelope, ProviderRequest, REMOTE_TIMEOUT, build_http_client, finish_text,
    nested_error_message, parse_body, post_json,
};
use crate::error::ReformatError;

const ENVELOPE: ErrorEnvelope = ErrorEnvelope {
    parse: nested_error_message,
    fallback: "Unknown error",
};

#[derive(Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<Message>,
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
}

/// Request body for OpenAI-style chat completions.
pub fn request_body(config: &ProviderConfig, req: &ProviderRequest) -> serde_json::Value {
    serde_json::json!({
        "model": config.model,
        "messages": [
            {"role": "system", "content": req.system_prompt},
            {"role": "user", "content": req.prompt},
        ],
        "max_tokens": config.max_tokens,
        "temperature": config.temperature,
    })
}

/// Extract `choices[0].message.content`.
pub fn parse_response(bytes: &[u8]) -> Result<String, ReformatError> {
    let completion: ChatCompletion = parse_body(bytes)?;
    let text = completion
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content);
    finish_text(text, "choices[0].message.content")
}

/// Chat-completions backend (OpenAI and custom compatible endpoints).
pub struct ChatClient {
    http: Client,
    config: ProviderConfig,
    api_key: Option<String>,
}

impl ChatClient {
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
        let api_key = self
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ReformatError::InvalidApiKey {
                provider: provider.to_string(),
            })?;

        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", api_key.trim())).map_err(|_| {
            ReformatError::InvalidApiKey {
                provider: provider.to_string(),
            }
        })?;
        headers.insert(AUTHORIZATION, bearer);

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

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("config", &self.config)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}
