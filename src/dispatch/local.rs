use reqwest::Client;
use reqwest::header::HeaderMap;
use serde::Deserialize;

use crate::config::ProviderConfig;
use crate::dispatch::{
    ErrorEnvelope, LOCAL_TIMEOUT, ProviderRequest, build_http_client, chat, finish_text,
    flat_error_message, parse_body, post_json,
};
use crate::error::ReformatError;

/// Path fragment that marks Ollama's native chat endpoint.
pub const NATIVE_CHAT_PATH: &str = "/api/chat";

const ENVELOPE: ErrorEnvelope = ErrorEnvelope {
    parse: flat_error_message,
    fallback: "Local LLM not responding. Is Ollama/LM Studio running?",
};

/// Wire shape a local endpoint speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalShape {
    /// Ollama `/api/chat`: `stream:false`, `options`, `message.content`.
    NativeChat,
    /// OpenAI-compatible chat completions (LM Studio, llama.cpp, Ollama `/v1`).
    OpenAiCompatible,
}

impl LocalShape {
    /// Decided from the endpoint path, not the provider kind: the same kind
    /// can point at either shape.
    pub fn for_endpoint(endpoint: &str) -> Self {
        let path = reqwest::Url::parse(endpoint)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| endpoint.to_string());
        if path.contains(NATIVE_CHAT_PATH) {
            Self::NativeChat
        } else {
            Self::OpenAiCompatible
        }
    }
}

#[derive(Deserialize)]
struct NativeResponse {
    message: Option<NativeMessage>,
}

#[derive(Deserialize)]
struct NativeMessage {
    content: Option<String>,
}

pub fn native_request_body(config: &ProviderConfig, req: &ProviderRequest) -> serde_json::Value {
    serde_json::json!({
        "model": config.model,
        "messages": [
            {"role": "system", "content": req.system_prompt},
            {"role": "user", "content": req.prompt},
        ],
        "stream": false,
        "options": {
            "num_predict": config.max_tokens,
            "temperature": config.temperature,
        },
    })
}

/// Extract `message.content`.
pub fn parse_native_response(bytes: &[u8]) -> Result<String, ReformatError> {
    let response: NativeResponse = parse_body(bytes)?;
    finish_text(
        response.message.and_then(|m| m.content),
        "message.content",
    )
}

/// Credential-free backend for models served on the local machine.
#[derive(Debug)]
pub struct LocalClient {
    http: Client,
    config: ProviderConfig,
}

impl LocalClient {
    pub fn new(config: ProviderConfig) -> Result<Self, ReformatError> {
        Ok(Self {
            http: build_http_client(LOCAL_TIMEOUT)?,
            config,
        })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn shape(&self) -> LocalShape {
        LocalShape::for_endpoint(&self.config.endpoint)
    }

    pub async fn send(&self, req: &ProviderRequest) -> Result<String, ReformatError> {
        let shape = self.shape();
        let body = match shape {
            LocalShape::NativeChat => native_request_body(&self.config, req),
            LocalShape::OpenAiCompatible => chat::request_body(&self.config, req),
        };

        let bytes = post_json(
            &self.http,
            &self.config.endpoint,
            HeaderMap::new(),
            &body,
            self.config.kind.as_str(),
            &ENVELOPE,
        )
        .await?;

        match shape {
            LocalShape::NativeChat => parse_native_response(&bytes),
            LocalShape::OpenAiCompatible => chat::parse_response(&bytes),
        }
    }
}
