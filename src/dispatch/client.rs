use crate::config::{CredentialStore, ProviderConfig, ProviderKind};
use crate::dispatch::ProviderRequest;
use crate::dispatch::chat::ChatClient;
use crate::dispatch::local::LocalClient;
use crate::dispatch::messages::MessagesClient;
use crate::error::ReformatError;

/// One configured backend. The variant set is closed: every provider kind
/// maps onto one of these three wire families.
#[derive(Debug)]
pub enum ProviderClient {
    ChatCompletions(ChatClient),
    Messages(MessagesClient),
    Local(LocalClient),
}

impl ProviderClient {
    /// Build a client for `config`, reading the credential once.
    ///
    /// The config is validated first. A config that still has no endpoint or
    /// model afterwards (a blank custom provider) is `NotConfigured`. A
    /// missing API key is not an error here; `send` reports it before any
    /// network call.
    pub fn from_config(
        config: ProviderConfig,
        credentials: &CredentialStore,
    ) -> Result<Self, ReformatError> {
        let config = config.validate();
        if config.endpoint.is_empty() || config.model.is_empty() {
            return Err(ReformatError::NotConfigured);
        }

        let client = match config.kind {
            ProviderKind::OpenAi | ProviderKind::Custom => {
                let key = credentials.get(config.kind);
                Self::ChatCompletions(ChatClient::new(config, key)?)
            }
            ProviderKind::Anthropic => {
                let key = credentials.get(config.kind);
                Self::Messages(MessagesClient::new(config, key)?)
            }
            ProviderKind::Ollama | ProviderKind::LmStudio => Self::Local(LocalClient::new(config)?),
        };

        tracing::info!(
            provider = %client.config().kind,
            model = %client.config().model,
            wire = client.wire_name(),
            "provider configured"
        );
        Ok(client)
    }

    pub fn config(&self) -> &ProviderConfig {
        match self {
            Self::ChatCompletions(c) => c.config(),
            Self::Messages(c) => c.config(),
            Self::Local(c) => c.config(),
        }
    }

    /// Wire family name for logs.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::ChatCompletions(_) => "chat_completions",
            Self::Messages(_) => "messages",
            Self::Local(_) => "local",
        }
    }

    /// Send one rewrite request and return the trimmed model output.
    pub async fn send(&self, req: &ProviderRequest) -> Result<String, ReformatError> {
        let result = match self {
            Self::ChatCompletions(c) => c.send(req).await,
            Self::Messages(c) => c.send(req).await,
            Self::Local(c) => c.send(req).await,
        };
        if let Err(ref e) = result {
            tracing::debug!(provider = %self.config().kind, "provider call failed: {e}");
        }
        result
    }
}
