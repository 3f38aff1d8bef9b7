use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReformatError {
    #[error("no provider configured")]
    NotConfigured,

    #[error("missing API key for {provider}")]
    InvalidApiKey { provider: String },

    #[error("request failed with status {status}: {message}")]
    RequestFailed { status: u16, message: String },

    #[error("invalid response: {detail}")]
    InvalidResponse { detail: String },

    #[error("rate limited by {provider}")]
    RateLimited { provider: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// `detail` names a missing or failing desktop tool when that is the cause.
    #[error("accessibility permission not granted")]
    NoPermission { detail: Option<String> },

    #[error("clipboard was empty after copy")]
    Empty,

    #[error("clipboard did not change after copy")]
    Timeout,

    #[error("replace failed: {0}")]
    ReplaceFailed(String),

    #[error("no mode selected")]
    NoMode,

    #[error("nothing to revert")]
    NothingToRevert,
}

/// Coarse classification of a [`ReformatError`], stable across variants'
/// payloads. The notification layer keys icons and hold times off this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotConfigured,
    InvalidApiKey,
    RequestFailed,
    InvalidResponse,
    RateLimited,
    Network,
    NoPermission,
    Empty,
    Timeout,
    ReplaceFailed,
    NoMode,
    NothingToRevert,
}

impl ReformatError {
    pub fn invalid_response(detail: impl Into<String>) -> Self {
        Self::InvalidResponse {
            detail: detail.into(),
        }
    }

    pub fn no_permission() -> Self {
        Self::NoPermission { detail: None }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotConfigured => ErrorKind::NotConfigured,
            Self::InvalidApiKey { .. } => ErrorKind::InvalidApiKey,
            Self::RequestFailed { .. } => ErrorKind::RequestFailed,
            Self::InvalidResponse { .. } => ErrorKind::InvalidResponse,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Network(_) => ErrorKind::Network,
            Self::NoPermission { .. } => ErrorKind::NoPermission,
            Self::Empty => ErrorKind::Empty,
            Self::Timeout => ErrorKind::Timeout,
            Self::ReplaceFailed(_) => ErrorKind::ReplaceFailed,
            Self::NoMode => ErrorKind::NoMode,
            Self::NothingToRevert => ErrorKind::NothingToRevert,
        }
    }

    /// True for failures raised by the provider layer (as opposed to the
    /// capture/replace layer or the orchestrator itself).
    pub fn is_provider_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::NotConfigured
                | ErrorKind::InvalidApiKey
                | ErrorKind::RequestFailed
                | ErrorKind::InvalidResponse
                | ErrorKind::RateLimited
                | ErrorKind::Network
        )
    }

    /// The one message shown to the user for this failure.
    /// Never includes credentials or request bodies.
    pub fn user_message(&self) -> String {
        match self {
            Self::NotConfigured => {
                "LLM service not configured. Please set up your API key in Settings.".to_string()
            }
            Self::InvalidApiKey { .. } => {
                "Invalid API key. Please check your API key in Settings.".to_string()
            }
            Self::RequestFailed { status, message } => {
                format!("Request failed ({status}): {message}")
            }
            Self::InvalidResponse { detail } => {
                if detail.trim().is_empty() {
                    "Invalid response from API.".to_string()
                } else {
                    format!("Invalid response from API: {detail}")
                }
            }
            Self::RateLimited { .. } => "Rate limited. Please try again later.".to_string(),
            Self::Network(e) => format!("Network error: {}", network_cause(e)),
            Self::NoPermission { detail: None } => "Accessibility permissions required. \
                 Please grant input and clipboard access to this application."
                .to_string(),
            Self::NoPermission {
                detail: Some(detail),
            } => format!("Clipboard access unavailable: {detail}"),
            Self::Empty => "No text was captured. Please select some text first.".to_string(),
            Self::Timeout => "Clipboard operation timed out. Please try again.".to_string(),
            Self::ReplaceFailed(_) => "Failed to replace text.".to_string(),
            Self::NoMode => "No mode selected".to_string(),
            Self::NothingToRevert => "Nothing to revert".to_string(),
        }
    }
}

/// Describe a transport failure without echoing the request URL, which may
/// carry a user-supplied host with credentials in it.
fn network_cause(e: &reqwest::Error) -> String {
    let kind = if e.is_timeout() {
        "request timed out"
    } else if e.is_connect() {
        "could not connect to server"
    } else if e.is_body() || e.is_decode() {
        "failed to read response"
    } else {
        "request failed"
    };
    let source = std::error::Error::source(e)
        .map(|s| s.to_string())
        .unwrap_or_default();
    if source.is_empty() {
        kind.to_string()
    } else {
        format!("{kind} ({source})")
    }
}
