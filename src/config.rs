use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::modes::Mode;
use crate::prompt::{Abbreviation, NameEntry};

/// Bounds for provider sampling parameters.
pub const MAX_TOKENS_LIMIT: u32 = 32_768;
pub const MAX_TEMPERATURE: f64 = 2.0;

/// Bounds for multi-candidate generation.
pub const MIN_VERSIONS: usize = 2;
pub const MAX_VERSIONS: usize = 5;

/// Backend family a [`ProviderConfig`] talks to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    #[serde(alias = "open_ai")]
    OpenAi,
    Anthropic,
    Ollama,
    #[serde(alias = "lm_studio", alias = "lm-studio")]
    LmStudio,
    Custom,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 5] = [
        Self::OpenAi,
        Self::Anthropic,
        Self::Ollama,
        Self::LmStudio,
        Self::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Ollama => "ollama",
            Self::LmStudio => "lmstudio",
            Self::Custom => "custom",
        }
    }

    /// Endpoint used when the configured one is empty or malformed.
    /// Custom has no default; an empty endpoint leaves it unconfigured.
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1/chat/completions",
            Self::Anthropic => "https://api.anthropic.com/v1/messages",
            Self::Ollama => "http://localhost:11434/api/chat",
            Self::LmStudio => "http://localhost:1234/v1/chat/completions",
            Self::Custom => "",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::Anthropic => "claude-3-5-sonnet-20241022",
            Self::Ollama => "llama3.2",
            Self::LmStudio => "local-model",
            Self::Custom => "",
        }
    }

    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::OpenAi | Self::Anthropic | Self::Custom)
    }

    /// Environment variable the credential store reads for this kind.
    pub fn api_key_var(&self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some("OPENAI_API_KEY"),
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::Custom => Some("REWORD_CUSTOM_API_KEY"),
            Self::Ollama | Self::LmStudio => None,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        let kind = ProviderKind::OpenAi;
        Self {
            kind,
            endpoint: kind.default_endpoint().to_string(),
            model: kind.default_model().to_string(),
            max_tokens: 2048,
            temperature: 0.7,
        }
    }
}

impl ProviderConfig {
    /// Normalize a configuration so it is always usable.
    ///
    /// Never fails: an empty or malformed endpoint becomes the kind's default,
    /// an empty model becomes the kind's default, and sampling parameters are
    /// clamped into range.
    pub fn validate(mut self) -> Self {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() || !is_valid_endpoint(endpoint) {
            if !endpoint.is_empty() {
                tracing::warn!(
                    kind = %self.kind,
                    endpoint,
                    "invalid endpoint URL, using provider default"
                );
            }
            self.endpoint = self.kind.default_endpoint().to_string();
        } else {
            self.endpoint = endpoint.to_string();
        }

        let model = self.model.trim();
        if model.is_empty() {
            self.model = self.kind.default_model().to_string();
        } else {
            self.model = model.to_string();
        }

        self.max_tokens = self.max_tokens.clamp(1, MAX_TOKENS_LIMIT);
        self.temperature = if self.temperature.is_finite() {
            self.temperature.clamp(0.0, MAX_TEMPERATURE)
        } else {
            ProviderConfig::default().temperature
        };

        self
    }

    /// Switch to another backend family. Endpoint and model are reset to
    /// the new kind's defaults; sampling parameters carry over.
    pub fn switch_kind(&mut self, kind: ProviderKind) {
        self.kind = kind;
        self.endpoint = kind.default_endpoint().to_string();
        self.model = kind.default_model().to_string();
    }
}

/// Absolute http(s) URL with a host.
pub fn is_valid_endpoint(endpoint: &str) -> bool {
    reqwest::Url::parse(endpoint)
        .is_ok_and(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
}

/// Multi-candidate generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionsConfig {
    pub enabled: bool,
    pub count: usize,
}

impl Default for VersionsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            count: 3,
        }
    }
}

impl VersionsConfig {
    /// Number of candidates a cycle generates: 1 when disabled, otherwise
    /// `count` clamped to `[MIN_VERSIONS, MAX_VERSIONS]`.
    pub fn candidate_count(&self) -> usize {
        if self.enabled {
            self.count.clamp(MIN_VERSIONS, MAX_VERSIONS)
        } else {
            1
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    pub abbreviations: Vec<Abbreviation>,
    pub names: Vec<NameEntry>,
}

/// Delays used by the capture/replace protocol, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub settle_ms: u64,
    pub poll_interval_ms: u64,
    pub poll_attempts: u32,
    pub paste_settle_ms: u64,
    pub error_hold_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            settle_ms: 50,
            poll_interval_ms: 100,
            poll_attempts: 30,
            paste_settle_ms: 100,
            error_hold_ms: 3000,
        }
    }
}

impl TimingConfig {
    pub fn error_hold(&self) -> Duration {
        Duration::from_millis(self.error_hold_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub versions: VersionsConfig,
    pub knowledge: KnowledgeConfig,
    /// Custom mode list. Empty means the built-in modes.
    pub modes: Vec<Mode>,
    pub timing: TimingConfig,
}

impl Config {
    pub fn validate(mut self) -> Self {
        self.provider = self.provider.validate();
        self.versions.count = self.versions.count.clamp(MIN_VERSIONS, MAX_VERSIONS);
        self.timing.poll_attempts = self.timing.poll_attempts.max(1);
        self
    }
}

/// TOML-backed configuration persistence.
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$REWORD_CONFIG`, else `<config dir>/reword/config.toml`.
    pub fn from_env() -> Self {
        let path = env::var_os("REWORD_CONFIG")
            .map(PathBuf::from)
            .or_else(|| dirs::config_dir().map(|d| d.join("reword").join("config.toml")))
            .unwrap_or_else(|| PathBuf::from("reword.toml"));
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the saved configuration, or defaults when there is none.
    /// A malformed file is logged and ignored rather than treated as fatal.
    pub fn load(&self) -> Config {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "no config file, using defaults");
                return Config::default().validate();
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "failed to read config: {e}");
                return Config::default().validate();
            }
        };

        match toml::from_str::<Config>(&raw) {
            Ok(config) => config.validate(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "failed to parse config: {e}");
                Config::default().validate()
            }
        }
    }

    /// Persist the configuration. Callers treat failure as non-fatal.
    pub fn save(&self, config: &Config) -> std::io::Result<()> {
        let text = toml::to_string_pretty(config).map_err(std::io::Error::other)?;
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir)?;
        }

        // Atomic write: temp file + rename prevents partial reads
        let tmp_path = self.path.with_extension("toml.tmp");
        std::fs::write(&tmp_path, text.as_bytes())?;
        if let Err(e) = std::fs::rename(&tmp_path, &self.path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(e);
        }
        Ok(())
    }
}

/// API keys per provider kind: process environment plus in-memory overrides.
#[derive(Default)]
pub struct CredentialStore {
    from_env: bool,
    overrides: Mutex<HashMap<ProviderKind, String>>,
}

impl CredentialStore {
    /// Store with no backing environment (only `set` values are visible).
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that falls back to `OPENAI_API_KEY`, `ANTHROPIC_API_KEY` and
    /// `REWORD_CUSTOM_API_KEY`.
    pub fn from_env() -> Self {
        Self {
            from_env: true,
            overrides: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, kind: ProviderKind) -> Option<String> {
        let overridden = self
            .overrides
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&kind)
            .cloned();
        overridden
            .or_else(|| {
                if !self.from_env {
                    return None;
                }
                kind.api_key_var().and_then(|var| env::var(var).ok())
            })
            .filter(|k| !k.trim().is_empty())
    }

    pub fn set(&self, kind: ProviderKind, secret: impl Into<String>) {
        self.overrides
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(kind, secret.into());
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<ProviderKind> = ProviderKind::ALL
            .into_iter()
            .filter(|k| self.get(*k).is_some())
            .collect();
        f.debug_struct("CredentialStore")
            .field("configured", &kinds)
            .field("secrets", &"[REDACTED]")
            .finish()
    }
}
