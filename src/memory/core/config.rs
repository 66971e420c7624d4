//! Configuration for the assistant and its memory subsystem.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::memory::core::errors::{MemoryError, MemoryResult};

/// Environment variable naming an optional JSON configuration file.
pub const CONFIG_PATH_ENV: &str = "ASSISTANT_CONFIG";

/// Top-level configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Storage settings.
    pub storage: StorageConfig,
    /// Conversation retention settings.
    pub retention: RetentionConfig,
    /// Prompt history settings.
    pub history: HistoryConfig,
    /// Sampling for chat replies.
    pub chat: SamplingConfig,
    /// Sampling for fact extraction.
    pub extractor: SamplingConfig,
    /// Sampling for autocomplete suggestions.
    pub autocomplete: SamplingConfig,
    /// Conversation title settings.
    pub titles: TitleConfig,
    /// Generation service settings.
    pub llm: LlmConfig,
    /// HTTP server settings.
    pub server: ServerConfig,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            retention: RetentionConfig::default(),
            history: HistoryConfig::default(),
            chat: SamplingConfig::chat(),
            extractor: SamplingConfig::extraction(),
            autocomplete: SamplingConfig::autocomplete(),
            titles: TitleConfig::default(),
            llm: LlmConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl AssistantConfig {
    /// Build the configuration from defaults, the optional file named by
    /// `ASSISTANT_CONFIG`, then environment overrides.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> MemoryResult<Self> {
        let base = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        let config = base.with_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file. Missing sections keep their defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn from_file(path: impl AsRef<Path>) -> MemoryResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Apply `ASSISTANT_*` overrides resolved through `lookup`.
    ///
    /// # Errors
    /// Returns an error if a numeric override cannot be parsed.
    pub fn with_overrides<F>(mut self, lookup: F) -> MemoryResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("ASSISTANT_DB_PATH") {
            self.storage.sqlite_path = PathBuf::from(path);
        }
        if let Some(base_url) = lookup("ASSISTANT_OLLAMA_URL") {
            self.llm.base_url = base_url;
        }
        if let Some(model) = lookup("ASSISTANT_MODEL") {
            self.llm.model = model;
        }
        if let Some(port) = lookup("ASSISTANT_PORT") {
            self.server.port = parse_override("ASSISTANT_PORT", &port)?;
        }
        if let Some(max) = lookup("ASSISTANT_MAX_CONVERSATIONS") {
            self.retention.max_conversations = parse_override("ASSISTANT_MAX_CONVERSATIONS", &max)?;
        }
        if let Some(limit) = lookup("ASSISTANT_HISTORY_LIMIT") {
            self.history.limit = parse_override("ASSISTANT_HISTORY_LIMIT", &limit)?;
        }
        if let Some(origins) = lookup("ASSISTANT_ALLOWED_ORIGINS") {
            self.server.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect();
        }
        Ok(self)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> MemoryResult<()> {
        if self.retention.max_conversations == 0 {
            return Err(MemoryError::InvalidConfig(
                "retention.max_conversations must be > 0".to_string(),
            ));
        }

        if self.history.limit == 0 {
            return Err(MemoryError::InvalidConfig(
                "history.limit must be > 0".to_string(),
            ));
        }

        if self.titles.max_chars == 0 {
            return Err(MemoryError::InvalidConfig(
                "titles.max_chars must be > 0".to_string(),
            ));
        }

        if self.llm.model.trim().is_empty() {
            return Err(MemoryError::InvalidConfig(
                "llm.model must not be empty".to_string(),
            ));
        }

        if self.llm.timeout_seconds == 0 {
            return Err(MemoryError::InvalidConfig(
                "llm.timeout_seconds must be > 0".to_string(),
            ));
        }

        for (name, sampling) in [
            ("chat", &self.chat),
            ("extractor", &self.extractor),
            ("autocomplete", &self.autocomplete),
        ] {
            sampling.validate(name)?;
        }

        Url::parse(&self.llm.base_url)?;

        for origin in &self.server.allowed_origins {
            let url = Url::parse(origin)?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(MemoryError::InvalidConfig(format!(
                    "server.allowed_origins entry is not an http(s) origin: {origin}"
                )));
            }
        }

        Ok(())
    }
}

fn parse_override<T: std::str::FromStr>(name: &str, value: &str) -> MemoryResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| MemoryError::InvalidConfig(format!("{name} is not a valid number: {value}")))
}

/// Storage configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// `SQLite` database path.
    pub sqlite_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("chat_memory.db"),
        }
    }
}

/// Conversation retention settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Hard cap on stored conversations, enforced when one is created.
    pub max_conversations: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_conversations: 5,
        }
    }
}

/// Prompt history settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Number of most recent messages rendered into the prompt.
    pub limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { limit: 30 }
    }
}

/// Sampling parameters for one generation call.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Temperature for generation.
    pub temperature: f64,
    /// Token budget.
    pub max_tokens: u32,
}

impl SamplingConfig {
    /// Build sampling parameters.
    #[must_use]
    pub const fn new(temperature: f64, max_tokens: u32) -> Self {
        Self {
            temperature,
            max_tokens,
        }
    }

    /// Sampling used for chat replies.
    #[must_use]
    pub const fn chat() -> Self {
        Self::new(0.7, 2048)
    }

    /// Sampling used for fact extraction.
    #[must_use]
    pub const fn extraction() -> Self {
        Self::new(0.2, 32)
    }

    /// Sampling used for autocomplete.
    #[must_use]
    pub const fn autocomplete() -> Self {
        Self::new(0.3, 12)
    }

    fn validate(&self, section: &str) -> MemoryResult<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(MemoryError::InvalidConfig(format!(
                "{section}.temperature must be within 0.0..=2.0"
            )));
        }
        if self.max_tokens == 0 {
            return Err(MemoryError::InvalidConfig(format!(
                "{section}.max_tokens must be > 0"
            )));
        }
        Ok(())
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self::chat()
    }
}

/// Conversation title settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleConfig {
    /// Characters of the first utterance kept as the title.
    pub max_chars: usize,
}

impl Default for TitleConfig {
    fn default() -> Self {
        Self { max_chars: 30 }
    }
}

/// Generation service settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama completion model name.
    pub model: String,
    /// Ollama base URL.
    pub base_url: String,
    /// Transport timeout for one generation request.
    pub timeout_seconds: u64,
    /// How long Ollama keeps the model loaded after a request.
    pub keep_alive: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "mistral:7b-instruct-q8_0".to_string(),
            base_url: "http://127.0.0.1:11434".to_string(),
            timeout_seconds: 60,
            keep_alive: "1h".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listening port.
    pub port: u16,
    /// Browser origins allowed to call the API cross-origin. Empty means
    /// same-origin only.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            allowed_origins: Vec::new(),
        }
    }
}
