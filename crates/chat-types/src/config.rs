use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{ChatError, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub retry: RetryConfig,
    pub session: SessionConfig,
    pub retrieval: RetrievalConfig,
    pub artifact: ArtifactConfig,
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ChatError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Apply `CHAT_*` environment variables on top of file values.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(key) = lookup("CHAT_API_KEY") {
            self.llm.api_key = key;
        }
        if let Some(model) = lookup("CHAT_MODEL") {
            self.llm.model = model;
        }
        if let Some(base) = lookup("CHAT_API_BASE") {
            self.llm.api_base = Some(base);
        }
        if let Some(dir) = lookup("CHAT_STORAGE_DIR") {
            self.storage.dir = Some(PathBuf::from(dir));
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(ChatError::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ChatError::Config(
                "retry.base_delay_ms must not exceed retry.max_delay_ms".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter_ratio) {
            return Err(ChatError::Config("retry.jitter_ratio must be within 0..=1".into()));
        }
        if self.retrieval.top_k == 0 {
            return Err(ChatError::Config("retrieval.top_k must be at least 1".into()));
        }
        if self.retrieval.chunk_overlap >= self.retrieval.chunk_size {
            return Err(ChatError::Config(
                "retrieval.chunk_overlap must be smaller than retrieval.chunk_size".into(),
            ));
        }
        if self.session.max_message_chars == 0 {
            return Err(ChatError::Config("session.max_message_chars must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub api_key: String,
    pub api_base: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::HuggingFace,
            model: "microsoft/Phi-3.5-mini-instruct".to_string(),
            api_key: String::new(),
            api_base: None,
            max_tokens: 1024,
            temperature: 0.7,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LlmProvider {
    OpenAI,
    DeepSeek,
    HuggingFace,
    Custom,
}

impl LlmProvider {
    pub fn default_base_url(&self) -> &str {
        match self {
            LlmProvider::OpenAI => "https://api.openai.com/v1",
            LlmProvider::DeepSeek => "https://api.deepseek.com/v1",
            LlmProvider::HuggingFace => "https://router.huggingface.co/v1",
            LlmProvider::Custom => "",
        }
    }

    pub fn label(&self) -> &str {
        match self {
            LlmProvider::OpenAI => "OpenAI",
            LlmProvider::DeepSeek => "DeepSeek",
            LlmProvider::HuggingFace => "HuggingFace",
            LlmProvider::Custom => "Custom",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Upper bound of the random extra delay, as a fraction of the backoff
    pub jitter_ratio: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 1_000,
            max_delay_ms: 8_000,
            jitter_ratio: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Sessions older than this are reported as expired
    pub ttl_secs: Option<u64>,
    /// The append that reaches this many turns expires the session
    pub max_turns: Option<usize>,
    pub max_message_chars: usize,
    /// Replay only the most recent N history entries into the prompt
    pub history_window: Option<usize>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: None,
            max_turns: None,
            max_message_chars: 5_000,
            history_window: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub enabled: bool,
    pub top_k: usize,
    pub timeout_ms: u64,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            top_k: 5,
            timeout_ms: 2_000,
            chunk_size: 500,
            chunk_overlap: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    pub fetch_timeout_secs: u64,
    pub max_image_bytes: u64,
    pub max_csv_bytes: u64,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 30,
            max_image_bytes: 10 * 1024 * 1024,
            max_csv_bytes: 50 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackendType,
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageBackendType {
    /// File storage when a directory is configured, memory otherwise
    #[default]
    Auto,
    Memory,
    File,
}

