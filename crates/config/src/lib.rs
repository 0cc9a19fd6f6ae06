//! Configuration loading, validation, and management for kazpaGPT.
//!
//! Loads configuration from `~/.kazpagpt/config.toml` (or an explicit path)
//! with environment variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.kazpagpt/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model requested from the provider
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per reply
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Upper bound on one outbound completion call, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// How many of the most recent transcript messages are forwarded
    #[serde(default = "default_max_history_messages")]
    pub max_history_messages: usize,

    /// LLM provider endpoint and credential
    #[serde(default)]
    pub provider: ProviderConfig,

    /// HTTP gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Knowledge directory, chunking and retrieval settings
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Assistant persona
    #[serde(default)]
    pub assistant: AssistantConfig,
}

fn default_model() -> String {
    "gpt-4.1-mini".into()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_request_timeout_secs() -> u64 {
    45
}
fn default_max_history_messages() -> usize {
    40
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_history_messages", &self.max_history_messages)
            .field("provider", &self.provider)
            .field("gateway", &self.gateway)
            .field("knowledge", &self.knowledge)
            .field("assistant", &self.assistant)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_name")]
    pub name: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_provider_name() -> String {
    "openai".into()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            base_url: default_base_url(),
            api_key: None,
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Origins allowed to call the API from a browser. Empty = same-origin only.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_port() -> u16 {
    3000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:3000".into()]
}
fn default_max_body_bytes() -> usize {
    1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            allowed_origins: default_allowed_origins(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Where knowledge lives on disk and how it is chunked and ranked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Root of the knowledge tree
    #[serde(default = "default_knowledge_dir")]
    pub dir: PathBuf,

    /// Canon directory, relative to `dir` unless absolute
    #[serde(default = "default_canon_dir")]
    pub canon_dir: PathBuf,

    /// Canon files in precedence order (later files win on conflicts)
    #[serde(default = "default_canon_files")]
    pub canon_files: Vec<String>,

    /// File extensions (without dot) that are indexed
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// "paragraph" or "sliding_window"
    #[serde(default = "default_strategy")]
    pub strategy: String,

    /// Paragraph strategy: maximum chunk length in characters
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,

    /// Sliding-window strategy: window length in characters
    #[serde(default = "default_window_chars")]
    pub window_chars: usize,

    /// Sliding-window strategy: overlap between consecutive windows
    #[serde(default = "default_window_overlap")]
    pub window_overlap: usize,

    /// Sliding-window strategy: safety cap on windows per file
    #[serde(default = "default_max_chunks_per_file")]
    pub max_chunks_per_file: usize,

    /// Seconds before the in-memory snapshot is rebuilt from disk
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Maximum snippets injected per request
    #[serde(default = "default_max_snippets")]
    pub max_snippets: usize,

    /// Maximum total characters of injected snippets
    #[serde(default = "default_char_budget")]
    pub char_budget: usize,

    /// Query tokens considered when scoring
    #[serde(default = "default_max_query_tokens")]
    pub max_query_tokens: usize,

    /// Terms worth +2 when present in both query and chunk
    #[serde(default = "default_bonus_terms")]
    pub bonus_terms: Vec<String>,

    /// +3 when the whole query appears verbatim in a chunk
    #[serde(default = "default_true")]
    pub phrase_bonus: bool,
}

fn default_knowledge_dir() -> PathBuf {
    PathBuf::from("knowledge")
}
fn default_canon_dir() -> PathBuf {
    PathBuf::from("canon")
}
fn default_canon_files() -> Vec<String> {
    ["identity.md", "language.md", "products.md", "risk.md", "brokers.md"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_extensions() -> Vec<String> {
    ["txt", "md", "markdown"].into_iter().map(String::from).collect()
}
fn default_strategy() -> String {
    "paragraph".into()
}
fn default_max_chunk_chars() -> usize {
    1200
}
fn default_window_chars() -> usize {
    900
}
fn default_window_overlap() -> usize {
    150
}
fn default_max_chunks_per_file() -> usize {
    2000
}
fn default_cache_ttl_secs() -> u64 {
    60
}
fn default_max_snippets() -> usize {
    12
}
fn default_char_budget() -> usize {
    8000
}
fn default_max_query_tokens() -> usize {
    60
}
fn default_bonus_terms() -> Vec<String> {
    [
        "mt5",
        "mql5",
        "experts",
        "advisors",
        "autotrading",
        "vistax",
        "vistaone",
        "vista",
        "vps",
        "license",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            dir: default_knowledge_dir(),
            canon_dir: default_canon_dir(),
            canon_files: default_canon_files(),
            extensions: default_extensions(),
            strategy: default_strategy(),
            max_chunk_chars: default_max_chunk_chars(),
            window_chars: default_window_chars(),
            window_overlap: default_window_overlap(),
            max_chunks_per_file: default_max_chunks_per_file(),
            cache_ttl_secs: default_cache_ttl_secs(),
            max_snippets: default_max_snippets(),
            char_budget: default_char_budget(),
            max_query_tokens: default_max_query_tokens(),
            bonus_terms: default_bonus_terms(),
            phrase_bonus: true,
        }
    }
}

impl KnowledgeConfig {
    /// Absolute-or-relative canon directory resolved against `dir`.
    pub fn resolved_canon_dir(&self) -> PathBuf {
        if self.canon_dir.is_absolute() {
            self.canon_dir.clone()
        } else {
            self.dir.join(&self.canon_dir)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    #[serde(default = "default_assistant_name")]
    pub name: String,

    /// Replace the built-in brand rules with the contents of this file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_file: Option<PathBuf>,
}

fn default_assistant_name() -> String {
    "kazpaGPT".into()
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            name: default_assistant_name(),
            rules_file: None,
        }
    }
}

const KNOWN_STRATEGIES: [&str; 2] = ["paragraph", "sliding_window"];

impl AppConfig {
    /// Load configuration from the default path (~/.kazpagpt/config.toml).
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path)
    }

    /// Load configuration from `path`, then apply environment overrides.
    ///
    /// API key lookup order when the file does not set one:
    /// - `KAZPA_API_KEY`
    /// - `OPENAI_API_KEY`
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;

        if config.provider.api_key.is_none() {
            config.provider.api_key = std::env::var("KAZPA_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                .filter(|k| !k.trim().is_empty());
        }

        if let Ok(model) = std::env::var("KAZPA_MODEL") {
            config.model = model;
        }

        if let Ok(dir) = std::env::var("KAZPA_KNOWLEDGE_DIR") {
            config.knowledge.dir = PathBuf::from(dir);
        }

        if let Ok(port) = std::env::var("KAZPA_PORT") {
            config.gateway.port = port.parse().map_err(|_| {
                ConfigError::ValidationError(format!("KAZPA_PORT is not a valid port: {port}"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".kazpagpt")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "request_timeout_secs must be > 0".into(),
            ));
        }

        if self.max_history_messages == 0 {
            return Err(ConfigError::ValidationError(
                "max_history_messages must be > 0".into(),
            ));
        }

        let k = &self.knowledge;
        if !KNOWN_STRATEGIES.contains(&k.strategy.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "knowledge.strategy must be one of {KNOWN_STRATEGIES:?}, got '{}'",
                k.strategy
            )));
        }
        if k.max_chunk_chars == 0 || k.window_chars == 0 {
            return Err(ConfigError::ValidationError(
                "knowledge chunk sizes must be > 0".into(),
            ));
        }
        if k.window_overlap >= k.window_chars {
            return Err(ConfigError::ValidationError(
                "knowledge.window_overlap must be smaller than knowledge.window_chars".into(),
            ));
        }
        if k.max_chunks_per_file == 0 {
            return Err(ConfigError::ValidationError(
                "knowledge.max_chunks_per_file must be > 0".into(),
            ));
        }
        if k.max_snippets == 0 || k.char_budget == 0 {
            return Err(ConfigError::ValidationError(
                "knowledge.max_snippets and knowledge.char_budget must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.provider.api_key.is_some()
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
            max_history_messages: default_max_history_messages(),
            provider: ProviderConfig::default(),
            gateway: GatewayConfig::default(),
            knowledge: KnowledgeConfig::default(),
            assistant: AssistantConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
