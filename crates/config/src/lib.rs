//! Configuration loading, validation, and management for tutorgate.
//!
//! Loads configuration from `~/.tutorgate/config.toml` (or an explicit path)
//! with environment variable overrides. Credentials are optional at load
//! time: a missing key is reported by `missing_credentials()` and surfaces as
//! an explicit error on the first provider call, never as a startup panic.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.tutorgate/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// OpenAI API key (`CHATGPT_API_KEY` / `OPENAI_API_KEY`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Chat and embedding model settings
    #[serde(default)]
    pub model: ModelConfig,

    /// Supabase (vector store + message log) settings
    #[serde(default)]
    pub supabase: SupabaseConfig,

    /// HTTP server settings
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Request limits and history capping
    #[serde(default)]
    pub chat: ChatConfig,

    /// Gatekeeper settings
    #[serde(default)]
    pub gate: GateConfig,

    /// Knowledge retrieval settings
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Persona and fixed reply texts
    #[serde(default)]
    pub prompt: PromptConfig,

    /// Conversation log settings
    #[serde(default)]
    pub logging: LoggingConfig,
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
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("supabase", &self.supabase)
            .field("gateway", &self.gateway)
            .field("chat", &self.chat)
            .field("gate", &self.gate)
            .field("retrieval", &self.retrieval)
            .field("prompt", &self.prompt)
            .field("logging", &self.logging)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Model used for answers
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    /// Model used for query and seed embeddings
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Sampling temperature; omitted from requests when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens per answer; omitted from requests when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_chat_model() -> String {
    "gpt-5-nano".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            chat_model: default_chat_model(),
            embedding_model: default_embedding_model(),
            temperature: None,
            max_tokens: None,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SupabaseConfig {
    /// Project URL (`SUPABASE_URL`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Service or anon key (`SUPABASE_KEY`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Postgres function performing the similarity search
    #[serde(default = "default_match_function")]
    pub match_function: String,

    /// Table holding `{content, embedding}` rows
    #[serde(default = "default_knowledge_table")]
    pub knowledge_table: String,

    /// Table holding `{conversation_id, source, message}` rows
    #[serde(default = "default_messages_table")]
    pub messages_table: String,
}

fn default_match_function() -> String {
    "match_knowledge".into()
}
fn default_knowledge_table() -> String {
    "knowledge_embeddings".into()
}
fn default_messages_table() -> String {
    "chat_messages".into()
}

impl Default for SupabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            key: None,
            match_function: default_match_function(),
            knowledge_table: default_knowledge_table(),
            messages_table: default_messages_table(),
        }
    }
}

impl std::fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .field("key", &redact(&self.key))
            .field("match_function", &self.match_function)
            .field("knowledge_table", &self.knowledge_table)
            .field("messages_table", &self.messages_table)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Allowed CORS origins. `["*"]` allows any origin.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,

    /// Requests per minute per client; 0 disables rate limiting
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: usize,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}
fn default_body_limit() -> usize {
    256 * 1024
}
fn default_rate_limit() -> usize {
    30
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            cors_origins: default_cors_origins(),
            body_limit_bytes: default_body_limit(),
            rate_limit_per_minute: default_rate_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Maximum characters in any user message
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,

    /// Most recent turns replayed to the model
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_max_message_chars() -> usize {
    250
}
fn default_history_limit() -> usize {
    10
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_message_chars: default_max_message_chars(),
            history_limit: default_history_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Top chunk score a probationary caller must reach
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,

    /// When false every caller is treated as probationary
    #[serde(default = "default_true")]
    pub trust_ratchet: bool,
}

fn default_confidence_threshold() -> f32 {
    0.25
}
fn default_true() -> bool {
    true
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            trust_ratchet: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Maximum chunks retrieved per query (at most 5)
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Inclusion floor passed to the store
    #[serde(default = "default_match_floor")]
    pub match_floor: f32,
}

fn default_top_k() -> usize {
    5
}
fn default_match_floor() -> f32 {
    0.01
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            match_floor: default_match_floor(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    #[serde(default = "default_assistant_name")]
    pub assistant_name: String,

    #[serde(default = "default_tutor_name")]
    pub tutor_name: String,

    #[serde(default = "default_contact_email")]
    pub contact_email: String,

    /// Greeting the widget shows before the first question
    #[serde(default = "default_welcome_message")]
    pub welcome_message: String,

    /// Reply sent to blocked callers, also the model's off-topic sentence
    #[serde(default = "default_rejection_message")]
    pub rejection_message: String,

    /// Sentence the model uses when the context lacks the answer
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,
}

fn default_assistant_name() -> String {
    "AI-Barney".into()
}
fn default_tutor_name() -> String {
    "Barney Evans".into()
}
fn default_contact_email() -> String {
    "ebarneytutoring@gmail.com".into()
}
fn default_welcome_message() -> String {
    "Hello! I'm AI-Barney. I can answer questions about the course syllabus, pricing, or my teaching style. Try asking: 'Do you teach A-Level?'".into()
}
fn default_rejection_message() -> String {
    "Please only ask information relevant to Barney's tutoring services, such as course details or pricing.".into()
}
fn default_fallback_message() -> String {
    "I don't have that knowledge right now, email Barney for any questions.".into()
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            assistant_name: default_assistant_name(),
            tutor_name: default_tutor_name(),
            contact_email: default_contact_email(),
            welcome_message: default_welcome_message(),
            rejection_message: default_rejection_message(),
            fallback_message: default_fallback_message(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Write user and AI turns to the conversation log
    #[serde(default = "default_true")]
    pub conversation_log: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            conversation_log: true,
        }
    }
}

impl AppConfig {
    /// Load from `path` if given, otherwise from `~/.tutorgate/config.toml`,
    /// then apply environment overrides and validate.
    ///
    /// Environment overrides:
    /// - `CHATGPT_API_KEY`, then `OPENAI_API_KEY`
    /// - `SUPABASE_URL`, `SUPABASE_KEY`
    /// - `TUTORGATE_MODEL`, `TUTORGATE_HOST`, `PORT`
    ///
    /// A missing default file means defaults; a missing explicit file is an
    /// error.
    pub fn load_with(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) if !path.exists() => {
                return Err(ConfigError::ReadError {
                    path: path.to_path_buf(),
                    reason: "file does not exist".into(),
                });
            }
            Some(path) => Self::load_from(path)?,
            None => Self::load_from(&Self::config_dir().join("config.toml"))?,
        };
        config.apply_env(|name| std::env::var(name).ok());
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

    /// Apply environment overrides using `lookup` to read variables.
    ///
    /// Credentials from the environment only fill gaps left by the file;
    /// model, host and port overrides always win.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if self.api_key.is_none() {
            self.api_key = non_empty("CHATGPT_API_KEY").or_else(|| non_empty("OPENAI_API_KEY"));
        }
        if self.supabase.url.is_none() {
            self.supabase.url = non_empty("SUPABASE_URL");
        }
        if self.supabase.key.is_none() {
            self.supabase.key = non_empty("SUPABASE_KEY");
        }

        if let Some(model) = non_empty("TUTORGATE_MODEL") {
            self.model.chat_model = model;
        }
        if let Some(host) = non_empty("TUTORGATE_HOST") {
            self.gateway.host = host;
        }
        if let Some(port) = non_empty("PORT") {
            match port.parse() {
                Ok(port) => self.gateway.port = port,
                Err(_) => tracing::warn!(value = %port, "Ignoring unparseable PORT"),
            }
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".tutorgate")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.gate.confidence_threshold) {
            return Err(ConfigError::ValidationError(
                "gate.confidence_threshold must be between 0.0 and 1.0".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.retrieval.match_floor) {
            return Err(ConfigError::ValidationError(
                "retrieval.match_floor must be between 0.0 and 1.0".into(),
            ));
        }

        if !(1..=5).contains(&self.retrieval.top_k) {
            return Err(ConfigError::ValidationError(
                "retrieval.top_k must be between 1 and 5".into(),
            ));
        }

        if self.chat.history_limit == 0 {
            return Err(ConfigError::ValidationError(
                "chat.history_limit must be at least 1".into(),
            ));
        }

        if self.chat.max_message_chars == 0 {
            return Err(ConfigError::ValidationError(
                "chat.max_message_chars must be at least 1".into(),
            ));
        }

        if let Some(t) = self.model.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigError::ValidationError(
                    "model.temperature must be between 0.0 and 2.0".into(),
                ));
            }
        }

        Ok(())
    }

    /// Names of credentials that are not set.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.api_key.is_none() {
            missing.push("CHATGPT_API_KEY");
        }
        if self.supabase.url.is_none() {
            missing.push("SUPABASE_URL");
        }
        if self.supabase.key.is_none() {
            missing.push("SUPABASE_KEY");
        }
        missing
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
            api_key: None,
            model: ModelConfig::default(),
            supabase: SupabaseConfig::default(),
            gateway: GatewayConfig::default(),
            chat: ChatConfig::default(),
            gate: GateConfig::default(),
            retrieval: RetrievalConfig::default(),
            prompt: PromptConfig::default(),
            logging: LoggingConfig::default(),
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
