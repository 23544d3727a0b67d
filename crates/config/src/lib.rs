//! Configuration loading, validation, and management for biochat.
//!
//! Loads configuration from `biochat.toml` (or the file named by
//! `BIOCHAT_CONFIG`) with environment variable overrides. Validates all
//! settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default config file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "biochat.toml";

/// The root configuration structure.
///
/// Maps directly to `biochat.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Chat completion backend and sampling
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Embedding backend
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Similarity index backend
    #[serde(default)]
    pub index: IndexConfig,

    /// HTTP surface
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Session lifetime and history limits
    #[serde(default)]
    pub session: SessionConfig,

    /// Persona selection
    #[serde(default)]
    pub persona: PersonaConfig,
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_chat_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_frequency_penalty")]
    pub frequency_penalty: f32,

    #[serde(default = "default_presence_penalty")]
    pub presence_penalty: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Prepend the persona's demonstration exchange to every prompt
    #[serde(default)]
    pub few_shot: bool,

    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_chat_model() -> String {
    "gpt-4".into()
}
fn default_temperature() -> f32 {
    0.5
}
fn default_top_p() -> f32 {
    0.9
}
fn default_frequency_penalty() -> f32 {
    0.2
}
fn default_presence_penalty() -> f32 {
    0.3
}
fn default_generation_timeout() -> u64 {
    30
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            model: default_chat_model(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            frequency_penalty: default_frequency_penalty(),
            presence_penalty: default_presence_penalty(),
            max_tokens: None,
            few_shot: false,
            timeout_secs: default_generation_timeout(),
        }
    }
}

impl std::fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("frequency_penalty", &self.frequency_penalty)
            .field("presence_penalty", &self.presence_penalty)
            .field("max_tokens", &self.max_tokens)
            .field("few_shot", &self.few_shot)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Expected vector length; a mismatch is a configuration error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,

    /// Longest accepted input, in estimated tokens
    #[serde(default = "default_max_input_tokens")]
    pub max_input_tokens: usize,

    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

fn default_embedding_model() -> String {
    "text-embedding-ada-002".into()
}
fn default_max_input_tokens() -> usize {
    8191
}
fn default_embedding_timeout() -> u64 {
    15
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dimensions: None,
            max_input_tokens: default_max_input_tokens(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

/// Which similarity index implementation to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexBackend {
    /// PostgREST `match_documents` RPC
    #[default]
    Supabase,
    /// Brute-force ranking over passages loaded from a JSON file
    Memory,
}

impl FromStr for IndexBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "supabase" => Ok(Self::Supabase),
            "memory" | "in_memory" => Ok(Self::Memory),
            other => Err(ConfigError::ValidationError(format!(
                "unknown index backend '{other}' (expected 'supabase' or 'memory')"
            ))),
        }
    }
}

impl std::fmt::Display for IndexBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Supabase => write!(f, "supabase"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default)]
    pub backend: IndexBackend,

    /// Supabase project URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Name of the similarity RPC function
    #[serde(default = "default_rpc_function")]
    pub rpc_function: String,

    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,

    #[serde(default = "default_match_count")]
    pub match_count: usize,

    /// Seed file for the in-memory backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passages_file: Option<PathBuf>,

    #[serde(default = "default_index_timeout")]
    pub timeout_secs: u64,
}

fn default_rpc_function() -> String {
    "match_documents".into()
}
fn default_match_threshold() -> f64 {
    0.5
}
fn default_match_count() -> usize {
    1
}
fn default_index_timeout() -> u64 {
    10
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: IndexBackend::default(),
            url: None,
            api_key: None,
            rpc_function: default_rpc_function(),
            match_threshold: default_match_threshold(),
            match_count: default_match_count(),
            passages_file: None,
            timeout_secs: default_index_timeout(),
        }
    }
}

impl std::fmt::Debug for IndexConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexConfig")
            .field("backend", &self.backend)
            .field("url", &self.url)
            .field("api_key", &redact(&self.api_key))
            .field("rpc_function", &self.rpc_function)
            .field("match_threshold", &self.match_threshold)
            .field("match_count", &self.match_count)
            .field("passages_file", &self.passages_file)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Exact-match CORS allow-list; empty means no cross-origin access
    #[serde(default)]
    pub allowed_origins: Vec<String>,

    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_port() -> u16 {
    3001
}
fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            allowed_origins: Vec::new(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Sessions idle longer than this are evicted
    #[serde(default = "default_idle_ttl")]
    pub idle_ttl_secs: u64,

    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Prior turns kept in the prompt
    #[serde(default = "default_max_history_turns")]
    pub max_history_turns: usize,

    /// Estimated token budget for prior turns
    #[serde(default = "default_max_history_tokens")]
    pub max_history_tokens: usize,
}

fn default_idle_ttl() -> u64 {
    1800
}
fn default_max_sessions() -> usize {
    1000
}
fn default_max_history_turns() -> usize {
    20
}
fn default_max_history_tokens() -> usize {
    3000
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: default_idle_ttl(),
            max_sessions: default_max_sessions(),
            max_history_turns: default_max_history_turns(),
            max_history_tokens: default_max_history_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    #[serde(default = "default_persona_version")]
    pub version: String,

    /// Replace the persona text entirely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_override: Option<String>,

    /// Read the persona text from a file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_file: Option<PathBuf>,

    /// Ask for the visitor's name until they share it or decline
    #[serde(default = "default_true")]
    pub ask_for_name: bool,
}

fn default_persona_version() -> String {
    "v1".into()
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            version: default_persona_version(),
            system_prompt_override: None,
            system_prompt_file: None,
            ask_for_name: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default location, then apply the
    /// process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("BIOCHAT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut config = Self::read_file(&path)?;
        config.apply_env_overrides_from(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path, without env overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Apply environment overrides using `lookup` to read variables.
    ///
    /// Blank values are ignored. Unparseable numbers are validation errors.
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("BIOCHAT_API_KEY").or_else(|| get("OPENAI_API_KEY")) {
            self.generation.api_key = Some(key);
        }
        if let Some(url) = get("BIOCHAT_API_URL") {
            self.generation.api_url = url;
        }
        if let Some(model) = get("BIOCHAT_CHAT_MODEL") {
            self.generation.model = model;
        }
        if let Some(model) = get("BIOCHAT_EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Some(v) = get("BIOCHAT_TEMPERATURE") {
            self.generation.temperature = parse_env("BIOCHAT_TEMPERATURE", &v)?;
        }
        if let Some(v) = get("BIOCHAT_TOP_P") {
            self.generation.top_p = parse_env("BIOCHAT_TOP_P", &v)?;
        }
        if let Some(v) = get("BIOCHAT_FREQUENCY_PENALTY") {
            self.generation.frequency_penalty = parse_env("BIOCHAT_FREQUENCY_PENALTY", &v)?;
        }
        if let Some(v) = get("BIOCHAT_PRESENCE_PENALTY") {
            self.generation.presence_penalty = parse_env("BIOCHAT_PRESENCE_PENALTY", &v)?;
        }
        if let Some(v) = get("BIOCHAT_FEW_SHOT") {
            self.generation.few_shot = parse_env("BIOCHAT_FEW_SHOT", &v)?;
        }

        if let Some(url) = get("SUPABASE_URL") {
            self.index.url = Some(url);
        }
        if let Some(key) = get("SUPABASE_API_KEY") {
            self.index.api_key = Some(key);
        }
        if let Some(v) = get("BIOCHAT_INDEX_BACKEND") {
            self.index.backend = v.parse()?;
        }
        if let Some(path) = get("BIOCHAT_PASSAGES_FILE") {
            self.index.passages_file = Some(PathBuf::from(path));
        }
        if let Some(v) = get("MATCH_THRESHOLD") {
            self.index.match_threshold = parse_env("MATCH_THRESHOLD", &v)?;
        }
        if let Some(v) = get("MATCH_COUNT") {
            self.index.match_count = parse_env("MATCH_COUNT", &v)?;
        }

        if let Some(v) = get("ALLOWED_ORIGINS") {
            self.gateway.allowed_origins = v
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(host) = get("HOST") {
            self.gateway.host = host;
        }
        if let Some(v) = get("PORT") {
            self.gateway.port = parse_env("PORT", &v)?;
        }

        Ok(())
    }

    /// Validate ranges and limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = &self.generation;
        check_range("generation.temperature", g.temperature, 0.0, 2.0)?;
        check_range("generation.top_p", g.top_p, 0.0, 1.0)?;
        check_range("generation.frequency_penalty", g.frequency_penalty, -2.0, 2.0)?;
        check_range("generation.presence_penalty", g.presence_penalty, -2.0, 2.0)?;

        let t = self.index.match_threshold;
        if !(-1.0..=1.0).contains(&t) {
            return Err(ConfigError::ValidationError(
                "index.match_threshold must be between -1.0 and 1.0".into(),
            ));
        }
        if self.index.match_count == 0 {
            return Err(ConfigError::ValidationError(
                "index.match_count must be at least 1".into(),
            ));
        }
        if self.embedding.dimensions == Some(0) {
            return Err(ConfigError::ValidationError(
                "embedding.dimensions must be positive when set".into(),
            ));
        }

        for (name, value) in [
            ("generation.timeout_secs", g.timeout_secs),
            ("embedding.timeout_secs", self.embedding.timeout_secs),
            ("index.timeout_secs", self.index.timeout_secs),
            ("session.idle_ttl_secs", self.session.idle_ttl_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!("{name} must be > 0")));
            }
        }

        for (name, value) in [
            ("embedding.max_input_tokens", self.embedding.max_input_tokens),
            ("session.max_sessions", self.session.max_sessions),
            ("session.max_history_turns", self.session.max_history_turns),
            ("session.max_history_tokens", self.session.max_history_tokens),
            ("gateway.body_limit_bytes", self.gateway.body_limit_bytes),
        ] {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!("{name} must be > 0")));
            }
        }

        Ok(())
    }

    /// Checks that must pass before the server accepts traffic.
    pub fn validate_for_serving(&self) -> Result<(), ConfigError> {
        self.validate()?;

        if !self.has_api_key() {
            return Err(ConfigError::ValidationError(
                "an API key is required (set OPENAI_API_KEY or BIOCHAT_API_KEY)".into(),
            ));
        }

        match self.index.backend {
            IndexBackend::Supabase => {
                if self.index.url.as_deref().is_none_or(str::is_empty) {
                    return Err(ConfigError::ValidationError(
                        "SUPABASE_URL is required for the supabase index backend".into(),
                    ));
                }
                if self.index.api_key.as_deref().is_none_or(str::is_empty) {
                    return Err(ConfigError::ValidationError(
                        "SUPABASE_API_KEY is required for the supabase index backend".into(),
                    ));
                }
            }
            IndexBackend::Memory => {
                if self.index.passages_file.is_none() {
                    return Err(ConfigError::ValidationError(
                        "index.passages_file is required for the memory index backend".into(),
                    ));
                }
            }
        }

        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        self.generation
            .api_key
            .as_deref()
            .is_some_and(|k| !k.is_empty())
    }

    /// Effective configuration as TOML with secrets removed.
    pub fn redacted_toml(&self) -> String {
        let mut config = self.clone();
        if config.generation.api_key.is_some() {
            config.generation.api_key = Some("[REDACTED]".into());
        }
        if config.index.api_key.is_some() {
            config.index.api_key = Some("[REDACTED]".into());
        }
        toml::to_string_pretty(&config).unwrap_or_default()
    }

    /// Socket address string for the HTTP listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.gateway.host, self.gateway.port)
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| {
        ConfigError::ValidationError(format!("{key} has an invalid value: '{value}'"))
    })
}

fn check_range(name: &str, value: f32, min: f32, max: f32) -> Result<(), ConfigError> {
    if !(min..=max).contains(&value) {
        return Err(ConfigError::ValidationError(format!(
            "{name} must be between {min:.1} and {max:.1}"
        )));
    }
    Ok(())
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
