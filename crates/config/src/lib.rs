//! Configuration loading, validation, and management for colloquy.
//!
//! Loads configuration from `~/.colloquy/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.colloquy/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-backend)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default chat backend
    #[serde(default = "default_backend")]
    pub default_backend: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Conversation settings
    #[serde(default)]
    pub session: SessionConfig,

    /// Provider retry settings
    #[serde(default)]
    pub retry: RetryConfig,

    /// Command execution settings
    #[serde(default)]
    pub commands: CommandsConfig,

    /// Backend-specific configurations
    #[serde(default)]
    pub backends: HashMap<String, BackendConfig>,
}

fn default_backend() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
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
            .field("default_backend", &self.default_backend)
            .field("default_model", &self.default_model)
            .field("session", &self.session)
            .field("retry", &self.retry)
            .field("commands", &self.commands)
            .field("backends", &self.backends)
            .finish()
    }
}

/// Settings for a single conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Token budget for the context window sent to the backend
    #[serde(default = "default_context_budget")]
    pub context_budget: usize,

    /// Max provider rounds per user request before the turn aborts
    #[serde(default = "default_round_limit")]
    pub round_limit: usize,

    /// Override the built-in persona text in the system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,
}

fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_context_budget() -> usize {
    6144
}
fn default_round_limit() -> usize {
    8
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            context_budget: default_context_budget(),
            round_limit: default_round_limit(),
            persona: None,
        }
    }
}

/// Bounded retry with backoff for transient provider failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt (0 disables retrying)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff delay, doubled per attempt
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    2
}
fn default_base_delay_ms() -> u64 {
    500
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

/// Command execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandsConfig {
    /// Run side-effecting commands without confirmation
    #[serde(default)]
    pub auto_approve: bool,

    /// Shell executor allowlist. Empty = shell disabled.
    #[serde(default = "default_shell_allowlist")]
    pub allowed_shell_commands: Vec<String>,

    /// Root directory for file commands. Defaults to ~/.colloquy/workspace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
}

fn default_shell_allowlist() -> Vec<String> {
    [
        "ls", "cat", "head", "tail", "echo", "pwd", "date", "whoami", "wc", "grep", "find",
        "which", "git",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            auto_approve: false,
            allowed_shell_commands: default_shell_allowlist(),
            workspace: None,
        }
    }
}

/// Settings for one named backend.
#[derive(Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.colloquy/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `COLLOQUY_API_KEY` (highest priority)
    /// - `OPENROUTER_API_KEY`
    /// - `OPENAI_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("COLLOQUY_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(backend) = std::env::var("COLLOQUY_BACKEND") {
            config.default_backend = backend;
        }

        if let Ok(model) = std::env::var("COLLOQUY_MODEL") {
            config.default_model = model;
        }

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
        dirs_home().join(".colloquy")
    }

    /// Root directory for file commands.
    pub fn workspace_dir(&self) -> PathBuf {
        match &self.commands.workspace {
            Some(dir) => PathBuf::from(dir),
            None => Self::config_dir().join("workspace"),
        }
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.session.temperature) {
            return Err(ConfigError::ValidationError(
                "session.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.session.round_limit == 0 {
            return Err(ConfigError::ValidationError(
                "session.round_limit must be at least 1".into(),
            ));
        }

        if self.session.context_budget == 0 {
            return Err(ConfigError::ValidationError(
                "session.context_budget must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_backend: default_backend(),
            default_model: default_model(),
            session: SessionConfig::default(),
            retry: RetryConfig::default(),
            commands: CommandsConfig::default(),
            backends: HashMap::new(),
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
