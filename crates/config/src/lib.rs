//! Configuration loading, validation, and management for Skald.
//!
//! Loads configuration from `~/.skald/config.toml` (or an explicit path) with
//! environment variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use skald_core::DecodePolicy;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.skald/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP listener configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Turn store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// External generation service
    #[serde(default)]
    pub generation: GenerationConfig,

    /// OAuth code exchange
    #[serde(default)]
    pub oauth: OAuthConfig,

    /// Orchestration deadlines and ordering
    #[serde(default)]
    pub chat: ChatConfig,
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

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed by CORS. Empty = same-origin only.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8081
}
fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:3000".into()]
}
fn default_body_limit() -> usize {
    // Inline base64 images travel in request bodies
    16 * 1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: default_allowed_origins(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

/// Which store implementation backs the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    /// Ephemeral; everything is lost on restart
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Connection string, e.g. `sqlite://skald.db` or `sqlite::memory:`
    #[serde(default = "default_store_url")]
    pub url: String,

    #[serde(default)]
    pub decode_policy: DecodePolicy,
}

fn default_store_url() -> String {
    format!(
        "sqlite://{}",
        AppConfig::config_dir().join("turns.sqlite").display()
    )
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: default_store_url(),
            decode_policy: DecodePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Base URL of the chat endpoint (`{base_url}/chat`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Base URL of the image service (`{inpaint_url}/inpaint`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inpaint_url: Option<String>,

    /// HTTP client timeout for a single call
    #[serde(default = "default_generation_http_timeout")]
    pub timeout_secs: u64,
}

fn default_generation_http_timeout() -> u64 {
    120
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            inpaint_url: None,
            timeout_secs: default_generation_http_timeout(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,

    #[serde(default = "default_token_url")]
    pub token_url: String,
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".into()
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: None,
            token_url: default_token_url(),
        }
    }
}

impl OAuthConfig {
    /// Whether enough is configured to attempt a code exchange.
    pub fn is_configured(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }
}

impl std::fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("redirect_uri", &self.redirect_uri)
            .field("token_url", &self.token_url)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Deadline for each store read and write
    #[serde(default = "default_store_timeout")]
    pub store_timeout_secs: u64,

    /// Deadline for each generation or inpaint call
    #[serde(default = "default_generation_timeout")]
    pub generation_timeout_secs: u64,

    /// Run at most one turn per conversation at a time
    #[serde(default = "default_true")]
    pub serialize_conversations: bool,

    /// How long a turn waits for another turn on the same conversation
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout_secs: u64,
}

fn default_store_timeout() -> u64 {
    5
}
fn default_generation_timeout() -> u64 {
    60
}
fn default_lock_timeout() -> u64 {
    60
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            store_timeout_secs: default_store_timeout(),
            generation_timeout_secs: default_generation_timeout(),
            serialize_conversations: true,
            lock_timeout_secs: default_lock_timeout(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.skald/config.toml).
    ///
    /// Environment variables override file values:
    /// - `BALDR_URL`, `BALDR_SDXL_URL`: generation endpoints
    /// - `GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET`, `GOOGLE_REDIRECT_URI`: OAuth
    /// - `SKALD_DATABASE_URL`: store connection string
    /// - `SKALD_PORT`: listener port
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load from a specific path, then apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
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

    /// Apply overrides from a key lookup (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(url) = lookup("BALDR_URL") {
            self.generation.base_url = Some(url);
        }
        if let Some(url) = lookup("BALDR_SDXL_URL") {
            self.generation.inpaint_url = Some(url);
        }
        if let Some(id) = lookup("GOOGLE_CLIENT_ID") {
            self.oauth.client_id = Some(id);
        }
        if let Some(secret) = lookup("GOOGLE_CLIENT_SECRET") {
            self.oauth.client_secret = Some(secret);
        }
        if let Some(uri) = lookup("GOOGLE_REDIRECT_URI") {
            self.oauth.redirect_uri = Some(uri);
        }
        if let Some(url) = lookup("SKALD_DATABASE_URL") {
            self.store.url = url;
        }
        if let Some(port) = lookup("SKALD_PORT") {
            self.gateway.port = port.parse().map_err(|_| {
                ConfigError::ValidationError(format!("SKALD_PORT is not a valid port: {port}"))
            })?;
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".skald")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chat.store_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "chat.store_timeout_secs must be > 0".into(),
            ));
        }

        if self.chat.generation_timeout_secs == 0 || self.generation.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "generation timeouts must be > 0".into(),
            ));
        }

        if self.generation.timeout_secs < self.chat.generation_timeout_secs {
            return Err(ConfigError::ValidationError(format!(
                "generation.timeout_secs ({}) must be >= chat.generation_timeout_secs ({})",
                self.generation.timeout_secs, self.chat.generation_timeout_secs
            )));
        }

        if self.chat.serialize_conversations && self.chat.lock_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "chat.lock_timeout_secs must be > 0".into(),
            ));
        }

        if self.store.backend == StoreBackend::Sqlite && self.store.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "store.url is required for the sqlite backend".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
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

impl From<ConfigError> for skald_core::Error {
    fn from(err: ConfigError) -> Self {
        skald_core::Error::Config {
            message: err.to_string(),
        }
    }
}
