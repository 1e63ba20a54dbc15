//! Configuration loading
//!
//! Settings resolve in the following priority order (highest last):
//! 1. Built-in defaults (code constants)
//! 2. TOML configuration file
//! 3. Environment variables
//!
//! Command-line overrides (`--host`, `--port`) are applied by the binary on
//! top of the loaded [`Settings`].

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Default ClickUp API root
pub const DEFAULT_API_BASE: &str = "https://api.clickup.com";

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "GAIA_CONFIG";

/// Complete service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub clickup: ClickUpConfig,
    pub server: ServerConfig,
    pub upload: UploadConfig,
    pub retry: RetryConfig,
    pub logging: LoggingConfig,
}

/// Remote document service credentials and endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClickUpConfig {
    /// Personal API token sent in the `Authorization` header
    pub api_key: String,
    /// API root, without trailing slash
    pub api_base: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

/// HTTP listener configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Shared secret expected in `X-Api-Secret`; blank disables the check
    pub api_secret: String,
}

/// Upload tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Minimum interval between consecutive remote calls (milliseconds)
    pub delay_ms: u64,
    /// Maximum page content size in bytes accepted by the remote service
    pub max_content_size: usize,
}

/// Retry policy for transient remote failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// First backoff delay; doubles on every retry (milliseconds)
    pub base_delay_ms: u64,
    /// HTTP status codes treated as transient
    pub transient_statuses: Vec<u16>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for ClickUpConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout_secs: 60,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            api_secret: String::new(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            delay_ms: 1200,
            max_content_size: 90_000,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 3000,
            transient_statuses: vec![429, 500, 502, 503, 504],
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl UploadConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

impl ClickUpConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// True when an API token has been configured
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

impl Settings {
    /// Load settings from defaults, an optional TOML file and the process
    /// environment.
    ///
    /// An explicit `path` must exist. Without one, `GAIA_CONFIG` is consulted,
    /// then the per-user default location; a missing default file is not an
    /// error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));

        let mut settings = match explicit {
            Some(path) => Self::from_toml_file(&path)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => Self::from_toml_file(&path)?,
                None => Self::default(),
            },
        };

        settings.apply_env(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from a TOML file; missing keys fall back to defaults
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        let settings = Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        info!("Configuration loaded from {}", path.display());
        Ok(settings)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Overlay environment variables using `lookup` to read them.
    ///
    /// Blank values are ignored so an empty variable never clears a value
    /// configured in TOML.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("CLICKUP_API_KEY") {
            self.clickup.api_key = v;
        }
        if let Some(v) = get("CLICKUP_API_BASE") {
            self.clickup.api_base = v;
        }
        if let Some(v) = get("GAIA_HOST") {
            self.server.host = v;
        }
        if let Some(v) = get("GAIA_PORT") {
            self.server.port = parse_env("GAIA_PORT", &v)?;
        }
        if let Some(v) = get("API_SECRET") {
            self.server.api_secret = v;
        }
        if let Some(v) = get("GAIA_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = get("UPLOAD_DELAY_MS") {
            self.upload.delay_ms = parse_env("UPLOAD_DELAY_MS", &v)?;
        }
        if let Some(v) = get("MAX_CONTENT_SIZE") {
            self.upload.max_content_size = parse_env("MAX_CONTENT_SIZE", &v)?;
        }
        if let Some(v) = get("API_RETRIES") {
            self.retry.max_retries = parse_env("API_RETRIES", &v)?;
        }
        if let Some(v) = get("API_RETRY_BASE_DELAY_MS") {
            self.retry.base_delay_ms = parse_env("API_RETRY_BASE_DELAY_MS", &v)?;
        }
        Ok(())
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.clickup.api_base.trim().is_empty() {
            return Err(Error::Config("clickup.api_base must not be empty".to_string()));
        }
        if self.upload.max_content_size == 0 {
            return Err(Error::Config(
                "upload.max_content_size must be greater than zero".to_string(),
            ));
        }
        if let Some(code) = self
            .retry
            .transient_statuses
            .iter()
            .find(|code| !(100..=599).contains(*code))
        {
            return Err(Error::Config(format!(
                "retry.transient_statuses contains invalid HTTP status {}",
                code
            )));
        }
        if !self.clickup.has_api_key() {
            warn!("CLICKUP_API_KEY is not set - wiki uploads will fail");
        }
        Ok(())
    }
}

fn parse_env<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("{} has invalid value '{}': {}", key, value, e)))
}

/// Per-user config location (`~/.config/gaia/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("gaia").join("config.toml"))
}
