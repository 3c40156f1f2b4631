use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::SyncError;
use crate::platform::Platform;

/// Main configuration structure for autopull
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    /// Synchronization settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings for one sync run
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SyncConfig {
    /// Account whose repositories are synchronized
    #[serde(default)]
    pub username: String,

    /// Access token; falls back to the platform's environment variable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Hosting platform
    #[serde(default)]
    pub platform: Option<Platform>,

    /// Directory that receives `{username}/{repo}` checkouts
    #[serde(default = "default_clone_dir")]
    pub clone_dir: String,

    /// Maximum git operations in flight
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-operation timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Override for the platform's REST API root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String, // "info"
}

// Default value functions
fn default_clone_dir() -> String {
    "cloned_repos".to_string()
}
fn default_concurrency() -> usize {
    5
}
fn default_timeout_ms() -> u64 {
    120_000
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            token: None,
            platform: None,
            clone_dir: default_clone_dir(),
            concurrency: default_concurrency(),
            timeout_ms: default_timeout_ms(),
            api_base_url: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl SyncConfig {
    /// Check required fields and limits, returning the selected platform
    pub fn validate(&self) -> Result<Platform, SyncError> {
        if self.username.trim().is_empty() {
            return Err(SyncError::config("username is required"));
        }

        let platform = self
            .platform
            .ok_or_else(|| SyncError::config("platform is required (github or gitee)"))?;

        if self.concurrency == 0 {
            return Err(SyncError::config("concurrency must be at least 1"));
        }

        if self.timeout_ms == 0 {
            return Err(SyncError::config("timeout_ms must be at least 1"));
        }

        Ok(platform)
    }

    /// Configured token, else the platform's environment variable
    pub fn resolve_token(&self, platform: Platform) -> Result<String, SyncError> {
        if let Some(token) = self.token.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            return Ok(token.to_string());
        }

        let var = platform.token_env_var();
        match std::env::var(var) {
            Ok(token) if !token.trim().is_empty() => {
                tracing::debug!("Using access token from {}", var);
                Ok(token.trim().to_string())
            }
            _ => Err(SyncError::config(format!(
                "no access token for {}: pass --token or set {}",
                platform, var
            ))),
        }
    }

    /// `{clone_dir}/{username}`
    pub fn destination_root(&self) -> PathBuf {
        PathBuf::from(&self.clone_dir).join(&self.username)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    /// Load configuration from the default location, or defaults if absent
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        // Expand environment variables in paths
        config.expand_paths()?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("autopull").join("config.yml"))
    }

    /// Expand environment variables and `~` in configuration paths
    pub fn expand_paths(&mut self) -> Result<()> {
        self.sync.clone_dir = shellexpand::full(&self.sync.clone_dir)
            .context("Failed to expand clone_dir path")?
            .into_owned();

        Ok(())
    }
}
