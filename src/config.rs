//! Configuration file parser for ~/.config/fluxsync/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are accepted but logged as warnings since they are usually
//! typos. `MINIFLUX_URL` and `MINIFLUX_API_KEY` override the file, and
//! command-line flags override both (applied by the binary).
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::sync::{SyncOptions, DEFAULT_ENTRY_LIMIT};

/// Environment variable holding the Miniflux server address.
pub const ENV_SERVER_URL: &str = "MINIFLUX_URL";

/// Environment variable holding the Miniflux API token.
pub const ENV_API_KEY: &str = "MINIFLUX_API_KEY";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds the size cap
    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// A value parsed but is out of range
    #[error("Invalid config value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },

    /// A required setting was not supplied by file, environment or flag
    #[error("Missing `{key}`: set it in config.toml, via {env}, or on the command line")]
    Missing {
        key: &'static str,
        env: &'static str,
    },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// The custom Debug impl masks `api_key`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Miniflux server address, with or without the `/v1` suffix.
    pub server_url: Option<String>,

    /// Miniflux API token.
    pub api_key: Option<SecretString>,

    /// Maximum unread entries fetched per sync pass.
    pub entry_limit: u32,

    /// Mark synced entries as read on the server.
    pub mark_remote_read: bool,

    /// Per-request deadline in seconds.
    pub request_timeout_secs: u64,

    /// Interval between passes in `sync --watch` mode.
    pub sync_interval_minutes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: None,
            api_key: None,
            entry_limit: DEFAULT_ENTRY_LIMIT,
            mark_remote_read: false,
            request_timeout_secs: 30,
            sync_interval_minutes: 15,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("server_url", &self.server_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("entry_limit", &self.entry_limit)
            .field("mark_remote_read", &self.mark_remote_read)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("sync_interval_minutes", &self.sync_interval_minutes)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 6] = [
        "server_url",
        "api_key",
        "entry_limit",
        "mark_remote_read",
        "request_timeout_secs",
        "sync_interval_minutes",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Out-of-range values → `Err(ConfigError::Invalid)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        tracing::info!(
            path = %path.display(),
            server_configured = config.server_url.is_some(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Apply `MINIFLUX_URL` / `MINIFLUX_API_KEY` from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`. Blank values are ignored.
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_blank(ENV_SERVER_URL) {
            tracing::debug!(var = ENV_SERVER_URL, "Server URL taken from environment");
            self.server_url = Some(url);
        }
        if let Some(key) = non_blank(ENV_API_KEY) {
            tracing::debug!(var = ENV_API_KEY, "API key taken from environment");
            self.api_key = Some(SecretString::from(key));
        }
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.entry_limit == 0 {
            return Err(ConfigError::Invalid {
                key: "entry_limit",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "request_timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Server URL, or `ConfigError::Missing` when no source supplied one.
    pub fn require_server_url(&self) -> Result<&str, ConfigError> {
        self.server_url
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::Missing {
                key: "server_url",
                env: ENV_SERVER_URL,
            })
    }

    /// API token, or `ConfigError::Missing` when no source supplied one.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_ref()
            .map(|k| k.expose_secret())
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::Missing {
                key: "api_key",
                env: ENV_API_KEY,
            })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_minutes.saturating_mul(60))
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            entry_limit: self.entry_limit,
            mark_remote_read: self.mark_remote_read,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
