//! Configuration file support

use parley_session::{RetryConfig, SessionConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for parley
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Stream endpoint URL
    pub endpoint: Option<String>,
    /// Conversations kept before the oldest is evicted
    pub max_conversations: Option<usize>,
    /// Round-trip time above which the connection counts as slow
    pub slow_rtt_ms: Option<u64>,
    /// Delay before the first connection attempt
    pub connect_delay_ms: Option<u64>,
    /// Seconds between network probes
    pub probe_interval_secs: Option<u64>,
    /// Reconnect policy
    #[serde(default)]
    pub retry: RetrySettings,
}

/// Reconnect settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub initial_delay_ms: Option<u64>,
    pub backoff_multiplier: Option<f64>,
    pub max_delay_ms: Option<u64>,
    pub max_retries: Option<usize>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("parley")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("PARLEY_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {}", path.display(), e);
                Self::default()
            }),
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Write the example config if no file exists yet
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&path, example_config())?;
        Ok(path)
    }

    /// Session settings from this file, falling back to defaults
    pub fn session_config(&self) -> SessionConfig {
        let defaults = SessionConfig::default();
        SessionConfig {
            endpoint: self.endpoint.clone().unwrap_or(defaults.endpoint),
            max_conversations: self.max_conversations.unwrap_or(defaults.max_conversations),
            slow_rtt_ms: self.slow_rtt_ms.unwrap_or(defaults.slow_rtt_ms),
            connect_delay_ms: self.connect_delay_ms.unwrap_or(defaults.connect_delay_ms),
            retry: self.retry.retry_config(defaults.retry),
        }
    }
}

impl RetrySettings {
    fn retry_config(&self, defaults: RetryConfig) -> RetryConfig {
        RetryConfig {
            initial_delay: self
                .initial_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.initial_delay),
            backoff_multiplier: self.backoff_multiplier.unwrap_or(defaults.backoff_multiplier),
            max_delay: self
                .max_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_delay),
            max_retries: self.max_retries.or(defaults.max_retries),
        }
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# parley configuration file
# Place at ~/.config/parley/config.toml (Linux/Mac) or %APPDATA%\parley\config.toml (Windows)

# Conversation stream endpoint
endpoint = "https://api-dev.withallo.com/v1/demo/interview/conversation"

# Conversations kept in memory; the oldest is dropped first
max_conversations = 5

# Round-trip time (ms) above which the connection is reported as slow
slow_rtt_ms = 500

# Delay (ms) before connecting
connect_delay_ms = 2000

# Seconds between network reachability probes
probe_interval_secs = 15

# Reconnect policy for the event stream
[retry]
initial_delay_ms = 1000
backoff_multiplier = 2.0
max_delay_ms = 30000
# Give up after this many failed reconnects (retries forever when unset)
# max_retries = 10
"#
}
