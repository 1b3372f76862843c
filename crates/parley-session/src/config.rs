//! Session configuration

use crate::error::{Error, Result};
use crate::monitor::DEFAULT_SLOW_RTT_MS;
use crate::store::DEFAULT_MAX_CONVERSATIONS;
use crate::transport::RetryConfig;
use std::time::Duration;

/// Stream endpoint used when none is configured
pub const DEFAULT_ENDPOINT: &str = "https://api-dev.withallo.com/v1/demo/interview/conversation";

/// Default delay before the first connection attempt
pub const DEFAULT_CONNECT_DELAY_MS: u64 = 2000;

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Stream endpoint URL
    pub endpoint: String,
    /// Number of conversations kept before the oldest is evicted
    pub max_conversations: usize,
    /// Round-trip time above which the link counts as slow
    pub slow_rtt_ms: u64,
    /// Delay before connecting, so an empty state can show first
    pub connect_delay_ms: u64,
    /// Transport reconnect policy
    pub retry: RetryConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            max_conversations: DEFAULT_MAX_CONVERSATIONS,
            slow_rtt_ms: DEFAULT_SLOW_RTT_MS,
            connect_delay_ms: DEFAULT_CONNECT_DELAY_MS,
            retry: RetryConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn connect_delay(&self) -> Duration {
        Duration::from_millis(self.connect_delay_ms)
    }

    /// Check the configuration before a session is built from it
    pub fn validate(&self) -> Result<()> {
        if self.max_conversations == 0 {
            return Err(Error::InvalidConfig(
                "max_conversations must be at least 1".to_string(),
            ));
        }
        reqwest::Url::parse(&self.endpoint)
            .map_err(|e| Error::InvalidConfig(format!("endpoint '{}': {}", self.endpoint, e)))?;
        if self.retry.backoff_multiplier < 1.0 {
            return Err(Error::InvalidConfig(
                "retry backoff multiplier must be at least 1.0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.max_conversations, 5);
        assert_eq!(config.slow_rtt_ms, 500);
        assert_eq!(config.connect_delay(), Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = SessionConfig {
            max_conversations: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = SessionConfig {
            endpoint: "conversation".to_string(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("endpoint"), "got: {}", err);
    }
}
