//! Client channel configuration
//!
//! Used by processes that subscribe to a remote notification stream
//! through `ChannelSubscription`.

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Reconnecting subscription settings
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    /// Stream endpoint to subscribe to; unset disables the client
    pub url: Option<String>,

    /// Failed attempts tolerated before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first reconnect, in milliseconds
    #[serde(default = "default_initial_retry_delay")]
    pub initial_retry_delay_ms: u64,

    /// Upper bound on the reconnect delay, in milliseconds
    #[serde(default = "default_max_retry_delay")]
    pub max_retry_delay_ms: u64,
}

impl ChannelConfig {
    /// Initial retry delay as Duration
    pub fn initial_retry_delay(&self) -> Duration {
        Duration::from_millis(self.initial_retry_delay_ms)
    }

    /// Maximum retry delay as Duration
    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay_ms)
    }

    /// Validate channel configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(url) = &self.url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ValidationError::InvalidChannelUrl);
            }
        }
        if self.initial_retry_delay_ms == 0 || self.initial_retry_delay_ms > self.max_retry_delay_ms {
            return Err(ValidationError::InvalidRetryDelays);
        }
        Ok(())
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_retries: default_max_retries(),
            initial_retry_delay_ms: default_initial_retry_delay(),
            max_retry_delay_ms: default_max_retry_delay(),
        }
    }
}

fn default_max_retries() -> u32 {
    10
}

fn default_initial_retry_delay() -> u64 {
    1_000
}

fn default_max_retry_delay() -> u64 {
    30_000
}
