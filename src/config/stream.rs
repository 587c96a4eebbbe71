//! Server-side stream configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Settings for outbound SSE streams
#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    /// Seconds between heartbeat broadcasts
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// Frames buffered per connection before it is dropped as too slow
    #[serde(default = "default_sink_capacity")]
    pub sink_capacity: usize,

    /// Reconnection hint sent in the `connected` frame (0 disables)
    #[serde(default)]
    pub retry_hint_ms: u64,
}

impl StreamConfig {
    /// Heartbeat interval as Duration
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Retry hint, if enabled
    pub fn retry_hint(&self) -> Option<u64> {
        (self.retry_hint_ms > 0).then_some(self.retry_hint_ms)
    }

    /// Validate stream configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.heartbeat_interval_secs == 0 {
            return Err(ValidationError::InvalidHeartbeatInterval);
        }
        if self.sink_capacity == 0 || self.sink_capacity > 65_536 {
            return Err(ValidationError::InvalidSinkCapacity);
        }
        Ok(())
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval(),
            sink_capacity: default_sink_capacity(),
            retry_hint_ms: 0,
        }
    }
}

fn default_heartbeat_interval() -> u64 {
    30
}

fn default_sink_capacity() -> usize {
    64
}
