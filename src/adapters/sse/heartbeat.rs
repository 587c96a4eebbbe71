//! HeartbeatService - periodic liveness frames for every open stream.
//!
//! The registry owns no timer. This service calls `heartbeat()` on a fixed
//! period so intermediaries keep idle streams open and clients can tell a
//! quiet channel from a dead one. Failed writes found along the way prune
//! departed connections.
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `interval` | 30s | Time between heartbeat broadcasts |
//!
//! ## Graceful Shutdown
//!
//! The service listens on a `watch` channel and returns as soon as `true`
//! is published. No final heartbeat is sent.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use super::registry::ConnectionRegistry;

/// Configuration for the HeartbeatService.
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Time between heartbeat broadcasts.
    pub interval: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
        }
    }
}

impl HeartbeatConfig {
    /// Create config with custom interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Background service broadcasting heartbeats through a registry.
pub struct HeartbeatService {
    registry: Arc<ConnectionRegistry>,
    config: HeartbeatConfig,
}

impl HeartbeatService {
    /// Create a new HeartbeatService with default configuration.
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self::with_config(registry, HeartbeatConfig::default())
    }

    /// Create a new HeartbeatService with custom configuration.
    pub fn with_config(registry: Arc<ConnectionRegistry>, config: HeartbeatConfig) -> Self {
        Self { registry, config }
    }

    /// Run the heartbeat loop until the shutdown signal is received.
    ///
    /// The first heartbeat goes out one full interval after start; new
    /// connections already got their `connected` frame.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let period = self.config.interval.max(Duration::from_millis(1));
        let mut interval = time::interval_at(time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::debug!("Heartbeat service stopped");
                        return;
                    }
                }

                _ = interval.tick() => {
                    self.beat_once();
                }
            }
        }
    }

    /// Broadcast one heartbeat and return the number of live recipients.
    pub fn beat_once(&self) -> usize {
        let delivered = self.registry.heartbeat();
        tracing::trace!(delivered, "Heartbeat sent");
        delivered
    }
}

/// Spawns a heartbeat service on the current runtime.
///
/// Publish `true` on the paired sender (or drop it) to stop the task.
pub fn spawn_heartbeat(
    registry: Arc<ConnectionRegistry>,
    config: HeartbeatConfig,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let service = HeartbeatService::with_config(registry, config);
    tokio::spawn(async move { service.run(shutdown).await })
}
