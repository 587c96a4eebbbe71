//! Client side of the notification channel.
//!
//! - `ChannelController` - reconnect state machine over transport/timer ports
//! - `ChannelSubscription` - runs a controller on one tokio task
//! - `OfflineQueue` - ordered buffer replayed once the channel is back

mod controller;
mod offline_queue;
mod subscription;

pub use controller::{
    ChannelCallbacks, ChannelController, ChannelOptions, ChannelStatus, EventHandler,
    ListenerHandle, MAX_RETRIES_EXCEEDED,
};
pub use offline_queue::{OfflineQueue, ProcessSummary};
pub use subscription::{ChannelSubscription, SubscriptionError};
