//! Application layer - Commands, handlers and client-side orchestration.
//!
//! This layer orchestrates domain operations and coordinates between ports.

pub mod channel;
pub mod handlers;

pub use channel::{
    ChannelCallbacks, ChannelController, ChannelOptions, ChannelStatus, ChannelSubscription,
    EventHandler, ListenerHandle, OfflineQueue, ProcessSummary, SubscriptionError,
};
pub use handlers::{
    Audience, PublishNotificationCommand, PublishNotificationHandler, PublishNotificationResult,
};
