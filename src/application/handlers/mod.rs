//! Application handlers.
//!
//! Command handlers that orchestrate notification delivery through ports.

mod publish_notification;

pub use publish_notification::{
    Audience, PublishNotificationCommand, PublishNotificationHandler, PublishNotificationResult,
};
