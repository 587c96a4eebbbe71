//! PublishNotificationHandler - Command handler for pushing a notification
//! to live connections.

use std::sync::Arc;

use serde_json::Value;

use crate::domain::foundation::{ConnectionId, UserId};
use crate::domain::notification::SseMessage;
use crate::ports::NotificationDispatcher;

/// Who receives a published notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// One specific connection.
    Connection(ConnectionId),
    /// Every connection of one user.
    User(UserId),
    /// Every connection with a user identity.
    Identified,
    /// Every connection, anonymous included.
    Everyone,
}

/// Command to publish a notification.
#[derive(Debug, Clone)]
pub struct PublishNotificationCommand {
    pub audience: Audience,
    pub event: Option<String>,
    pub data: Value,
    pub id: Option<String>,
}

impl PublishNotificationCommand {
    /// Creates an unnamed notification for `audience`.
    pub fn new(audience: Audience, data: impl Into<Value>) -> Self {
        Self {
            audience,
            event: None,
            data: data.into(),
            id: None,
        }
    }

    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    fn into_message(self) -> SseMessage {
        let mut message = SseMessage::new(self.data);
        message.event = self.event;
        message.id = self.id;
        message
    }
}

/// Result of a publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishNotificationResult {
    /// Connections that accepted the frame.
    pub delivered: usize,
}

/// Handler for publishing notifications.
///
/// Delivery is best-effort: an audience with no live connections is not an
/// error, it simply yields `delivered == 0`.
pub struct PublishNotificationHandler {
    dispatcher: Arc<dyn NotificationDispatcher>,
}

impl PublishNotificationHandler {
    pub fn new(dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn handle(&self, cmd: PublishNotificationCommand) -> PublishNotificationResult {
        let audience = cmd.audience.clone();
        let message = cmd.into_message();

        let delivered = match &audience {
            Audience::Connection(id) => {
                usize::from(self.dispatcher.send_to_connection(id, &message))
            }
            Audience::User(user_id) => self.dispatcher.send_to_user(user_id, &message),
            Audience::Identified => self.dispatcher.broadcast_to_identified(&message),
            Audience::Everyone => self.dispatcher.broadcast(&message),
        };

        tracing::debug!(
            audience = ?audience,
            event = message.event.as_deref(),
            delivered,
            "Notification published"
        );

        PublishNotificationResult { delivered }
    }
}
