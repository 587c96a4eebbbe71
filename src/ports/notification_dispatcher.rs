//! NotificationDispatcher port - push messages to live connections.
//!
//! Producers (command handlers, background jobs) depend on this port rather
//! than on the registry, so they cannot register or drop connections.
//! Every method is best-effort and returns how many connections accepted
//! the frame; zero is not an error.

use crate::domain::foundation::{ConnectionId, UserId};
use crate::domain::notification::SseMessage;

/// Fan-out over the live connection set.
pub trait NotificationDispatcher: Send + Sync {
    /// Sends to one connection. False if it is gone or the write failed.
    fn send_to_connection(&self, id: &ConnectionId, message: &SseMessage) -> bool;

    /// Sends to every connection of one user.
    fn send_to_user(&self, user_id: &UserId, message: &SseMessage) -> usize;

    /// Sends to every connection that carries a user identity.
    fn broadcast_to_identified(&self, message: &SseMessage) -> usize;

    /// Sends to every connection.
    fn broadcast(&self, message: &SseMessage) -> usize;
}
