//! PresenceReader port - read-only view of who is connected.
//!
//! Presence indicators and admin dashboards need connection counts without
//! being able to register, drop or write to connections. They receive an
//! `Arc<dyn PresenceReader>` instead of the registry itself.

use crate::domain::foundation::UserId;

/// Read-only introspection over the live connection set.
pub trait PresenceReader: Send + Sync {
    /// Number of currently registered connections, anonymous included.
    fn connection_count(&self) -> usize;

    /// Number of distinct users with at least one connection.
    fn distinct_user_count(&self) -> usize;

    /// True if the user has at least one live connection.
    fn is_user_connected(&self, user_id: &UserId) -> bool;
}
