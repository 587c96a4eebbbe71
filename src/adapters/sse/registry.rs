//! Connection registry for Server-Sent Events fan-out.
//!
//! Holds every open outbound stream of this process, keyed by connection id.
//! A user may hold several connections at once (tabs, devices).
//!
//! ```text
//! user u1 ─┬─ conn a
//!          └─ conn b        broadcast ─▶ a, b, c, d
//! user u2 ─── conn c        send_to_user(u1) ─▶ a, b
//! anonymous ─ conn d        broadcast_to_identified ─▶ a, b, c
//! ```
//!
//! # Thread Safety
//!
//! One `RwLock` guards the map. Fan-out copies the matching sinks out under
//! the read lock and writes after releasing it, so register/unregister from
//! other tasks never wait on a slow write and a broadcast never sees a
//! half-applied registration. Sinks that fail a write are removed afterwards
//! under the write lock; entries already removed by someone else are skipped.
//!
//! Delivery is best-effort and at-most-once: a failed write drops the
//! connection and is reported only through the returned counts.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::domain::foundation::{ConnectionId, Timestamp, UserId};
use crate::domain::notification::SseMessage;
use crate::ports::{EventSink, NotificationDispatcher, PresenceReader};

use super::channel_sink::{ChannelSink, NotificationStream};

/// Tunables for the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Frames buffered per connection before it counts as too slow.
    pub sink_capacity: usize,

    /// `retry:` hint attached to the `connected` frame, if any.
    pub retry_hint_ms: Option<u64>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            sink_capacity: 64,
            retry_hint_ms: None,
        }
    }
}

struct Connection {
    user_id: Option<UserId>,
    sink: Arc<dyn EventSink>,
    created_at: Timestamp,
}

/// Snapshot of one registered connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub user_id: Option<UserId>,
    pub created_at: Timestamp,
}

/// Registry of live SSE connections.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Connection>>,
    config: RegistryConfig,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Creates an empty registry wrapped for sharing.
    pub fn new_shared(config: RegistryConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    /// Registers an open stream and greets it with a `connected` frame.
    ///
    /// The greeting is written before the connection becomes visible, so it
    /// is always the first frame the client sees. If that write fails the
    /// connection is never added; the id is still returned.
    pub fn register(&self, user_id: Option<UserId>, sink: Arc<dyn EventSink>) -> ConnectionId {
        let created_at = Timestamp::now();
        let mut connections = self.write();

        let mut id = ConnectionId::new();
        while connections.contains_key(&id) {
            id = ConnectionId::new();
        }

        let mut greeting = SseMessage::connected(&id, created_at);
        if let Some(retry_ms) = self.config.retry_hint_ms {
            greeting = greeting.with_retry_hint(retry_ms);
        }

        if let Err(e) = sink.write(&greeting.frame()) {
            tracing::debug!(connection_id = %id, error = %e, "Connection closed before greeting");
            sink.close();
            return id;
        }

        connections.insert(
            id,
            Connection {
                user_id: user_id.clone(),
                sink,
                created_at,
            },
        );
        let total = connections.len();
        drop(connections);

        tracing::debug!(
            connection_id = %id,
            user_id = user_id.as_ref().map(UserId::as_str),
            total,
            "Connection registered"
        );
        id
    }

    /// Opens a channel-backed stream for a caller and registers it.
    ///
    /// Dropping the returned stream unregisters the connection.
    pub fn open_stream(self: &Arc<Self>, user_id: Option<UserId>) -> (ConnectionId, NotificationStream) {
        let (sink, rx) = ChannelSink::channel(self.config.sink_capacity);
        let id = self.register(user_id, Arc::new(sink));
        (id, NotificationStream::new(rx, Arc::downgrade(self), id))
    }

    /// Removes a connection and closes its sink. Idempotent.
    ///
    /// Returns true if the connection was registered.
    pub fn unregister(&self, id: &ConnectionId) -> bool {
        let removed = self.write().remove(id);

        match removed {
            Some(connection) => {
                connection.sink.close();
                tracing::debug!(connection_id = %id, "Connection unregistered");
                true
            }
            None => false,
        }
    }

    /// Sends to one connection. A failed write removes it and returns false.
    pub fn send_to_connection(&self, id: &ConnectionId, message: &SseMessage) -> bool {
        let sink = match self.read().get(id) {
            Some(connection) => Arc::clone(&connection.sink),
            None => return false,
        };

        match sink.write(&message.frame()) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(connection_id = %id, error = %e, "Write failed, dropping connection");
                self.unregister(id);
                false
            }
        }
    }

    /// Sends to every connection of `user_id`; returns successful deliveries.
    pub fn send_to_user(&self, user_id: &UserId, message: &SseMessage) -> usize {
        self.fan_out(message, |connection| {
            connection.user_id.as_ref() == Some(user_id)
        })
    }

    /// Sends to every registered connection.
    pub fn broadcast(&self, message: &SseMessage) -> usize {
        self.fan_out(message, |_| true)
    }

    /// Sends to every connection that carries a user identity.
    pub fn broadcast_to_identified(&self, message: &SseMessage) -> usize {
        self.fan_out(message, |connection| connection.user_id.is_some())
    }

    /// Broadcasts a `heartbeat` event stamped with the current time.
    ///
    /// The registry owns no timer; see `HeartbeatService` for the periodic
    /// driver.
    pub fn heartbeat(&self) -> usize {
        self.broadcast(&SseMessage::heartbeat(Timestamp::now()))
    }

    /// Closes and removes every connection of a user (e.g. on logout).
    ///
    /// Returns the number of connections removed.
    pub fn disconnect_user(&self, user_id: &UserId) -> usize {
        let removed: Vec<(ConnectionId, Connection)> = {
            let mut connections = self.write();
            let ids: Vec<ConnectionId> = connections
                .iter()
                .filter(|(_, c)| c.user_id.as_ref() == Some(user_id))
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| connections.remove(&id).map(|c| (id, c)))
                .collect()
        };

        for (_, connection) in &removed {
            connection.sink.close();
        }

        if !removed.is_empty() {
            tracing::debug!(user_id = %user_id, count = removed.len(), "User disconnected");
        }
        removed.len()
    }

    /// Closes and removes every connection. Used on server shutdown so open
    /// streams end and graceful shutdown can complete.
    pub fn close_all(&self) -> usize {
        let removed: Vec<Connection> = self.write().drain().map(|(_, c)| c).collect();
        for connection in &removed {
            connection.sink.close();
        }

        if !removed.is_empty() {
            tracing::info!(count = removed.len(), "Closed all connections");
        }
        removed.len()
    }

    /// Snapshot of one connection, if registered.
    pub fn connection(&self, id: &ConnectionId) -> Option<ConnectionInfo> {
        self.read().get(id).map(|c| ConnectionInfo {
            id: *id,
            user_id: c.user_id.clone(),
            created_at: c.created_at,
        })
    }

    /// Ids of every connection held by a user.
    pub fn connections_for_user(&self, user_id: &UserId) -> Vec<ConnectionId> {
        self.read()
            .iter()
            .filter(|(_, c)| c.user_id.as_ref() == Some(user_id))
            .map(|(id, _)| *id)
            .collect()
    }

    fn fan_out(&self, message: &SseMessage, matches: impl Fn(&Connection) -> bool) -> usize {
        let targets: Vec<(ConnectionId, Arc<dyn EventSink>)> = self
            .read()
            .iter()
            .filter(|(_, connection)| matches(connection))
            .map(|(id, connection)| (*id, Arc::clone(&connection.sink)))
            .collect();

        if targets.is_empty() {
            return 0;
        }

        let frame = message.frame();
        let mut delivered = 0;
        let mut failed = Vec::new();

        for (id, sink) in targets {
            match sink.write(&frame) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::debug!(connection_id = %id, error = %e, "Write failed, dropping connection");
                    failed.push(id);
                }
            }
        }

        if !failed.is_empty() {
            let removed: Vec<Connection> = {
                let mut connections = self.write();
                failed.iter().filter_map(|id| connections.remove(id)).collect()
            };
            for connection in removed {
                connection.sink.close();
            }
        }

        delivered
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<ConnectionId, Connection>> {
        self.connections.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ConnectionId, Connection>> {
        self.connections.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl NotificationDispatcher for ConnectionRegistry {
    fn send_to_connection(&self, id: &ConnectionId, message: &SseMessage) -> bool {
        ConnectionRegistry::send_to_connection(self, id, message)
    }

    fn send_to_user(&self, user_id: &UserId, message: &SseMessage) -> usize {
        ConnectionRegistry::send_to_user(self, user_id, message)
    }

    fn broadcast_to_identified(&self, message: &SseMessage) -> usize {
        ConnectionRegistry::broadcast_to_identified(self, message)
    }

    fn broadcast(&self, message: &SseMessage) -> usize {
        ConnectionRegistry::broadcast(self, message)
    }
}

impl PresenceReader for ConnectionRegistry {
    fn connection_count(&self) -> usize {
        self.read().len()
    }

    fn distinct_user_count(&self) -> usize {
        self.read()
            .values()
            .filter_map(|c| c.user_id.as_ref())
            .collect::<HashSet<_>>()
            .len()
    }

    fn is_user_connected(&self, user_id: &UserId) -> bool {
        self.read()
            .values()
            .any(|c| c.user_id.as_ref() == Some(user_id))
    }
}
