//! EventSink port - write handle to one open outbound event stream.
//!
//! The connection registry only ever writes complete frames through this
//! port. A failed write tells the registry the peer went away; sinks with a
//! cancellation hook of their own (see `NotificationStream`) may unregister
//! earlier.

use thiserror::Error;

/// Reasons a frame could not be handed to the stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// The receiving side is gone (client disconnected or stream closed).
    #[error("Stream closed")]
    Closed,

    /// The stream's buffer is full; the peer is not keeping up.
    #[error("Stream buffer full")]
    Full,
}

/// Write side of one long-lived outbound stream.
///
/// Implementations must never block: a write either succeeds immediately or
/// fails. Frames written through one sink reach the peer in write order.
pub trait EventSink: Send + Sync {
    /// Queues one complete frame for delivery.
    fn write(&self, frame: &str) -> Result<(), SinkError>;

    /// Closes the stream. Further writes fail with `SinkError::Closed`.
    fn close(&self);

    /// True once the stream can no longer accept frames.
    fn is_closed(&self) -> bool;
}
