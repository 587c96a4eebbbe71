//! Client-side ports driven by the reconnecting channel controller.
//!
//! The controller decides every retry itself, so transports must never
//! reconnect on their own: after a failure they report once and stay closed
//! until the controller opens them again.
//!
//! ```text
//! controller ──open/close/subscribe──▶ ChannelTransport
//!            ◀──TransportSignal─────── (opened, frame, failed)
//! controller ──schedule/cancel───────▶ RetryTimer
//!            ◀──retry elapsed───────── (delivered by the driver)
//! ```

use std::time::Duration;

use thiserror::Error;

use crate::domain::notification::Frame;

/// Failures reported by a transport. All are recoverable through backoff.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Could not reach the endpoint (refused, reset, DNS, timeout).
    #[error("Connection failed: {0}")]
    Connect(String),

    /// Endpoint answered with a non-success status.
    #[error("Unexpected response status: {0}")]
    Status(u16),

    /// Endpoint answered with something other than an event stream.
    #[error("Unexpected content type: {0}")]
    ContentType(String),

    /// The stream broke after it was established.
    #[error("Stream error: {0}")]
    Stream(String),

    /// The server ended the stream.
    #[error("Stream closed by server")]
    Closed,
}

/// What a transport reports back to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportSignal {
    /// The stream is established.
    Opened,
    /// A complete frame arrived.
    Frame(Frame),
    /// The stream failed or ended; the transport is now closed.
    Failed(TransportError),
}

/// An outbound event-stream subscription that can be opened and closed.
pub trait ChannelTransport {
    /// Starts opening the stream. Completion is reported as a signal.
    ///
    /// An `Err` means the attempt could not even start.
    fn open(&mut self, url: &str, last_event_id: Option<&str>) -> Result<(), TransportError>;

    /// Closes the stream if open. Signals from the closed stream are dropped.
    fn close(&mut self);

    /// Delivers frames of `event_type` from now on, including on the
    /// stream that is currently open.
    fn subscribe(&mut self, event_type: &str);
}

/// One-shot timer for the reconnect backoff.
pub trait RetryTimer {
    /// Arms the timer, replacing any pending one.
    fn schedule(&mut self, delay: Duration);

    /// Disarms the timer. After this returns no elapsed signal is delivered
    /// for the cancelled schedule.
    fn cancel(&mut self);
}
