//! Channel-backed event sink and the response stream it feeds.
//!
//! `ChannelSink` is the registry-side write handle; `NotificationStream` is
//! the HTTP body side. Dropping the stream (the client hung up and the body
//! was cancelled) unregisters the connection immediately instead of waiting
//! for the next failed write.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError, Weak};
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::domain::foundation::ConnectionId;
use crate::ports::{EventSink, SinkError};

use super::registry::ConnectionRegistry;

/// Bounded, non-blocking sink over a tokio mpsc channel.
///
/// A full buffer is reported as `SinkError::Full` rather than waited on.
pub struct ChannelSink {
    tx: Mutex<Option<mpsc::Sender<String>>>,
}

impl ChannelSink {
    /// Creates a sink and the receiver that drains it.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }
}

impl EventSink for ChannelSink {
    fn write(&self, frame: &str) -> Result<(), SinkError> {
        let guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        let tx = guard.as_ref().ok_or(SinkError::Closed)?;

        tx.try_send(frame.to_string()).map_err(|e| match e {
            TrySendError::Full(_) => SinkError::Full,
            TrySendError::Closed(_) => SinkError::Closed,
        })
    }

    fn close(&self) {
        // Dropping the only sender ends the receiving stream once it drains.
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    fn is_closed(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(true, |tx| tx.is_closed())
    }
}

/// Stream of framed events for one connection, usable as an HTTP body.
pub struct NotificationStream {
    rx: mpsc::Receiver<String>,
    registry: Weak<ConnectionRegistry>,
    connection_id: ConnectionId,
}

impl NotificationStream {
    pub(super) fn new(
        rx: mpsc::Receiver<String>,
        registry: Weak<ConnectionRegistry>,
        connection_id: ConnectionId,
    ) -> Self {
        Self {
            rx,
            registry,
            connection_id,
        }
    }

    /// The connection this stream belongs to.
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Receives the next frame, or `None` once the connection is closed.
    pub async fn next_frame(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

impl Stream for NotificationStream {
    type Item = Result<String, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx).map(|frame| frame.map(Ok))
    }
}

impl Drop for NotificationStream {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            if registry.unregister(&self.connection_id) {
                tracing::debug!(
                    connection_id = %self.connection_id,
                    "Stream dropped, connection unregistered"
                );
            }
        }
    }
}
