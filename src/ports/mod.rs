//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Server Ports
//!
//! - `EventSink` - Write side of one open outbound stream
//! - `NotificationDispatcher` - Push messages to live connections
//! - `PresenceReader` - Read-only connection counts
//! - `SessionValidator` - Bearer token to user identity
//!
//! ## Client Ports
//!
//! - `ChannelTransport` - Outbound event-stream subscription
//! - `RetryTimer` - One-shot reconnect timer

mod channel_transport;
mod event_sink;
mod notification_dispatcher;
mod presence_reader;
mod session_validator;

pub use channel_transport::{ChannelTransport, RetryTimer, TransportError, TransportSignal};
pub use event_sink::{EventSink, SinkError};
pub use notification_dispatcher::NotificationDispatcher;
pub use presence_reader::PresenceReader;
pub use session_validator::SessionValidator;
