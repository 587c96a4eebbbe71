//! Notification channel domain: wire messages, decoding, backoff and the
//! client channel lifecycle.
//!
//! Everything here is pure; the registry, transports and timers that move
//! bytes live in `adapters` and `application`.

mod backoff;
mod channel_state;
mod decoder;
mod message;
mod payload;

pub use backoff::{retry_delay, BackoffPolicy};
pub use channel_state::ChannelState;
pub use decoder::{Frame, FrameDecoder};
pub use message::{frame, SseMessage, CONNECTED_EVENT, DEFAULT_EVENT_TYPE, HEARTBEAT_EVENT};
pub use payload::Payload;
