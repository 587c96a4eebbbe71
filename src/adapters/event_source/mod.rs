//! Client-side adapters for the reconnecting channel.
//!
//! - `HttpEventSource` - reqwest event-stream transport
//! - `TokioRetryTimer` - backoff timer on the tokio clock

mod http_transport;
mod tokio_timer;

pub use http_transport::{HttpEventSource, SourceEvent};
pub use tokio_timer::{RetryElapsed, TokioRetryTimer};
