//! Server-side SSE adapters.
//!
//! - `ConnectionRegistry` - live connection set with targeted and fan-out sends
//! - `ChannelSink` / `NotificationStream` - bounded per-connection buffer and
//!   the HTTP body that drains it
//! - `HeartbeatService` - periodic `heartbeat` broadcast

mod channel_sink;
mod heartbeat;
mod registry;

pub use channel_sink::{ChannelSink, NotificationStream};
pub use heartbeat::{spawn_heartbeat, HeartbeatConfig, HeartbeatService};
pub use registry::{ConnectionInfo, ConnectionRegistry, RegistryConfig};
