//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `auth` - Session validators (static token table)
//! - `event_source` - reqwest-backed SSE client transport and tokio retry timer
//! - `http` - axum router, auth middleware and notification endpoints
//! - `sse` - Connection registry, stream sinks and heartbeat service

pub mod auth;
pub mod event_source;
pub mod http;
pub mod sse;

pub use sse::{ConnectionRegistry, HeartbeatConfig, HeartbeatService, RegistryConfig};
