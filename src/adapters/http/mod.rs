//! HTTP adapters - axum router, middleware and endpoint modules.

pub mod middleware;
pub mod notification;
mod router;

pub use notification::NotificationAppState;
pub use router::build_router;
