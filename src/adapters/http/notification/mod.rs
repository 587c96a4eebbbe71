//! HTTP adapter for the notification channel.
//!
//! - `GET /api/notifications/stream` - Open an SSE stream (identity optional)
//! - `GET /api/notifications/presence` - Live connection and user counts

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::PresenceResponse;
pub use handlers::{get_presence, stream_notifications, NotificationAppState};
pub use routes::notification_routes;
