//! Axum router configuration for notification endpoints.

use axum::{routing::get, Router};

use super::handlers::{get_presence, stream_notifications, NotificationAppState};

/// Create the notification API router.
///
/// # Routes
///
/// - `GET /stream` - Open an SSE stream; identity from the auth middleware
/// - `GET /presence` - Connection and distinct user counts
pub fn notification_routes() -> Router<NotificationAppState> {
    Router::new()
        .route("/stream", get(stream_notifications))
        .route("/presence", get(get_presence))
}
