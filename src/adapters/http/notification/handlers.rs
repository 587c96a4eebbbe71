//! HTTP handlers for notification endpoints.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::adapters::http::middleware::OptionalAuth;
use crate::adapters::sse::ConnectionRegistry;
use crate::ports::PresenceReader;

use super::dto::PresenceResponse;

// ════════════════════════════════════════════════════════════════════════════
// Handler state
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct NotificationAppState {
    registry: Arc<ConnectionRegistry>,
    presence: Arc<dyn PresenceReader>,
}

impl NotificationAppState {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        let presence: Arc<dyn PresenceReader> = registry.clone();
        Self { registry, presence }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HTTP handlers
// ════════════════════════════════════════════════════════════════════════════

/// GET /api/notifications/stream - Open a Server-Sent Events stream
///
/// The body stays open until the client disconnects or the registry drops
/// the connection. When the body is dropped the connection unregisters.
pub async fn stream_notifications(
    State(state): State<NotificationAppState>,
    OptionalAuth(user): OptionalAuth,
) -> Response {
    let (connection_id, stream) = state.registry.open_stream(user.map(|u| u.id));
    tracing::info!(connection_id = %connection_id, "Notification stream opened");

    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));

    response
}

/// GET /api/notifications/presence - Connection and user counts
pub async fn get_presence(State(state): State<NotificationAppState>) -> impl IntoResponse {
    Json(PresenceResponse::from_reader(state.presence.as_ref()))
}
