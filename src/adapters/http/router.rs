//! Top-level axum router: notification routes, health check and the
//! cross-cutting layers (auth, tracing, CORS, timeout).

use axum::{
    http::{HeaderValue, Method},
    middleware,
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerConfig;

use super::middleware::{auth_middleware, AuthState};
use super::notification::{notification_routes, NotificationAppState};

/// Builds the application router.
///
/// # Routes
///
/// - `GET /health` - Liveness probe
/// - `GET /api/notifications/stream` - SSE stream
/// - `GET /api/notifications/presence` - Presence counts
///
/// The timeout bounds only the time to produce response headers; an open
/// event stream is not cut off by it.
pub fn build_router(
    state: NotificationAppState,
    validator: AuthState,
    server: &ServerConfig,
) -> Router {
    let api = Router::new()
        .nest("/notifications", notification_routes())
        .layer(middleware::from_fn_with_state(validator, auth_middleware))
        .with_state(state);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .layer(TimeoutLayer::new(server.request_timeout()))
        .layer(cors_layer(&server.cors_origins_list()))
        .layer(TraceLayer::new_for_http())
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// CORS for the configured origins; any origin when none are configured.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(allowed)
}
