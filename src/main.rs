//! notification-relay server binary.
//!
//! Serves the SSE endpoints, runs the heartbeat task and, when
//! `channel.url` is configured, keeps a reconnecting subscription to an
//! upstream relay whose frames are logged.

use std::error::Error;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use notification_relay::adapters::auth::StaticSessionValidator;
use notification_relay::adapters::http::{build_router, NotificationAppState};
use notification_relay::adapters::sse::{
    spawn_heartbeat, ConnectionRegistry, HeartbeatConfig, RegistryConfig,
};
use notification_relay::application::{ChannelCallbacks, ChannelOptions, ChannelSubscription};
use notification_relay::config::{AppConfig, ChannelConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::load_validated()?;
    init_tracing(&config);

    tracing::info!(
        environment = ?config.server.environment,
        "notification-relay v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let registry = ConnectionRegistry::new_shared(RegistryConfig {
        sink_capacity: config.stream.sink_capacity,
        retry_hint_ms: config.stream.retry_hint(),
    });

    let validator = StaticSessionValidator::from_entries(config.auth.static_token_entries())?;
    if validator.token_count() > 0 {
        tracing::warn!(
            tokens = validator.token_count(),
            "Static session tokens are enabled; do not use in production"
        );
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let heartbeat = spawn_heartbeat(
        Arc::clone(&registry),
        HeartbeatConfig::default().with_interval(config.stream.heartbeat_interval()),
        shutdown_rx,
    );

    let upstream = config
        .channel
        .url
        .as_deref()
        .map(|url| spawn_upstream(url, &config.channel))
        .transpose()?;

    let app = build_router(
        NotificationAppState::new(Arc::clone(&registry)),
        Arc::new(validator),
        &config.server,
    );

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Listening");

    let closing = Arc::clone(&registry);
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Open streams never finish on their own.
            closing.close_all();
        })
        .await;

    let _ = shutdown_tx.send(true);
    if let Err(e) = heartbeat.await {
        tracing::warn!(error = %e, "Heartbeat task ended abnormally");
    }
    if let Some(subscription) = upstream {
        subscription.shutdown().await;
    }

    tracing::info!("Shutdown complete");
    served.map_err(Into::into)
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.server.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if config.is_production() {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().pretty().with_env_filter(filter).init();
    }
}

fn spawn_upstream(
    url: &str,
    channel: &ChannelConfig,
) -> Result<ChannelSubscription, Box<dyn Error>> {
    let callbacks = ChannelCallbacks::new()
        .on_open(|| tracing::info!("Upstream channel open"))
        .on_message(|frame| {
            tracing::debug!(
                event = frame.event_type(),
                id = ?frame.id,
                bytes = frame.data.len(),
                "Upstream frame"
            )
        })
        .on_error(|error| tracing::warn!(error = %error, "Upstream channel error"))
        .on_reconnect(|attempt| tracing::info!(attempt, "Reconnecting to upstream"));

    let subscription =
        ChannelSubscription::spawn(ChannelOptions::from_config(url, channel), callbacks);
    subscription.connect()?;
    Ok(subscription)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
