//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid bind address: {0}")]
    InvalidBindAddress(String),

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Heartbeat interval must be at least one second")]
    InvalidHeartbeatInterval,

    #[error("Sink capacity must be between 1 and 65536")]
    InvalidSinkCapacity,

    #[error("Channel URL must start with http:// or https://")]
    InvalidChannelUrl,

    #[error("Initial retry delay must be positive and not exceed the maximum")]
    InvalidRetryDelays,

    #[error("Invalid static token table: {0}")]
    InvalidStaticTokens(String),

    #[error("Static tokens are not allowed in production")]
    StaticTokensInProduction,
}
