//! Notification Relay - Server-pushed notifications over Server-Sent Events
//!
//! The server side keeps a registry of open event streams, fans messages out
//! to one connection, one user, every identified user or everyone, and keeps
//! idle streams alive with heartbeats. The client side is a reconnecting
//! subscription with exponential backoff and an offline work queue.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
