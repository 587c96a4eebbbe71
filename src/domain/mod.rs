//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, auth, errors, state machines)
//! - `notification` - SSE wire format, frame decoding, backoff and channel lifecycle

pub mod foundation;
pub mod notification;
