//! Authentication adapters.
//!
//! Implementations of the `SessionValidator` port:
//!
//! - `static_validator` - fixed token table for development and tests

mod static_validator;

pub use static_validator::StaticSessionValidator;
