//! Decoded frame payload handed to client-side handlers.

use serde_json::Value;

/// Frame data after a best-effort JSON parse.
///
/// Parse failures are not errors: the raw text is delivered instead.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Text(String),
}

impl Payload {
    /// Parses `data` as JSON, falling back to the raw text.
    pub fn parse(data: &str) -> Self {
        serde_json::from_str(data)
            .map(Payload::Json)
            .unwrap_or_else(|_| Payload::Text(data.to_string()))
    }

    /// Returns the JSON value, if the data parsed.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(value) => Some(value),
            Payload::Text(_) => None,
        }
    }

    /// Returns the raw text, if the data did not parse.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Json(_) => None,
            Payload::Text(text) => Some(text),
        }
    }
}
