//! Logical push message and its SSE wire framing.
//!
//! A frame is a run of `field: value` lines closed by a blank line:
//!
//! ```text
//! id: 42
//! event: notification
//! retry: 5000
//! data: {"title":"New comment"}
//!
//! ```
//!
//! The framing is a wire contract read by generic EventSource clients, so
//! the output for a given message never varies.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::foundation::{ConnectionId, Timestamp};

/// Event name sent once on every new connection.
pub const CONNECTED_EVENT: &str = "connected";

/// Event name of the liveness broadcast.
pub const HEARTBEAT_EVENT: &str = "heartbeat";

/// Event type a receiver assumes when a frame carries no `event:` line.
pub const DEFAULT_EVENT_TYPE: &str = "message";

/// One logical message to push to a connection.
///
/// Transient: built, framed and dropped per send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SseMessage {
    /// Event name; receivers default to `"message"` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,

    /// Payload. Strings are sent as-is, anything else as compact JSON.
    pub data: Value,

    /// Event id, echoed back by clients in `Last-Event-ID`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Suggested client reconnection delay in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_hint_ms: Option<u64>,
}

impl SseMessage {
    /// Creates an unnamed message carrying `data`.
    pub fn new(data: impl Into<Value>) -> Self {
        Self {
            event: None,
            data: data.into(),
            id: None,
            retry_hint_ms: None,
        }
    }

    /// Creates a named event carrying `data`.
    pub fn event(name: impl Into<String>, data: impl Into<Value>) -> Self {
        Self::new(data).with_event(name)
    }

    /// Sets the event name.
    pub fn with_event(mut self, name: impl Into<String>) -> Self {
        self.event = Some(name.into());
        self
    }

    /// Sets the event id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the suggested reconnection delay.
    pub fn with_retry_hint(mut self, retry_ms: u64) -> Self {
        self.retry_hint_ms = Some(retry_ms);
        self
    }

    /// The synthetic frame every connection receives right after registration.
    pub fn connected(connection_id: &ConnectionId, at: Timestamp) -> Self {
        Self::event(
            CONNECTED_EVENT,
            json!({
                "connectionId": connection_id.to_string(),
                "timestamp": at.to_rfc3339(),
            }),
        )
    }

    /// The liveness frame broadcast on each heartbeat.
    pub fn heartbeat(at: Timestamp) -> Self {
        Self::event(HEARTBEAT_EVENT, json!({ "timestamp": at.to_rfc3339() }))
    }

    /// Renders this message as one wire frame.
    pub fn frame(&self) -> String {
        frame(self)
    }
}

/// Serializes a message into SSE wire text.
///
/// Emits, in order: `id:`, `event:`, `retry:` (only when > 0), one `data:`
/// line per line of the serialized payload, then a blank line. The result
/// always ends in exactly two newlines.
pub fn frame(message: &SseMessage) -> String {
    let mut out = String::new();

    if let Some(id) = message.id.as_deref().filter(|id| !id.is_empty()) {
        push_field(&mut out, "id", &single_line(id));
    }

    if let Some(event) = message.event.as_deref().filter(|e| !e.is_empty()) {
        push_field(&mut out, "event", &single_line(event));
    }

    if let Some(retry) = message.retry_hint_ms.filter(|ms| *ms > 0) {
        push_field(&mut out, "retry", &retry.to_string());
    }

    let data = payload_text(&message.data);
    for segment in split_lines(&data) {
        push_field(&mut out, "data", segment);
    }

    out.push('\n');
    out
}

fn push_field(out: &mut String, name: &str, value: &str) {
    out.push_str(name);
    out.push_str(": ");
    out.push_str(value);
    out.push('\n');
}

fn payload_text(data: &Value) -> Cow<'_, str> {
    match data {
        Value::String(text) => Cow::Borrowed(text.as_str()),
        other => Cow::Owned(other.to_string()),
    }
}

/// `id` and `event` must stay on one line or they would open a new field.
fn single_line(value: &str) -> Cow<'_, str> {
    if value.contains(['\r', '\n']) {
        Cow::Owned(value.replace("\r\n", " ").replace(['\r', '\n'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

/// Splits on every SSE line terminator (`\r\n`, `\n`, `\r`).
///
/// Always yields at least one segment, so an empty payload still produces
/// a single `data:` line.
pub(crate) fn split_lines(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut segments = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                segments.push(&text[start..i]);
                i += 1;
                start = i;
            }
            b'\r' => {
                segments.push(&text[start..i]);
                i += if bytes.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
                start = i;
            }
            _ => i += 1,
        }
    }

    segments.push(&text[start..]);
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn frames_all_fields_in_order() {
        let msg = SseMessage::event("notification", "hello")
            .with_id("42")
            .with_retry_hint(5000);

        assert_eq!(
            frame(&msg),
            "id: 42\nevent: notification\nretry: 5000\ndata: hello\n\n"
        );
    }

    #[test]
    fn frames_data_only_message() {
        let msg = SseMessage::new("ping");
        assert_eq!(frame(&msg), "data: ping\n\n");
    }

    #[test]
    fn structured_data_is_compact_json() {
        let msg = SseMessage::new(json!({"a": 1, "b": [true, null]}));
        assert_eq!(frame(&msg), "data: {\"a\":1,\"b\":[true,null]}\n\n");
    }

    #[test]
    fn multi_line_text_becomes_multiple_data_lines() {
        let msg = SseMessage::new("line one\nline two\r\nline three");
        assert_eq!(
            frame(&msg),
            "data: line one\ndata: line two\ndata: line three\n\n"
        );
    }

    #[test]
    fn zero_retry_hint_is_omitted() {
        let msg = SseMessage::new("x").with_retry_hint(0);
        assert_eq!(frame(&msg), "data: x\n\n");
    }

    #[test]
    fn empty_id_and_event_are_omitted() {
        let msg = SseMessage::new("x").with_id("").with_event("");
        assert_eq!(frame(&msg), "data: x\n\n");
    }

    #[test]
    fn line_breaks_in_event_name_cannot_inject_fields() {
        let msg = SseMessage::event("evil\ndata: injected", "x");
        assert_eq!(frame(&msg), "event: evil data: injected\ndata: x\n\n");
    }

    #[test]
    fn empty_payload_still_has_one_data_line() {
        let msg = SseMessage::new("");
        assert_eq!(frame(&msg), "data: \n\n");
    }

    #[test]
    fn connected_message_carries_connection_id() {
        let id = ConnectionId::new();
        let msg = SseMessage::connected(&id, Timestamp::now());

        assert_eq!(msg.event.as_deref(), Some(CONNECTED_EVENT));
        assert_eq!(msg.data["connectionId"], json!(id.to_string()));
        assert!(msg.data["timestamp"].is_string());
    }

    #[test]
    fn heartbeat_message_carries_timestamp() {
        let msg = SseMessage::heartbeat(Timestamp::now());
        assert_eq!(msg.event.as_deref(), Some(HEARTBEAT_EVENT));
        assert!(msg.data["timestamp"].is_string());
    }

    proptest! {
        #[test]
        fn frame_ends_with_exactly_two_newlines(text in ".*", event in proptest::option::of("[a-z]{1,12}")) {
            let mut msg = SseMessage::new(text);
            msg.event = event;
            let framed = frame(&msg);

            prop_assert!(framed.ends_with("\n\n"));
            prop_assert!(!framed.ends_with("\n\n\n"));
        }

        #[test]
        fn one_data_line_per_segment(text in "[a-z \\n\\r]{0,64}") {
            let msg = SseMessage::new(text.clone());
            let framed = frame(&msg);
            let data_lines = framed.lines().filter(|l| l.starts_with("data: ")).count();

            prop_assert_eq!(data_lines, split_lines(&text).len());
        }

        #[test]
        fn framing_is_deterministic(text in ".*", id in "[0-9]{0,6}") {
            let msg = SseMessage::new(text).with_id(id);
            prop_assert_eq!(frame(&msg), frame(&msg.clone()));
        }
    }
}
