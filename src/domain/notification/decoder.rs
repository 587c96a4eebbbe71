//! Incremental decoder for the SSE wire format.
//!
//! Bytes arrive in arbitrary chunks from the network; the decoder keeps the
//! partial line between calls and yields a [`Frame`] each time a blank line
//! closes one.

use super::message::DEFAULT_EVENT_TYPE;

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    /// `id:` value set inside this frame, if any.
    pub id: Option<String>,
    /// `event:` value, if any.
    pub event: Option<String>,
    /// `retry:` value, if it was a valid integer.
    pub retry_ms: Option<u64>,
    /// Concatenated `data:` lines joined by `\n`.
    pub data: String,
}

impl Frame {
    /// Event type used for handler dispatch; `"message"` when unnamed.
    pub fn event_type(&self) -> &str {
        self.event
            .as_deref()
            .filter(|e| !e.is_empty())
            .unwrap_or(DEFAULT_EVENT_TYPE)
    }
}

/// Stateful SSE stream decoder.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    line: Vec<u8>,
    skip_lf: bool,
    started: bool,
    event: Option<String>,
    id: Option<String>,
    retry_ms: Option<u64>,
    data: Vec<String>,
    last_event_id: Option<String>,
}

impl FrameDecoder {
    /// Creates a decoder positioned at the start of a stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent `id:` seen on this stream, sticky across frames.
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Feeds a chunk and returns every frame it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();

        for &byte in chunk {
            if self.skip_lf {
                self.skip_lf = false;
                if byte == b'\n' {
                    continue;
                }
            }

            match byte {
                b'\n' => self.end_line(&mut frames),
                b'\r' => {
                    self.end_line(&mut frames);
                    self.skip_lf = true;
                }
                _ => self.line.push(byte),
            }
        }

        frames
    }

    fn end_line(&mut self, frames: &mut Vec<Frame>) {
        let raw = std::mem::take(&mut self.line);
        let mut bytes = raw.as_slice();

        if !self.started {
            self.started = true;
            bytes = bytes.strip_prefix(BOM).unwrap_or(bytes);
        }

        let line = String::from_utf8_lossy(bytes);
        self.process_line(&line, frames);
    }

    fn process_line(&mut self, line: &str, frames: &mut Vec<Frame>) {
        if line.is_empty() {
            if let Some(frame) = self.dispatch() {
                frames.push(frame);
            }
            return;
        }

        // Comment; servers use these as keep-alives.
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.find(':') {
            Some(idx) => {
                let value = &line[idx + 1..];
                (&line[..idx], value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" => {
                if !value.contains('\0') {
                    self.id = Some(value.to_string());
                    self.last_event_id = Some(value.to_string());
                }
            }
            "retry" => {
                if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                    self.retry_ms = value.parse().ok();
                }
            }
            _ => {}
        }
    }

    fn dispatch(&mut self) -> Option<Frame> {
        let event = self.event.take();
        let id = self.id.take();
        let retry_ms = self.retry_ms.take();
        let data = std::mem::take(&mut self.data);

        if data.is_empty() {
            return None;
        }

        Some(Frame {
            id,
            event,
            retry_ms,
            data: data.join("\n"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::notification::message::{frame, SseMessage};

    #[test]
    fn decodes_single_frame() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed(b"id: 7\nevent: notification\ndata: hi\n\n");

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].id.as_deref(), Some("7"));
        assert_eq!(frames[0].event_type(), "notification");
        assert_eq!(frames[0].data, "hi");
    }

    #[test]
    fn unnamed_frame_defaults_to_message() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed(b"data: plain\n\n");
        assert_eq!(frames[0].event_type(), "message");
    }

    #[test]
    fn joins_multiple_data_lines() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed(b"data: one\ndata: two\n\n");
        assert_eq!(frames[0].data, "one\ntwo");
    }

    #[test]
    fn handles_chunk_boundaries_anywhere() {
        let wire = frame(&SseMessage::event("update", "payload").with_id("1"));
        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();

        for byte in wire.as_bytes() {
            frames.extend(decoder.feed(std::slice::from_ref(byte)));
        }

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event_type(), "update");
        assert_eq!(frames[0].data, "payload");
    }

    #[test]
    fn handles_crlf_split_across_chunks() {
        let mut decoder = FrameDecoder::new();
        let mut frames = decoder.feed(b"data: a\r");
        frames.extend(decoder.feed(b"\n\r\n"));

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "a");
    }

    #[test]
    fn ignores_comments_and_unknown_fields() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed(b": keep-alive\n\nfoo: bar\ndata: x\n\n");

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "x");
    }

    #[test]
    fn frame_without_data_is_discarded() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed(b"event: lonely\n\ndata: next\n\n");

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event_type(), "message");
    }

    #[test]
    fn retry_requires_digits() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed(b"retry: 3000\ndata: a\n\nretry: soon\ndata: b\n\n");

        assert_eq!(frames[0].retry_ms, Some(3000));
        assert_eq!(frames[1].retry_ms, None);
    }

    #[test]
    fn last_event_id_is_sticky() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(b"id: 9\ndata: a\n\ndata: b\n\n");
        assert_eq!(decoder.last_event_id(), Some("9"));
    }

    #[test]
    fn skips_leading_bom() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed(b"\xEF\xBB\xBFdata: x\n\n");
        assert_eq!(frames[0].data, "x");
    }

    #[test]
    fn incomplete_frame_is_held_back() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(b"data: partial\n").is_empty());
        assert_eq!(decoder.feed(b"\n").len(), 1);
    }

    #[test]
    fn decodes_what_the_framer_produces() {
        let msg = SseMessage::event("notification", "first\nsecond").with_id("abc");
        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed(frame(&msg).as_bytes());

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].id.as_deref(), Some("abc"));
        assert_eq!(frames[0].data, "first\nsecond");
    }
}
