//! Incremental Server-Sent Events decoding for streamed chat responses.
//!
//! Chunks arrive from the transport at arbitrary byte boundaries, including
//! the middle of a multi-byte UTF-8 character, so lines are assembled from
//! raw bytes and only decoded once a full line is available.
//!
//! ```text
//! data: {"choices":[{"delta":{"content":"Hi"}}]}
//!
//! data: [DONE]
//! ```
//!
//! # Examples
//!
//! ```
//! use parley::llm::providers::sse::SseLineParser;
//!
//! let mut parser = SseLineParser::new();
//! let mut events = parser.push(b"data: hel");
//! assert!(events.is_empty());
//! events = parser.push(b"lo\n\n");
//! assert_eq!(events[0].data, "hello");
//! ```

/// A parsed Server-Sent Event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// The event type (from `event:`), if any.
    pub event_type: Option<String>,
    /// The payload; multiple `data:` lines are joined with `\n`.
    pub data: String,
}

impl SseEvent {
    /// Whether this event is the `[DONE]` sentinel.
    pub fn is_done(&self) -> bool {
        self.data.trim() == "[DONE]"
    }
}

#[derive(Debug, Default)]
struct PendingEvent {
    event_type: Option<String>,
    data_lines: Vec<String>,
}

impl PendingEvent {
    fn take(&mut self) -> Option<SseEvent> {
        if self.data_lines.is_empty() {
            self.event_type = None;
            return None;
        }
        let data = self.data_lines.join("\n");
        self.data_lines.clear();
        Some(SseEvent {
            event_type: self.event_type.take(),
            data,
        })
    }

    /// Apply one line; a blank line closes the event.
    fn apply(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.take();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => self.data_lines.push(value.to_owned()),
            "event" => self.event_type = Some(value.to_owned()),
            _ => {}
        }
        None
    }
}

/// Byte-oriented incremental SSE parser.
#[derive(Debug, Default)]
pub struct SseLineParser {
    buffer: Vec<u8>,
    pending: PendingEvent,
}

impl SseLineParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and collect every event it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            let line = line.strip_suffix('\r').unwrap_or(&line);
            if let Some(event) = self.pending.apply(line) {
                events.push(event);
            }
        }
        events
    }

    /// Close out whatever is buffered when the transport ends.
    pub fn flush(&mut self) -> Option<SseEvent> {
        if !self.buffer.is_empty() {
            let raw = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&raw);
            let line = line.strip_suffix('\r').unwrap_or(&line);
            self.pending.apply(line);
        }
        self.pending.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_event() {
        let mut parser = SseLineParser::new();
        let events = parser.push(b"data: {\"a\":1}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "{\"a\":1}");
        assert!(events[0].event_type.is_none());
    }

    #[test]
    fn event_split_across_chunks() {
        let mut parser = SseLineParser::new();
        assert!(parser.push(b"da").is_empty());
        assert!(parser.push(b"ta: one\n").is_empty());
        let events = parser.push(b"\ndata: two\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "one");
        assert_eq!(events[1].data, "two");
    }

    #[test]
    fn multibyte_character_split_across_chunks() {
        let text = "data: 你好\n\n".as_bytes();
        let (head, tail) = text.split_at(8);
        let mut parser = SseLineParser::new();
        assert!(parser.push(head).is_empty());
        let events = parser.push(tail);
        assert_eq!(events[0].data, "你好");
    }

    #[test]
    fn multi_line_data_is_joined() {
        let mut parser = SseLineParser::new();
        let events = parser.push(b"data: a\ndata: b\n\n");
        assert_eq!(events[0].data, "a\nb");
    }

    #[test]
    fn comments_and_unknown_fields_ignored() {
        let mut parser = SseLineParser::new();
        let events = parser.push(b": keep-alive\nretry: 10\nid: 4\ndata: x\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "x");
    }

    #[test]
    fn event_type_preserved() {
        let mut parser = SseLineParser::new();
        let events = parser.push(b"event: ping\ndata: {}\n\n");
        assert_eq!(events[0].event_type.as_deref(), Some("ping"));
    }

    #[test]
    fn crlf_lines() {
        let mut parser = SseLineParser::new();
        let events = parser.push(b"data: x\r\n\r\n");
        assert_eq!(events[0].data, "x");
    }

    #[test]
    fn done_sentinel() {
        let mut parser = SseLineParser::new();
        let events = parser.push(b"data: [DONE]\n\n");
        assert!(events[0].is_done());
    }

    #[test]
    fn flush_emits_unterminated_event() {
        let mut parser = SseLineParser::new();
        assert!(parser.push(b"data: tail").is_empty());
        let event = parser.flush();
        assert_eq!(event.map(|e| e.data), Some("tail".to_string()));
        assert!(parser.flush().is_none());
    }

    #[test]
    fn blank_lines_without_data_emit_nothing() {
        let mut parser = SseLineParser::new();
        assert!(parser.push(b"\n\n\n").is_empty());
    }
}
