//! Incremental decoder for `text/event-stream` bodies.

use crate::domain::errors::TransportError;

/// Longest line, and largest event, the decoder will buffer
pub const MAX_EVENT_BYTES: usize = 1024 * 1024;

/// One dispatched server-sent event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
}

/// Splits a byte stream into events. Chunks may end anywhere, including in
/// the middle of a line or a multi-byte character.
#[derive(Debug)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    data_len: usize,
    last_id: Option<String>,
    limit: usize,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_limit(MAX_EVENT_BYTES)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder that rejects lines and events longer than `limit` bytes
    pub fn with_limit(limit: usize) -> Self {
        Self {
            buffer: Vec::new(),
            event: None,
            data: Vec::new(),
            data_len: 0,
            last_id: None,
            limit,
        }
    }

    /// Feed a chunk and return every event it completed.
    ///
    /// Fails once a line or an event outgrows the limit; the partial event
    /// is discarded and the stream cannot be resumed mid-line.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<SseFrame>, TransportError> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(frame) = self.push_line(&line) {
                frames.push(frame);
            }
            if self.data_len > self.limit {
                return Err(self.overflow("event"));
            }
        }
        if self.buffer.len() > self.limit {
            return Err(self.overflow("line"));
        }
        Ok(frames)
    }

    fn overflow(&mut self, what: &str) -> TransportError {
        self.buffer.clear();
        self.event = None;
        self.data.clear();
        self.data_len = 0;
        TransportError::Decode(format!("SSE {} exceeds {} bytes", what, self.limit))
    }

    /// Id of the last event seen, for resuming a stream
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_id.as_deref()
    }

    fn push_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            // comment / keep-alive
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => {
                self.data_len += value.len() + 1;
                self.data.push(value.to_string());
            }
            "id" => self.last_id = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        self.data_len = 0;
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame {
            event,
            data,
            id: self.last_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_event() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.feed(b"event: notification\ndata: {\"a\":1}\n\n").unwrap();

        assert_eq!(
            frames,
            vec![SseFrame {
                event: Some("notification".to_string()),
                data: "{\"a\":1}".to_string(),
                id: None,
            }]
        );
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: hel").unwrap().is_empty());
        assert!(decoder.feed(b"lo\n").unwrap().is_empty());
        let frames = decoder.feed(b"\n").unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "hello");
    }

    #[test]
    fn test_multibyte_character_split() {
        let mut decoder = SseDecoder::new();
        let bytes = "data: caf\u{e9}\n\n".as_bytes();
        let split = bytes.len() - 3; // inside the two-byte é
        assert!(decoder.feed(&bytes[..split]).unwrap().is_empty());
        let frames = decoder.feed(&bytes[split..]).unwrap();
        assert_eq!(frames[0].data, "caf\u{e9}");
    }

    #[test]
    fn test_crlf_and_multiline_data() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.feed(b"data: one\r\ndata: two\r\n\r\n").unwrap();
        assert_eq!(frames[0].data, "one\ntwo");
    }

    #[test]
    fn test_comments_and_empty_events_are_skipped() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.feed(b": keep-alive\n\nevent: ping\n\ndata: x\n\n").unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, None);
        assert_eq!(frames[0].data, "x");
    }

    #[test]
    fn test_multiple_events_in_one_chunk_and_ids() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.feed(b"id: 1\ndata: a\n\nid: 2\ndata: b\n\n").unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].id.as_deref(), Some("1"));
        assert_eq!(frames[1].data, "b");
        assert_eq!(decoder.last_event_id(), Some("2"));
    }

    #[test]
    fn test_line_without_newline_is_capped() {
        let mut decoder = SseDecoder::with_limit(16);
        assert!(decoder.feed(b"data: 0123456789").unwrap().is_empty());

        let err = decoder.feed(b"abcdef").unwrap_err();
        assert!(matches!(err, TransportError::Decode(_)));

        // Buffer was dropped; a fresh event decodes again
        let frames = decoder.feed(b"\ndata: ok\n\n").unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "ok");
    }

    #[test]
    fn test_event_without_blank_line_is_capped() {
        let mut decoder = SseDecoder::with_limit(16);
        assert!(decoder.feed(b"data: aaaaaa\n").unwrap().is_empty());

        let err = decoder.feed(b"data: bbbbbb\ndata: cccccc\n").unwrap_err();
        assert!(matches!(err, TransportError::Decode(_)));
    }
}
