//! Incremental parser for chunked event streams.
//!
//! Servers push JSON messages separated by blank lines. Network chunks do not
//! respect message boundaries, so the parser carries partial text between reads
//! and only scans once the carried text ends with the `"\n\n"` terminator.
//!
//! # Parsing Flow
//!
//! 1. **Reading**: decode bytes as UTF-8 (an incomplete trailing sequence waits
//!    for the next feed) and split the text into reads of at most `buffer_size`
//!    bytes. Each read is appended to the carry.
//! 2. **Flushing**: once the carry ends with the terminator it is scanned for
//!    balanced `{...}` objects and cleared.
//! 3. **Terminated**: further input is ignored.
//!
//! # Examples
//!
//! ```
//! use apiclient_http::client::{StreamEvent, StreamParser};
//!
//! let mut parser = StreamParser::new(4096);
//!
//! assert!(parser.feed(b"{\"n\": 1}\r\n").is_empty());
//! let events = parser.feed(b"\n");
//! assert_eq!(events, vec![StreamEvent::Message("{\"n\": 1}".to_string())]);
//! ```

use crate::protocol::constants::STREAM_TERMINATOR;

/// Parse state for the stream parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    /// Accumulating text
    Reading,
    /// Scanning a terminated chunk
    Flushing,
    /// Stopped; input is ignored
    Terminated,
}

/// One item extracted from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Text of one balanced `{...}` object
    Message(String),
    /// A terminated chunk that held no object
    Unstructured(String),
}

/// Incremental stream parser.
#[derive(Debug)]
pub struct StreamParser {
    buffer_size: usize,
    state: ParseState,
    /// Undecoded bytes of an incomplete UTF-8 sequence
    pending: Vec<u8>,
    /// Text read since the last flush
    carry: String,
}

impl StreamParser {
    /// Create a parser handing at most `buffer_size` bytes to each read.
    pub fn new(buffer_size: usize) -> Self {
        StreamParser {
            buffer_size: buffer_size.max(1),
            state: ParseState::Reading,
            pending: Vec::new(),
            carry: String::new(),
        }
    }

    /// Feed bytes to the parser
    pub fn feed(&mut self, data: &[u8]) -> Vec<StreamEvent> {
        if self.state == ParseState::Terminated {
            return Vec::new();
        }

        let text = self.decode(data);
        let mut events = Vec::new();
        for read in split_reads(&text, self.buffer_size) {
            self.carry.push_str(read);
            if self.carry.ends_with(STREAM_TERMINATOR) {
                self.flush(&mut events);
            }
        }
        events
    }

    /// Stop the parser. Carried text is discarded.
    pub fn terminate(&mut self) {
        self.state = ParseState::Terminated;
        self.carry.clear();
        self.pending.clear();
    }

    /// Get current state
    pub fn state(&self) -> ParseState {
        self.state
    }

    /// Text waiting for a terminator.
    pub fn carried(&self) -> &str {
        &self.carry
    }

    fn flush(&mut self, events: &mut Vec<StreamEvent>) {
        self.state = ParseState::Flushing;
        let chunk = std::mem::take(&mut self.carry);

        let messages = extract_messages(&chunk);
        if messages.is_empty() {
            events.push(StreamEvent::Unstructured(chunk));
        } else {
            events.extend(messages.into_iter().map(|m| StreamEvent::Message(m.to_string())));
        }

        self.state = ParseState::Reading;
    }

    fn decode(&mut self, data: &[u8]) -> String {
        self.pending.extend_from_slice(data);
        let mut out = String::with_capacity(self.pending.len());
        let mut start = 0;

        loop {
            match std::str::from_utf8(&self.pending[start..]) {
                Ok(valid) => {
                    out.push_str(valid);
                    start = self.pending.len();
                    break;
                }
                Err(e) => {
                    let valid_end = start + e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[start..valid_end]));
                    match e.error_len() {
                        // Incomplete sequence at the end; wait for more bytes.
                        None => {
                            start = valid_end;
                            break;
                        }
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            start = valid_end + len;
                        }
                    }
                }
            }
        }

        self.pending.drain(..start);
        out
    }
}

impl Default for StreamParser {
    fn default() -> Self {
        Self::new(4096)
    }
}

/// Split `text` into pieces of at most `max` bytes on char boundaries.
fn split_reads(text: &str, max: usize) -> Vec<&str> {
    let mut reads = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let mut end = rest.len().min(max);
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        if end == 0 {
            // A single char wider than `max`.
            end = rest.chars().next().map_or(rest.len(), char::len_utf8);
        }
        let (head, tail) = rest.split_at(end);
        reads.push(head);
        rest = tail;
    }
    reads
}

/// Find every balanced top-level `{...}` object in `text`.
///
/// Braces inside string literals are ignored and backslash escapes are
/// honoured. An object left open at the end of the text is dropped.
///
/// ```
/// use apiclient_http::client::extract_messages;
///
/// let text = "data: {\"a\": \"}\"}{\"b\": {\"c\": 1}}\n\n";
/// assert_eq!(extract_messages(text), vec!["{\"a\": \"}\"}", "{\"b\": {\"c\": 1}}"]);
/// ```
pub fn extract_messages(text: &str) -> Vec<&str> {
    let mut found = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, b) in text.bytes().enumerate() {
        if depth > 0 && in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            b'}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    found.push(&text[start..=i]);
                }
            }
            b'"' if depth > 0 => in_string = true,
            _ => {}
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_creation() {
        let parser = StreamParser::new(16);
        assert_eq!(parser.state(), ParseState::Reading);
        assert_eq!(parser.carried(), "");
    }

    #[test]
    fn test_reassembly_across_reads() {
        let mut parser = StreamParser::new(4096);
        assert!(parser.feed(b"{\"id\":").is_empty());
        assert!(parser.feed(b" 7}\r\n").is_empty());
        assert_eq!(parser.carried(), "{\"id\": 7}\r\n");

        let events = parser.feed(b"\n");
        assert_eq!(events, vec![StreamEvent::Message("{\"id\": 7}".into())]);
        assert_eq!(parser.carried(), "");
        assert_eq!(parser.state(), ParseState::Reading);
    }

    #[test]
    fn test_two_messages_in_one_read() {
        let mut parser = StreamParser::new(4096);
        let events = parser.feed(b"{\"n\":1}\n{\"n\":2}\n\n");
        assert_eq!(
            events,
            vec![
                StreamEvent::Message("{\"n\":1}".into()),
                StreamEvent::Message("{\"n\":2}".into()),
            ]
        );
    }

    #[test]
    fn test_unstructured_chunk() {
        let mut parser = StreamParser::new(4096);
        let events = parser.feed(b"event: ping\n\n");
        assert_eq!(events, vec![StreamEvent::Unstructured("event: ping\n\n".into())]);
    }

    #[test]
    fn test_blank_chunk_is_unstructured() {
        let mut parser = StreamParser::new(4096);
        assert_eq!(parser.feed(b"\n\n"), vec![StreamEvent::Unstructured("\n\n".into())]);
        assert_eq!(parser.carried(), "");
    }

    #[test]
    fn test_multiline_object() {
        let mut parser = StreamParser::new(4096);
        let events = parser.feed(b"{\n  \"a\": 1,\n  \"b\": [1, 2]\n}\n\n");
        assert_eq!(events.len(), 1);
        let StreamEvent::Message(text) = &events[0] else {
            panic!("expected message");
        };
        let value: serde_json::Value = serde_json::from_str(text).unwrap();
        assert_eq!(value["b"][1], 2);
    }

    #[test]
    fn test_small_buffer_flushes_per_read() {
        // Each 9-byte read ends with the terminator.
        let mut parser = StreamParser::new(9);
        let events = parser.feed(b"{\"a\":1}\n\n{\"b\":2}\n\n");
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_split_utf8_sequence() {
        let mut parser = StreamParser::new(4096);
        let text = "{\"name\": \"caf\u{e9}\"}\n\n".as_bytes();
        let cut = text.iter().position(|&b| b == 0xC3).unwrap() + 1;

        assert!(parser.feed(&text[..cut]).is_empty());
        let events = parser.feed(&text[cut..]);
        assert_eq!(events, vec![StreamEvent::Message("{\"name\": \"caf\u{e9}\"}".into())]);
    }

    #[test]
    fn test_invalid_utf8_replaced() {
        let mut parser = StreamParser::new(4096);
        let events = parser.feed(b"{\"x\": \"\xFF\"}\n\n");
        assert_eq!(events, vec![StreamEvent::Message("{\"x\": \"\u{FFFD}\"}".into())]);
    }

    #[test]
    fn test_terminated_ignores_input() {
        let mut parser = StreamParser::new(4096);
        parser.feed(b"{\"partial\":");
        parser.terminate();
        assert_eq!(parser.state(), ParseState::Terminated);
        assert!(parser.feed(b"1}\n\n").is_empty());
        assert_eq!(parser.carried(), "");
    }

    #[test]
    fn test_extract_ignores_braces_in_strings() {
        let found = extract_messages(r#"{"s": "a{b}c", "e": "q\"}"}"#);
        assert_eq!(found, vec![r#"{"s": "a{b}c", "e": "q\"}"}"#]);
    }

    #[test]
    fn test_extract_drops_unclosed() {
        assert_eq!(extract_messages("{\"a\":1} {\"b\":"), vec!["{\"a\":1}"]);
        assert!(extract_messages("no json here }").is_empty());
    }

    #[test]
    fn test_split_reads_char_boundaries() {
        let reads = split_reads("a\u{e9}b", 2);
        assert_eq!(reads, vec!["a", "\u{e9}", "b"]);
    }
}
