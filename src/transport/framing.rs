//! `Content-Length` framing.
//!
//! Messages on the client stream look like:
//!
//! ```text
//! Content-Length: 52\r\n
//! \r\n
//! {"seq":1,"type":"request","command":"initialize"}
//! ```
//!
//! [`FrameParser`] is an explicit state value fed one chunk at a time. It
//! never dispatches an incomplete message, counts the body in encoded bytes
//! and keeps parsing after a malformed frame.

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Terminates the header block.
const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Header carrying the body length.
const CONTENT_LENGTH: &str = "content-length";

/// Upper bound on a header block without a terminator.
const MAX_HEADER_BYTES: usize = 8 * 1024;

// ============================================================================
// ParseState
// ============================================================================

/// Which part of a frame the parser is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    /// Scanning for the blank line that ends the header block.
    Headers,
    /// Waiting for `content_length` body bytes.
    Body { content_length: usize },
}

// ============================================================================
// FrameParser
// ============================================================================

/// Incremental decoder for `Content-Length` framed JSON.
#[derive(Debug)]
pub struct FrameParser {
    state: ParseState,
    buffer: Vec<u8>,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    /// Creates a parser waiting for a header block.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ParseState::Headers,
            buffer: Vec::new(),
        }
    }

    /// Number of bytes received but not yet consumed.
    #[inline]
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Appends `chunk` and decodes every complete message it finishes.
    ///
    /// Each element is one frame: the parsed JSON, or the error that made the
    /// frame unusable. Errors never stop later frames from being decoded.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Result<Value>> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        loop {
            match self.state {
                ParseState::Headers => {
                    let Some(end) = find(&self.buffer, HEADER_TERMINATOR) else {
                        if self.buffer.len() > MAX_HEADER_BYTES {
                            self.buffer.clear();
                            frames.push(Err(Error::framing("header block too large")));
                        }
                        break;
                    };

                    let header: Vec<u8> = self.buffer.drain(..end + HEADER_TERMINATOR.len()).collect();
                    match parse_content_length(&header[..end]) {
                        Ok(content_length) => {
                            self.state = ParseState::Body { content_length };
                        }
                        Err(e) => frames.push(Err(e)),
                    }
                }

                ParseState::Body { content_length } => {
                    if self.buffer.len() < content_length {
                        break;
                    }

                    let body: Vec<u8> = self.buffer.drain(..content_length).collect();
                    self.state = ParseState::Headers;
                    frames.push(decode_body(&body));
                }
            }
        }

        frames
    }
}

// ============================================================================
// Encoding
// ============================================================================

/// Serializes `message` and prepends its header.
///
/// # Errors
///
/// Returns [`Error::Json`] if serialization fails.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(message)?;
    let mut frame = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
    frame.extend_from_slice(&body);
    Ok(frame)
}

// ============================================================================
// Helpers
// ============================================================================

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn parse_content_length(header: &[u8]) -> Result<usize> {
    let text = std::str::from_utf8(header)
        .map_err(|_| Error::framing("header block is not valid UTF-8"))?;

    for line in text.split("\r\n") {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if name.trim().eq_ignore_ascii_case(CONTENT_LENGTH) {
            return value
                .trim()
                .parse()
                .map_err(|_| Error::framing(format!("invalid Content-Length: {}", value.trim())));
        }
    }

    Err(Error::framing("missing Content-Length header"))
}

fn decode_body(body: &[u8]) -> Result<Value> {
    let text =
        std::str::from_utf8(body).map_err(|_| Error::framing("body is not valid UTF-8"))?;
    Ok(serde_json::from_str(text)?)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use serde_json::json;

    fn frame(body: &str) -> Vec<u8> {
        format!("Content-Length: {}\r\n\r\n{}", body.len(), body).into_bytes()
    }

    #[test]
    fn test_single_chunk() {
        let body = r#"{"seq":1,"type":"request","command":"initialize"}"#;
        let mut parser = FrameParser::new();

        let frames = parser.feed(&frame(body));
        assert_eq!(frames.len(), 1);
        assert_eq!(
            frames[0].as_ref().expect("valid"),
            &serde_json::from_str::<Value>(body).expect("json")
        );
        assert_eq!(parser.buffered(), 0);
    }

    #[test]
    fn test_byte_by_byte_dispatches_once() {
        let body = r#"{"seq":2,"type":"event","event":"stopped"}"#;
        let bytes = frame(body);
        let mut parser = FrameParser::new();

        let mut frames = Vec::new();
        for (i, byte) in bytes.iter().enumerate() {
            let out = parser.feed(std::slice::from_ref(byte));
            if i + 1 < bytes.len() {
                assert!(out.is_empty(), "dispatched early at byte {i}");
            }
            frames.extend(out);
        }

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref().expect("valid")["event"], "stopped");
    }

    #[test]
    fn test_multibyte_body_counts_bytes() {
        let body = r#"{"seq":3,"type":"event","event":"output","body":{"output":"héllo ✓"}}"#;
        assert!(body.len() > body.chars().count());

        let mut parser = FrameParser::new();
        let frames = parser.feed(&frame(body));

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref().expect("valid")["body"]["output"], "héllo ✓");
    }

    #[test]
    fn test_pipelined_messages_dispatch_in_order() {
        let mut bytes = frame(r#"{"seq":1}"#);
        bytes.extend(frame(r#"{"seq":2}"#));

        let frames = FrameParser::new().feed(&bytes);
        let seqs: Vec<_> = frames
            .iter()
            .map(|f| f.as_ref().expect("valid")["seq"].clone())
            .collect();
        assert_eq!(seqs, vec![json!(1), json!(2)]);
    }

    #[test]
    fn test_bad_json_does_not_corrupt_state() {
        let mut bytes = frame("{not json");
        bytes.extend(frame(r#"{"seq":9}"#));

        let frames = FrameParser::new().feed(&bytes);
        assert_eq!(frames.len(), 2);
        assert!(matches!(frames[0], Err(Error::Json(_))));
        assert_eq!(frames[1].as_ref().expect("valid")["seq"], 9);
    }

    #[test]
    fn test_missing_content_length_is_skipped() {
        let mut bytes = b"X-Other: 1\r\n\r\n".to_vec();
        bytes.extend(frame(r#"{"seq":5}"#));

        let frames = FrameParser::new().feed(&bytes);
        assert_eq!(frames.len(), 2);
        assert!(matches!(frames[0], Err(Error::Framing { .. })));
        assert_eq!(frames[1].as_ref().expect("valid")["seq"], 5);
    }

    #[test]
    fn test_incomplete_trailing_message_stays_buffered() {
        let mut bytes = frame(r#"{"seq":1}"#);
        let second = frame(r#"{"seq":2}"#);
        bytes.extend(&second[..second.len() - 3]);

        let mut parser = FrameParser::new();
        let frames = parser.feed(&bytes);
        assert_eq!(frames.len(), 1);
        assert!(parser.buffered() > 0);

        let frames = parser.feed(&second[second.len() - 3..]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref().expect("valid")["seq"], 2);
    }

    #[test]
    fn test_header_name_is_case_insensitive() {
        let bytes = b"content-length: 2\r\nContent-Type: application/json\r\n\r\n{}".to_vec();
        let frames = FrameParser::new().feed(&bytes);
        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_ok());
    }

    #[test]
    fn test_encode_round_trip() {
        let message = json!({"seq": 1, "type": "event", "event": "initialized"});
        let bytes = encode(&message).expect("encode");

        let frames = FrameParser::new().feed(&bytes);
        assert_eq!(frames[0].as_ref().expect("valid"), &message);
    }

    proptest! {
        #[test]
        fn prop_chunking_does_not_change_output(
            text in "[a-zé✓ ]{0,24}",
            splits in proptest::collection::vec(any::<usize>(), 0..6),
        ) {
            let mut bytes = encode(&json!({"seq": 1, "text": text})).expect("encode");
            bytes.extend(encode(&json!({"seq": 2})).expect("encode"));

            let mut cuts: Vec<usize> = splits.iter().map(|s| s % (bytes.len() + 1)).collect();
            cuts.push(bytes.len());
            cuts.sort_unstable();

            let mut parser = FrameParser::new();
            let mut frames = Vec::new();
            let mut start = 0;
            for cut in cuts {
                frames.extend(parser.feed(&bytes[start..cut]));
                start = cut;
            }

            prop_assert_eq!(frames.len(), 2);
            let first = frames[0].as_ref().expect("valid");
            prop_assert_eq!(first["text"].as_str(), Some(text.as_str()));
            prop_assert_eq!(&frames[1].as_ref().expect("valid")["seq"], &json!(2));
            prop_assert_eq!(parser.buffered(), 0);
        }
    }
}
