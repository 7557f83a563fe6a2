//! Line-based codec for tokio.
//!
//! Frames newline-terminated program lines. Decoded lines have their
//! terminator (`\n` or `\r\n`) stripped; encoded lines get `\n` appended.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;

/// Default maximum line length in bytes, terminator included.
pub const DEFAULT_MAX_LINE_LEN: usize = 1024;

/// Newline-delimited line codec with a length cap.
#[derive(Debug)]
pub struct LineCodec {
    /// Index of next byte to check for newline
    next_index: usize,
    /// Maximum line length
    max_len: usize,
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl LineCodec {
    /// Create a codec with the default length cap.
    pub fn new() -> Self {
        Self::with_max_len(DEFAULT_MAX_LINE_LEN)
    }

    /// Create a codec with a custom length cap.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
        }
    }

    /// Reject control characters other than tab.
    fn validate_line(s: &str) -> Result<(), ProtocolError> {
        match s.chars().find(|&c| c.is_control() && c != '\t') {
            Some(ch) => Err(ProtocolError::IllegalControlChar(ch)),
            None => Ok(()),
        }
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, ProtocolError> {
        // Look for newline starting from where we left off
        if let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') {
            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            if line.len() > self.max_len {
                return Err(ProtocolError::LineTooLong {
                    actual: line.len(),
                    limit: self.max_len,
                });
            }

            let data = std::str::from_utf8(&line).map_err(|e| ProtocolError::InvalidUtf8 {
                byte_pos: e.valid_up_to(),
                details: e.to_string(),
            })?;
            let data = data.trim_end_matches(['\r', '\n']);
            Self::validate_line(data)?;

            Ok(Some(data.to_string()))
        } else {
            // No complete line yet - remember where we stopped
            self.next_index = src.len();

            if src.len() > self.max_len {
                return Err(ProtocolError::LineTooLong {
                    actual: src.len(),
                    limit: self.max_len,
                });
            }

            Ok(None)
        }
    }
}

impl Encoder<String> for LineCodec {
    type Error = ProtocolError;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        dst.reserve(line.len() + 1);
        dst.extend_from_slice(line.as_bytes());
        if !line.ends_with('\n') {
            dst.extend_from_slice(b"\n");
        }
        Ok(())
    }
}
