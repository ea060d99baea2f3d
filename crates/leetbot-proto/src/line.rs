//! Newline-delimited framing.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error;
use crate::MAX_TAGGED_LINE_LEN;

/// Splits a byte stream into lines and writes lines with a CR-LF terminator.
///
/// Decoding is lossy: invalid UTF-8 is replaced rather than failing the
/// stream, and a line longer than the configured limit is dropped whole
/// (with a warning) so one bad line never ends the connection.
pub struct LineCodec {
    /// Index of next byte to check for newline
    next_index: usize,
    max_len: usize,
    /// Inside an over-long line; drop bytes until the next newline.
    discarding: bool,
}

impl LineCodec {
    /// Codec accepting tagged lines up to [`MAX_TAGGED_LINE_LEN`] bytes.
    pub fn new() -> Self {
        Self::with_max_len(MAX_TAGGED_LINE_LEN)
    }

    /// Codec with a custom maximum line length.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
            discarding: false,
        }
    }

    fn finish_line(line: &[u8]) -> Option<String> {
        let text = String::from_utf8_lossy(line);
        let text = text.trim_end_matches(['\r', '\n']);
        if text.is_empty() {
            None
        } else {
            Some(text.to_owned())
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = error::ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> error::Result<Option<String>> {
        loop {
            let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
                if src.len() > self.max_len {
                    if !self.discarding {
                        tracing::warn!(limit = self.max_len, "discarding over-long inbound line");
                    }
                    self.discarding = true;
                    src.clear();
                    self.next_index = 0;
                } else {
                    self.next_index = src.len();
                }
                return Ok(None);
            };

            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            if self.discarding {
                self.discarding = false;
                continue;
            }
            if line.len() > self.max_len {
                tracing::warn!(
                    actual = line.len(),
                    limit = self.max_len,
                    "discarding over-long inbound line"
                );
                continue;
            }
            if let Some(text) = Self::finish_line(&line) {
                return Ok(Some(text));
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> error::Result<Option<String>> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        if src.is_empty() || self.discarding {
            src.clear();
            return Ok(None);
        }
        let rest = src.split();
        self.next_index = 0;
        Ok(Self::finish_line(&rest))
    }
}

impl Encoder<String> for LineCodec {
    type Error = error::ProtocolError;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> error::Result<()> {
        dst.reserve(line.len() + 2);
        dst.extend_from_slice(line.as_bytes());
        dst.extend_from_slice(b"\r\n");
        Ok(())
    }
}
