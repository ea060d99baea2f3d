//! Message-level codec built on [`LineCodec`].

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error;
use crate::line::LineCodec;
use crate::message::Message;

/// Encodes [`Message`]s with full wire validation and decodes lines into
/// messages.
///
/// Lines that fail to parse are logged and skipped rather than surfaced as
/// stream errors.
#[derive(Default)]
pub struct IrcCodec {
    inner: LineCodec,
}

impl IrcCodec {
    /// Codec with the default inbound line limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec with a custom inbound line limit.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            inner: LineCodec::with_max_len(max_len),
        }
    }
}

impl Decoder for IrcCodec {
    type Item = Message;
    type Error = error::ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> error::Result<Option<Message>> {
        while let Some(line) = self.inner.decode(src)? {
            match line.parse::<Message>() {
                Ok(msg) => return Ok(Some(msg)),
                Err(e) => tracing::warn!(line = %line, error = %e, "skipping unparseable line"),
            }
        }
        Ok(None)
    }
}

impl Encoder<Message> for IrcCodec {
    type Error = error::ProtocolError;

    fn encode(&mut self, msg: Message, dst: &mut BytesMut) -> error::Result<()> {
        let line = msg.encode()?;
        self.inner.encode(line, dst)
    }
}
