//! Outbound path: message shaping, splitting and rate-limited writing.
//!
//! Each connection owns one [`OutboundQueue`] and one [`OutboundWriter`]
//! task. Paced traffic (channel and private messages, joins, raw lines)
//! drains through a [`RateBucket`]; control traffic (PONG, keepalive PING,
//! registration, QUIT) bypasses the bucket but still goes through the same
//! writer so lines never interleave.

mod bucket;
pub mod split;
mod writer;

use leetbot_proto::Message;

pub use bucket::RateBucket;
pub use split::{payload_budget, shape_response, split_text};
pub use writer::{OutboundQueue, OutboundReceiver, OutboundWriter, channel};

/// Whether a message is sent as PRIVMSG or NOTICE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundKind {
    Privmsg,
    Notice,
}

impl OutboundKind {
    pub fn command(self) -> &'static str {
        match self {
            OutboundKind::Privmsg => "PRIVMSG",
            OutboundKind::Notice => "NOTICE",
        }
    }
}

/// Text addressed to a channel or nickname.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub kind: OutboundKind,
    pub target: String,
    pub body: String,
}

impl OutboundMessage {
    pub fn privmsg(target: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind: OutboundKind::Privmsg,
            target: target.into(),
            body: body.into(),
        }
    }

    pub fn notice(target: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind: OutboundKind::Notice,
            target: target.into(),
            body: body.into(),
        }
    }

    /// Same kind and target with a different body.
    pub fn with_body(&self, body: impl Into<String>) -> Self {
        Self {
            kind: self.kind,
            target: self.target.clone(),
            body: body.into(),
        }
    }

    pub fn to_message(&self) -> Message {
        match self.kind {
            OutboundKind::Privmsg => Message::privmsg(&self.target, &self.body),
            OutboundKind::Notice => Message::notice(&self.target, &self.body),
        }
    }
}
