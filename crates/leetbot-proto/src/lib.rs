//! # leetbot-proto
//!
//! The wire layer of leetbot: parsing raw IRC lines into [`Message`]s,
//! encoding outbound commands with correct trailing-parameter placement,
//! and normalizing inbound traffic into [`InboundMessage`] events the bot
//! dispatches on.
//!
//! ```
//! use leetbot_proto::{InboundMessage, MessageKind};
//!
//! let event = InboundMessage::decode(":alice!a@host PRIVMSG #chan :hello there", "libera").unwrap();
//! assert_eq!(event.kind, MessageKind::ChannelMessage);
//! assert_eq!(event.sender_nick.as_deref(), Some("alice"));
//! assert_eq!(event.text, "hello there");
//! ```
//!
//! ## Features
//!
//! - `tokio` (default): [`LineCodec`] and [`IrcCodec`] for `tokio_util::codec` framing.

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod chan;
pub mod command;
pub mod error;
pub mod inbound;
#[cfg(feature = "tokio")]
pub mod irc;
#[cfg(feature = "tokio")]
pub mod line;
pub mod message;
pub mod prefix;
pub mod response;

pub use self::chan::ChannelExt;
pub use self::command::Command;
pub use self::error::{MessageParseError, ProtocolError, Result};
pub use self::inbound::{InboundMessage, MessageKind};
#[cfg(feature = "tokio")]
pub use self::irc::IrcCodec;
#[cfg(feature = "tokio")]
pub use self::line::LineCodec;
pub use self::message::{encode, Message, Tag};
pub use self::prefix::Prefix;
pub use self::response::Response;

/// Maximum length of a single IRC line on the wire, including the CR-LF terminator.
pub const MAX_LINE_LEN: usize = 512;

/// Maximum accepted inbound line length when the server prepends IRCv3 tags.
pub const MAX_TAGGED_LINE_LEN: usize = 8191;

/// Maximum number of parameters a single message may carry.
pub const MAX_PARAMS: usize = 15;

/// Fold a nickname or channel name to its RFC 1459 lowercase form.
///
/// `[]\~` are the uppercase forms of `{}|^`.
pub fn irc_to_lower(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '[' => '{',
            ']' => '}',
            '\\' => '|',
            '~' => '^',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

/// Case-insensitive comparison under RFC 1459 casemapping.
pub fn irc_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && irc_to_lower(a) == irc_to_lower(b)
}
