//! Normalized inbound events.
//!
//! The connection layer turns every parsed [`Message`] into an
//! [`InboundMessage`] tagged with the server it arrived on, so downstream
//! code never has to pick apart prefixes and parameter positions.

use std::time::Instant;

use crate::chan::ChannelExt;
use crate::command::Command;
use crate::error::Result;
use crate::message::Message;

/// Classification of an inbound message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// PRIVMSG addressed to a channel.
    ChannelMessage,
    /// PRIVMSG addressed to the bot directly.
    PrivateMessage,
    /// NOTICE to a channel or to the bot.
    Notice,
    /// Someone (possibly the bot) joined a channel.
    Join,
    /// Someone (possibly the bot) left a channel.
    Part,
    /// Someone disconnected from the network.
    Quit,
    /// Server keepalive probe.
    Ping,
    /// Numeric server reply.
    Numeric,
    /// Any other command.
    Other,
}

/// One decoded line from a server, with the fields handlers care about lifted out.
#[derive(Clone, Debug, PartialEq)]
pub struct InboundMessage {
    /// Classification.
    pub kind: MessageKind,
    /// Name of the server connection this arrived on.
    pub server: String,
    /// Nickname of the sender, when the source is a user.
    pub sender_nick: Option<String>,
    /// `user@host` of the sender, when known.
    pub sender_host: Option<String>,
    /// Channel or nickname the message was addressed to.
    pub target: Option<String>,
    /// Free text: message body, part/quit reason, ping token or numeric text.
    pub text: String,
    /// Numeric code for [`MessageKind::Numeric`].
    pub numeric: Option<u16>,
    /// All parameters in wire order.
    pub params: Vec<String>,
    /// When the line was read.
    pub received_at: Instant,
    /// The parsed message.
    pub message: Message,
}

impl InboundMessage {
    /// Parse a raw line received from `server`.
    pub fn decode(line: &str, server: &str) -> Result<Self> {
        let message: Message = line.parse()?;
        Ok(Self::from_message(message, server))
    }

    /// Normalize an already-parsed message.
    pub fn from_message(message: Message, server: &str) -> Self {
        let (params, _) = message.command.params();
        let params: Vec<String> = params.into_iter().map(str::to_owned).collect();
        let last = params.last().cloned().unwrap_or_default();

        let (kind, target, text) = match &message.command {
            Command::PRIVMSG(target, text) => {
                let kind = if target.is_channel_target() {
                    MessageKind::ChannelMessage
                } else {
                    MessageKind::PrivateMessage
                };
                (kind, Some(target.clone()), text.clone())
            }
            Command::NOTICE(target, text) => (MessageKind::Notice, Some(target.clone()), text.clone()),
            Command::JOIN(channel, _) => (MessageKind::Join, Some(channel.clone()), String::new()),
            Command::PART(channel, reason) => (
                MessageKind::Part,
                Some(channel.clone()),
                reason.clone().unwrap_or_default(),
            ),
            Command::QUIT(reason) => (MessageKind::Quit, None, reason.clone().unwrap_or_default()),
            Command::PING(first, second) => (
                MessageKind::Ping,
                None,
                second.clone().unwrap_or_else(|| first.clone()),
            ),
            cmd if cmd.numeric().is_some() => (MessageKind::Numeric, params.first().cloned(), last),
            _ => (MessageKind::Other, params.first().cloned(), last),
        };

        InboundMessage {
            kind,
            server: server.to_owned(),
            sender_nick: message.source_nickname().map(str::to_owned),
            sender_host: message.prefix.as_ref().and_then(|p| p.user_host()),
            target,
            text,
            numeric: message.command.numeric(),
            params,
            received_at: Instant::now(),
            message,
        }
    }

    /// True for channel PRIVMSGs.
    pub fn is_channel(&self) -> bool {
        self.kind == MessageKind::ChannelMessage
    }

    /// Where a reply belongs: the channel for channel traffic, otherwise the sender.
    pub fn reply_target(&self) -> Option<&str> {
        match self.kind {
            MessageKind::ChannelMessage => self.target.as_deref(),
            _ => self.sender_nick.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_message() {
        let m = InboundMessage::decode(":alice!al@example.org PRIVMSG #rust :!ping now", "libera").unwrap();
        assert_eq!(m.kind, MessageKind::ChannelMessage);
        assert_eq!(m.server, "libera");
        assert_eq!(m.sender_nick.as_deref(), Some("alice"));
        assert_eq!(m.sender_host.as_deref(), Some("al@example.org"));
        assert_eq!(m.target.as_deref(), Some("#rust"));
        assert_eq!(m.text, "!ping now");
        assert_eq!(m.reply_target(), Some("#rust"));
    }

    #[test]
    fn private_message_replies_to_sender() {
        let m = InboundMessage::decode(":bob!b@h PRIVMSG leetbot :help", "net").unwrap();
        assert_eq!(m.kind, MessageKind::PrivateMessage);
        assert_eq!(m.reply_target(), Some("bob"));
    }

    #[test]
    fn ping_is_distinct() {
        let m = InboundMessage::decode("PING :abc123", "net").unwrap();
        assert_eq!(m.kind, MessageKind::Ping);
        assert_eq!(m.text, "abc123");
        assert_eq!(m.sender_nick, None);
    }

    #[test]
    fn numerics_carry_code_and_text() {
        let m = InboundMessage::decode(":irc.test 001 leetbot :Welcome to the test net", "net").unwrap();
        assert_eq!(m.kind, MessageKind::Numeric);
        assert_eq!(m.numeric, Some(1));
        assert_eq!(m.target.as_deref(), Some("leetbot"));
        assert_eq!(m.text, "Welcome to the test net");

        let m = InboundMessage::decode(":irc.test 265 leetbot 4 9 :Current local users", "net").unwrap();
        assert_eq!(m.numeric, Some(265));
        assert_eq!(m.params.len(), 4);
    }

    #[test]
    fn membership_events() {
        let join = InboundMessage::decode(":carol!c@h JOIN #chan", "net").unwrap();
        assert_eq!(join.kind, MessageKind::Join);
        assert_eq!(join.target.as_deref(), Some("#chan"));

        let part = InboundMessage::decode(":carol!c@h PART #chan :bye", "net").unwrap();
        assert_eq!(part.kind, MessageKind::Part);
        assert_eq!(part.text, "bye");

        let quit = InboundMessage::decode(":carol!c@h QUIT :Client Quit", "net").unwrap();
        assert_eq!(quit.kind, MessageKind::Quit);
        assert_eq!(quit.text, "Client Quit");
    }

    #[test]
    fn notice_and_other() {
        let n = InboundMessage::decode(":NickServ!s@services NOTICE leetbot :identify", "net").unwrap();
        assert_eq!(n.kind, MessageKind::Notice);
        let o = InboundMessage::decode(":dave!d@h MODE #chan +o leetbot", "net").unwrap();
        assert_eq!(o.kind, MessageKind::Other);
        assert_eq!(o.target.as_deref(), Some("#chan"));
    }

    #[test]
    fn malformed_line_errors() {
        assert!(InboundMessage::decode(":nobody", "net").is_err());
    }
}
