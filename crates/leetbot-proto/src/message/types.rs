use crate::chan::ChannelExt;
use crate::command::Command;
use crate::error::MessageParseError;
use crate::prefix::Prefix;

/// An IRCv3 message tag: key and optional unescaped value.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Tag(pub String, pub Option<String>);

/// An owned IRC message.
///
/// ```
/// use leetbot_proto::{Command, Message};
///
/// let msg: Message = ":nick!user@host PRIVMSG #channel :Hello!".parse().unwrap();
/// assert_eq!(msg.command, Command::PRIVMSG("#channel".into(), "Hello!".into()));
///
/// let reply = Message::privmsg("#channel", "hi");
/// assert_eq!(reply.to_string(), "PRIVMSG #channel :hi");
/// ```
#[derive(Clone, PartialEq, Debug)]
pub struct Message {
    /// IRCv3 message tags.
    pub tags: Option<Vec<Tag>>,
    /// Message source.
    pub prefix: Option<Prefix>,
    /// The command and its parameters.
    pub command: Command,
}

impl Message {
    /// Create a message from raw components.
    pub fn new(prefix: Option<&str>, command: &str, args: Vec<&str>) -> Result<Message, MessageParseError> {
        Message::with_tags(None, prefix, command, args)
    }

    /// Create a message with tags from raw components.
    pub fn with_tags(
        tags: Option<Vec<Tag>>,
        prefix: Option<&str>,
        command: &str,
        args: Vec<&str>,
    ) -> Result<Message, MessageParseError> {
        let prefix = prefix.map(Prefix::try_from_str).transpose()?;
        Ok(Message {
            tags,
            prefix,
            command: Command::new(command, args)?,
        })
    }

    /// The nickname from the prefix, if the source is a user.
    pub fn source_nickname(&self) -> Option<&str> {
        self.prefix.as_ref().and_then(Prefix::nickname)
    }

    /// Where a reply to this message should go: the channel for channel
    /// traffic, otherwise the sender.
    pub fn response_target(&self) -> Option<&str> {
        match &self.command {
            Command::PRIVMSG(target, _) | Command::NOTICE(target, _) if target.is_channel_target() => {
                Some(target)
            }
            _ => self.source_nickname(),
        }
    }

    /// Value of a tag by key.
    pub fn tag_value(&self, key: &str) -> Option<&str> {
        self.tags
            .as_ref()?
            .iter()
            .find(|Tag(k, _)| k == key)
            .and_then(|Tag(_, v)| v.as_deref())
    }

    /// `PRIVMSG target :text`
    #[must_use]
    pub fn privmsg(target: impl Into<String>, text: impl Into<String>) -> Self {
        Command::PRIVMSG(target.into(), text.into()).into()
    }

    /// `NOTICE target :text`
    #[must_use]
    pub fn notice(target: impl Into<String>, text: impl Into<String>) -> Self {
        Command::NOTICE(target.into(), text.into()).into()
    }

    /// `JOIN channel [key]`
    #[must_use]
    pub fn join(channel: impl Into<String>, key: Option<String>) -> Self {
        Command::JOIN(channel.into(), key).into()
    }

    /// `PART channel [:reason]`
    #[must_use]
    pub fn part(channel: impl Into<String>, reason: Option<String>) -> Self {
        Command::PART(channel.into(), reason).into()
    }

    /// `NICK nickname`
    #[must_use]
    pub fn nick(nickname: impl Into<String>) -> Self {
        Command::NICK(nickname.into()).into()
    }

    /// `USER username 0 * :realname`
    #[must_use]
    pub fn user(username: impl Into<String>, realname: impl Into<String>) -> Self {
        Command::USER(username.into(), "0".to_owned(), realname.into()).into()
    }

    /// `PING :token`
    #[must_use]
    pub fn ping(token: impl Into<String>) -> Self {
        Command::PING(token.into(), None).into()
    }

    /// `PONG :token`
    #[must_use]
    pub fn pong(token: impl Into<String>) -> Self {
        Command::PONG(token.into(), None).into()
    }

    /// `QUIT [:reason]`
    #[must_use]
    pub fn quit(reason: Option<String>) -> Self {
        Command::QUIT(reason).into()
    }
}

impl From<Command> for Message {
    fn from(command: Command) -> Self {
        Message {
            tags: None,
            prefix: None,
            command,
        }
    }
}
