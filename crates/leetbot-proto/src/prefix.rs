//! Message prefix (source) handling.

use std::fmt;
use std::str::FromStr;

use crate::error::MessageParseError;

/// The origin of a message: a server name or a `nick!user@host` mask.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum Prefix {
    /// Server name (e.g., "irc.example.com").
    ServerName(String),
    /// User prefix: (nickname, username, hostname). User and host may be empty.
    Nickname(String, String, String),
}

impl Prefix {
    /// Parse a prefix without validating its components.
    ///
    /// A bare token containing a dot and no `!`/`@` is taken as a server name.
    pub fn new_from_str(s: &str) -> Self {
        let (name, rest) = match s.find(['!', '@']) {
            Some(idx) => (&s[..idx], &s[idx..]),
            None => (s, ""),
        };

        if rest.is_empty() && name.contains('.') {
            return Prefix::ServerName(name.to_owned());
        }

        let (user, host) = if let Some(after_bang) = rest.strip_prefix('!') {
            match after_bang.split_once('@') {
                Some((user, host)) => (user, host),
                None => (after_bang, ""),
            }
        } else if let Some(host) = rest.strip_prefix('@') {
            ("", host)
        } else {
            ("", "")
        };

        Prefix::Nickname(name.to_owned(), user.to_owned(), host.to_owned())
    }

    /// Parse a prefix, rejecting empty input and embedded whitespace.
    pub fn try_from_str(s: &str) -> Result<Self, MessageParseError> {
        if s.is_empty() || s.contains([' ', '\r', '\n', '\0']) {
            return Err(MessageParseError::InvalidPrefix(s.to_owned()));
        }
        Ok(Self::new_from_str(s))
    }

    /// The nickname, if this prefix names a user.
    pub fn nickname(&self) -> Option<&str> {
        match self {
            Prefix::Nickname(nick, _, _) => Some(nick),
            Prefix::ServerName(_) => None,
        }
    }

    /// The `user@host` part of a user prefix, when both halves are known.
    pub fn user_host(&self) -> Option<String> {
        match self {
            Prefix::Nickname(_, user, host) if !host.is_empty() => {
                if user.is_empty() {
                    Some(host.clone())
                } else {
                    Some(format!("{user}@{host}"))
                }
            }
            _ => None,
        }
    }
}

impl FromStr for Prefix {
    type Err = MessageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Prefix::try_from_str(s)
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prefix::ServerName(name) => f.write_str(name),
            Prefix::Nickname(nick, user, host) => {
                f.write_str(nick)?;
                if !user.is_empty() {
                    write!(f, "!{user}")?;
                }
                if !host.is_empty() {
                    write!(f, "@{host}")?;
                }
                Ok(())
            }
        }
    }
}
