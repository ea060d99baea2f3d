//! IRC commands and their wire form.

use std::borrow::Cow;
use std::fmt;

use crate::error::MessageParseError;
use crate::response::Response;

/// An IRC command with its parameters.
///
/// Commands the bot sends or reacts to get typed variants. Everything else,
/// including unnamed numerics, is carried verbatim in [`Command::Raw`].
#[derive(Clone, PartialEq, Eq, Debug)]
#[allow(clippy::upper_case_acronyms)]
pub enum Command {
    /// `PASS password`
    PASS(String),
    /// `NICK nickname`
    NICK(String),
    /// `USER username mode * :realname`
    USER(String, String, String),
    /// `JOIN channel [key]`
    JOIN(String, Option<String>),
    /// `PART channel [:reason]`
    PART(String, Option<String>),
    /// `PRIVMSG target :text`
    PRIVMSG(String, String),
    /// `NOTICE target :text`
    NOTICE(String, String),
    /// `QUIT [:reason]`
    QUIT(Option<String>),
    /// `PING [server] :token`
    PING(String, Option<String>),
    /// `PONG [server] :token`
    PONG(String, Option<String>),
    /// `KICK channel nick [:reason]`
    KICK(String, String, Option<String>),
    /// `ERROR :message`
    ERROR(String),
    /// A named server numeric and its parameters.
    Response(Response, Vec<String>),
    /// Any other command, verbatim.
    Raw(String, Vec<String>),
}

fn arity(command: &'static str, expected: usize, got: usize) -> MessageParseError {
    MessageParseError::NotEnoughArguments {
        command,
        expected,
        got,
    }
}

fn owned(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| (*s).to_owned()).collect()
}

impl Command {
    /// Build a command from its name and raw parameters.
    ///
    /// Known commands with an unusual parameter count fall back to
    /// [`Command::Raw`] rather than failing, except where a required
    /// parameter is missing.
    pub fn new(cmd: &str, args: Vec<&str>) -> Result<Command, MessageParseError> {
        if cmd.is_empty() {
            return Err(MessageParseError::InvalidCommand);
        }

        if cmd.len() == 3 && cmd.bytes().all(|b| b.is_ascii_digit()) {
            let code: u16 = cmd.parse().map_err(|_| MessageParseError::InvalidCommand)?;
            return Ok(match Response::from_code(code) {
                Some(resp) => Command::Response(resp, owned(&args)),
                None => Command::Raw(cmd.to_owned(), owned(&args)),
            });
        }

        let upper = cmd.to_ascii_uppercase();
        let n = args.len();
        let command = match (upper.as_str(), n) {
            ("PASS", 1) => Command::PASS(args[0].to_owned()),
            ("NICK", 1) => Command::NICK(args[0].to_owned()),
            ("NICK", 0) => return Err(arity("NICK", 1, 0)),
            ("USER", 4) => Command::USER(args[0].to_owned(), args[1].to_owned(), args[3].to_owned()),
            ("JOIN", 1) => Command::JOIN(args[0].to_owned(), None),
            ("JOIN", 2) => Command::JOIN(args[0].to_owned(), Some(args[1].to_owned())),
            ("JOIN", 0) => return Err(arity("JOIN", 1, 0)),
            ("PART", 1) => Command::PART(args[0].to_owned(), None),
            ("PART", 2) => Command::PART(args[0].to_owned(), Some(args[1].to_owned())),
            ("PART", 0) => return Err(arity("PART", 1, 0)),
            ("PRIVMSG", 2) => Command::PRIVMSG(args[0].to_owned(), args[1].to_owned()),
            ("PRIVMSG", _) if n < 2 => return Err(arity("PRIVMSG", 2, n)),
            ("NOTICE", 2) => Command::NOTICE(args[0].to_owned(), args[1].to_owned()),
            ("NOTICE", _) if n < 2 => return Err(arity("NOTICE", 2, n)),
            ("QUIT", 0) => Command::QUIT(None),
            ("QUIT", 1) => Command::QUIT(Some(args[0].to_owned())),
            ("PING", 1) => Command::PING(args[0].to_owned(), None),
            ("PING", 2) => Command::PING(args[0].to_owned(), Some(args[1].to_owned())),
            ("PING", 0) => return Err(arity("PING", 1, 0)),
            ("PONG", 1) => Command::PONG(args[0].to_owned(), None),
            ("PONG", 2) => Command::PONG(args[0].to_owned(), Some(args[1].to_owned())),
            ("PONG", 0) => return Err(arity("PONG", 1, 0)),
            ("KICK", 2) => Command::KICK(args[0].to_owned(), args[1].to_owned(), None),
            ("KICK", 3) => Command::KICK(
                args[0].to_owned(),
                args[1].to_owned(),
                Some(args[2].to_owned()),
            ),
            ("KICK", _) if n < 2 => return Err(arity("KICK", 2, n)),
            ("ERROR", 1) => Command::ERROR(args[0].to_owned()),
            _ => Command::Raw(upper, owned(&args)),
        };
        Ok(command)
    }

    /// The command name as it appears on the wire.
    pub fn name(&self) -> Cow<'_, str> {
        match self {
            Command::PASS(_) => "PASS".into(),
            Command::NICK(_) => "NICK".into(),
            Command::USER(..) => "USER".into(),
            Command::JOIN(..) => "JOIN".into(),
            Command::PART(..) => "PART".into(),
            Command::PRIVMSG(..) => "PRIVMSG".into(),
            Command::NOTICE(..) => "NOTICE".into(),
            Command::QUIT(_) => "QUIT".into(),
            Command::PING(..) => "PING".into(),
            Command::PONG(..) => "PONG".into(),
            Command::KICK(..) => "KICK".into(),
            Command::ERROR(_) => "ERROR".into(),
            Command::Response(resp, _) => format!("{:03}", resp.code()).into(),
            Command::Raw(name, _) => name.as_str().into(),
        }
    }

    /// The numeric value, for numeric replies.
    pub fn numeric(&self) -> Option<u16> {
        match self {
            Command::Response(resp, _) => Some(resp.code()),
            Command::Raw(name, _) if name.len() == 3 => name.parse().ok(),
            _ => None,
        }
    }

    /// Parameters in wire order, and whether the last one is always sent
    /// in trailing (`:`) position.
    pub fn params(&self) -> (Vec<&str>, bool) {
        match self {
            Command::PASS(p) => (vec![p], false),
            Command::NICK(n) => (vec![n], false),
            Command::USER(u, m, r) => (vec![u, m, "*", r], true),
            Command::JOIN(c, Some(k)) => (vec![c, k], false),
            Command::JOIN(c, None) => (vec![c], false),
            Command::PART(c, Some(m)) => (vec![c, m], true),
            Command::PART(c, None) => (vec![c], false),
            Command::PRIVMSG(t, m) | Command::NOTICE(t, m) => (vec![t, m], true),
            Command::QUIT(Some(m)) => (vec![m], true),
            Command::QUIT(None) => (vec![], false),
            Command::PING(a, Some(b)) | Command::PONG(a, Some(b)) => (vec![a, b], true),
            Command::PING(a, None) | Command::PONG(a, None) => (vec![a], true),
            Command::KICK(c, n, Some(r)) => (vec![c, n, r], true),
            Command::KICK(c, n, None) => (vec![c, n], false),
            Command::ERROR(m) => (vec![m], true),
            Command::Response(_, args) | Command::Raw(_, args) => {
                (args.iter().map(String::as_str).collect(), false)
            }
        }
    }

    /// Check every parameter can be written without changing its meaning.
    ///
    /// Only the last parameter may be empty, contain spaces, or start with
    /// `:`. No parameter may contain CR, LF or NUL.
    pub fn validate(&self) -> Result<(), MessageParseError> {
        let (params, _) = self.params();
        if params.len() > crate::MAX_PARAMS {
            return Err(MessageParseError::TooManyParameters(params.len()));
        }
        let last = params.len().saturating_sub(1);
        for (index, value) in params.iter().enumerate() {
            if value.contains(['\r', '\n', '\0']) {
                return Err(MessageParseError::ParseContext {
                    position: index,
                    context: "parameter contains a line break or NUL".to_owned(),
                });
            }
            if index < last && needs_colon_prefix(value) {
                return Err(MessageParseError::InvalidMiddleParameter {
                    index,
                    value: (*value).to_owned(),
                });
            }
        }
        Ok(())
    }
}

/// Whether a final parameter must be written in trailing position.
pub fn needs_colon_prefix(s: &str) -> bool {
    s.is_empty() || s.contains(' ') || s.starts_with(':')
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())?;
        let (params, force_trailing) = self.params();
        let last = params.len().saturating_sub(1);
        for (i, param) in params.iter().enumerate() {
            f.write_str(" ")?;
            if i == last && (force_trailing || needs_colon_prefix(param)) {
                f.write_str(":")?;
            }
            f.write_str(param)?;
        }
        Ok(())
    }
}
