use std::fmt::{self, Write};

use crate::command::Command;
use crate::error::{ProtocolError, Result};
use crate::MAX_LINE_LEN;

use super::types::{Message, Tag};

fn escape_tag_value(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    for c in value.chars() {
        match c {
            ';' => f.write_str("\\:")?,
            ' ' => f.write_str("\\s")?,
            '\\' => f.write_str("\\\\")?,
            '\r' => f.write_str("\\r")?,
            '\n' => f.write_str("\\n")?,
            c => f.write_char(c)?,
        }
    }
    Ok(())
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(tags) = self.tags.as_ref().filter(|t| !t.is_empty()) {
            f.write_char('@')?;
            for (i, Tag(key, value)) in tags.iter().enumerate() {
                if i > 0 {
                    f.write_char(';')?;
                }
                f.write_str(key)?;
                if let Some(value) = value {
                    f.write_char('=')?;
                    escape_tag_value(f, value)?;
                }
            }
            f.write_char(' ')?;
        }
        if let Some(prefix) = &self.prefix {
            write!(f, ":{prefix} ")?;
        }
        write!(f, "{}", self.command)
    }
}

impl Message {
    /// Serialize for the wire, without the CR-LF terminator.
    ///
    /// Fails when a parameter cannot be written losslessly or when the
    /// line plus terminator would exceed [`MAX_LINE_LEN`].
    pub fn encode(&self) -> Result<String> {
        self.command
            .validate()
            .map_err(|cause| ProtocolError::invalid(&self.command.name(), cause))?;
        let line = self.to_string();
        let actual = line.len() + 2;
        if actual > MAX_LINE_LEN {
            return Err(ProtocolError::MessageTooLong {
                actual,
                limit: MAX_LINE_LEN,
            });
        }
        Ok(line)
    }
}

/// Encode a command and its parameters into a single wire line.
///
/// The last parameter is placed in trailing position when it needs to be
/// (empty, contains a space, or starts with `:`), and always for commands
/// whose final argument is free text.
///
/// ```
/// assert_eq!(leetbot_proto::encode("PRIVMSG", &["#chan", "hi there"]).unwrap(), "PRIVMSG #chan :hi there");
/// assert_eq!(leetbot_proto::encode("PONG", &["abc123"]).unwrap(), "PONG :abc123");
/// ```
pub fn encode(command: &str, params: &[&str]) -> Result<String> {
    let command = Command::new(command, params.to_vec())
        .map_err(|cause| ProtocolError::invalid(command, cause))?;
    Message::from(command).encode()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MessageParseError;

    #[test]
    fn encodes_join_with_key() {
        assert_eq!(encode("JOIN", &["#secret", "hunter2"]).unwrap(), "JOIN #secret hunter2");
    }

    #[test]
    fn encodes_user_registration() {
        let msg = Message::user("leetbot", "Leet Bot");
        assert_eq!(msg.encode().unwrap(), "USER leetbot 0 * :Leet Bot");
    }

    #[test]
    fn trailing_colon_for_leading_colon_param() {
        assert_eq!(encode("TOPIC", &["#c", ":)"]).unwrap(), "TOPIC #c ::)");
    }

    #[test]
    fn rejects_overlong_lines() {
        let text = "x".repeat(600);
        assert!(matches!(
            encode("PRIVMSG", &["#chan", &text]),
            Err(ProtocolError::MessageTooLong { limit: 512, .. })
        ));
    }

    #[test]
    fn limit_counts_terminator() {
        // "PRIVMSG #c :" is 12 bytes; 12 + 498 + 2 = 512
        let text = "y".repeat(498);
        assert!(encode("PRIVMSG", &["#c", &text]).is_ok());
        let text = "y".repeat(499);
        assert!(encode("PRIVMSG", &["#c", &text]).is_err());
    }

    #[test]
    fn rejects_injected_line_breaks() {
        let err = encode("PRIVMSG", &["#c", "hi\r\nQUIT :bye"]).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidMessage { .. }));
    }

    #[test]
    fn rejects_space_in_middle_param() {
        let err = encode("MODE", &["#a b", "+o"]).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidMessage { cause: MessageParseError::InvalidMiddleParameter { .. }, .. }
        ));
    }

    #[test]
    fn tags_are_escaped() {
        let msg = Message {
            tags: Some(vec![Tag("label".into(), Some("a b;c".into()))]),
            prefix: None,
            command: Command::PING("x".into(), None),
        };
        assert_eq!(msg.to_string(), "@label=a\\sb\\:c PING :x");
    }
}
