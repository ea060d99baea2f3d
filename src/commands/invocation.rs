//! Turning a prefixed line into a command request.

use leetbot_proto::irc_to_lower;

use super::descriptor::Origin;
use crate::security::AdminCredential;

/// Cooldown identity used for console invocations.
pub const CONSOLE_IDENTITY: &str = "console";

/// A parsed command request from IRC or the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    /// Lowercased command token as typed (alias resolution happens in the registry).
    pub name: String,
    /// Whitespace-separated arguments.
    pub args: Vec<String>,
    /// Everything after the command token, trimmed.
    pub raw: String,
    pub origin: Origin,
    /// Server the request arrived on; `None` for the console.
    pub server: Option<String>,
    /// Where a public reply goes: the channel, the sender's nick, or `console`.
    pub target: String,
    /// Nick of the sender; `None` for the console.
    pub sender: Option<String>,
    /// Whether an admin credential was presented and accepted.
    pub admin_valid: bool,
}

impl CommandInvocation {
    /// Parse `text` if it starts with `prefix` followed by a command token.
    pub fn parse(text: &str, prefix: char, origin: Origin) -> Option<Self> {
        let rest = text.trim_start().strip_prefix(prefix)?;
        let (token, remainder) = match rest.split_once(char::is_whitespace) {
            Some((token, remainder)) => (token, remainder.trim()),
            None => (rest.trim_end(), ""),
        };
        if token.is_empty() {
            return None;
        }

        Some(Self {
            name: token.to_lowercase(),
            args: remainder.split_whitespace().map(str::to_owned).collect(),
            raw: remainder.to_owned(),
            origin,
            server: None,
            target: CONSOLE_IDENTITY.to_owned(),
            sender: None,
            admin_valid: origin.is_console(),
        })
    }

    /// Attach the IRC context the request arrived in.
    #[must_use]
    pub fn on_server(
        mut self,
        server: impl Into<String>,
        target: impl Into<String>,
        sender: impl Into<String>,
    ) -> Self {
        self.server = Some(server.into());
        self.target = target.into();
        self.sender = Some(sender.into());
        self
    }

    /// Key for cooldown bookkeeping: `nick@server`, or `console`.
    pub fn identity(&self) -> String {
        match (&self.sender, &self.server) {
            (Some(sender), Some(server)) => format!("{}@{}", irc_to_lower(sender), server),
            _ => CONSOLE_IDENTITY.to_owned(),
        }
    }

    /// Check the leading argument against the admin credential.
    ///
    /// On IRC the first argument is always consumed as the password attempt,
    /// so it never reaches a handler or a log line. The console is already
    /// trusted; a leading password there is stripped only when it matches.
    pub fn authenticate(&mut self, credential: Option<&AdminCredential>) {
        let Some(first) = self.args.first() else {
            return;
        };
        let matches = credential.is_some_and(|c| c.verify(first));

        if self.origin.is_console() {
            if matches {
                self.strip_first_arg();
            }
            return;
        }

        self.admin_valid = matches;
        self.strip_first_arg();
    }

    fn strip_first_arg(&mut self) {
        if self.args.is_empty() {
            return;
        }
        self.args.remove(0);
        self.raw = self
            .raw
            .split_once(char::is_whitespace)
            .map(|(_, rest)| rest.trim_start().to_owned())
            .unwrap_or_default();
    }

    /// Argument `index`, if present.
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_args_and_raw() {
        let inv = CommandInvocation::parse("!Kaiku  hello   world ", '!', Origin::Channel).unwrap();
        assert_eq!(inv.name, "kaiku");
        assert_eq!(inv.args, vec!["hello", "world"]);
        assert_eq!(inv.raw, "hello   world");
        assert!(!inv.admin_valid);
    }

    #[test]
    fn rejects_non_commands() {
        assert!(CommandInvocation::parse("hello", '!', Origin::Channel).is_none());
        assert!(CommandInvocation::parse("!", '!', Origin::Channel).is_none());
        assert!(CommandInvocation::parse("! ping", '!', Origin::Channel).is_none());
    }

    #[test]
    fn console_defaults() {
        let inv = CommandInvocation::parse("!status", '!', Origin::Console).unwrap();
        assert!(inv.admin_valid);
        assert_eq!(inv.identity(), "console");
        assert_eq!(inv.target, "console");
    }

    #[test]
    fn identity_folds_case() {
        let inv = CommandInvocation::parse("!ping", '!', Origin::Channel)
            .unwrap()
            .on_server("libera", "#leet", "Alice[m]");
        assert_eq!(inv.identity(), "alice{m}@libera");
    }

    #[test]
    fn authenticate_strips_password() {
        let cred = AdminCredential::Plain("hunter2".into());

        let mut inv = CommandInvocation::parse("!join hunter2 #chan key", '!', Origin::Private)
            .unwrap()
            .on_server("libera", "alice", "alice");
        inv.authenticate(Some(&cred));
        assert!(inv.admin_valid);
        assert_eq!(inv.args, vec!["#chan", "key"]);
        assert_eq!(inv.raw, "#chan key");

        let mut inv = CommandInvocation::parse("!join wrong #chan", '!', Origin::Private)
            .unwrap()
            .on_server("libera", "alice", "alice");
        inv.authenticate(Some(&cred));
        assert!(!inv.admin_valid);
        assert_eq!(inv.args, vec!["#chan"]);

        let mut inv = CommandInvocation::parse("!join hunter2 #chan", '!', Origin::Private)
            .unwrap()
            .on_server("libera", "alice", "alice");
        inv.authenticate(None);
        assert!(!inv.admin_valid);
    }

    #[test]
    fn console_keeps_non_password_args() {
        let cred = AdminCredential::Plain("hunter2".into());

        let mut inv = CommandInvocation::parse("!join #chan", '!', Origin::Console).unwrap();
        inv.authenticate(Some(&cred));
        assert!(inv.admin_valid);
        assert_eq!(inv.args, vec!["#chan"]);

        let mut inv = CommandInvocation::parse("!join hunter2 #chan", '!', Origin::Console).unwrap();
        inv.authenticate(Some(&cred));
        assert_eq!(inv.args, vec!["#chan"]);
    }
}
