//! Sans-IO session state machine.
//!
//! [`Session`] consumes decoded server messages and returns the actions the
//! connection task must carry out. It owns the nickname and joined-channel
//! set; nothing else mutates them.

use std::collections::BTreeMap;
use std::fmt;

use leetbot_proto::{
    ChannelExt, Command, InboundMessage, Message, MessageKind, Response, irc_eq, irc_to_lower,
};
use tracing::{debug, info, warn};

use crate::config::{BotConfig, ChannelConfig, ServerIdentity};

/// Nickname length most networks accept.
pub const MAX_NICK_LEN: usize = 30;

/// Fallback nicknames tried before giving up.
pub const MAX_NICK_ATTEMPTS: u32 = 10;

/// Why a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// `stop` was called.
    Requested,
    /// Socket, TLS or DNS failure.
    Error(String),
    /// Every fallback nickname was rejected.
    NicknameUnavailable,
    /// The server closed the socket.
    ServerClosed,
    /// The server sent ERROR.
    ServerError(String),
    /// No welcome within the registration window.
    RegistrationTimeout,
    /// Keepalive PING went unanswered.
    PingTimeout,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::Requested => f.write_str("requested"),
            DisconnectReason::Error(e) => write!(f, "error: {e}"),
            DisconnectReason::NicknameUnavailable => f.write_str("nickname unavailable"),
            DisconnectReason::ServerClosed => f.write_str("closed by server"),
            DisconnectReason::ServerError(e) => write!(f, "server error: {e}"),
            DisconnectReason::RegistrationTimeout => f.write_str("registration timed out"),
            DisconnectReason::PingTimeout => f.write_str("ping timeout"),
        }
    }
}

/// Connection lifecycle. Transitions only move forward, except that any
/// state may drop to `Disconnected`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected; `None` before the first attempt.
    Disconnected(Option<DisconnectReason>),
    Connecting,
    Registering,
    Joining,
    Ready,
}

impl ConnectionState {
    pub fn is_ready(&self) -> bool {
        matches!(self, ConnectionState::Ready)
    }

    pub fn is_disconnected(&self) -> bool {
        matches!(self, ConnectionState::Disconnected(_))
    }

    fn rank(&self) -> u8 {
        match self {
            ConnectionState::Disconnected(_) => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Registering => 2,
            ConnectionState::Joining => 3,
            ConnectionState::Ready => 4,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected(None) => f.write_str("disconnected"),
            ConnectionState::Disconnected(Some(reason)) => write!(f, "disconnected ({reason})"),
            ConnectionState::Connecting => f.write_str("connecting"),
            ConnectionState::Registering => f.write_str("registering"),
            ConnectionState::Joining => f.write_str("joining"),
            ConnectionState::Ready => f.write_str("ready"),
        }
    }
}

/// What the connection task must do next.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Write ahead of paced traffic, bypassing the rate limiter.
    Control(Message),
    /// Queue behind the rate limiter.
    Paced(Message),
    /// Hand to the dispatcher.
    Forward(InboundMessage),
    /// Publish a new state.
    Transition(ConnectionState),
}

/// Per-connection protocol state.
#[derive(Debug)]
pub struct Session {
    server: String,
    state: ConnectionState,
    base_nick: String,
    nickname: String,
    nick_attempts: u32,
    username: String,
    realname: String,
    channels: Vec<ChannelConfig>,
    /// Casefolded names of configured channels still awaiting a reply.
    pending: Vec<String>,
    /// Casefolded name -> name as the server spelled it.
    joined: BTreeMap<String, String>,
}

impl Session {
    pub fn new(identity: &ServerIdentity, bot: &BotConfig) -> Self {
        let nickname = if identity.nickname.is_empty() {
            bot.name.clone()
        } else {
            identity.nickname.clone()
        };
        Self {
            server: identity.name.clone(),
            state: ConnectionState::Disconnected(None),
            base_nick: nickname.clone(),
            nickname,
            nick_attempts: 0,
            username: bot.username().to_owned(),
            realname: bot.realname.clone(),
            channels: identity.channels.clone(),
            pending: Vec::new(),
            joined: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    /// Joined channels in casefolded order.
    pub fn channels(&self) -> Vec<String> {
        self.joined.values().cloned().collect()
    }

    pub fn is_joined(&self, channel: &str) -> bool {
        self.joined.contains_key(&irc_to_lower(channel))
    }

    /// The socket is being opened.
    pub fn connecting(&mut self) -> Vec<SessionAction> {
        self.transition(ConnectionState::Connecting).into_iter().collect()
    }

    /// The socket is open: send NICK and USER.
    pub fn register(&mut self) -> Vec<SessionAction> {
        let mut actions = vec![
            SessionAction::Control(Message::nick(&self.nickname)),
            SessionAction::Control(Message::user(&self.username, &self.realname)),
        ];
        actions.extend(self.transition(ConnectionState::Registering));
        actions
    }

    /// The connection ended; later messages are ignored.
    pub fn disconnect(&mut self, reason: DisconnectReason) -> Vec<SessionAction> {
        if self.state.is_disconnected() {
            return Vec::new();
        }
        self.pending.clear();
        self.joined.clear();
        self.transition(ConnectionState::Disconnected(Some(reason)))
            .into_iter()
            .collect()
    }

    /// The join window closed: carry on without channels that never answered.
    pub fn join_timed_out(&mut self) -> Vec<SessionAction> {
        if self.state != ConnectionState::Joining {
            return Vec::new();
        }
        warn!(server = %self.server, channels = ?self.pending, "no reply to JOIN, continuing without");
        self.pending.clear();
        let mut actions = Vec::new();
        self.maybe_ready(&mut actions);
        actions
    }

    /// Feed one decoded message.
    pub fn handle(&mut self, msg: InboundMessage) -> Vec<SessionAction> {
        if self.state.is_disconnected() {
            return Vec::new();
        }

        if msg.kind == MessageKind::Ping {
            return vec![SessionAction::Control(Message::pong(msg.text))];
        }
        if let Command::ERROR(text) = &msg.message.command {
            return self.disconnect(DisconnectReason::ServerError(text.clone()));
        }

        let mut actions = Vec::new();
        match &msg.message.command {
            Command::Response(response, params) => {
                self.on_numeric(*response, params, &mut actions);
            }
            Command::Raw(_, params) if self.state == ConnectionState::Joining => {
                if let Some(code) = msg.numeric.filter(|code| (400..600).contains(code)) {
                    self.reject_pending(code, params, &mut actions);
                }
            }
            Command::JOIN(channel, _) if self.is_me(&msg) => {
                info!(server = %self.server, channel = %channel, "joined");
                self.joined.insert(irc_to_lower(channel), channel.clone());
                self.resolve_pending(channel, &mut actions);
            }
            Command::PART(channel, _) if self.is_me(&msg) => {
                info!(server = %self.server, channel = %channel, "left");
                self.joined.remove(&irc_to_lower(channel));
            }
            Command::KICK(channel, nick, reason) if irc_eq(nick, &self.nickname) => {
                warn!(
                    server = %self.server,
                    channel = %channel,
                    reason = reason.as_deref().unwrap_or(""),
                    "kicked"
                );
                self.joined.remove(&irc_to_lower(channel));
            }
            Command::NICK(new) if self.is_me(&msg) => {
                info!(server = %self.server, old = %self.nickname, new = %new, "nickname changed");
                self.nickname = new.clone();
            }
            _ => {}
        }

        if self.state.is_ready() {
            actions.push(SessionAction::Forward(msg));
        }
        actions
    }

    fn is_me(&self, msg: &InboundMessage) -> bool {
        msg.sender_nick
            .as_deref()
            .is_some_and(|nick| irc_eq(nick, &self.nickname))
    }

    fn on_numeric(&mut self, response: Response, params: &[String], actions: &mut Vec<SessionAction>) {
        match self.state {
            ConnectionState::Registering => {
                if response == Response::RPL_WELCOME || response.ends_motd() {
                    if let Some(nick) = params.first().filter(|_| response == Response::RPL_WELCOME) {
                        self.nickname = nick.clone();
                    }
                    self.complete_registration(actions);
                } else if response == Response::ERR_ERRONEUSNICKNAME {
                    warn!(server = %self.server, nick = %self.nickname, "nickname rejected as invalid");
                    actions.extend(self.disconnect(DisconnectReason::NicknameUnavailable));
                } else if response.rejects_nick() {
                    self.next_nickname(actions);
                }
            }
            ConnectionState::Joining => {
                if response == Response::RPL_ENDOFNAMES
                    && let Some(channel) = params.get(1)
                {
                    self.joined
                        .entry(irc_to_lower(channel))
                        .or_insert_with(|| channel.clone());
                    self.resolve_pending(channel, actions);
                } else if response.is_error() {
                    self.reject_pending(response.code(), params, actions);
                }
            }
            ConnectionState::Ready => {
                if response.rejects_join()
                    && let Some(channel) = params.get(1)
                {
                    warn!(server = %self.server, channel = %channel, code = response.code(), "join failed");
                }
            }
            _ => {}
        }
    }

    fn complete_registration(&mut self, actions: &mut Vec<SessionAction>) {
        info!(server = %self.server, nick = %self.nickname, "registered");
        actions.extend(self.transition(ConnectionState::Joining));

        self.pending.clear();
        for channel in &self.channels {
            if !channel.name.is_channel_target() {
                warn!(server = %self.server, channel = %channel.name, "not a channel name, skipping");
                continue;
            }
            self.pending.push(irc_to_lower(&channel.name));
            actions.push(SessionAction::Paced(Message::join(
                &channel.name,
                channel.key.clone(),
            )));
        }
        self.maybe_ready(actions);
    }

    /// An error numeric naming a pending channel settles that channel.
    fn reject_pending(&mut self, code: u16, params: &[String], actions: &mut Vec<SessionAction>) {
        let Some(channel) = params.get(1) else {
            return;
        };
        if !self.pending.contains(&irc_to_lower(channel)) {
            return;
        }
        if code == Response::ERR_LINKCHANNEL.code()
            && let Some(forward) = params.get(2)
        {
            info!(server = %self.server, channel = %channel, forwarded_to = %forward, "join forwarded");
        } else {
            warn!(
                server = %self.server,
                channel = %channel,
                code,
                reason = params.last().map(String::as_str).unwrap_or(""),
                "join failed, skipping channel"
            );
        }
        self.resolve_pending(channel, actions);
    }

    fn resolve_pending(&mut self, channel: &str, actions: &mut Vec<SessionAction>) {
        let folded = irc_to_lower(channel);
        self.pending.retain(|c| *c != folded);
        if self.state == ConnectionState::Joining {
            self.maybe_ready(actions);
        }
    }

    fn maybe_ready(&mut self, actions: &mut Vec<SessionAction>) {
        if self.pending.is_empty() {
            actions.extend(self.transition(ConnectionState::Ready));
        }
    }

    fn next_nickname(&mut self, actions: &mut Vec<SessionAction>) {
        self.nick_attempts += 1;
        if self.nick_attempts > MAX_NICK_ATTEMPTS {
            warn!(server = %self.server, attempts = MAX_NICK_ATTEMPTS, "no usable nickname");
            actions.extend(self.disconnect(DisconnectReason::NicknameUnavailable));
            return;
        }
        let candidate = fallback_nickname(&self.base_nick, self.nick_attempts);
        debug!(server = %self.server, rejected = %self.nickname, trying = %candidate, "nickname in use");
        self.nickname = candidate;
        actions.push(SessionAction::Control(Message::nick(&self.nickname)));
    }

    fn transition(&mut self, next: ConnectionState) -> Option<SessionAction> {
        let forward = next.rank() > self.state.rank();
        if !forward && !next.is_disconnected() {
            return None;
        }
        debug!(server = %self.server, from = %self.state, to = %next, "state change");
        self.state = next.clone();
        Some(SessionAction::Transition(next))
    }
}

/// `base_`, then `base_1`, `base_2`, ... truncated so the result fits
/// [`MAX_NICK_LEN`] bytes.
pub fn fallback_nickname(base: &str, attempt: u32) -> String {
    let suffix = if attempt <= 1 {
        "_".to_owned()
    } else {
        format!("_{}", attempt - 1)
    };
    let mut keep = MAX_NICK_LEN.saturating_sub(suffix.len()).min(base.len());
    while !base.is_char_boundary(keep) {
        keep -= 1;
    }
    format!("{}{suffix}", &base[..keep])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(channels: &[&str]) -> Session {
        let mut identity = ServerIdentity::new("libera", "irc.example.org", 6667, "leetbot");
        for channel in channels {
            identity = identity.with_channel(*channel, None);
        }
        let bot: BotConfig = toml::from_str("name = \"leetbot\"").unwrap();
        Session::new(&identity, &bot)
    }

    fn feed(session: &mut Session, line: &str) -> Vec<SessionAction> {
        session.handle(InboundMessage::decode(line, "libera").unwrap())
    }

    fn sent(actions: &[SessionAction]) -> Vec<String> {
        actions
            .iter()
            .filter_map(|a| match a {
                SessionAction::Control(m) | SessionAction::Paced(m) => Some(m.to_string()),
                _ => None,
            })
            .collect()
    }

    fn registered(channels: &[&str]) -> Session {
        let mut s = session(channels);
        s.connecting();
        s.register();
        feed(&mut s, ":irc.example.org 001 leetbot :Welcome");
        s
    }

    #[test]
    fn registration_sends_nick_and_user() {
        let mut s = session(&[]);
        assert_eq!(
            s.connecting(),
            vec![SessionAction::Transition(ConnectionState::Connecting)]
        );
        let actions = s.register();
        assert_eq!(sent(&actions), vec!["NICK leetbot", "USER leetbot 0 * :leetbot"]);
        assert_eq!(s.state(), &ConnectionState::Registering);
    }

    #[test]
    fn welcome_joins_configured_channels() {
        let mut s = session(&["#leet", "#rust"]);
        s.connecting();
        s.register();
        let actions = feed(&mut s, ":irc.example.org 001 leetbot :Welcome");
        assert_eq!(actions[0], SessionAction::Transition(ConnectionState::Joining));
        assert_eq!(sent(&actions), vec!["JOIN #leet", "JOIN #rust"]);
        assert!(matches!(actions[1], SessionAction::Paced(_)));
    }

    #[test]
    fn ready_after_every_channel_answers() {
        let mut s = registered(&["#leet", "#secret"]);
        assert!(feed(&mut s, ":leetbot!bot@host JOIN #leet").is_empty());
        assert!(s.is_joined("#LEET"));
        assert_eq!(s.state(), &ConnectionState::Joining);

        let actions = feed(&mut s, ":irc.example.org 475 leetbot #secret :Cannot join channel (+k)");
        assert_eq!(actions, vec![SessionAction::Transition(ConnectionState::Ready)]);
        assert_eq!(s.channels(), vec!["#leet"]);
    }

    #[test]
    fn forwarded_channel_settles_the_requested_one() {
        let mut s = registered(&["#leet"]);
        let actions = feed(
            &mut s,
            ":irc.example.org 470 leetbot #leet ##leet :Forwarding to another channel",
        );
        assert_eq!(actions, vec![SessionAction::Transition(ConnectionState::Ready)]);

        feed(&mut s, ":leetbot!bot@host JOIN ##leet");
        feed(&mut s, ":irc.example.org 366 leetbot ##leet :End of /NAMES list.");
        assert_eq!(s.channels(), vec!["##leet"]);
        let actions = feed(&mut s, ":alice!a@h PRIVMSG ##leet :!ping");
        assert!(matches!(&actions[..], [SessionAction::Forward(m)] if m.text == "!ping"));
    }

    #[test]
    fn any_error_naming_a_pending_channel_rejects_it() {
        let mut s = registered(&["#ok", "#bad*name"]);
        feed(&mut s, ":leetbot!bot@host JOIN #ok");
        assert_eq!(s.state(), &ConnectionState::Joining);
        feed(&mut s, ":irc.example.org 479 leetbot #bad*name :Illegal channel name");
        assert_eq!(s.state(), &ConnectionState::Ready);
        assert_eq!(s.channels(), vec!["#ok"]);
    }

    #[test]
    fn unnamed_error_numeric_rejects_pending_channel() {
        let mut s = registered(&["#tls"]);
        feed(&mut s, ":irc.example.org 520 leetbot #tls :Cannot join channel (+z)");
        assert_eq!(s.state(), &ConnectionState::Ready);
    }

    #[test]
    fn errors_about_other_targets_keep_waiting() {
        let mut s = registered(&["#leet"]);
        feed(&mut s, ":irc.example.org 401 leetbot alice :No such nick");
        feed(&mut s, ":irc.example.org 403 leetbot #other :No such channel");
        assert_eq!(s.state(), &ConnectionState::Joining);
    }

    #[test]
    fn join_timeout_moves_on_to_ready() {
        let mut s = registered(&["#leet", "#silent"]);
        feed(&mut s, ":leetbot!bot@host JOIN #leet");
        let actions = s.join_timed_out();
        assert_eq!(actions, vec![SessionAction::Transition(ConnectionState::Ready)]);
        assert_eq!(s.channels(), vec!["#leet"]);
        assert!(s.join_timed_out().is_empty());
    }

    #[test]
    fn no_channels_means_ready_at_welcome() {
        let s = registered(&[]);
        assert_eq!(s.state(), &ConnectionState::Ready);
    }

    #[test]
    fn motd_end_completes_missed_welcome() {
        let mut s = session(&[]);
        s.connecting();
        s.register();
        feed(&mut s, ":irc.example.org 422 leetbot :MOTD File is missing");
        assert_eq!(s.state(), &ConnectionState::Ready);
    }

    #[test]
    fn ping_answered_in_any_state() {
        let mut s = session(&[]);
        s.connecting();
        s.register();
        assert_eq!(
            sent(&feed(&mut s, "PING :abc123")),
            vec!["PONG :abc123"]
        );
        let s2 = &mut registered(&[]);
        let actions = feed(s2, "PING :abc123");
        assert_eq!(actions, vec![SessionAction::Control(Message::pong("abc123"))]);
    }

    #[test]
    fn nick_collision_uses_suffixes() {
        let mut s = session(&["#leet"]);
        s.connecting();
        s.register();
        let actions = feed(&mut s, ":irc.example.org 433 * leetbot :Nickname is already in use");
        assert_eq!(sent(&actions), vec!["NICK leetbot_"]);
        let actions = feed(&mut s, ":irc.example.org 433 * leetbot_ :Nickname is already in use");
        assert_eq!(sent(&actions), vec!["NICK leetbot_1"]);

        feed(&mut s, ":irc.example.org 001 leetbot_1 :Welcome");
        assert_eq!(s.nickname(), "leetbot_1");
        feed(&mut s, ":leetbot_1!bot@host JOIN #leet");
        assert_eq!(s.state(), &ConnectionState::Ready);
    }

    #[test]
    fn nick_attempts_are_bounded() {
        let mut s = session(&[]);
        s.connecting();
        s.register();
        for _ in 0..MAX_NICK_ATTEMPTS {
            feed(&mut s, ":irc.example.org 433 * x :in use");
        }
        assert_eq!(s.state(), &ConnectionState::Registering);
        let actions = feed(&mut s, ":irc.example.org 433 * x :in use");
        assert_eq!(
            actions,
            vec![SessionAction::Transition(ConnectionState::Disconnected(Some(
                DisconnectReason::NicknameUnavailable
            )))]
        );
    }

    #[test]
    fn erroneous_nick_disconnects() {
        let mut s = session(&[]);
        s.connecting();
        s.register();
        feed(&mut s, ":irc.example.org 432 * leetbot :Erroneous nickname");
        assert_eq!(
            s.state(),
            &ConnectionState::Disconnected(Some(DisconnectReason::NicknameUnavailable))
        );
    }

    #[test]
    fn fallback_nickname_truncates() {
        assert_eq!(fallback_nickname("bot", 1), "bot_");
        assert_eq!(fallback_nickname("bot", 3), "bot_2");
        let long = "a".repeat(40);
        let nick = fallback_nickname(&long, 10);
        assert_eq!(nick.len(), MAX_NICK_LEN);
        assert!(nick.ends_with("_9"));
        let nick = fallback_nickname(&"ä".repeat(20), 1);
        assert!(nick.len() <= MAX_NICK_LEN);
        assert!(nick.ends_with('_'));
    }

    #[test]
    fn messages_forwarded_only_when_ready() {
        let mut s = registered(&["#leet"]);
        assert!(feed(&mut s, ":alice!a@h PRIVMSG #leet :hi").is_empty());
        feed(&mut s, ":leetbot!bot@host JOIN #leet");
        let actions = feed(&mut s, ":alice!a@h PRIVMSG #leet :hi");
        assert!(matches!(&actions[..], [SessionAction::Forward(m)] if m.text == "hi"));
    }

    #[test]
    fn membership_follows_echoes() {
        let mut s = registered(&[]);
        feed(&mut s, ":leetbot!bot@host JOIN #a");
        feed(&mut s, ":leetbot!bot@host JOIN #b");
        feed(&mut s, ":alice!a@h JOIN #c");
        assert_eq!(s.channels(), vec!["#a", "#b"]);

        feed(&mut s, ":leetbot!bot@host PART #a :bye");
        feed(&mut s, ":op!o@h KICK #b leetbot :out");
        assert!(s.channels().is_empty());

        feed(&mut s, ":leetbot!bot@host NICK :leet2");
        assert_eq!(s.nickname(), "leet2");
    }

    #[test]
    fn server_error_disconnects() {
        let mut s = registered(&[]);
        let actions = feed(&mut s, "ERROR :Closing Link: flood");
        assert_eq!(
            actions,
            vec![SessionAction::Transition(ConnectionState::Disconnected(Some(
                DisconnectReason::ServerError("Closing Link: flood".into())
            )))]
        );
        assert!(feed(&mut s, "PING :late").is_empty());
    }
}
