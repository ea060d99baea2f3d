//! One live session to one IRC server.
//!
//! ```text
//!   socket ──read──▶ LineCodec ──▶ InboundMessage::decode ──▶ Session
//!                                                               │
//!            ┌───────────── SessionAction ◀──────────────────────┘
//!            ▼
//!   Control ─┐                          Forward ──▶ dispatcher
//!   Paced  ──┴──▶ OutboundQueue ──▶ OutboundWriter ──write──▶ socket
//! ```
//!
//! A [`Connection`] runs once: when it ends it reports a
//! [`DisconnectReason`] and is discarded. Reconnecting means building a new
//! one; that policy lives in the bot, not here.

mod state;

pub use state::{
    ConnectionState, DisconnectReason, MAX_NICK_ATTEMPTS, MAX_NICK_LEN, Session, SessionAction,
    fallback_nickname,
};

use std::sync::Arc;

use futures_util::StreamExt;
use leetbot_proto::{ChannelExt, InboundMessage, LineCodec, Message};
use parking_lot::RwLock;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until, timeout};
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

use super::tls;
use crate::config::{BotConfig, Config, RateLimitConfig, ServerIdentity, TimeoutsConfig};
use crate::dispatch::BotEvent;
use crate::error::{ConnectionError, SendError};
use crate::outbound::{
    OutboundKind, OutboundMessage, OutboundQueue, OutboundReceiver, payload_budget, split_text,
};
use crate::telemetry::spans;

/// QUIT text shared by every connection; admin `quit` replaces it.
pub type QuitMessage = Arc<RwLock<String>>;

/// Settings a connection reads but does not own.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub bot: BotConfig,
    pub rate_limit: RateLimitConfig,
    pub timeouts: TimeoutsConfig,
}

impl From<&Config> for ConnectionSettings {
    fn from(config: &Config) -> Self {
        Self {
            bot: config.bot.clone(),
            rate_limit: config.rate_limit.clone(),
            timeouts: config.timeouts.clone(),
        }
    }
}

/// Point-in-time view of a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSnapshot {
    pub state: ConnectionState,
    pub nickname: String,
    pub channels: Vec<String>,
}

impl ConnectionSnapshot {
    fn is_joined(&self, channel: &str) -> bool {
        self.channels
            .iter()
            .any(|joined| leetbot_proto::irc_eq(joined, channel))
    }
}

/// The connection task. Built with [`Connection::new`], consumed by [`Connection::run`].
pub struct Connection {
    identity: ServerIdentity,
    settings: ConnectionSettings,
    server: Arc<str>,
    session: Session,
    queue: OutboundQueue,
    receiver: Option<OutboundReceiver>,
    snapshot: watch::Sender<ConnectionSnapshot>,
    events: mpsc::UnboundedSender<BotEvent>,
    cancel: CancellationToken,
    stop_reason: Arc<RwLock<Option<String>>>,
    quit_message: QuitMessage,
}

impl Connection {
    pub fn new(
        identity: ServerIdentity,
        settings: ConnectionSettings,
        events: mpsc::UnboundedSender<BotEvent>,
        quit_message: QuitMessage,
    ) -> (Self, ConnectionHandle) {
        let server: Arc<str> = Arc::from(identity.name.as_str());
        let session = Session::new(&identity, &settings.bot);
        let (queue, receiver) = crate::outbound::channel(&settings.rate_limit, Arc::clone(&server));
        let (snapshot, snapshot_rx) = watch::channel(ConnectionSnapshot {
            state: session.state().clone(),
            nickname: session.nickname().to_owned(),
            channels: Vec::new(),
        });
        let cancel = CancellationToken::new();
        let stop_reason = Arc::new(RwLock::new(None));

        let handle = ConnectionHandle {
            server: Arc::clone(&server),
            queue: queue.clone(),
            snapshot: snapshot_rx,
            cancel: cancel.clone(),
            stop_reason: Arc::clone(&stop_reason),
        };
        let connection = Self {
            identity,
            settings,
            server,
            session,
            queue,
            receiver: Some(receiver),
            snapshot,
            events,
            cancel,
            stop_reason,
            quit_message,
        };
        (connection, handle)
    }

    /// Connect, register, join, then read until the connection ends.
    pub async fn run(self) -> DisconnectReason {
        let span = spans::connection(&self.identity.name, &self.identity.address());
        self.run_inner().instrument(span).await
    }

    async fn run_inner(mut self) -> DisconnectReason {
        let actions = self.session.connecting();
        self.apply(actions);
        info!("connecting");

        let cancel = self.cancel.clone();
        let host = self.identity.host.clone();
        let port = self.identity.port;
        let connect = timeout(
            self.settings.timeouts.connect(),
            TcpStream::connect((host.as_str(), port)),
        );
        let stream = tokio::select! {
            _ = cancel.cancelled() => return self.finish(DisconnectReason::Requested),
            result = connect => match result {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => return self.fail(ConnectionError::Io(e)),
                Err(_) => return self.fail(ConnectionError::ConnectTimeout),
            },
        };
        let _ = stream.set_nodelay(true);

        if !self.identity.tls {
            return self.drive(stream).await;
        }

        let insecure = self.identity.tls_insecure;
        let upgraded = tokio::select! {
            _ = cancel.cancelled() => return self.finish(DisconnectReason::Requested),
            result = tls::upgrade(stream, &host, insecure) => result,
        };
        match upgraded {
            Ok(stream) => self.drive(stream).await,
            Err(e) => self.fail(e),
        }
    }

    /// Run the session over an established stream.
    async fn drive<S>(mut self, stream: S) -> DisconnectReason
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let Some(receiver) = self.receiver.take() else {
            return self.finish(DisconnectReason::Error("connection already used".into()));
        };
        let mut writer: JoinHandle<Result<(), ConnectionError>> =
            tokio::spawn(receiver.attach(write_half).run().in_current_span());
        let mut writer_done = false;
        let mut reader = FramedRead::new(read_half, LineCodec::new());

        info!("connected, registering");
        let actions = self.session.register();
        self.apply(actions);

        let registration_deadline = Instant::now() + self.settings.timeouts.registration();
        let keepalive = self.settings.timeouts.keepalive();
        let cancel = self.cancel.clone();
        let mut awaiting_pong = false;
        let mut join_deadline: Option<Instant> = None;

        let reason = loop {
            let registering = *self.session.state() == ConnectionState::Registering;
            let joining = *self.session.state() == ConnectionState::Joining;
            if joining && join_deadline.is_none() {
                join_deadline = Some(Instant::now() + self.settings.timeouts.registration());
            }
            let join_wait = join_deadline.unwrap_or(registration_deadline);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break DisconnectReason::Requested,
                result = &mut writer => {
                    writer_done = true;
                    break match result {
                        Ok(Ok(())) => DisconnectReason::ServerClosed,
                        Ok(Err(e)) => DisconnectReason::Error(e.to_string()),
                        Err(e) => DisconnectReason::Error(format!("writer task failed: {e}")),
                    };
                }
                _ = sleep_until(registration_deadline), if registering => {
                    break DisconnectReason::RegistrationTimeout;
                }
                _ = sleep_until(join_wait), if joining => {
                    let actions = self.session.join_timed_out();
                    self.apply(actions);
                }
                next = timeout(keepalive, reader.next()) => match next {
                    Err(_) if awaiting_pong => break DisconnectReason::PingTimeout,
                    Err(_) => {
                        debug!("read idle, sending keepalive");
                        awaiting_pong = true;
                        let _ = self.queue.send_now(Message::ping("keepalive"));
                    }
                    Ok(None) => break DisconnectReason::ServerClosed,
                    Ok(Some(Err(e))) => break DisconnectReason::Error(e.to_string()),
                    Ok(Some(Ok(line))) => {
                        awaiting_pong = false;
                        debug!(raw = %line, "recv");
                        match InboundMessage::decode(&line, &self.server) {
                            Ok(msg) => {
                                let actions = self.session.handle(msg);
                                if let Some(reason) = self.apply(actions) {
                                    break reason;
                                }
                            }
                            Err(e) => warn!(raw = %line, error = %e, "dropping unparseable line"),
                        }
                    }
                },
            }
        };

        if !writer_done {
            let last = (reason == DisconnectReason::Requested).then(|| Message::quit(Some(self.quit_text())));
            let _ = self.queue.close(last);
            match timeout(self.settings.timeouts.shutdown(), &mut writer).await {
                Ok(Ok(Err(e))) => debug!(error = %e, "writer failed while closing"),
                Ok(_) => {}
                Err(_) => {
                    warn!("writer did not flush in time, aborting");
                    writer.abort();
                }
            }
        }

        self.finish(reason)
    }

    fn quit_text(&self) -> String {
        self.stop_reason
            .read()
            .clone()
            .unwrap_or_else(|| self.quit_message.read().clone())
    }

    fn fail(self, error: ConnectionError) -> DisconnectReason {
        warn!(error = %error, "connection failed");
        self.finish(DisconnectReason::Error(error.to_string()))
    }

    fn finish(mut self, reason: DisconnectReason) -> DisconnectReason {
        let actions = self.session.disconnect(reason.clone());
        self.apply(actions);
        info!(reason = %reason, "disconnected");
        reason
    }

    /// Carry out session actions. Returns the reason if the session ended.
    fn apply(&mut self, actions: Vec<SessionAction>) -> Option<DisconnectReason> {
        let mut ended = None;
        for action in actions {
            match action {
                SessionAction::Control(msg) => {
                    let _ = self.queue.send_now(msg);
                }
                SessionAction::Paced(msg) => {
                    let _ = self.queue.enqueue(msg);
                }
                SessionAction::Forward(msg) => {
                    if self.events.send(BotEvent::Inbound(msg)).is_err() {
                        debug!("dispatcher gone, dropping inbound message");
                    }
                }
                SessionAction::Transition(state) => {
                    if let ConnectionState::Disconnected(Some(reason)) = &state {
                        ended = Some(reason.clone());
                    }
                    if state.is_ready() {
                        info!(nick = %self.session.nickname(), channels = ?self.session.channels(), "ready");
                    }
                }
            }
        }
        self.publish();
        ended
    }

    fn publish(&self) {
        let next = ConnectionSnapshot {
            state: self.session.state().clone(),
            nickname: self.session.nickname().to_owned(),
            channels: self.session.channels(),
        };
        self.snapshot.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

/// Cloneable control surface for a running [`Connection`].
#[derive(Clone)]
pub struct ConnectionHandle {
    server: Arc<str>,
    queue: OutboundQueue,
    snapshot: watch::Receiver<ConnectionSnapshot>,
    cancel: CancellationToken,
    stop_reason: Arc<RwLock<Option<String>>>,
}

impl ConnectionHandle {
    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn state(&self) -> ConnectionState {
        self.snapshot.borrow().state.clone()
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Watch for state, nickname and channel changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionSnapshot> {
        self.snapshot.clone()
    }

    /// Body bytes that fit in one line of `kind` to `target`.
    pub fn payload_budget(&self, kind: OutboundKind, target: &str) -> usize {
        payload_budget(kind.command(), target, &self.snapshot.borrow().nickname)
    }

    fn ready_snapshot(&self) -> Result<ConnectionSnapshot, SendError> {
        let snapshot = self.snapshot();
        if snapshot.state.is_ready() {
            Ok(snapshot)
        } else {
            Err(SendError::NotReady(self.server.to_string()))
        }
    }

    /// Queue text, split to fit the line limit. Channel targets must be joined.
    pub fn send(&self, msg: OutboundMessage) -> Result<(), SendError> {
        let snapshot = self.ready_snapshot()?;
        if msg.target.is_channel_target() && !snapshot.is_joined(&msg.target) {
            debug!(server = %self.server, target = %msg.target, "dropping message to unjoined channel");
            return Err(SendError::ChannelNotJoined(msg.target));
        }

        let budget = payload_budget(msg.kind.command(), &msg.target, &snapshot.nickname);
        for chunk in split_text(&msg.body, budget) {
            debug!(server = %self.server, target = %msg.target, bytes = chunk.len(), "queue send");
            self.queue.enqueue(msg.with_body(chunk).to_message())?;
        }
        Ok(())
    }

    /// Ask to join; membership updates when the server echoes the JOIN.
    pub fn join(&self, channel: &str, key: Option<&str>) -> Result<(), SendError> {
        self.ready_snapshot()?;
        self.queue
            .enqueue(Message::join(channel, key.map(str::to_owned)))
    }

    pub fn part(&self, channel: &str, reason: Option<&str>) -> Result<(), SendError> {
        self.ready_snapshot()?;
        self.queue
            .enqueue(Message::part(channel, reason.map(str::to_owned)))
    }

    /// Ask for a new nickname; the snapshot updates on the server's echo.
    pub fn change_nick(&self, nickname: &str) -> Result<(), SendError> {
        self.ready_snapshot()?;
        self.queue.enqueue(Message::nick(nickname))
    }

    /// Parse and queue a raw protocol line.
    pub fn send_raw(&self, line: &str) -> Result<(), SendError> {
        self.ready_snapshot()?;
        let msg: Message = line.trim().parse()?;
        self.queue.enqueue(msg)
    }

    /// Send QUIT (if connected) and close. Safe from any state.
    pub fn stop(&self, reason: Option<String>) {
        if reason.is_some() {
            *self.stop_reason.write() = reason;
        }
        self.cancel.cancel();
    }

    /// [`stop`](Self::stop) with an explicit QUIT reason.
    pub fn quit(&self, reason: impl Into<String>) {
        self.stop(Some(reason.into()));
    }

    /// Wait until the connection has ended.
    pub async fn closed(&self) {
        let mut rx = self.snapshot.clone();
        let _ = rx
            .wait_for(|s| matches!(s.state, ConnectionState::Disconnected(Some(_))))
            .await;
    }
}
