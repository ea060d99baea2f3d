//! The orchestrator: owns every server connection and the shared event feed.
//!
//! Each configured server gets a slot. A running slot has a supervisor task
//! that builds a [`Connection`], runs it to completion, and reconnects with
//! exponential backoff until the slot is disconnected or the bot shuts down.
//! The slot always holds the handle of the current connection so commands
//! can reach it.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures_util::future::join_all;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::capabilities::{BotControl, Messenger, ServerStatus};
use crate::config::{Config, ServerIdentity};
use crate::dispatch::BotEvent;
use crate::error::{SendError, StartupError};
use crate::network::{
    Connection, ConnectionHandle, ConnectionSettings, ConnectionState, QuitMessage,
};
use crate::outbound::{OutboundMessage, payload_budget};

type CurrentHandle = Arc<RwLock<Option<ConnectionHandle>>>;

struct Supervisor {
    stop: CancellationToken,
    task: JoinHandle<()>,
}

struct ServerSlot {
    identity: ServerIdentity,
    current: CurrentHandle,
    supervisor: Option<Supervisor>,
}

impl ServerSlot {
    fn new(identity: ServerIdentity) -> Self {
        Self {
            identity,
            current: Arc::new(RwLock::new(None)),
            supervisor: None,
        }
    }

    fn is_running(&self) -> bool {
        self.supervisor
            .as_ref()
            .is_some_and(|s| !s.task.is_finished())
    }
}

struct BotInner {
    settings: ConnectionSettings,
    slots: DashMap<String, ServerSlot>,
    events: mpsc::UnboundedSender<BotEvent>,
    quit_message: QuitMessage,
    shutdown: CancellationToken,
}

/// Cloneable handle to the orchestrator.
#[derive(Clone)]
pub struct Bot {
    inner: Arc<BotInner>,
}

impl Bot {
    /// Build the bot with a slot per configured server. Nothing connects
    /// until [`Bot::start`]. The receiver carries every connection's traffic
    /// and must be handed to the dispatcher.
    pub fn new(config: &Config) -> (Self, mpsc::UnboundedReceiver<BotEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let slots = DashMap::new();
        for identity in &config.servers {
            slots.insert(identity.name.clone(), ServerSlot::new(identity.clone()));
        }
        let inner = BotInner {
            settings: ConnectionSettings::from(config),
            slots,
            events,
            quit_message: Arc::new(RwLock::new(config.bot.quit_message.clone())),
            shutdown: CancellationToken::new(),
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            rx,
        )
    }

    /// Sender for the shared event feed (the console writes here too).
    pub fn events(&self) -> mpsc::UnboundedSender<BotEvent> {
        self.inner.events.clone()
    }

    /// Fires when shutdown has been requested.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    /// Connect every server marked `autoconnect`.
    pub fn start(&self) {
        let names: Vec<String> = self
            .inner
            .slots
            .iter()
            .filter(|slot| slot.identity.autoconnect)
            .map(|slot| slot.key().clone())
            .collect();
        for name in names {
            if let Err(e) = self.connect(&name) {
                warn!(server = %name, error = %e, "autoconnect failed");
            }
        }
    }

    /// Add a server and start connecting to it.
    pub fn add_server(&self, identity: ServerIdentity) -> Result<(), StartupError> {
        if identity.name.is_empty() || identity.host.is_empty() || identity.nickname.is_empty() {
            return Err(StartupError::InvalidServer {
                name: identity.name,
                reason: "name, host and nickname are required".into(),
            });
        }
        let name = identity.name.clone();
        match self.inner.slots.entry(name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(StartupError::InvalidServer {
                    name,
                    reason: "already configured".into(),
                });
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(ServerSlot::new(identity));
            }
        }
        info!(server = %name, "server added");
        if let Err(e) = self.connect(&name) {
            warn!(server = %name, error = %e, "connect failed");
        }
        Ok(())
    }

    /// Stop a server's connection and forget it.
    pub fn remove_server(&self, name: &str) -> Result<(), SendError> {
        let (_, mut slot) = self
            .inner
            .slots
            .remove(name)
            .ok_or_else(|| SendError::UnknownServer(name.to_owned()))?;
        if let Some(supervisor) = slot.supervisor.take() {
            supervisor.stop.cancel();
        }
        info!(server = %name, "server removed");
        Ok(())
    }

    /// Handle of the current connection to `server`.
    pub fn connection(&self, server: &str) -> Result<ConnectionHandle, SendError> {
        let slot = self
            .inner
            .slots
            .get(server)
            .ok_or_else(|| SendError::UnknownServer(server.to_owned()))?;
        let current = slot.current.read().clone();
        current.ok_or_else(|| SendError::NotReady(server.to_owned()))
    }

    /// Stop every connection and wait for them, bounded by the configured
    /// shutdown timeout. Connections that overrun are abandoned.
    pub async fn shutdown(&self, quit_message: Option<String>) {
        if let Some(message) = quit_message {
            *self.inner.quit_message.write() = message;
        }
        self.inner.shutdown.cancel();

        let mut tasks = Vec::new();
        let mut aborts: Vec<(String, AbortHandle)> = Vec::new();
        for mut slot in self.inner.slots.iter_mut() {
            if let Some(supervisor) = slot.supervisor.take() {
                supervisor.stop.cancel();
                aborts.push((slot.key().clone(), supervisor.task.abort_handle()));
                tasks.push(supervisor.task);
            }
        }
        if tasks.is_empty() {
            return;
        }

        info!(connections = tasks.len(), "stopping connections");
        // Each connection already bounds its QUIT flush by the same timeout.
        let limit = self.inner.settings.timeouts.shutdown() * 2;
        if tokio::time::timeout(limit, join_all(tasks)).await.is_err() {
            for (server, abort) in aborts {
                if !abort.is_finished() {
                    warn!(server = %server, "connection did not stop in time, abandoning");
                    abort.abort();
                }
            }
        }
    }

    fn spawn_supervisor(&self, identity: ServerIdentity, current: CurrentHandle) -> Supervisor {
        let stop = self.inner.shutdown.child_token();
        let task = tokio::spawn(supervise(
            Arc::clone(&self.inner),
            identity,
            current,
            stop.clone(),
        ));
        Supervisor { stop, task }
    }
}

/// Run connections for one server until `stop` fires.
async fn supervise(
    inner: Arc<BotInner>,
    identity: ServerIdentity,
    current: CurrentHandle,
    stop: CancellationToken,
) {
    let timeouts = &inner.settings.timeouts;
    let mut backoff = timeouts.reconnect_initial();

    loop {
        let (connection, handle) = Connection::new(
            identity.clone(),
            inner.settings.clone(),
            inner.events.clone(),
            Arc::clone(&inner.quit_message),
        );
        *current.write() = Some(handle.clone());

        let mut snapshots = handle.subscribe();
        let run = connection.run();
        tokio::pin!(run);
        let mut reached_ready = false;
        let mut stopping = false;

        let reason = loop {
            tokio::select! {
                biased;
                reason = &mut run => break reason,
                _ = stop.cancelled(), if !stopping => {
                    stopping = true;
                    handle.stop(None);
                }
                changed = snapshots.changed(), if !reached_ready => {
                    if changed.is_ok() && snapshots.borrow().state.is_ready() {
                        reached_ready = true;
                        info!(server = %identity.name, "connection ready");
                    }
                }
            }
        };

        if stop.is_cancelled() {
            debug!(server = %identity.name, %reason, "supervisor stopped");
            return;
        }
        if reached_ready {
            backoff = timeouts.reconnect_initial();
        }

        warn!(
            server = %identity.name,
            %reason,
            retry_in_secs = backoff.as_secs(),
            "connection lost, reconnecting"
        );
        tokio::select! {
            _ = stop.cancelled() => return,
            _ = tokio::time::sleep(backoff) => {}
        }
        backoff = next_backoff(backoff, timeouts.reconnect_max());
    }
}

fn next_backoff(current: Duration, max: Duration) -> Duration {
    current.saturating_mul(2).min(max)
}

impl Messenger for Bot {
    fn send(&self, server: &str, msg: OutboundMessage) -> Result<(), SendError> {
        self.connection(server)?.send(msg)
    }

    fn payload_budget(&self, server: &str, kind: &str, target: &str) -> usize {
        let nickname = self
            .connection(server)
            .map(|handle| handle.snapshot().nickname)
            .unwrap_or_default();
        payload_budget(kind, target, &nickname)
    }
}

impl BotControl for Bot {
    fn join(&self, server: &str, channel: &str, key: Option<&str>) -> Result<(), SendError> {
        self.connection(server)?.join(channel, key)
    }

    fn part(&self, server: &str, channel: &str, reason: Option<&str>) -> Result<(), SendError> {
        self.connection(server)?.part(channel, reason)
    }

    fn change_nick(&self, server: &str, nickname: &str) -> Result<(), SendError> {
        self.connection(server)?.change_nick(nickname)
    }

    fn send_raw(&self, server: &str, line: &str) -> Result<(), SendError> {
        self.connection(server)?.send_raw(line)
    }

    fn connect(&self, server: &str) -> Result<(), SendError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(SendError::Closed);
        }
        let mut slot = self
            .inner
            .slots
            .get_mut(server)
            .ok_or_else(|| SendError::UnknownServer(server.to_owned()))?;
        if slot.is_running() {
            debug!(server = %server, "already connected or connecting");
            return Ok(());
        }
        let supervisor = self.spawn_supervisor(slot.identity.clone(), Arc::clone(&slot.current));
        slot.supervisor = Some(supervisor);
        info!(server = %server, "connecting");
        Ok(())
    }

    fn disconnect(&self, server: &str) -> Result<(), SendError> {
        let mut slot = self
            .inner
            .slots
            .get_mut(server)
            .ok_or_else(|| SendError::UnknownServer(server.to_owned()))?;
        if let Some(supervisor) = slot.supervisor.take() {
            supervisor.stop.cancel();
            info!(server = %server, "disconnecting");
        }
        Ok(())
    }

    fn servers(&self) -> Vec<ServerStatus> {
        let mut servers: Vec<ServerStatus> = self
            .inner
            .slots
            .iter()
            .map(|slot| match slot.current.read().as_ref() {
                Some(handle) => {
                    let snapshot = handle.snapshot();
                    ServerStatus {
                        name: slot.key().clone(),
                        state: snapshot.state,
                        nickname: snapshot.nickname,
                        channels: snapshot.channels,
                    }
                }
                None => ServerStatus {
                    name: slot.key().clone(),
                    state: ConnectionState::Disconnected(None),
                    nickname: slot.identity.nickname.clone(),
                    channels: Vec::new(),
                },
            })
            .collect();
        servers.sort_by(|a, b| a.name.cmp(&b.name));
        servers
    }

    fn request_shutdown(&self, quit_message: Option<String>) {
        if let Some(message) = quit_message {
            *self.inner.quit_message.write() = message;
        }
        info!("shutdown requested");
        self.inner.shutdown.cancel();
    }
}
