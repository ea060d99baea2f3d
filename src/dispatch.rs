//! Message pipeline: observers, command parsing, handler execution and
//! response delivery.
//!
//! Events from every connection and the console arrive on one channel and
//! are routed in arrival order. Each command runs in its own task so a slow
//! handler never holds up a read loop or another command.

use std::sync::Arc;

use async_trait::async_trait;
use leetbot_proto::{InboundMessage, MessageKind};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, warn};

use crate::capabilities::Capabilities;
use crate::commands::{CommandInvocation, Origin, Registry, Reply};
use crate::error::SendError;
use crate::outbound::{OutboundKind, OutboundMessage, shape_response};
use crate::security::AdminCredential;
use crate::telemetry::spans;

/// One unit of work for the dispatcher.
#[derive(Debug, Clone)]
pub enum BotEvent {
    /// A message from a connection in the `Ready` state.
    Inbound(InboundMessage),
    /// A line typed on the console.
    Console(String),
}

/// Sees every inbound message before command handling (word trackers,
/// URL detectors and the like). Must return quickly.
pub trait MessageObserver: Send + Sync {
    fn observe(&self, msg: &InboundMessage);
}

/// Answers console lines that are not commands.
#[async_trait]
pub trait FreeChat: Send + Sync {
    async fn reply(&self, line: &str) -> anyhow::Result<Option<String>>;
}

/// Where console replies are printed.
#[async_trait]
pub trait ConsoleOutput: Send + Sync {
    async fn write_line(&self, line: &str);
}

/// Console output on stdout.
pub struct StdoutConsole;

#[async_trait]
impl ConsoleOutput for StdoutConsole {
    async fn write_line(&self, line: &str) {
        let mut stdout = tokio::io::stdout();
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');
        if let Err(e) = stdout.write_all(buf.as_bytes()).await {
            debug!(error = %e, "console write failed");
        }
        let _ = stdout.flush().await;
    }
}

/// Response policy.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub command_prefix: char,
    /// Reply with NOTICE instead of PRIVMSG.
    pub use_notices: bool,
    /// Wrapped lines per response before truncation.
    pub max_response_lines: usize,
}

/// Routes events to observers, the registry and the free-chat collaborator.
pub struct Dispatcher {
    registry: Arc<Registry>,
    caps: Capabilities,
    settings: DispatchSettings,
    credential: Option<AdminCredential>,
    observers: Vec<Arc<dyn MessageObserver>>,
    free_chat: Option<Arc<dyn FreeChat>>,
    console: Arc<dyn ConsoleOutput>,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>, caps: Capabilities, settings: DispatchSettings) -> Self {
        Self {
            registry,
            caps,
            settings,
            credential: None,
            observers: Vec::new(),
            free_chat: None,
            console: Arc::new(StdoutConsole),
        }
    }

    #[must_use]
    pub fn with_credential(mut self, credential: Option<AdminCredential>) -> Self {
        self.credential = credential;
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn MessageObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    #[must_use]
    pub fn with_free_chat(mut self, free_chat: Arc<dyn FreeChat>) -> Self {
        self.free_chat = Some(free_chat);
        self
    }

    #[must_use]
    pub fn with_console_output(mut self, console: Arc<dyn ConsoleOutput>) -> Self {
        self.console = console;
        self
    }

    /// Consume events until the channel closes or `shutdown` fires. Once
    /// shutdown begins no new work is accepted; running handlers finish.
    pub async fn run(
        self: Arc<Self>,
        mut events: mpsc::UnboundedReceiver<BotEvent>,
        shutdown: CancellationToken,
    ) {
        let mut tasks = JoinSet::new();
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => log_join(joined),
                event = events.recv() => match event {
                    Some(event) => self.route(event, &mut tasks),
                    None => break,
                },
            }
        }

        events.close();
        if !tasks.is_empty() {
            info!(in_flight = tasks.len(), "waiting for running commands");
        }
        while let Some(joined) = tasks.join_next().await {
            log_join(joined);
        }
        debug!("dispatcher stopped");
    }

    fn route(self: &Arc<Self>, event: BotEvent, tasks: &mut JoinSet<()>) {
        match event {
            BotEvent::Inbound(msg) => {
                for observer in &self.observers {
                    observer.observe(&msg);
                }
                if let Some(inv) = self.invocation_from(&msg) {
                    tasks.spawn(Arc::clone(self).execute(inv));
                }
            }
            BotEvent::Console(line) => {
                if let Some(inv) =
                    CommandInvocation::parse(&line, self.settings.command_prefix, Origin::Console)
                {
                    tasks.spawn(Arc::clone(self).execute(inv));
                } else if let Some(chat) = self.free_chat.clone() {
                    let console = Arc::clone(&self.console);
                    tasks.spawn(async move {
                        match chat.reply(&line).await {
                            Ok(Some(answer)) => {
                                for line in answer.lines() {
                                    console.write_line(line).await;
                                }
                            }
                            Ok(None) => {}
                            Err(e) => error!(error = %e, "free chat failed"),
                        }
                    });
                }
            }
        }
    }

    fn invocation_from(&self, msg: &InboundMessage) -> Option<CommandInvocation> {
        let origin = match msg.kind {
            MessageKind::ChannelMessage => Origin::Channel,
            MessageKind::PrivateMessage => Origin::Private,
            _ => return None,
        };
        let target = msg.reply_target()?;
        let sender = msg.sender_nick.as_deref()?;
        let inv = CommandInvocation::parse(&msg.text, self.settings.command_prefix, origin)?;
        Some(inv.on_server(&msg.server, target, sender))
    }

    /// Run one invocation and deliver its reply.
    pub async fn execute(self: Arc<Self>, mut inv: CommandInvocation) {
        if self.registry.resolve(&inv.name).is_some_and(|d| d.admin_only) {
            inv.authenticate(self.credential.as_ref());
        }

        let source = inv.sender.as_deref().unwrap_or("console").to_owned();
        let span = spans::command(&inv.name, &source, Some(inv.target.as_str()));
        let reply = self
            .registry
            .dispatch(&inv, &self.caps)
            .instrument(span)
            .await;
        self.deliver(&inv, reply).await;
    }

    async fn deliver(&self, inv: &CommandInvocation, reply: Reply) {
        let (text, private) = match reply {
            Reply::Silent => return,
            Reply::Text(text) => (text, false),
            Reply::Private(text) => (text, true),
        };

        let Some(server) = inv.server.as_deref() else {
            for line in text.lines().filter(|l| !l.trim().is_empty()) {
                self.console.write_line(line).await;
            }
            return;
        };

        let target = match (private, inv.sender.as_deref()) {
            (true, Some(sender)) => sender,
            _ => inv.target.as_str(),
        };
        let kind = if self.settings.use_notices {
            OutboundKind::Notice
        } else {
            OutboundKind::Privmsg
        };
        let budget = self
            .caps
            .messenger
            .payload_budget(server, kind.command(), target);

        for line in shape_response(&text, budget, self.settings.max_response_lines) {
            let msg = OutboundMessage {
                kind,
                target: target.to_owned(),
                body: line,
            };
            match self.caps.messenger.send(server, msg) {
                Ok(()) => {}
                Err(SendError::ChannelNotJoined(channel)) => {
                    debug!(server = %server, channel = %channel, "reply to unjoined channel dropped");
                    return;
                }
                Err(e) => {
                    warn!(server = %server, target = %target, error = %e, "reply not sent");
                    return;
                }
            }
        }
    }
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined
        && e.is_panic()
    {
        error!(error = %e, "command task panicked");
    }
}
