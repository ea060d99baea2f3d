//! The capability bag handed to every command handler.
//!
//! Handlers never touch connections or sockets directly. Everything they can
//! do is declared here: send text, steer the bot, and call the external
//! services (weather, crypto prices, scheduled messages, the pet game).
//! The bag is assembled once at startup and shared by every invocation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveTime;

use crate::error::{HandlerError, SendError};
use crate::network::ConnectionState;
use crate::outbound::{OutboundMessage, payload_budget};

// ============================================================================
// Bot-facing capabilities
// ============================================================================

/// Queues text on a named server's connection.
pub trait Messenger: Send + Sync {
    /// Queue a message. Long bodies are split by the connection.
    fn send(&self, server: &str, msg: OutboundMessage) -> Result<(), SendError>;

    /// Bytes of body that fit in one line to `target` on `server`.
    fn payload_budget(&self, server: &str, kind: &str, target: &str) -> usize {
        let _ = server;
        payload_budget(kind, target, "")
    }
}

/// Snapshot of one configured server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerStatus {
    pub name: String,
    pub state: ConnectionState,
    pub nickname: String,
    pub channels: Vec<String>,
}

/// Control over connections and the bot's lifecycle.
pub trait BotControl: Send + Sync {
    fn join(&self, server: &str, channel: &str, key: Option<&str>) -> Result<(), SendError>;

    fn part(&self, server: &str, channel: &str, reason: Option<&str>) -> Result<(), SendError>;

    fn change_nick(&self, server: &str, nickname: &str) -> Result<(), SendError>;

    /// Parse and queue a raw protocol line.
    fn send_raw(&self, server: &str, line: &str) -> Result<(), SendError>;

    /// Start (or restart) the supervisor for a configured server.
    fn connect(&self, server: &str) -> Result<(), SendError>;

    /// Stop a server's connection without reconnecting.
    fn disconnect(&self, server: &str) -> Result<(), SendError>;

    /// All configured servers, sorted by name.
    fn servers(&self) -> Vec<ServerStatus>;

    /// Begin a graceful shutdown, optionally replacing the QUIT message.
    fn request_shutdown(&self, quit_message: Option<String>);
}

// ============================================================================
// External services
// ============================================================================

/// Current weather lookup.
#[async_trait]
pub trait WeatherService: Send + Sync {
    async fn current(&self, location: &str) -> anyhow::Result<String>;
}

/// Cryptocurrency price lookup.
#[async_trait]
pub trait CryptoService: Send + Sync {
    /// Price of `coin` in `currency`, already formatted.
    async fn price(&self, coin: &str, currency: &str) -> anyhow::Result<String>;
}

/// A message to deliver at a wall-clock time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledMessage {
    pub server: String,
    pub channel: String,
    pub at: NaiveTime,
    pub text: String,
}

/// Persists scheduled messages; delivery is the scheduler's job.
#[async_trait]
pub trait MessageScheduler: Send + Sync {
    /// Returns an identifier for the stored message.
    async fn schedule(&self, message: ScheduledMessage) -> anyhow::Result<String>;
}

/// The per-server virtual pet.
#[async_trait]
pub trait PetService: Send + Sync {
    async fn status(&self, server: &str) -> anyhow::Result<String>;
    async fn feed(&self, server: &str, food: Option<&str>) -> anyhow::Result<String>;
    async fn pet(&self, server: &str) -> anyhow::Result<String>;
}

// ============================================================================
// The bag
// ============================================================================

/// Everything a handler may call. Unconfigured services are `None` and the
/// commands that need them reply that the service is unavailable.
#[derive(Clone)]
pub struct Capabilities {
    pub messenger: Arc<dyn Messenger>,
    pub control: Arc<dyn BotControl>,
    pub weather: Option<Arc<dyn WeatherService>>,
    pub crypto: Option<Arc<dyn CryptoService>>,
    pub scheduler: Option<Arc<dyn MessageScheduler>>,
    pub pet: Option<Arc<dyn PetService>>,
    pub version: Arc<str>,
}

impl Capabilities {
    pub fn new(
        messenger: Arc<dyn Messenger>,
        control: Arc<dyn BotControl>,
        version: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            messenger,
            control,
            weather: None,
            crypto: None,
            scheduler: None,
            pet: None,
            version: version.into(),
        }
    }

    #[must_use]
    pub fn with_weather(mut self, service: Arc<dyn WeatherService>) -> Self {
        self.weather = Some(service);
        self
    }

    #[must_use]
    pub fn with_crypto(mut self, service: Arc<dyn CryptoService>) -> Self {
        self.crypto = Some(service);
        self
    }

    #[must_use]
    pub fn with_scheduler(mut self, service: Arc<dyn MessageScheduler>) -> Self {
        self.scheduler = Some(service);
        self
    }

    #[must_use]
    pub fn with_pet(mut self, service: Arc<dyn PetService>) -> Self {
        self.pet = Some(service);
        self
    }

    pub fn weather(&self) -> Result<&dyn WeatherService, HandlerError> {
        self.weather.as_deref().ok_or(HandlerError::Unavailable("Weather service"))
    }

    pub fn crypto(&self) -> Result<&dyn CryptoService, HandlerError> {
        self.crypto.as_deref().ok_or(HandlerError::Unavailable("Crypto price service"))
    }

    pub fn scheduler(&self) -> Result<&dyn MessageScheduler, HandlerError> {
        self.scheduler.as_deref().ok_or(HandlerError::Unavailable("Message scheduler"))
    }

    pub fn pet(&self) -> Result<&dyn PetService, HandlerError> {
        self.pet.as_deref().ok_or(HandlerError::Unavailable("Tamagotchi"))
    }
}
