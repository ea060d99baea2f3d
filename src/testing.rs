//! In-memory collaborators for unit tests.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::capabilities::{
    BotControl, Capabilities, CryptoService, MessageScheduler, Messenger, PetService,
    ScheduledMessage, ServerStatus, WeatherService,
};
use crate::error::SendError;
use crate::network::ConnectionState;
use crate::outbound::OutboundMessage;

/// Records every message instead of sending it.
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<(String, OutboundMessage)>>,
}

impl RecordingMessenger {
    pub fn sent(&self) -> Vec<(String, OutboundMessage)> {
        std::mem::take(&mut *self.sent.lock())
    }
}

impl Messenger for RecordingMessenger {
    fn send(&self, server: &str, msg: OutboundMessage) -> Result<(), SendError> {
        self.sent.lock().push((server.to_owned(), msg));
        Ok(())
    }
}

/// Bot control over a fixed set of ready servers. Calls are logged as
/// space-separated strings.
pub struct FakeControl {
    servers: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeControl {
    pub fn with_servers(names: &[&str]) -> Arc<Self> {
        let mut servers: Vec<String> = names.iter().map(|n| (*n).to_owned()).collect();
        servers.sort();
        Arc::new(Self {
            servers,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, server: &str, call: String) -> Result<(), SendError> {
        if !self.servers.iter().any(|s| s == server) {
            return Err(SendError::UnknownServer(server.to_owned()));
        }
        self.calls.lock().push(call);
        Ok(())
    }
}

impl BotControl for FakeControl {
    fn join(&self, server: &str, channel: &str, key: Option<&str>) -> Result<(), SendError> {
        let call = match key {
            Some(key) => format!("join {server} {channel} {key}"),
            None => format!("join {server} {channel}"),
        };
        self.record(server, call)
    }

    fn part(&self, server: &str, channel: &str, _reason: Option<&str>) -> Result<(), SendError> {
        self.record(server, format!("part {server} {channel}"))
    }

    fn change_nick(&self, server: &str, nickname: &str) -> Result<(), SendError> {
        self.record(server, format!("nick {server} {nickname}"))
    }

    fn send_raw(&self, server: &str, line: &str) -> Result<(), SendError> {
        self.record(server, format!("raw {server} {line}"))
    }

    fn connect(&self, server: &str) -> Result<(), SendError> {
        self.record(server, format!("connect {server}"))
    }

    fn disconnect(&self, server: &str) -> Result<(), SendError> {
        self.record(server, format!("disconnect {server}"))
    }

    fn servers(&self) -> Vec<ServerStatus> {
        self.servers
            .iter()
            .map(|name| ServerStatus {
                name: name.clone(),
                state: ConnectionState::Ready,
                nickname: "leetbot".to_owned(),
                channels: vec!["#leet".to_owned()],
            })
            .collect()
    }

    fn request_shutdown(&self, quit_message: Option<String>) {
        let call = match quit_message {
            Some(message) => format!("shutdown {message}"),
            None => "shutdown".to_owned(),
        };
        self.calls.lock().push(call);
    }
}

/// Canned answers for every external service.
pub struct FakeServices;

impl FakeServices {
    pub fn install(caps: Capabilities) -> Capabilities {
        let services = Arc::new(FakeServices);
        caps.with_weather(services.clone())
            .with_crypto(services.clone())
            .with_scheduler(services.clone())
            .with_pet(services)
    }
}

#[async_trait]
impl WeatherService for FakeServices {
    async fn current(&self, location: &str) -> anyhow::Result<String> {
        Ok(format!("Weather in {location}: 3°C"))
    }
}

#[async_trait]
impl CryptoService for FakeServices {
    async fn price(&self, _coin: &str, _currency: &str) -> anyhow::Result<String> {
        Ok("42".to_owned())
    }
}

#[async_trait]
impl MessageScheduler for FakeServices {
    async fn schedule(&self, _message: ScheduledMessage) -> anyhow::Result<String> {
        Ok("1".to_owned())
    }
}

#[async_trait]
impl PetService for FakeServices {
    async fn status(&self, server: &str) -> anyhow::Result<String> {
        Ok(format!("{server} pet is content"))
    }

    async fn feed(&self, server: &str, food: Option<&str>) -> anyhow::Result<String> {
        Ok(format!("{server} pet ate {}", food.unwrap_or("snacks")))
    }

    async fn pet(&self, server: &str) -> anyhow::Result<String> {
        Ok(format!("{server} pet purrs"))
    }
}

/// Capabilities with no services and no servers.
pub fn test_capabilities() -> Capabilities {
    capabilities_with(FakeControl::with_servers(&[]))
}

pub fn capabilities_with(control: Arc<FakeControl>) -> Capabilities {
    Capabilities::new(Arc::new(RecordingMessenger::default()), control, "test")
}
