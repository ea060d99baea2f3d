//! Core configuration types and loading.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use super::defaults::*;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Bot configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Bot identity and response policy.
    pub bot: BotConfig,
    /// Admin credential.
    #[serde(default)]
    pub admin: AdminConfig,
    /// Servers to connect to.
    #[serde(default)]
    pub servers: Vec<ServerIdentity>,
    /// Outbound token bucket.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Connection and shutdown timing.
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    /// Per-command overrides.
    #[serde(default)]
    pub commands: CommandsConfig,
    /// Local console.
    #[serde(default)]
    pub console: ConsoleConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    ///
    /// Servers without an explicit nickname inherit `bot.name`.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(content)?;
        for server in &mut config.servers {
            if server.nickname.is_empty() {
                server.nickname = config.bot.name.clone();
            }
        }
        Ok(config)
    }

    /// The command prefix as a single character, if configured correctly.
    pub fn command_prefix(&self) -> Option<char> {
        let mut chars = self.bot.command_prefix.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Some(c),
            _ => None,
        }
    }
}

/// Bot identity and response policy.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Default nickname.
    pub name: String,
    /// Username sent in USER; defaults to the nickname.
    pub username: Option<String>,
    /// Real name sent in USER.
    #[serde(default = "default_realname")]
    pub realname: String,
    /// Command prefix character.
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    /// Respond with NOTICE instead of PRIVMSG.
    #[serde(default)]
    pub use_notices: bool,
    /// Version string reported by the `version` command.
    #[serde(default = "default_version")]
    pub version: String,
    /// QUIT message used on shutdown unless overridden.
    #[serde(default = "default_quit_message")]
    pub quit_message: String,
    /// Maximum wrapped lines per response.
    #[serde(default = "default_max_response_lines")]
    pub max_response_lines: usize,
}

impl BotConfig {
    /// Username for registration.
    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.name)
    }
}

/// Admin credential configuration. `password_hash` wins when both are set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminConfig {
    /// Plaintext password.
    pub password: Option<String>,
    /// Argon2 PHC string.
    pub password_hash: Option<String>,
}

/// One IRC network the bot connects to.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerIdentity {
    /// Unique name used to address this server in commands and logs.
    pub name: String,
    /// Hostname or address.
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Connect over TLS.
    #[serde(default)]
    pub tls: bool,
    /// Skip certificate verification (self-signed test networks only).
    #[serde(default)]
    pub tls_insecure: bool,
    /// Nickname on this server; empty means `bot.name`.
    #[serde(default)]
    pub nickname: String,
    /// Channels joined after registration.
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
    /// Connect at startup.
    #[serde(default = "default_true")]
    pub autoconnect: bool,
}

impl ServerIdentity {
    /// A plaintext server entry with no channels.
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        nickname: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            tls: false,
            tls_insecure: false,
            nickname: nickname.into(),
            channels: Vec::new(),
            autoconnect: true,
        }
    }

    /// Add a channel to join after registration.
    #[must_use]
    pub fn with_channel(mut self, name: impl Into<String>, key: Option<&str>) -> Self {
        self.channels.push(ChannelConfig {
            name: name.into(),
            key: key.map(str::to_owned),
        });
        self
    }

    /// `host:port` for logging and connecting.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A channel, written either as `"#name"` or `{ name = "#name", key = "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "ChannelEntry")]
pub struct ChannelConfig {
    pub name: String,
    pub key: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ChannelEntry {
    Name(String),
    Keyed { name: String, key: Option<String> },
}

impl From<ChannelEntry> for ChannelConfig {
    fn from(entry: ChannelEntry) -> Self {
        match entry {
            ChannelEntry::Name(name) => ChannelConfig { name, key: None },
            ChannelEntry::Keyed { name, key } => ChannelConfig { name, key },
        }
    }
}

/// Outbound token bucket configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum burst in messages.
    #[serde(default = "default_bucket_capacity")]
    pub capacity: f64,
    /// Tokens added per second.
    #[serde(default = "default_refill_per_second")]
    pub refill_per_second: f64,
    /// Refills closer together than this are skipped.
    #[serde(default = "default_min_refill_interval_ms")]
    pub min_refill_interval_ms: u64,
    /// Sleep between attempts while the bucket is empty.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// A send deferred longer than this is logged as stalled.
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,
}

impl RateLimitConfig {
    pub fn min_refill_interval(&self) -> Duration {
        Duration::from_millis(self.min_refill_interval_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: default_bucket_capacity(),
            refill_per_second: default_refill_per_second(),
            min_refill_interval_ms: default_min_refill_interval_ms(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_wait_secs: default_max_wait_secs(),
        }
    }
}

/// Connection timing (all values in seconds).
#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(default = "default_connect_secs")]
    pub connect_secs: u64,
    /// Window for the welcome, and again for JOIN replies after it.
    #[serde(default = "default_registration_secs")]
    pub registration_secs: u64,
    /// Read-idle time before the bot sends its own PING.
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
    #[serde(default = "default_shutdown_secs")]
    pub shutdown_secs: u64,
    #[serde(default = "default_reconnect_initial_secs")]
    pub reconnect_initial_secs: u64,
    #[serde(default = "default_reconnect_max_secs")]
    pub reconnect_max_secs: u64,
}

impl TimeoutsConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn registration(&self) -> Duration {
        Duration::from_secs(self.registration_secs)
    }

    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }

    pub fn shutdown(&self) -> Duration {
        Duration::from_secs(self.shutdown_secs)
    }

    pub fn reconnect_initial(&self) -> Duration {
        Duration::from_secs(self.reconnect_initial_secs)
    }

    pub fn reconnect_max(&self) -> Duration {
        Duration::from_secs(self.reconnect_max_secs)
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            connect_secs: default_connect_secs(),
            registration_secs: default_registration_secs(),
            keepalive_secs: default_keepalive_secs(),
            shutdown_secs: default_shutdown_secs(),
            reconnect_initial_secs: default_reconnect_initial_secs(),
            reconnect_max_secs: default_reconnect_max_secs(),
        }
    }
}

/// Per-command configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandsConfig {
    /// Cooldown overrides in seconds, keyed by canonical command name.
    #[serde(default)]
    pub cooldowns: HashMap<String, f64>,
}

impl CommandsConfig {
    /// Cooldown override for a command, if configured.
    pub fn cooldown_for(&self, name: &str) -> Option<Duration> {
        self.cooldowns
            .get(name)
            .filter(|secs| secs.is_finite() && **secs >= 0.0)
            .map(|secs| Duration::from_secs_f64(*secs))
    }
}

/// Local console configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsoleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
