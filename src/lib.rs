//! leetbot: a multi-server IRC bot core.
//!
//! The crate is split the way traffic flows:
//!
//! - [`network`]: one [`network::Connection`] per server (TCP/TLS, handshake,
//!   keepalive, channel membership)
//! - [`outbound`]: rate-limited, line-length-aware output
//! - [`dispatch`]: observers, command parsing and response delivery
//! - [`commands`]: the registry, descriptors, help and built-in commands
//! - [`bot`]: the orchestrator tying connections to the dispatcher
//!
//! The wire format lives in the `leetbot-proto` crate.

pub mod bot;
pub mod capabilities;
pub mod commands;
pub mod config;
pub mod console;
pub mod dispatch;
pub mod error;
pub mod network;
pub mod outbound;
pub mod security;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use tokio::io::BufReader;
use tracing::{info, warn};

use crate::bot::Bot;
use crate::capabilities::Capabilities;
use crate::commands::{Registry, register_builtins};
use crate::config::Config;
use crate::dispatch::{DispatchSettings, Dispatcher};
use crate::error::StartupError;
use crate::security::AdminCredential;

/// Build the command registry: built-ins plus configured cooldown overrides.
pub fn build_registry(config: &Config) -> Result<Arc<Registry>, StartupError> {
    let mut registry = Registry::new(config.commands.clone());
    register_builtins(&mut registry)?;
    info!(commands = registry.len(), "command registry ready");
    Ok(registry.seal())
}

/// Validate `config`, connect, and run until shutdown is requested from a
/// command, the console, or Ctrl-C.
pub async fn run(config: Config) -> Result<(), StartupError> {
    config::validate(&config)?;
    let credential = AdminCredential::from_config(&config.admin)?;
    if credential.is_none() {
        warn!("no admin credential configured; admin commands are disabled");
    }
    let registry = build_registry(&config)?;
    let prefix = config.command_prefix().ok_or_else(|| {
        StartupError::Invalid(vec![config::ValidationError::InvalidCommandPrefix(
            config.bot.command_prefix.clone(),
        )])
    })?;

    let (bot, events) = Bot::new(&config);
    let caps = Capabilities::new(
        Arc::new(bot.clone()),
        Arc::new(bot.clone()),
        config.bot.version.as_str(),
    );
    let dispatcher = Arc::new(
        Dispatcher::new(
            registry,
            caps,
            DispatchSettings {
                command_prefix: prefix,
                use_notices: config.bot.use_notices,
                max_response_lines: config.bot.max_response_lines,
            },
        )
        .with_credential(credential),
    );

    let shutdown = bot.shutdown_token();
    let dispatcher_task = tokio::spawn(dispatcher.run(events, shutdown.clone()));

    info!(servers = config.servers.len(), "starting leetbot");
    bot.start();

    if config.console.enabled {
        let console_bot = bot.clone();
        let console_shutdown = shutdown.clone();
        tokio::spawn(async move {
            console::run(
                BufReader::new(tokio::io::stdin()),
                console_bot.events(),
                &console_bot,
                console_shutdown,
            )
            .await;
        });
    }

    tokio::select! {
        _ = shutdown.cancelled() => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!(error = %e, "failed to listen for ctrl-c");
            }
            info!("interrupt received");
        }
    }

    bot.shutdown(None).await;
    let limit = config.timeouts.shutdown();
    if tokio::time::timeout(limit, dispatcher_task).await.is_err() {
        warn!("commands still running at exit, abandoning them");
    }
    info!("leetbot stopped");
    Ok(())
}
