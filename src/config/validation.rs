//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use std::collections::HashSet;

use thiserror::Error;

use super::Config;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("bot.name is required")]
    MissingBotName,
    #[error("bot.command_prefix must be exactly one character, got {0:?}")]
    InvalidCommandPrefix(String),
    #[error("at least one [[servers]] entry is required")]
    NoServers,
    #[error("servers[{0}].name is required")]
    MissingServerName(usize),
    #[error("server {0:?}: host is required")]
    MissingHost(String),
    #[error("server {0:?}: nickname is empty")]
    MissingNickname(String),
    #[error("server {0:?} is defined more than once")]
    DuplicateServer(String),
    #[error("server {server:?}: invalid channel name {channel:?}")]
    InvalidChannel { server: String, channel: String },
    #[error("rate_limit.capacity must be at least 1, got {0}")]
    InvalidCapacity(f64),
    #[error("rate_limit.refill_per_second must be positive, got {0}")]
    InvalidRefillRate(f64),
    #[error("bot.max_response_lines must be at least 1")]
    InvalidResponseLines,
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    use leetbot_proto::ChannelExt;

    let mut errors = Vec::new();

    if config.bot.name.is_empty() {
        errors.push(ValidationError::MissingBotName);
    }
    if config.command_prefix().is_none() {
        errors.push(ValidationError::InvalidCommandPrefix(
            config.bot.command_prefix.clone(),
        ));
    }
    if config.bot.max_response_lines == 0 {
        errors.push(ValidationError::InvalidResponseLines);
    }

    if config.servers.is_empty() {
        errors.push(ValidationError::NoServers);
    }
    let mut seen = HashSet::new();
    for (idx, server) in config.servers.iter().enumerate() {
        if server.name.is_empty() {
            errors.push(ValidationError::MissingServerName(idx));
            continue;
        }
        if !seen.insert(server.name.to_lowercase()) {
            errors.push(ValidationError::DuplicateServer(server.name.clone()));
        }
        if server.host.is_empty() {
            errors.push(ValidationError::MissingHost(server.name.clone()));
        }
        if server.nickname.is_empty() {
            errors.push(ValidationError::MissingNickname(server.name.clone()));
        }
        for channel in &server.channels {
            if !channel.name.is_valid_channel_name() {
                errors.push(ValidationError::InvalidChannel {
                    server: server.name.clone(),
                    channel: channel.name.clone(),
                });
            }
        }
    }

    let rl = &config.rate_limit;
    if !(rl.capacity >= 1.0) {
        errors.push(ValidationError::InvalidCapacity(rl.capacity));
    }
    if !(rl.refill_per_second > 0.0) {
        errors.push(ValidationError::InvalidRefillRate(rl.refill_per_second));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
