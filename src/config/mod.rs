//! Configuration loading and validation.
//!
//! - [`types`]: config structs and [`Config::load`]
//! - [`defaults`]: serde default functions
//! - [`validation`]: startup checks that collect every problem at once

mod defaults;
mod types;
mod validation;

pub use types::{
    AdminConfig, BotConfig, ChannelConfig, CommandsConfig, Config, ConfigError, ConsoleConfig,
    RateLimitConfig, ServerIdentity, TimeoutsConfig,
};
pub use validation::{ValidationError, validate};
