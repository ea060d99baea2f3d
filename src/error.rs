//! Unified error handling for leetbot.
//!
//! Startup errors are fatal and surface before any connection opens.
//! Everything else is contained: connection errors become a disconnect
//! reason, handler errors become a generic reply, send errors are returned
//! to whoever asked for the send.

use leetbot_proto::ProtocolError;
use thiserror::Error;

use crate::config::{ConfigError, ValidationError};

// ============================================================================
// Startup Errors
// ============================================================================

/// Fatal errors raised while assembling the bot.
#[derive(Debug, Error)]
pub enum StartupError {
    /// A command name or alias is already registered.
    #[error("command name or alias {name:?} already registered by {existing:?}")]
    DuplicateCommand { name: String, existing: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid configuration: {}", join_errors(.0))]
    Invalid(Vec<ValidationError>),

    #[error("invalid server {name:?}: {reason}")]
    InvalidServer { name: String, reason: String },

    #[error("invalid admin credential: {0}")]
    InvalidCredential(String),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<Vec<ValidationError>> for StartupError {
    fn from(errors: Vec<ValidationError>) -> Self {
        StartupError::Invalid(errors)
    }
}

// ============================================================================
// Connection Errors
// ============================================================================

/// Errors that end a connection. They are logged and turned into a
/// disconnect reason; they never propagate past the connection task.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("tls error: {0}")]
    Tls(String),

    #[error("invalid server name for TLS: {0}")]
    InvalidServerName(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("connection closed by server")]
    Closed,

    #[error("connect timed out")]
    ConnectTimeout,

    #[error("registration timed out")]
    RegistrationTimeout,
}

// ============================================================================
// Send Errors
// ============================================================================

/// Errors returned when queueing outbound traffic.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("no connection named {0:?}")]
    UnknownServer(String),

    #[error("connection {0:?} is not ready")]
    NotReady(String),

    #[error("not joined to {0}")]
    ChannelNotJoined(String),

    #[error("connection closed")]
    Closed,

    #[error("invalid line: {0}")]
    InvalidLine(#[from] ProtocolError),
}

// ============================================================================
// Handler Errors (command processing)
// ============================================================================

/// Errors a command handler may return. Caught at the dispatch boundary.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Arguments were missing or malformed; the payload is the usage line.
    #[error("invalid arguments, usage: {0}")]
    InvalidArguments(String),

    /// A capability the command needs is not configured.
    #[error("capability unavailable: {0}")]
    Unavailable(&'static str),

    /// An external service failed.
    #[error("service error: {0}")]
    Service(#[from] anyhow::Error),

    #[error("send error: {0}")]
    Send(#[from] SendError),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Reply shown when a handler fails for reasons the user cannot fix.
pub const GENERIC_FAILURE: &str = "Command failed, please try again later.";

impl HandlerError {
    /// Get a static error code string for log labeling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidArguments(_) => "invalid_arguments",
            Self::Unavailable(_) => "unavailable",
            Self::Service(_) => "service_error",
            Self::Send(_) => "send_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// The text shown to the invoker. Internal details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidArguments(usage) => format!("Usage: {usage}"),
            Self::Unavailable(what) => format!("{what} is not available right now."),
            Self::Send(SendError::ChannelNotJoined(channel)) => {
                format!("Not joined to {channel}.")
            }
            Self::Send(SendError::UnknownServer(name)) => format!("Unknown server: {name}"),
            Self::Service(_) | Self::Send(_) | Self::Internal(_) => GENERIC_FAILURE.to_string(),
        }
    }
}
