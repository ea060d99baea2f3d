//! Error types for the IRC protocol layer.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Top-level protocol errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// I/O error during reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Message exceeded maximum allowed length.
    #[error("message too long: {actual} bytes (limit: {limit})")]
    MessageTooLong {
        /// Actual message length.
        actual: usize,
        /// Maximum allowed length.
        limit: usize,
    },

    /// Illegal control character in message.
    #[error("illegal control character: {0:?}")]
    IllegalControlChar(char),

    /// Failed to parse an IRC message.
    #[error("invalid message: {string}")]
    InvalidMessage {
        /// The invalid message string.
        string: String,
        /// The underlying parse error.
        #[source]
        cause: MessageParseError,
    },
}

/// Errors encountered when parsing or building IRC messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum MessageParseError {
    /// Message was empty.
    #[error("empty message")]
    EmptyMessage,

    /// Command was invalid or missing.
    #[error("invalid command")]
    InvalidCommand,

    /// Not enough arguments for command.
    #[error("not enough arguments for {command}: expected {expected}, got {got}")]
    NotEnoughArguments {
        /// The command being built.
        command: &'static str,
        /// Expected number of arguments.
        expected: usize,
        /// Actual number of arguments.
        got: usize,
    },

    /// More parameters than the protocol allows.
    #[error("too many parameters: {0}")]
    TooManyParameters(usize),

    /// A non-final parameter that cannot be sent in middle position.
    #[error("parameter {index} cannot appear before the trailing parameter: {value:?}")]
    InvalidMiddleParameter {
        /// Zero-based parameter position.
        index: usize,
        /// The offending value.
        value: String,
    },

    /// Malformed message prefix.
    #[error("invalid prefix: {0:?}")]
    InvalidPrefix(String),

    /// Parser rejected the input at the given byte position.
    #[error("parse error at byte {position}: {context}")]
    ParseContext {
        /// Byte offset of the failure.
        position: usize,
        /// Human-readable context.
        context: String,
    },
}

impl ProtocolError {
    /// Wrap a parse error together with the offending input.
    pub(crate) fn invalid(string: &str, cause: MessageParseError) -> Self {
        ProtocolError::InvalidMessage {
            string: string.to_owned(),
            cause,
        }
    }
}
