//! The handler abstraction every command implements.

use async_trait::async_trait;

use super::invocation::CommandInvocation;
use crate::capabilities::Capabilities;
use crate::error::HandlerError;

/// What a handler wants said back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Sent to the invocation's target (the channel, or the sender in private).
    Text(String),
    /// Sent to the sender's nick even when invoked in a channel.
    Private(String),
    /// Nothing to say.
    Silent,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply::Text(text.into())
    }

    pub fn private(text: impl Into<String>) -> Self {
        Reply::Private(text.into())
    }

    /// The reply body, if any.
    pub fn body(&self) -> Option<&str> {
        match self {
            Reply::Text(text) | Reply::Private(text) => Some(text),
            Reply::Silent => None,
        }
    }
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Reply::Text(text)
    }
}

impl From<&str> for Reply {
    fn from(text: &str) -> Self {
        Reply::Text(text.to_owned())
    }
}

/// A command implementation.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn execute(
        &self,
        invocation: &CommandInvocation,
        caps: &Capabilities,
    ) -> Result<Reply, HandlerError>;
}

/// Adapter for handlers that are plain synchronous functions.
pub struct FnHandler<F>(F);

/// Wrap a synchronous function as a [`CommandHandler`].
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&CommandInvocation, &Capabilities) -> Result<Reply, HandlerError> + Send + Sync,
{
    FnHandler(f)
}

#[async_trait]
impl<F> CommandHandler for FnHandler<F>
where
    F: Fn(&CommandInvocation, &Capabilities) -> Result<Reply, HandlerError> + Send + Sync,
{
    async fn execute(
        &self,
        invocation: &CommandInvocation,
        caps: &Capabilities,
    ) -> Result<Reply, HandlerError> {
        (self.0)(invocation, caps)
    }
}
