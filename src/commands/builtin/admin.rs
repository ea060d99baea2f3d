//! Admin commands. The credential is the first argument and has already
//! been checked and stripped by the time a handler runs.

use async_trait::async_trait;

use super::console::for_each_ready;
use crate::capabilities::Capabilities;
use crate::commands::descriptor::{CommandDescriptor, Scope};
use crate::commands::handler::{CommandHandler, Reply};
use crate::commands::invocation::CommandInvocation;
use crate::commands::registry::Registry;
use crate::error::{HandlerError, StartupError};

const DEFAULT_QUIT: &str = "Admin quit";

pub(super) fn register(registry: &mut Registry) -> Result<(), StartupError> {
    registry.register_handler(
        CommandDescriptor::new("join")
            .description("Join a channel (admin only)")
            .usage("!join <password> #channel [key]")
            .examples(&["!join mypass #newchannel", "!join mypass #private secretkey"])
            .admin_only()
            .requires_args(),
        AdminHandler(AdminAction::Join),
    )?;
    registry.register_handler(
        CommandDescriptor::new("part")
            .description("Leave a channel (admin only)")
            .usage("!part <password> #channel")
            .examples(&["!part mypass #channel"])
            .admin_only()
            .requires_args(),
        AdminHandler(AdminAction::Part),
    )?;
    registry.register_handler(
        CommandDescriptor::new("nick")
            .description("Change bot nickname (admin only)")
            .usage("!nick <password> <new_nickname>")
            .examples(&["!nick mypass newbot"])
            .admin_only()
            .requires_args(),
        AdminHandler(AdminAction::Nick),
    )?;
    registry.register_handler(
        CommandDescriptor::new("quit")
            .description("Quit IRC with message (admin only)")
            .usage("!quit <password> [message]")
            .examples(&["!quit mypass", "!quit mypass Goodbye everyone!"])
            .admin_only(),
        AdminHandler(AdminAction::Quit),
    )?;
    registry.register_handler(
        CommandDescriptor::new("raw")
            .description("Send raw IRC command (admin only)")
            .usage("!raw <password> <IRC_COMMAND>")
            .examples(&["!raw mypass MODE #channel +o user"])
            .scope(Scope::Irc)
            .admin_only()
            .requires_args(),
        AdminHandler(AdminAction::Raw),
    )?;
    Ok(())
}

#[derive(Clone, Copy, Debug)]
enum AdminAction {
    Join,
    Part,
    Nick,
    Quit,
    Raw,
}

impl AdminAction {
    fn usage(self) -> &'static str {
        match self {
            AdminAction::Join => "!join <password> #channel [key]",
            AdminAction::Part => "!part <password> #channel",
            AdminAction::Nick => "!nick <password> <new_nickname>",
            AdminAction::Quit => "!quit <password> [message]",
            AdminAction::Raw => "!raw <password> <IRC_COMMAND>",
        }
    }
}

struct AdminHandler(AdminAction);

enum Applied {
    /// The server the invocation came from.
    Here,
    /// Every ready server (console invocations).
    Servers(Vec<String>),
}

impl AdminHandler {
    fn required<'a>(&self, inv: &'a CommandInvocation, index: usize) -> Result<&'a str, HandlerError> {
        inv.arg(index)
            .ok_or_else(|| HandlerError::InvalidArguments(self.0.usage().to_owned()))
    }

    /// Apply `op` to the invocation's server, or to every ready server when
    /// run from the console.
    fn on_servers(
        &self,
        inv: &CommandInvocation,
        caps: &Capabilities,
        mut op: impl FnMut(&str) -> Result<(), crate::error::SendError>,
    ) -> Result<Applied, HandlerError> {
        match inv.server.as_deref() {
            Some(server) => {
                op(server)?;
                Ok(Applied::Here)
            }
            None => Ok(Applied::Servers(for_each_ready(caps, op)?)),
        }
    }
}

#[async_trait]
impl CommandHandler for AdminHandler {
    async fn execute(
        &self,
        inv: &CommandInvocation,
        caps: &Capabilities,
    ) -> Result<Reply, HandlerError> {
        let control = &caps.control;

        let (done, outcome) = match self.0 {
            AdminAction::Join => {
                let channel = self.required(inv, 0)?;
                let key = inv.arg(1);
                let outcome = self.on_servers(inv, caps, |s| control.join(s, channel, key))?;
                tracing::info!(channel = %channel, "admin join");
                (format!("Joining {channel}"), outcome)
            }
            AdminAction::Part => {
                let channel = self.required(inv, 0)?;
                let outcome = self.on_servers(inv, caps, |s| control.part(s, channel, None))?;
                tracing::info!(channel = %channel, "admin part");
                (format!("Leaving {channel}"), outcome)
            }
            AdminAction::Nick => {
                let nick = self.required(inv, 0)?;
                let outcome = self.on_servers(inv, caps, |s| control.change_nick(s, nick))?;
                tracing::info!(nick = %nick, "admin nick change");
                (format!("Changing nick to {nick}"), outcome)
            }
            AdminAction::Quit => {
                let message = if inv.raw.is_empty() {
                    DEFAULT_QUIT.to_owned()
                } else {
                    inv.raw.clone()
                };
                tracing::info!(message = %message, "admin quit");
                control.request_shutdown(Some(message.clone()));
                if inv.origin.is_console() {
                    return Ok(Reply::text(format!("Shutting down bot: {message}")));
                }
                return Ok(Reply::Silent);
            }
            AdminAction::Raw => {
                let server = inv
                    .server
                    .as_deref()
                    .ok_or_else(|| HandlerError::InvalidArguments(self.0.usage().to_owned()))?;
                control.send_raw(server, &inv.raw)?;
                tracing::info!(server = %server, "admin raw line sent");
                return Ok(Reply::text(format!("Sent: {}", inv.raw)));
            }
        };

        Ok(match outcome {
            Applied::Here => Reply::Text(done),
            Applied::Servers(servers) if servers.is_empty() => {
                Reply::text("No connected servers.")
            }
            Applied::Servers(servers) => Reply::Text(format!("{done} on {}", servers.join(", "))),
        })
    }
}
