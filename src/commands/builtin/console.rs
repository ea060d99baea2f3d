//! Console-only commands for running the bot by hand.

use std::sync::Arc;

use crate::capabilities::{Capabilities, ServerStatus};
use crate::commands::descriptor::{CommandDescriptor, Scope};
use crate::commands::handler::{Reply, handler_fn};
use crate::commands::registry::Registry;
use crate::error::{HandlerError, StartupError};

pub(super) fn register(registry: &mut Registry) -> Result<(), StartupError> {
    registry.register(
        CommandDescriptor::new("exit")
            .description("Exit the bot from console")
            .usage("!exit")
            .scope(Scope::Console),
        Arc::new(handler_fn(|_, caps| {
            caps.control.request_shutdown(None);
            Ok(Reply::text("Shutting down bot..."))
        })),
    )?;

    registry.register(
        CommandDescriptor::new("status")
            .description("Show connection status for every server")
            .usage("!status")
            .scope(Scope::Console),
        Arc::new(handler_fn(|_, caps| Ok(Reply::Text(status_report(caps))))),
    )?;

    registry.register(
        CommandDescriptor::new("channels")
            .description("List joined channels per server")
            .usage("!channels")
            .scope(Scope::Console),
        Arc::new(handler_fn(|_, caps| Ok(Reply::Text(channel_report(caps))))),
    )?;

    registry.register(
        CommandDescriptor::new("connect")
            .description("Connect to a configured server")
            .usage("!connect <server>")
            .scope(Scope::Console)
            .requires_args(),
        Arc::new(handler_fn(|inv, caps| {
            let name = inv.arg(0).unwrap_or_default();
            caps.control.connect(name)?;
            Ok(Reply::text(format!("Connecting to {name}")))
        })),
    )?;

    registry.register(
        CommandDescriptor::new("disconnect")
            .description("Disconnect from one server, or all of them")
            .usage("!disconnect [server]")
            .scope(Scope::Console),
        Arc::new(handler_fn(|inv, caps| {
            if let Some(name) = inv.arg(0) {
                caps.control.disconnect(name)?;
                return Ok(Reply::text(format!("Disconnecting from {name}")));
            }
            let names = names(&caps.control.servers());
            for name in &names {
                caps.control.disconnect(name)?;
            }
            Ok(Reply::text(format!("Disconnecting from {}", names.join(", "))))
        })),
    )?;

    Ok(())
}

fn names(servers: &[ServerStatus]) -> Vec<String> {
    servers.iter().map(|s| s.name.clone()).collect()
}

fn status_report(caps: &Capabilities) -> String {
    let servers = caps.control.servers();
    if servers.is_empty() {
        return "No servers configured.".to_owned();
    }
    servers
        .iter()
        .map(|s| {
            format!(
                "{}: {} as {} ({} channels)",
                s.name,
                s.state,
                s.nickname,
                s.channels.len()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn channel_report(caps: &Capabilities) -> String {
    let servers = caps.control.servers();
    if servers.is_empty() {
        return "No servers configured.".to_owned();
    }
    servers
        .iter()
        .map(|s| {
            if s.channels.is_empty() {
                format!("{}: (none)", s.name)
            } else {
                format!("{}: {}", s.name, s.channels.join(", "))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Run `op` against every ready server. Used by admin commands issued from
/// the console, which has no server of its own.
pub(super) fn for_each_ready(
    caps: &Capabilities,
    mut op: impl FnMut(&str) -> Result<(), crate::error::SendError>,
) -> Result<Vec<String>, HandlerError> {
    let ready: Vec<String> = caps
        .control
        .servers()
        .into_iter()
        .filter(|s| s.state.is_ready())
        .map(|s| s.name)
        .collect();
    for name in &ready {
        op(name)?;
    }
    Ok(ready)
}
