//! Command registry, dispatch and the built-in command set.
//!
//! - [`descriptor`]: static metadata (scope, admin flag, cooldown, help text)
//! - [`invocation`]: parsing `!name args` into a request
//! - [`handler`]: the [`CommandHandler`] trait and [`Reply`]
//! - [`registry`]: registration, lookup and the dispatch checks
//! - [`help`]: listing and detail text
//! - [`builtin`]: commands registered at startup

pub mod builtin;
pub mod descriptor;
pub mod handler;
pub mod help;
pub mod invocation;
pub mod registry;

pub use builtin::register_builtins;
pub use descriptor::{CommandDescriptor, HelpGroup, Origin, Scope};
pub use handler::{CommandHandler, FnHandler, Reply, handler_fn};
pub use help::HelpCatalog;
pub use invocation::CommandInvocation;
pub use registry::{Registry, unknown_command};
