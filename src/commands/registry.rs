//! Command registry and dispatch.
//!
//! The registry is filled once at startup, sealed, then shared read-only
//! behind an `Arc`. Only the cooldown map is written afterwards, and it is
//! a `DashMap` so unrelated commands never contend on one lock.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry as CooldownEntry;
use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, error};

use super::descriptor::{CommandDescriptor, Origin};
use super::handler::{CommandHandler, Reply};
use super::help::HelpCatalog;
use super::invocation::CommandInvocation;
use crate::capabilities::Capabilities;
use crate::config::CommandsConfig;
use crate::error::{GENERIC_FAILURE, StartupError};
use crate::telemetry::CommandTimer;

struct Entry {
    descriptor: CommandDescriptor,
    handler: Arc<dyn CommandHandler>,
}

type CooldownKey = (&'static str, String);

/// Registry of command handlers.
pub struct Registry {
    entries: Vec<Entry>,
    /// Lowercased name or alias -> entry index.
    index: HashMap<String, usize>,
    cooldowns: DashMap<CooldownKey, Instant>,
    /// Longest cooldown of any registered command; older entries are dead.
    longest_cooldown: Duration,
    last_prune: Mutex<Option<Instant>>,
    overrides: CommandsConfig,
    catalog: Arc<OnceLock<HelpCatalog>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(CommandsConfig::default())
    }
}

impl Registry {
    /// Create an empty registry. Cooldown overrides apply to commands
    /// registered afterwards.
    pub fn new(overrides: CommandsConfig) -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            cooldowns: DashMap::new(),
            longest_cooldown: Duration::ZERO,
            last_prune: Mutex::new(None),
            overrides,
            catalog: Arc::new(OnceLock::new()),
        }
    }

    /// Register a command. Fails without changing the registry if the name
    /// or any alias is already taken.
    pub fn register(
        &mut self,
        mut descriptor: CommandDescriptor,
        handler: Arc<dyn CommandHandler>,
    ) -> Result<(), StartupError> {
        let mut names: Vec<String> = Vec::new();
        for name in descriptor.names() {
            let key = name.to_lowercase();
            if let Some(&idx) = self.index.get(&key) {
                return Err(StartupError::DuplicateCommand {
                    name: name.to_owned(),
                    existing: self.entries[idx].descriptor.name.to_owned(),
                });
            }
            if names.contains(&key) {
                return Err(StartupError::DuplicateCommand {
                    name: name.to_owned(),
                    existing: descriptor.name.to_owned(),
                });
            }
            names.push(key);
        }

        if let Some(cooldown) = self.overrides.cooldown_for(descriptor.name) {
            descriptor.cooldown = (!cooldown.is_zero()).then_some(cooldown);
        }

        if let Some(cooldown) = descriptor.cooldown {
            self.longest_cooldown = self.longest_cooldown.max(cooldown);
        }

        let idx = self.entries.len();
        for key in names {
            self.index.insert(key, idx);
        }
        debug!(command = %descriptor.name, "registered command");
        self.entries.push(Entry { descriptor, handler });
        Ok(())
    }

    /// Register a handler that is a plain value.
    pub fn register_handler<H>(
        &mut self,
        descriptor: CommandDescriptor,
        handler: H,
    ) -> Result<(), StartupError>
    where
        H: CommandHandler + 'static,
    {
        self.register(descriptor, Arc::new(handler))
    }

    /// Handle filled with the help catalog when the registry is sealed.
    pub fn help_catalog(&self) -> Arc<OnceLock<HelpCatalog>> {
        Arc::clone(&self.catalog)
    }

    /// Finish registration and publish the help catalog.
    pub fn seal(self) -> Arc<Self> {
        let descriptors = self.entries.iter().map(|e| e.descriptor.clone()).collect();
        let _ = self.catalog.set(HelpCatalog::new(descriptors));
        Arc::new(self)
    }

    /// Case-insensitive lookup by name or alias.
    pub fn resolve(&self, name: &str) -> Option<&CommandDescriptor> {
        self.entry(name).map(|e| &e.descriptor)
    }

    fn entry(&self, name: &str) -> Option<&Entry> {
        let idx = *self.index.get(&name.to_lowercase())?;
        self.entries.get(idx)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// When `identity` last ran `command` successfully, if still tracked.
    pub fn last_used(&self, command: &str, identity: &str) -> Option<Instant> {
        let name = self.resolve(command)?.name;
        self.cooldowns
            .get(&(name, identity.to_owned()))
            .map(|at| *at)
    }

    /// Run an invocation through resolve, scope, admin, argument and
    /// cooldown checks, then the handler.
    pub async fn dispatch(&self, invocation: &CommandInvocation, caps: &Capabilities) -> Reply {
        self.dispatch_at(invocation, caps, Instant::now()).await
    }

    /// [`dispatch`](Self::dispatch) with an explicit clock reading.
    pub async fn dispatch_at(
        &self,
        invocation: &CommandInvocation,
        caps: &Capabilities,
        now: Instant,
    ) -> Reply {
        let Some(entry) = self.entry(&invocation.name) else {
            return unknown_command(invocation);
        };
        let descriptor = &entry.descriptor;

        if !descriptor.scope.allows(invocation.origin) {
            return Reply::text(descriptor.scope.denial(invocation.origin));
        }

        // Same reply as a command that does not exist.
        if descriptor.admin_only && !invocation.admin_valid {
            debug!(command = %descriptor.name, "admin check failed");
            return unknown_command(invocation);
        }

        if descriptor.requires_args && invocation.args.is_empty() {
            return Reply::text(format!("Usage: {}", descriptor.usage));
        }

        let reservation = match self.reserve_cooldown(descriptor, invocation, now) {
            Ok(reservation) => reservation,
            Err(remaining) => {
                return Reply::text(format!(
                    "Command on cooldown. Wait {:.1} seconds.",
                    remaining.as_secs_f64()
                ));
            }
        };

        let _timer = CommandTimer::new(descriptor.name);
        let outcome = AssertUnwindSafe(entry.handler.execute(invocation, caps))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                self.release_cooldown(reservation);
                error!(
                    command = %descriptor.name,
                    code = e.error_code(),
                    error = %e,
                    "command failed"
                );
                Reply::text(e.user_message())
            }
            Err(_) => {
                self.release_cooldown(reservation);
                error!(command = %descriptor.name, "command handler panicked");
                Reply::text(GENERIC_FAILURE)
            }
        }
    }

    /// Record `now` as the last use, or report the remaining wait.
    ///
    /// Check and record happen under the same map entry, so two concurrent
    /// invocations cannot both pass the window.
    fn reserve_cooldown(
        &self,
        descriptor: &CommandDescriptor,
        invocation: &CommandInvocation,
        now: Instant,
    ) -> Result<Option<Reservation>, Duration> {
        let Some(window) = descriptor.cooldown else {
            return Ok(None);
        };
        self.prune_cooldowns(now);
        let key = (descriptor.name, invocation.identity());

        let previous = match self.cooldowns.entry(key.clone()) {
            CooldownEntry::Occupied(mut slot) => {
                let elapsed = now.saturating_duration_since(*slot.get());
                if elapsed < window {
                    return Err(window - elapsed);
                }
                Some(slot.insert(now))
            }
            CooldownEntry::Vacant(slot) => {
                slot.insert(now);
                None
            }
        };

        Ok(Some(Reservation {
            key,
            at: now,
            previous,
        }))
    }

    /// Drop entries older than every cooldown window, at most once per
    /// longest window. Must not run while an entry guard is held.
    fn prune_cooldowns(&self, now: Instant) {
        let window = self.longest_cooldown;
        {
            let mut last = self.last_prune.lock();
            if last.is_some_and(|at| now.saturating_duration_since(at) < window) {
                return;
            }
            *last = Some(now);
        }
        let before = self.cooldowns.len();
        self.cooldowns
            .retain(|_, at| now.saturating_duration_since(*at) < window);
        let pruned = before.saturating_sub(self.cooldowns.len());
        if pruned > 0 {
            debug!(pruned, remaining = self.cooldowns.len(), "pruned expired cooldowns");
        }
    }

    /// Undo a reservation after a failed run.
    fn release_cooldown(&self, reservation: Option<Reservation>) {
        let Some(Reservation { key, at, previous }) = reservation else {
            return;
        };
        match previous {
            Some(previous) => {
                if let Some(mut slot) = self.cooldowns.get_mut(&key)
                    && *slot == at
                {
                    *slot = previous;
                }
            }
            None => {
                self.cooldowns.remove_if(&key, |_, recorded| *recorded == at);
            }
        }
    }
}

struct Reservation {
    key: CooldownKey,
    at: Instant,
    previous: Option<Instant>,
}

/// Silent in channels, a short notice everywhere else.
pub fn unknown_command(invocation: &CommandInvocation) -> Reply {
    match invocation.origin {
        Origin::Channel => Reply::Silent,
        Origin::Private | Origin::Console => {
            Reply::text(format!("Unknown command: {}", invocation.name))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::commands::descriptor::Scope;
    use crate::commands::handler::handler_fn;
    use crate::error::HandlerError;
    use crate::testing::test_capabilities;

    struct Counting(Arc<AtomicUsize>);

    #[async_trait]
    impl CommandHandler for Counting {
        async fn execute(
            &self,
            _invocation: &CommandInvocation,
            _caps: &Capabilities,
        ) -> Result<Reply, HandlerError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Reply::text("ok"))
        }
    }

    fn channel(text: &str) -> CommandInvocation {
        CommandInvocation::parse(text, '!', Origin::Channel)
            .unwrap()
            .on_server("libera", "#leet", "alice")
    }

    fn private(text: &str) -> CommandInvocation {
        CommandInvocation::parse(text, '!', Origin::Private)
            .unwrap()
            .on_server("libera", "alice", "alice")
    }

    fn console(text: &str) -> CommandInvocation {
        CommandInvocation::parse(text, '!', Origin::Console).unwrap()
    }

    fn pong() -> Arc<dyn CommandHandler> {
        Arc::new(handler_fn(|_, _| Ok(Reply::text("Pong!"))))
    }

    #[test]
    fn duplicate_alias_rejected_and_registry_unchanged() {
        let mut registry = Registry::default();
        registry
            .register(CommandDescriptor::new("aika").aliases(&["time"]), pong())
            .unwrap();

        let err = registry
            .register(CommandDescriptor::new("clock").aliases(&["TIME"]), pong())
            .unwrap_err();
        assert!(matches!(
            err,
            StartupError::DuplicateCommand { ref existing, .. } if existing == "aika"
        ));
        assert_eq!(registry.len(), 1);
        assert!(registry.resolve("clock").is_none());
        assert_eq!(registry.resolve("Time").unwrap().name, "aika");
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut registry = Registry::default();
        registry.register(CommandDescriptor::new("ping"), pong()).unwrap();
        assert!(registry.register(CommandDescriptor::new("ping"), pong()).is_err());
        assert!(
            registry
                .register(CommandDescriptor::new("self").aliases(&["self"]), pong())
                .is_err()
        );
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn unknown_command_is_silent_in_channels() {
        let registry = Registry::default().seal();
        let caps = test_capabilities();

        assert_eq!(registry.dispatch(&channel("!nope"), &caps).await, Reply::Silent);
        assert_eq!(
            registry.dispatch(&private("!nope"), &caps).await,
            Reply::text("Unknown command: nope")
        );
        assert_eq!(
            registry.dispatch(&console("!nope"), &caps).await,
            Reply::text("Unknown command: nope")
        );
    }

    #[tokio::test]
    async fn admin_denial_matches_unknown_command() {
        let mut registry = Registry::default();
        registry
            .register(CommandDescriptor::new("join").admin_only(), pong())
            .unwrap();
        let registry = registry.seal();
        let caps = test_capabilities();

        let denied = registry.dispatch(&private("!join wrong #x"), &caps).await;
        let missing = registry.dispatch(&private("!jion wrong #x"), &caps).await;
        assert_eq!(denied, Reply::text("Unknown command: join"));
        assert_eq!(missing, Reply::text("Unknown command: jion"));
        assert_eq!(registry.dispatch(&channel("!join wrong #x"), &caps).await, Reply::Silent);

        let mut allowed = private("!join #x");
        allowed.admin_valid = true;
        assert_eq!(registry.dispatch(&allowed, &caps).await, Reply::text("Pong!"));
    }

    #[tokio::test]
    async fn scope_is_enforced() {
        let mut registry = Registry::default();
        registry
            .register(CommandDescriptor::new("exit").scope(Scope::Console), pong())
            .unwrap();
        registry
            .register(CommandDescriptor::new("raw").scope(Scope::Irc), pong())
            .unwrap();
        let registry = registry.seal();
        let caps = test_capabilities();

        assert_eq!(
            registry.dispatch(&channel("!exit"), &caps).await,
            Reply::text("This command is only available in console mode")
        );
        assert_eq!(
            registry.dispatch(&console("!raw"), &caps).await,
            Reply::text("This command is not available in console mode")
        );
        assert_eq!(registry.dispatch(&console("!exit"), &caps).await, Reply::text("Pong!"));
    }

    #[tokio::test]
    async fn requires_args_shows_usage() {
        let mut registry = Registry::default();
        registry
            .register(
                CommandDescriptor::new("kaiku").usage("!kaiku <message>").requires_args(),
                pong(),
            )
            .unwrap();
        let registry = registry.seal();
        assert_eq!(
            registry.dispatch(&channel("!kaiku"), &test_capabilities()).await,
            Reply::text("Usage: !kaiku <message>")
        );
    }

    #[tokio::test]
    async fn cooldown_runs_handler_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::default();
        registry
            .register_handler(
                CommandDescriptor::new("s").cooldown(Duration::from_secs(10)),
                Counting(Arc::clone(&calls)),
            )
            .unwrap();
        let registry = registry.seal();
        let caps = test_capabilities();
        let inv = channel("!s");

        let start = Instant::now();
        let first = registry.dispatch_at(&inv, &caps, start).await;
        let second = registry
            .dispatch_at(&inv, &caps, start + Duration::from_millis(2500))
            .await;

        assert_eq!(first, Reply::text("ok"));
        assert_eq!(second, Reply::text("Command on cooldown. Wait 7.5 seconds."));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(registry.last_used("s", &inv.identity()), Some(start));

        // Other identities are unaffected.
        let other = CommandInvocation::parse("!s", '!', Origin::Channel)
            .unwrap()
            .on_server("libera", "#leet", "bob");
        let third = registry
            .dispatch_at(&other, &caps, start + Duration::from_secs(1))
            .await;
        assert_eq!(third, Reply::text("ok"));

        let later = registry
            .dispatch_at(&inv, &caps, start + Duration::from_secs(10))
            .await;
        assert_eq!(later, Reply::text("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn expired_cooldowns_are_pruned() {
        let mut registry = Registry::default();
        registry
            .register(CommandDescriptor::new("s").cooldown(Duration::from_secs(10)), pong())
            .unwrap();
        let registry = registry.seal();
        let caps = test_capabilities();
        let alice = channel("!s");
        let bob = CommandInvocation::parse("!s", '!', Origin::Channel)
            .unwrap()
            .on_server("libera", "#leet", "bob");

        let start = Instant::now();
        registry.dispatch_at(&alice, &caps, start).await;
        registry
            .dispatch_at(&bob, &caps, start + Duration::from_secs(1))
            .await;
        assert_eq!(registry.cooldowns.len(), 2);

        let later = start + Duration::from_secs(20);
        registry.dispatch_at(&alice, &caps, later).await;
        assert_eq!(registry.cooldowns.len(), 1);
        assert!(registry.last_used("s", &bob.identity()).is_none());
        assert_eq!(registry.last_used("s", &alice.identity()), Some(later));
    }

    #[tokio::test]
    async fn failed_run_does_not_start_cooldown() {
        let mut registry = Registry::default();
        registry
            .register(
                CommandDescriptor::new("crypto").cooldown(Duration::from_secs(30)),
                Arc::new(handler_fn(|_, _| {
                    Err(HandlerError::Service(anyhow::anyhow!("upstream 503")))
                })),
            )
            .unwrap();
        let registry = registry.seal();
        let inv = channel("!crypto");

        let reply = registry.dispatch(&inv, &test_capabilities()).await;
        assert_eq!(reply, Reply::text(GENERIC_FAILURE));
        assert!(registry.last_used("crypto", &inv.identity()).is_none());
    }

    #[tokio::test]
    async fn panicking_handler_is_contained() {
        let mut registry = Registry::default();
        registry
            .register(
                CommandDescriptor::new("boom"),
                Arc::new(handler_fn(|_, _| panic!("handler bug"))),
            )
            .unwrap();
        let registry = registry.seal();
        let reply = registry.dispatch(&channel("!boom"), &test_capabilities()).await;
        assert_eq!(reply, Reply::text(GENERIC_FAILURE));
    }

    #[test]
    fn config_override_replaces_cooldown() {
        let mut overrides = CommandsConfig::default();
        overrides.cooldowns.insert("s".into(), 30.0);
        overrides.cooldowns.insert("ping".into(), 0.0);

        let mut registry = Registry::new(overrides);
        registry
            .register(CommandDescriptor::new("s").cooldown(Duration::from_secs(5)), pong())
            .unwrap();
        registry
            .register(CommandDescriptor::new("ping").cooldown(Duration::from_secs(5)), pong())
            .unwrap();

        assert_eq!(registry.resolve("s").unwrap().cooldown, Some(Duration::from_secs(30)));
        assert_eq!(registry.resolve("ping").unwrap().cooldown, None);
    }

    #[test]
    fn seal_publishes_help() {
        let mut registry = Registry::default();
        registry.register(CommandDescriptor::new("ping"), pong()).unwrap();
        let catalog = registry.help_catalog();
        assert!(catalog.get().is_none());
        let _registry = registry.seal();
        assert!(catalog.get().unwrap().detail("ping").is_some());
    }
}
