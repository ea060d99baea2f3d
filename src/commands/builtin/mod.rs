//! Commands the bot ships with.

mod admin;
mod console;
mod general;
mod pet;

use super::registry::Registry;
use crate::error::StartupError;

/// Register every built-in command. Call before [`Registry::seal`].
pub fn register_builtins(registry: &mut Registry) -> Result<(), StartupError> {
    general::register(registry)?;
    pet::register(registry)?;
    console::register(registry)?;
    admin::register(registry)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::descriptor::Origin;
    use crate::config::CommandsConfig;

    #[test]
    fn builtins_register_without_collisions() {
        let mut registry = Registry::new(CommandsConfig::default());
        register_builtins(&mut registry).unwrap();
        for name in ["help", "ping", "time", "echo", "sää", "weather", "crypto", "feed", "exit", "raw"] {
            assert!(registry.resolve(name).is_some(), "{name} missing");
        }
        assert_eq!(registry.resolve("ECHO").unwrap().name, "kaiku");
    }

    #[test]
    fn help_listing_covers_groups() {
        let mut registry = Registry::new(CommandsConfig::default());
        register_builtins(&mut registry).unwrap();
        let catalog = registry.help_catalog();
        let _registry = registry.seal();

        let listing = catalog.get().unwrap().listing(Origin::Private);
        let ping = listing.find("\nping").unwrap();
        let feed = listing.find("\nfeed").unwrap();
        let join = listing.find("\njoin*").unwrap();
        assert!(ping < feed && feed < join);
        assert!(!listing.contains("\nhelp"));
        assert!(!listing.contains("\nexit"));
        assert!(listing.ends_with("* Admin command (requires password)"));
    }
}
