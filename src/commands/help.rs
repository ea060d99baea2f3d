//! Help text generated from the registered descriptors.

use std::collections::HashMap;

use super::descriptor::{CommandDescriptor, HelpGroup, Origin};

/// Footer shown when a listing contains admin commands.
pub const ADMIN_FOOTER: &str = "* Admin command (requires password)";

/// Read-only snapshot of every descriptor, taken when the registry is sealed.
#[derive(Debug, Default)]
pub struct HelpCatalog {
    descriptors: Vec<CommandDescriptor>,
    by_name: HashMap<String, usize>,
}

impl HelpCatalog {
    pub(crate) fn new(descriptors: Vec<CommandDescriptor>) -> Self {
        let mut by_name = HashMap::new();
        for (idx, descriptor) in descriptors.iter().enumerate() {
            for name in descriptor.names() {
                by_name.insert(name.to_lowercase(), idx);
            }
        }
        Self { descriptors, by_name }
    }

    /// Commands visible from `origin`, grouped and sorted.
    ///
    /// General commands come first, then the game group, then admin
    /// commands; each bucket is alphabetical. `help` itself and hidden
    /// commands are left out.
    pub fn listing(&self, origin: Origin) -> String {
        let mut visible: Vec<&CommandDescriptor> = self
            .descriptors
            .iter()
            .filter(|d| !d.hidden && d.name != "help" && d.scope.allows(origin))
            .collect();
        if visible.is_empty() {
            return "No commands available.".to_owned();
        }
        visible.sort_by(|a, b| {
            (a.admin_only, a.group, a.name).cmp(&(b.admin_only, b.group, b.name))
        });

        let mut lines = vec!["Available commands:".to_owned()];
        lines.extend(visible.iter().map(|d| summary_line(d)));
        if visible.iter().any(|d| d.admin_only) {
            lines.push(String::new());
            lines.push(ADMIN_FOOTER.to_owned());
        }
        lines.join("\n")
    }

    /// Detailed help for one command or alias.
    pub fn detail(&self, name: &str) -> Option<String> {
        let descriptor = self.descriptors.get(*self.by_name.get(&name.to_lowercase())?)?;

        let mut text = format!("{}{}", descriptor.name, descriptor.admin_marker());
        if !descriptor.aliases.is_empty() {
            text.push_str(&format!(" (aliases: {})", descriptor.aliases.join(", ")));
        }
        if !descriptor.description.is_empty() {
            text.push_str(" - ");
            text.push_str(descriptor.description);
        }
        if !descriptor.usage.is_empty() {
            text.push_str("\nUsage: ");
            text.push_str(descriptor.usage);
        }
        if !descriptor.examples.is_empty() {
            text.push_str("\nExamples:");
            for example in descriptor.examples {
                text.push_str("\n  ");
                text.push_str(example);
            }
        }
        Some(text)
    }
}

fn summary_line(descriptor: &CommandDescriptor) -> String {
    if descriptor.description.is_empty() {
        format!("{}{}", descriptor.name, descriptor.admin_marker())
    } else {
        format!(
            "{}{} - {}",
            descriptor.name,
            descriptor.admin_marker(),
            descriptor.description
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::descriptor::Scope;

    fn catalog() -> HelpCatalog {
        HelpCatalog::new(vec![
            CommandDescriptor::new("help").description("Show available commands"),
            CommandDescriptor::new("ping").description("Check if bot is responsive"),
            CommandDescriptor::new("pet").group(HelpGroup::Game).description("Pet it"),
            CommandDescriptor::new("feed").group(HelpGroup::Game),
            CommandDescriptor::new("join")
                .admin_only()
                .description("Join a channel")
                .usage("!join <password> #channel [key]")
                .examples(&["!join pw #a", "!join pw #b key"]),
            CommandDescriptor::new("aika").aliases(&["time"]).description("Show current time"),
            CommandDescriptor::new("secret").hidden(),
            CommandDescriptor::new("exit").scope(Scope::Console),
        ])
    }

    #[test]
    fn listing_orders_buckets() {
        let text = catalog().listing(Origin::Channel);
        assert_eq!(
            text,
            "Available commands:\n\
             aika - Show current time\n\
             ping - Check if bot is responsive\n\
             feed\n\
             pet - Pet it\n\
             join* - Join a channel\n\
             \n\
             * Admin command (requires password)"
        );
    }

    #[test]
    fn listing_respects_scope() {
        assert!(catalog().listing(Origin::Console).contains("exit"));
        assert!(!catalog().listing(Origin::Private).contains("exit"));
    }

    #[test]
    fn detail_by_alias() {
        let text = catalog().detail("TIME").unwrap();
        assert_eq!(text, "aika (aliases: time) - Show current time");
    }

    #[test]
    fn detail_with_usage_and_examples() {
        let text = catalog().detail("join").unwrap();
        assert_eq!(
            text,
            "join* - Join a channel\n\
             Usage: !join <password> #channel [key]\n\
             Examples:\n  !join pw #a\n  !join pw #b key"
        );
    }

    #[test]
    fn detail_unknown() {
        assert!(catalog().detail("nope").is_none());
    }
}
