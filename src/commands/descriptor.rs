//! Static command metadata.

use std::time::Duration;

/// Where an invocation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// A PRIVMSG to a channel.
    Channel,
    /// A PRIVMSG to the bot's nickname.
    Private,
    /// The local console.
    Console,
}

impl Origin {
    pub fn is_console(self) -> bool {
        matches!(self, Origin::Console)
    }

    pub fn is_private(self) -> bool {
        matches!(self, Origin::Private)
    }
}

/// The set of origins a command accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    /// Channel messages only.
    Channel,
    /// Private messages only.
    Private,
    /// Channel or private messages.
    Irc,
    /// The local console only.
    Console,
    /// Anywhere.
    #[default]
    All,
}

impl Scope {
    pub fn allows(self, origin: Origin) -> bool {
        match self {
            Scope::Channel => origin == Origin::Channel,
            Scope::Private => origin == Origin::Private,
            Scope::Irc => origin != Origin::Console,
            Scope::Console => origin == Origin::Console,
            Scope::All => true,
        }
    }

    /// Reply when the scope rejects an origin.
    pub fn denial(self, origin: Origin) -> &'static str {
        match (self, origin) {
            (Scope::Console, _) => "This command is only available in console mode",
            (_, Origin::Console) => "This command is not available in console mode",
            (Scope::Channel, _) => "This command is only available in channels",
            _ => "This command is only available in private messages",
        }
    }
}

/// Help listing bucket. Admin commands are always listed last regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum HelpGroup {
    #[default]
    General,
    /// The pet game commands.
    Game,
}

/// Registration record for one command.
#[derive(Debug, Clone)]
pub struct CommandDescriptor {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub description: &'static str,
    pub usage: &'static str,
    pub examples: &'static [&'static str],
    pub scope: Scope,
    pub group: HelpGroup,
    pub admin_only: bool,
    pub hidden: bool,
    pub requires_args: bool,
    pub cooldown: Option<Duration>,
}

impl CommandDescriptor {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            aliases: &[],
            description: "",
            usage: "",
            examples: &[],
            scope: Scope::All,
            group: HelpGroup::General,
            admin_only: false,
            hidden: false,
            requires_args: false,
            cooldown: None,
        }
    }

    pub const fn aliases(mut self, aliases: &'static [&'static str]) -> Self {
        self.aliases = aliases;
        self
    }

    pub const fn description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub const fn usage(mut self, usage: &'static str) -> Self {
        self.usage = usage;
        self
    }

    pub const fn examples(mut self, examples: &'static [&'static str]) -> Self {
        self.examples = examples;
        self
    }

    pub const fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub const fn group(mut self, group: HelpGroup) -> Self {
        self.group = group;
        self
    }

    pub const fn admin_only(mut self) -> Self {
        self.admin_only = true;
        self
    }

    pub const fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub const fn requires_args(mut self) -> Self {
        self.requires_args = true;
        self
    }

    pub const fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = Some(cooldown);
        self
    }

    /// Every name this command answers to, canonical first.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        std::iter::once(self.name).chain(self.aliases.iter().copied())
    }

    /// `*` for admin commands, empty otherwise.
    pub fn admin_marker(&self) -> &'static str {
        if self.admin_only { "*" } else { "" }
    }
}
