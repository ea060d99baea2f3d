//! Everyday commands: help, liveness, time, echo and the service lookups.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use chrono::{Local, NaiveTime};
use leetbot_proto::ChannelExt;

use crate::capabilities::{Capabilities, ScheduledMessage};
use crate::commands::descriptor::{CommandDescriptor, Scope};
use crate::commands::handler::{CommandHandler, Reply, handler_fn};
use crate::commands::help::HelpCatalog;
use crate::commands::invocation::CommandInvocation;
use crate::commands::registry::Registry;
use crate::error::{HandlerError, StartupError};

const DEFAULT_LOCATION: &str = "Joensuu";
const DEFAULT_COINS: [&str; 3] = ["bitcoin", "ethereum", "tether"];
const DEFAULT_CURRENCY: &str = "eur";

pub(super) fn register(registry: &mut Registry) -> Result<(), StartupError> {
    let catalog = registry.help_catalog();
    registry.register_handler(
        CommandDescriptor::new("help")
            .description("Show available commands")
            .usage("!help [command]")
            .examples(&["!help", "!help weather"]),
        HelpHandler { catalog },
    )?;

    registry.register(
        CommandDescriptor::new("ping")
            .description("Check if bot is responsive")
            .usage("!ping"),
        Arc::new(handler_fn(|_, _| Ok(Reply::text("Pong!")))),
    )?;

    registry.register(
        CommandDescriptor::new("version")
            .description("Show bot version")
            .usage("!version"),
        Arc::new(handler_fn(|_, caps| {
            Ok(Reply::text(format!("Bot version: {}", caps.version)))
        })),
    )?;

    registry.register(
        CommandDescriptor::new("about")
            .description("Show information about the bot")
            .usage("!about"),
        Arc::new(handler_fn(|_, caps| {
            Ok(Reply::text(format!(
                "leetbot v{} - a multi-network IRC bot with weather, crypto prices and a pet. \
                 Type !help for commands.",
                caps.version
            )))
        })),
    )?;

    registry.register(
        CommandDescriptor::new("aika")
            .aliases(&["time"])
            .description("Show current time")
            .usage("!aika"),
        Arc::new(handler_fn(|_, _| {
            let now = Local::now().format("%Y-%m-%d %H:%M:%S%.9f");
            Ok(Reply::text(format!("Current time: {now}")))
        })),
    )?;

    registry.register(
        CommandDescriptor::new("kaiku")
            .aliases(&["echo"])
            .description("Echo back the message")
            .usage("!kaiku <message>")
            .examples(&["!kaiku Hello world!"])
            .requires_args(),
        Arc::new(handler_fn(|inv, _| {
            let speaker = inv.sender.as_deref().unwrap_or("Console");
            Ok(Reply::text(format!("{speaker}: {}", inv.raw)))
        })),
    )?;

    registry.register_handler(
        CommandDescriptor::new("s")
            .aliases(&["sää", "weather"])
            .description("Get weather information")
            .usage("!s [location]")
            .examples(&["!s", "!s Helsinki"]),
        WeatherHandler,
    )?;

    registry.register_handler(
        CommandDescriptor::new("crypto")
            .description("Get cryptocurrency prices")
            .usage("!crypto [coin] [currency]")
            .examples(&["!crypto", "!crypto btc", "!crypto eth eur"]),
        CryptoHandler,
    )?;

    registry.register_handler(
        CommandDescriptor::new("schedule")
            .description("Schedule a message to be sent at a specific time")
            .usage("!schedule #channel HH:MM:SS[.fraction] message")
            .examples(&["!schedule #leet 13:37:00 leet!"])
            .scope(Scope::Irc)
            .requires_args(),
        ScheduleHandler,
    )?;

    Ok(())
}

/// Lists commands, or describes one. On IRC the answer goes to the
/// invoker privately so a channel is not flooded.
struct HelpHandler {
    catalog: Arc<OnceLock<HelpCatalog>>,
}

#[async_trait]
impl CommandHandler for HelpHandler {
    async fn execute(
        &self,
        inv: &CommandInvocation,
        _caps: &Capabilities,
    ) -> Result<Reply, HandlerError> {
        let catalog = self
            .catalog
            .get()
            .ok_or_else(|| HandlerError::Internal("help requested before registry was sealed".into()))?;

        let text = match inv.arg(0) {
            Some(name) => {
                let name = name.trim_start_matches(|c: char| !c.is_alphanumeric());
                catalog
                    .detail(name)
                    .unwrap_or_else(|| format!("Unknown command: {name}"))
            }
            None => catalog.listing(inv.origin),
        };

        if inv.origin.is_console() {
            Ok(Reply::Text(text))
        } else {
            Ok(Reply::Private(text))
        }
    }
}

struct WeatherHandler;

#[async_trait]
impl CommandHandler for WeatherHandler {
    async fn execute(
        &self,
        inv: &CommandInvocation,
        caps: &Capabilities,
    ) -> Result<Reply, HandlerError> {
        let location = if inv.raw.is_empty() {
            DEFAULT_LOCATION
        } else {
            inv.raw.as_str()
        };
        let report = caps.weather()?.current(location).await?;
        Ok(Reply::Text(report))
    }
}

struct CryptoHandler;

#[async_trait]
impl CommandHandler for CryptoHandler {
    async fn execute(
        &self,
        inv: &CommandInvocation,
        caps: &Capabilities,
    ) -> Result<Reply, HandlerError> {
        let service = caps.crypto()?;

        let Some(coin) = inv.arg(0) else {
            let mut parts = Vec::with_capacity(DEFAULT_COINS.len());
            for coin in DEFAULT_COINS {
                let price = service.price(coin, DEFAULT_CURRENCY).await?;
                parts.push(format!("{}: {price} €", capitalize(coin)));
            }
            return Ok(Reply::Text(parts.join(" | ")));
        };

        let coin = coin.to_lowercase();
        let currency = inv.arg(1).unwrap_or(DEFAULT_CURRENCY).to_lowercase();
        let price = service.price(&coin, &currency).await?;
        Ok(Reply::Text(format!(
            "{}: {price} {}",
            capitalize(&coin),
            currency.to_uppercase()
        )))
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

struct ScheduleHandler;

const SCHEDULE_USAGE: &str = "!schedule #channel HH:MM:SS[.fraction] message";

#[async_trait]
impl CommandHandler for ScheduleHandler {
    async fn execute(
        &self,
        inv: &CommandInvocation,
        caps: &Capabilities,
    ) -> Result<Reply, HandlerError> {
        let scheduler = caps.scheduler()?;
        let request = parse_schedule(inv)
            .ok_or_else(|| HandlerError::InvalidArguments(SCHEDULE_USAGE.to_owned()))?;
        let at = request.at;
        let id = scheduler.schedule(request).await?;
        Ok(Reply::Text(format!(
            "Message scheduled with ID: {id} for {}",
            at.format("%H:%M:%S%.6f")
        )))
    }
}

/// `#channel HH:MM:SS[.fraction] message`; the fraction may carry up to
/// nanosecond precision.
fn parse_schedule(inv: &CommandInvocation) -> Option<ScheduledMessage> {
    let server = inv.server.clone()?;
    let mut parts = inv.raw.splitn(3, char::is_whitespace);
    let channel = parts.next().filter(|c| c.is_channel_target())?;
    let time = parts.next()?;
    let text = parts.next().map(str::trim).filter(|t| !t.is_empty())?;

    Some(ScheduledMessage {
        server,
        channel: channel.to_owned(),
        at: parse_time_of_day(time)?,
        text: text.to_owned(),
    })
}

fn parse_time_of_day(input: &str) -> Option<NaiveTime> {
    let (clock, fraction) = match input.split_once('.') {
        Some((clock, fraction)) => (clock, Some(fraction)),
        None => (input, None),
    };

    let mut fields = clock.split(':').map(|f| {
        if (1..=2).contains(&f.len()) {
            f.parse::<u32>().ok()
        } else {
            None
        }
    });
    let hour = fields.next()??;
    let minute = fields.next()??;
    let second = fields.next()??;
    if fields.next().is_some() {
        return None;
    }

    let nanos = match fraction {
        Some(digits) if (1..=9).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit()) => {
            format!("{digits:0<9}").parse::<u32>().ok()?
        }
        Some(_) => return None,
        None => 0,
    };

    NaiveTime::from_hms_nano_opt(hour, minute, second, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::descriptor::Origin;
    use crate::config::CommandsConfig;
    use crate::testing::{FakeServices, test_capabilities};

    async fn run(text: &str, origin: Origin, caps: &Capabilities) -> Reply {
        let mut registry = Registry::new(CommandsConfig::default());
        register(&mut registry).unwrap();
        let registry = registry.seal();
        let mut inv = CommandInvocation::parse(text, '!', origin).unwrap();
        if origin != Origin::Console {
            let target = if origin == Origin::Channel { "#leet" } else { "alice" };
            inv = inv.on_server("libera", target, "alice");
        }
        registry.dispatch(&inv, caps).await
    }

    #[tokio::test]
    async fn ping_and_version() {
        let caps = test_capabilities();
        assert_eq!(run("!ping", Origin::Channel, &caps).await, Reply::text("Pong!"));
        assert_eq!(
            run("!version", Origin::Console, &caps).await,
            Reply::text("Bot version: test")
        );
    }

    #[tokio::test]
    async fn echo_names_the_speaker() {
        let caps = test_capabilities();
        assert_eq!(
            run("!echo hello  there", Origin::Channel, &caps).await,
            Reply::text("alice: hello  there")
        );
        assert_eq!(
            run("!kaiku hi", Origin::Console, &caps).await,
            Reply::text("Console: hi")
        );
    }

    #[tokio::test]
    async fn time_has_nanoseconds() {
        let Reply::Text(text) = run("!aika", Origin::Channel, &test_capabilities()).await else {
            panic!("expected text");
        };
        let fraction = text.rsplit('.').next().unwrap();
        assert_eq!(fraction.len(), 9);
    }

    #[tokio::test]
    async fn help_goes_private_on_irc() {
        let caps = test_capabilities();
        let reply = run("!help ping", Origin::Channel, &caps).await;
        assert_eq!(
            reply,
            Reply::private("ping - Check if bot is responsive\nUsage: !ping")
        );
        assert_eq!(
            run("!help nope", Origin::Console, &caps).await,
            Reply::text("Unknown command: nope")
        );
        assert_eq!(
            run("!help !echo", Origin::Console, &caps).await.body().map(|b| b.starts_with("kaiku")),
            Some(true)
        );
    }

    #[tokio::test]
    async fn weather_defaults_and_unavailable() {
        let caps = test_capabilities();
        assert_eq!(
            run("!s", Origin::Channel, &caps).await,
            Reply::text("Weather service is not available right now.")
        );

        let caps = FakeServices::install(test_capabilities());
        assert_eq!(
            run("!sää", Origin::Channel, &caps).await,
            Reply::text("Weather in Joensuu: 3°C")
        );
        assert_eq!(
            run("!weather Oulu", Origin::Channel, &caps).await,
            Reply::text("Weather in Oulu: 3°C")
        );
    }

    #[tokio::test]
    async fn crypto_formats_prices() {
        let caps = FakeServices::install(test_capabilities());
        assert_eq!(
            run("!crypto", Origin::Channel, &caps).await,
            Reply::text("Bitcoin: 42 € | Ethereum: 42 € | Tether: 42 €")
        );
        assert_eq!(
            run("!crypto ETH usd", Origin::Channel, &caps).await,
            Reply::text("Eth: 42 USD")
        );
    }

    #[tokio::test]
    async fn schedule_parses_request() {
        let caps = FakeServices::install(test_capabilities());
        assert_eq!(
            run("!schedule #leet 13:37:00.5 leet time", Origin::Channel, &caps).await,
            Reply::text("Message scheduled with ID: 1 for 13:37:00.500000")
        );
        assert_eq!(
            run("!schedule #leet 25:00:00 nope", Origin::Channel, &caps).await,
            Reply::text(format!("Usage: {SCHEDULE_USAGE}"))
        );
    }

    #[test]
    fn time_of_day_parsing() {
        assert_eq!(
            parse_time_of_day("13:37:00.123456789"),
            NaiveTime::from_hms_nano_opt(13, 37, 0, 123_456_789)
        );
        assert_eq!(parse_time_of_day("1:2:3"), NaiveTime::from_hms_opt(1, 2, 3));
        assert!(parse_time_of_day("13:37").is_none());
        assert!(parse_time_of_day("13:37:00.").is_none());
        assert!(parse_time_of_day("13:37:00.1234567890").is_none());
        assert!(parse_time_of_day("13:60:00").is_none());
    }
}
