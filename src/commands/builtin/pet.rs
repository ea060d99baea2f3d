//! The pet game. State lives in the [`PetService`](crate::capabilities::PetService);
//! these commands only route to it.

use async_trait::async_trait;

use crate::capabilities::Capabilities;
use crate::commands::descriptor::{CommandDescriptor, HelpGroup};
use crate::commands::handler::{CommandHandler, Reply};
use crate::commands::invocation::{CONSOLE_IDENTITY, CommandInvocation};
use crate::commands::registry::Registry;
use crate::error::{HandlerError, StartupError};

pub(super) fn register(registry: &mut Registry) -> Result<(), StartupError> {
    registry.register_handler(
        CommandDescriptor::new("tamagotchi")
            .description("Show the pet's status")
            .usage("!tamagotchi")
            .group(HelpGroup::Game),
        PetHandler(PetAction::Status),
    )?;
    registry.register_handler(
        CommandDescriptor::new("feed")
            .description("Feed the pet")
            .usage("!feed [food]")
            .examples(&["!feed", "!feed pizza"])
            .group(HelpGroup::Game),
        PetHandler(PetAction::Feed),
    )?;
    registry.register_handler(
        CommandDescriptor::new("pet")
            .description("Pet the pet")
            .usage("!pet")
            .group(HelpGroup::Game),
        PetHandler(PetAction::Pet),
    )?;
    Ok(())
}

#[derive(Clone, Copy)]
enum PetAction {
    Status,
    Feed,
    Pet,
}

struct PetHandler(PetAction);

#[async_trait]
impl CommandHandler for PetHandler {
    async fn execute(
        &self,
        inv: &CommandInvocation,
        caps: &Capabilities,
    ) -> Result<Reply, HandlerError> {
        let service = caps.pet()?;
        // Each network has its own pet; the console has one too.
        let server = inv.server.as_deref().unwrap_or(CONSOLE_IDENTITY);

        let text = match self.0 {
            PetAction::Status => service.status(server).await?,
            PetAction::Feed => {
                let food = (!inv.raw.is_empty()).then_some(inv.raw.as_str());
                service.feed(server, food).await?
            }
            PetAction::Pet => service.pet(server).await?,
        };
        Ok(Reply::Text(text))
    }
}
