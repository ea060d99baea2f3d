//! Local console input.
//!
//! Reads lines until EOF or shutdown. Bare `quit`/`exit` stop the bot;
//! everything else goes to the dispatcher, which decides between the
//! command registry and free chat.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::capabilities::BotControl;
use crate::dispatch::BotEvent;

/// Feed console lines into the event channel.
pub async fn run<R>(
    input: R,
    events: mpsc::UnboundedSender<BotEvent>,
    control: &dyn BotControl,
    shutdown: CancellationToken,
) where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("console input closed");
                break;
            }
            Err(e) => {
                warn!(error = %e, "console read failed");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            control.request_shutdown(None);
            break;
        }
        if events.send(BotEvent::Console(line.to_owned())).is_err() {
            break;
        }
    }
}
