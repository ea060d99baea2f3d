//! Scripted IRC server.
//!
//! Accepts the bot's connection, records what it sends and lets the test
//! play server lines back.

use std::time::Duration;

use leetbot_proto::{Command, Message};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::time::timeout;

/// Listens on an ephemeral localhost port.
pub struct MockServer {
    listener: TcpListener,
}

impl MockServer {
    pub async fn bind() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        Ok(Self { listener })
    }

    pub fn port(&self) -> u16 {
        self.listener
            .local_addr()
            .map(|addr| addr.port())
            .unwrap_or_default()
    }

    /// Wait for the bot to connect.
    pub async fn accept(&self) -> anyhow::Result<MockPeer> {
        let (stream, _) = timeout(Duration::from_secs(5), self.listener.accept()).await??;
        let (read_half, write_half) = stream.into_split();
        Ok(MockPeer {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
            received: Vec::new(),
        })
    }
}

/// The server side of one bot connection.
pub struct MockPeer {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
    /// Every line received so far, in order.
    pub received: Vec<String>,
}

#[allow(dead_code)]
impl MockPeer {
    /// Send a raw line to the bot.
    pub async fn send(&mut self, line: &str) -> anyhow::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Next line from the bot, or `None` once it closes the socket.
    pub async fn recv_line(&mut self) -> anyhow::Result<Option<String>> {
        let mut line = String::new();
        let read = timeout(Duration::from_secs(5), self.reader.read_line(&mut line)).await??;
        if read == 0 {
            return Ok(None);
        }
        let line = line.trim_end().to_owned();
        self.received.push(line.clone());
        Ok(Some(line))
    }

    /// Next parsed message from the bot.
    pub async fn recv(&mut self) -> anyhow::Result<Message> {
        match self.recv_line().await? {
            Some(line) => line
                .parse::<Message>()
                .map_err(|e| anyhow::anyhow!("bot sent unparseable line {line:?}: {e}")),
            None => anyhow::bail!("bot closed the connection"),
        }
    }

    /// Read until a message matches, returning it.
    pub async fn recv_until<F>(&mut self, mut predicate: F) -> anyhow::Result<Message>
    where
        F: FnMut(&Command) -> bool,
    {
        loop {
            let msg = self.recv().await?;
            if predicate(&msg.command) {
                return Ok(msg);
            }
        }
    }

    /// Assert nothing arrives for `quiet`.
    pub async fn expect_silence(&mut self, quiet: Duration) -> anyhow::Result<()> {
        let mut line = String::new();
        match timeout(quiet, self.reader.read_line(&mut line)).await {
            Err(_) => Ok(()),
            Ok(_) => anyhow::bail!("expected silence, got {:?}", line.trim_end()),
        }
    }

    /// Read the bot's NICK/USER and welcome it.
    pub async fn welcome(&mut self, nick: &str) -> anyhow::Result<()> {
        let first = self.recv().await?;
        anyhow::ensure!(
            first.command == Command::NICK(nick.to_owned()),
            "expected NICK {nick}, got {first:?}"
        );
        let second = self.recv().await?;
        anyhow::ensure!(
            matches!(second.command, Command::USER(..)),
            "expected USER, got {second:?}"
        );
        self.send(&format!(":mock.test 001 {nick} :Welcome to the mock network"))
            .await
    }

    /// Acknowledge a JOIN the way a real server does.
    pub async fn confirm_join(&mut self, nick: &str, channel: &str) -> anyhow::Result<()> {
        self.send(&format!(":{nick}!bot@localhost JOIN {channel}")).await?;
        self.send(&format!(":mock.test 366 {nick} {channel} :End of /NAMES list."))
            .await
    }

    /// Welcome the bot and confirm every channel JOIN it sends.
    pub async fn register_and_join(&mut self, nick: &str, channels: &[&str]) -> anyhow::Result<()> {
        self.welcome(nick).await?;
        for channel in channels {
            let msg = self.recv().await?;
            anyhow::ensure!(
                msg.command == Command::JOIN((*channel).to_owned(), None),
                "expected JOIN {channel}, got {msg:?}"
            );
            self.confirm_join(nick, channel).await?;
        }
        Ok(())
    }
}
