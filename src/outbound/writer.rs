use std::sync::Arc;
use std::time::Duration;

use futures_util::SinkExt;
use leetbot_proto::{IrcCodec, Message, ProtocolError};
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep};
use tokio_util::codec::FramedWrite;
use tracing::{debug, warn};

use super::bucket::RateBucket;
use crate::config::RateLimitConfig;
use crate::error::{ConnectionError, SendError};

enum Control {
    Send(Message),
    Close(Option<Message>),
}

enum Flow {
    Continue,
    Close(Option<Message>),
}

/// Producer side of a connection's outbound path. Cheap to clone.
#[derive(Clone)]
pub struct OutboundQueue {
    control: mpsc::UnboundedSender<Control>,
    paced: mpsc::UnboundedSender<Message>,
}

impl OutboundQueue {
    /// Queue a rate-limited message. Order is preserved per queue.
    pub fn enqueue(&self, msg: Message) -> Result<(), SendError> {
        self.paced.send(msg).map_err(|_| SendError::Closed)
    }

    /// Queue a message ahead of paced traffic, bypassing the bucket.
    pub fn send_now(&self, msg: Message) -> Result<(), SendError> {
        self.control
            .send(Control::Send(msg))
            .map_err(|_| SendError::Closed)
    }

    /// Write `last` (if any), flush, and shut the writer down.
    /// Paced messages still queued are discarded.
    pub fn close(&self, last: Option<Message>) -> Result<(), SendError> {
        self.control
            .send(Control::Close(last))
            .map_err(|_| SendError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.control.is_closed()
    }
}

/// Consumer side: owns the write half and the bucket.
pub struct OutboundWriter<W> {
    sink: FramedWrite<W, IrcCodec>,
    bucket: RateBucket,
    control: mpsc::UnboundedReceiver<Control>,
    paced: mpsc::UnboundedReceiver<Message>,
    backoff: Duration,
    max_wait: Duration,
    server: Arc<str>,
}

/// Receiving half of a connection's outbound path, waiting for a socket.
pub struct OutboundReceiver {
    control: mpsc::UnboundedReceiver<Control>,
    paced: mpsc::UnboundedReceiver<Message>,
    config: RateLimitConfig,
    server: Arc<str>,
}

impl OutboundReceiver {
    /// Bind to the write half of a socket. The bucket starts full.
    pub fn attach<W>(self, writer: W) -> OutboundWriter<W>
    where
        W: AsyncWrite + Unpin,
    {
        OutboundWriter {
            sink: FramedWrite::new(writer, IrcCodec::new()),
            bucket: RateBucket::from_config(&self.config, Instant::now()),
            control: self.control,
            paced: self.paced,
            backoff: self.config.retry_backoff(),
            max_wait: self.config.max_wait(),
            server: self.server,
        }
    }
}

/// Create the queue for one connection. Messages queued before the
/// receiver is attached wait in order.
pub fn channel(config: &RateLimitConfig, server: Arc<str>) -> (OutboundQueue, OutboundReceiver) {
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let (paced_tx, paced_rx) = mpsc::unbounded_channel();
    let queue = OutboundQueue {
        control: control_tx,
        paced: paced_tx,
    };
    let receiver = OutboundReceiver {
        control: control_rx,
        paced: paced_rx,
        config: config.clone(),
        server,
    };
    (queue, receiver)
}

impl<W> OutboundWriter<W>
where
    W: AsyncWrite + Unpin,
{
    /// Drain both queues until closed. Returns an error only when the
    /// socket write fails.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        loop {
            tokio::select! {
                biased;
                ctl = self.control.recv() => match ctl {
                    Some(Control::Send(msg)) => self.write(msg).await?,
                    Some(Control::Close(last)) => return self.close(last).await,
                    None => return self.close(None).await,
                },
                Some(msg) = self.paced.recv() => {
                    if let Flow::Close(last) = self.send_paced(msg).await? {
                        return self.close(last).await;
                    }
                }
            }
        }
    }

    /// Wait for a token, serving control traffic meanwhile.
    async fn send_paced(&mut self, msg: Message) -> Result<Flow, ConnectionError> {
        let queued_at = Instant::now();
        let mut reported = false;
        loop {
            let now = Instant::now();
            if self.bucket.try_consume(now) {
                self.write(msg).await?;
                return Ok(Flow::Continue);
            }
            if !reported && now.duration_since(queued_at) >= self.max_wait {
                warn!(
                    server = %self.server,
                    waited_ms = now.duration_since(queued_at).as_millis() as u64,
                    "outbound send stalled on rate limit"
                );
                reported = true;
            }

            tokio::select! {
                biased;
                ctl = self.control.recv() => match ctl {
                    Some(Control::Send(urgent)) => self.write(urgent).await?,
                    Some(Control::Close(last)) => return Ok(Flow::Close(last)),
                    None => return Ok(Flow::Close(None)),
                },
                _ = sleep(self.backoff) => {}
            }
        }
    }

    async fn write(&mut self, msg: Message) -> Result<(), ConnectionError> {
        debug!(server = %self.server, raw = %msg, "send");
        match self.sink.send(msg).await {
            Ok(()) => Ok(()),
            Err(ProtocolError::Io(e)) => Err(ConnectionError::Io(e)),
            Err(e) => {
                warn!(server = %self.server, error = %e, "dropping unencodable message");
                Ok(())
            }
        }
    }

    async fn close(mut self, last: Option<Message>) -> Result<(), ConnectionError> {
        if let Some(msg) = last {
            self.write(msg).await?;
        }
        self.sink.close().await.map_err(|e| match e {
            ProtocolError::Io(e) => ConnectionError::Io(e),
            other => ConnectionError::Protocol(other),
        })
    }
}
