//! TCP ServerQuery client.

use crate::command::Command;
use crate::error::{QueryError, Result};
use crate::notification::{Notification, NotificationHandler};
use crate::reply::{is_status_line, parse_records, parse_status, Record, Reply};
use crate::{Connector, ServerQuery};
use async_trait::async_trait;
use futures_util::StreamExt;
use parking_lot::{Mutex as SyncMutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

const MAX_LINE_LENGTH: usize = 1024 * 1024;

type Lines = FramedRead<OwnedReadHalf, LinesCodec>;
type ReplyResult = Result<Reply>;

/// Opens [`QueryClient`] sessions over TCP.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    connect_timeout: Duration,
    command_timeout: Duration,
}

impl TcpConnector {
    pub fn new(connect_timeout: Duration, command_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            command_timeout,
        }
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(10), Duration::from_secs(10))
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, address: &str) -> Result<Arc<dyn ServerQuery>> {
        let client = QueryClient::connect(address, self.connect_timeout, self.command_timeout).await?;
        Ok(Arc::new(client))
    }
}

/// Serialized command path: the writer plus the stream of completed replies.
struct CommandChannel {
    writer: Option<OwnedWriteHalf>,
    replies: mpsc::UnboundedReceiver<ReplyResult>,
    /// Replies still owed to commands that timed out
    stale: usize,
}

/// ServerQuery session over a TCP connection.
///
/// A reader task demultiplexes the socket: `notify*` lines go to the
/// registered [`NotificationHandler`], everything else is collected into
/// replies. One command is in flight at a time.
pub struct QueryClient {
    channel: Mutex<CommandChannel>,
    handler: Arc<RwLock<Option<NotificationHandler>>>,
    shutdown: CancellationToken,
    reader: SyncMutex<Option<JoinHandle<()>>>,
    command_timeout: Duration,
}

impl QueryClient {
    /// Connect and consume the `TS3` greeting
    pub async fn connect(
        address: &str,
        connect_timeout: Duration,
        command_timeout: Duration,
    ) -> Result<Self> {
        debug!(address = %address, "Connecting to ServerQuery");

        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(address))
            .await
            .map_err(|_| QueryError::Connect {
                address: address.to_string(),
                message: "timed out".to_string(),
            })?
            .map_err(|e| QueryError::Connect {
                address: address.to_string(),
                message: e.to_string(),
            })?;

        let (read_half, write_half) = stream.into_split();
        let mut lines = FramedRead::new(read_half, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

        tokio::time::timeout(connect_timeout, read_greeting(&mut lines))
            .await
            .map_err(|_| QueryError::Handshake("no greeting received".to_string()))??;

        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let handler: Arc<RwLock<Option<NotificationHandler>>> = Arc::new(RwLock::new(None));
        let shutdown = CancellationToken::new();

        let reader = tokio::spawn(read_loop(
            lines,
            reply_tx,
            Arc::clone(&handler),
            shutdown.clone(),
        ));

        debug!(address = %address, "ServerQuery connected");

        Ok(Self {
            channel: Mutex::new(CommandChannel {
                writer: Some(write_half),
                replies: reply_rx,
                stale: 0,
            }),
            handler,
            shutdown,
            reader: SyncMutex::new(Some(reader)),
            command_timeout,
        })
    }

    async fn send(channel: &mut CommandChannel, line: &str) -> Result<()> {
        let writer = channel.writer.as_mut().ok_or(QueryError::ConnectionClosed)?;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }

    async fn receive(channel: &mut CommandChannel) -> Result<Reply> {
        while channel.stale > 0 {
            let _late = channel
                .replies
                .recv()
                .await
                .ok_or(QueryError::ConnectionClosed)?;
            channel.stale -= 1;
        }

        channel
            .replies
            .recv()
            .await
            .ok_or(QueryError::ConnectionClosed)?
    }
}

#[async_trait]
impl ServerQuery for QueryClient {
    async fn execute(&self, command: Command) -> Result<Reply> {
        let line = command.encode();
        let mut channel = self.channel.lock().await;
        trace!(command = %command, "Sending ServerQuery command");

        let sent = tokio::time::timeout(self.command_timeout, Self::send(&mut channel, &line)).await;
        match sent {
            Ok(result) => result?,
            Err(_) => {
                // A partly written line leaves the stream unusable
                warn!(command = %command.name(), "ServerQuery write timed out, dropping connection");
                channel.writer = None;
                return Err(QueryError::Timeout(command.name().to_string()));
            }
        }

        let received = tokio::time::timeout(self.command_timeout, Self::receive(&mut channel)).await;
        match received {
            Ok(result) => result,
            Err(_) => {
                // The reply may still arrive; skip it before the next command's.
                channel.stale += 1;
                Err(QueryError::Timeout(command.name().to_string()))
            }
        }
    }

    fn on_notification(&self, handler: NotificationHandler) {
        *self.handler.write() = Some(handler);
    }

    async fn close(&self) {
        self.shutdown.cancel();

        let reader = self.reader.lock().take();
        if let Some(reader) = reader {
            if let Err(e) = reader.await {
                warn!("ServerQuery reader task ended abnormally: {}", e);
            }
        }

        let mut channel = self.channel.lock().await;
        if let Some(mut writer) = channel.writer.take() {
            if let Err(e) = writer.shutdown().await {
                debug!("Error shutting down ServerQuery socket: {}", e);
            }
        }
        debug!("ServerQuery connection closed");
    }
}

impl Drop for QueryClient {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn clean(line: &str) -> &str {
    line.trim_matches(|c| c == '\r' || c == '\n')
}

async fn read_greeting(lines: &mut Lines) -> Result<()> {
    let first = next_line(lines).await?;
    if first != "TS3" {
        return Err(QueryError::Handshake(format!(
            "unexpected greeting '{}'",
            first
        )));
    }
    // Welcome banner
    next_line(lines).await?;
    Ok(())
}

async fn next_line(lines: &mut Lines) -> Result<String> {
    loop {
        match lines.next().await {
            Some(Ok(line)) => {
                let line = clean(&line);
                if !line.is_empty() {
                    return Ok(line.to_string());
                }
            }
            Some(Err(e)) => return Err(QueryError::Malformed(e.to_string())),
            None => return Err(QueryError::ConnectionClosed),
        }
    }
}

async fn read_loop(
    mut lines: Lines,
    replies: mpsc::UnboundedSender<ReplyResult>,
    handler: Arc<RwLock<Option<NotificationHandler>>>,
    shutdown: CancellationToken,
) {
    let mut pending: Vec<Record> = Vec::new();

    loop {
        let next = tokio::select! {
            () = shutdown.cancelled() => break,
            next = lines.next() => next,
        };

        let raw = match next {
            Some(Ok(raw)) => raw,
            Some(Err(e)) => {
                warn!("ServerQuery read failed: {}", e);
                break;
            }
            None => {
                debug!("ServerQuery peer closed the connection");
                break;
            }
        };

        let line = clean(&raw);
        if line.is_empty() {
            continue;
        }

        if let Some(notification) = Notification::parse(line) {
            trace!(kind = %notification.kind, "ServerQuery notification");
            let current = handler.read().clone();
            if let Some(callback) = current {
                callback(notification);
            }
            continue;
        }

        if is_status_line(line) {
            let records = std::mem::take(&mut pending);
            let reply = parse_status(line).and_then(|status| status.into_result(records));
            if replies.send(reply).is_err() {
                break;
            }
            continue;
        }

        pending.extend(parse_records(line));
    }
}
