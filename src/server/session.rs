//! Per-connection client session.
//!
//! Each connection gets a reader task and a writer task. The reader turns
//! lines into commands and feeds them to the processor; the writer drains the
//! session's outbox onto the socket. Neither touches room state directly.

use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tracing::{debug, info, warn};

use crate::chat::{
    Command, CommandError, Outbound, Outbox, OutboxReceiver, ProcessorHandle, SessionId,
};
use crate::config::{Config, RateLimitConfig};
use crate::rate_limit::{CommandRateLimiter, RateLimitResult};

/// Per-session limits.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Longest accepted line in bytes, excluding the line terminator.
    pub max_line_length: usize,
    /// Pending lines a client may fall behind before it is disconnected.
    pub outbound_queue: usize,
    /// Command rate limit applied to this session.
    pub rate_limit: RateLimitConfig,
}

impl SessionConfig {
    /// Take the session limits out of the full configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_line_length: config.server.max_line_length,
            outbound_queue: config.server.outbound_queue,
            rate_limit: config.rate_limit,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// One connected client.
pub struct ClientSession {
    id: SessionId,
    peer: String,
    processor: ProcessorHandle,
    config: SessionConfig,
}

impl ClientSession {
    /// Create a session for a client at `peer`.
    pub fn new(peer: impl Into<String>, processor: ProcessorHandle, config: SessionConfig) -> Self {
        Self {
            id: SessionId::new(),
            peer: peer.into(),
            processor,
            config,
        }
    }

    /// Serve the client until either side closes the connection.
    pub async fn run<S>(self, stream: S)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let (outbox, outbound) = Outbox::channel(self.config.outbound_queue);

        if let Err(e) = self
            .processor
            .connect(self.id, self.peer.clone(), outbox.clone())
            .await
        {
            warn!(session = %self.id, peer = %self.peer, "Rejecting connection: {}", e);
            return;
        }
        info!(session = %self.id, peer = %self.peer, "Session started");

        let mut write_task = tokio::spawn(write_lines(writer, outbound, self.id));
        let mut read_task = tokio::spawn(read_commands(
            reader,
            self.id,
            outbox,
            self.processor.clone(),
            self.config,
        ));

        tokio::select! {
            _ = &mut read_task => {
                // Queued replies still drain; the writer stops once the
                // processor has dropped this session's outbox.
                let _ = self.processor.disconnect(self.id).await;
                let _ = write_task.await;
            }
            _ = &mut write_task => {
                read_task.abort();
                let _ = self.processor.disconnect(self.id).await;
            }
        }

        info!(session = %self.id, peer = %self.peer, "Session ended");
    }
}

/// Write queued lines until the outbox closes or asks for a close.
///
/// A client that lets its queue overflow is dropped without a flush, even
/// while a write to it is blocked.
async fn write_lines<W>(mut writer: W, mut outbound: OutboxReceiver, session: SessionId)
where
    W: AsyncWrite + Unpin,
{
    while let Some(item) = outbound.recv().await {
        match item {
            Outbound::Line(line) => {
                let mut bytes = line.into_bytes();
                bytes.push(b'\n');
                tokio::select! {
                    result = writer.write_all(&bytes) => {
                        if let Err(e) = result {
                            debug!(session = %session, "Write failed: {}", e);
                            return;
                        }
                    }
                    _ = outbound.overflowed() => break,
                }
            }
            Outbound::Close => break,
        }
    }

    if outbound.is_overflowed() {
        warn!(session = %session, "Client is not reading; disconnecting");
        return;
    }
    let _ = writer.flush().await;
    let _ = writer.shutdown().await;
}

/// Read lines, turn them into commands and submit them in order.
async fn read_commands<R>(
    reader: R,
    session: SessionId,
    outbox: Outbox,
    processor: ProcessorHandle,
    config: SessionConfig,
) where
    R: AsyncRead + Unpin,
{
    let limiter = CommandRateLimiter::new(&config.rate_limit);
    debug!(session = %session, rate_limited = limiter.is_enabled(), "Reading commands");
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    // Room for the longest line plus a CRLF terminator
    let limit = config.max_line_length as u64 + 2;

    loop {
        buf.clear();
        match (&mut reader).take(limit).read_until(b'\n', &mut buf).await {
            Ok(0) => {
                debug!(session = %session, "Client closed the connection");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                debug!(session = %session, "Read failed: {}", e);
                return;
            }
        }

        let terminated = buf.last() == Some(&b'\n');
        if !terminated && buf.len() < config.max_line_length + 2 {
            // Unterminated fragment at end of stream
            return;
        }

        if content_len(&buf) > config.max_line_length {
            outbox.send_error(&CommandError::LineTooLong(config.max_line_length));
            if terminated {
                continue;
            }
            match discard_line(&mut reader).await {
                Ok(true) => continue,
                Ok(false) => return,
                Err(e) => {
                    debug!(session = %session, "Read failed: {}", e);
                    return;
                }
            }
        }

        let line = String::from_utf8_lossy(&buf);
        let command = match Command::parse(session, &line) {
            Ok(command) => command,
            Err(e) => {
                outbox.send_error(&e);
                continue;
            }
        };

        if let RateLimitResult::Denied { retry_after } = limiter.check() {
            let retry_after_ms = u64::try_from(retry_after.as_millis())
                .unwrap_or(u64::MAX)
                .max(1);
            debug!(session = %session, command = %command.kind, retry_after_ms, "Rate limited");
            outbox.send_error(&CommandError::RateLimited { retry_after_ms });
            continue;
        }

        if let Err(e) = processor.submit(command).await {
            warn!(session = %session, "Dropping session: {}", e);
            return;
        }
    }
}

/// Length of a line without its `\n` or `\r\n` terminator.
fn content_len(line: &[u8]) -> usize {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line).len()
}

/// Skip input up to and including the next newline.
///
/// Returns false if the stream ended first.
async fn discard_line<R>(reader: &mut R) -> std::io::Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let (found, used) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(false);
            }
            match available.iter().position(|b| *b == b'\n') {
                Some(i) => (true, i + 1),
                None => (false, available.len()),
            }
        };
        reader.consume(used);
        if found {
            return Ok(true);
        }
    }
}
