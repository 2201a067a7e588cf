//! Processor-side view of a connected client.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use super::command::CommandError;

/// Nickname every session starts with.
pub const DEFAULT_NICKNAME: &str = "Anonymous";

/// Unique identifier of one client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Item queued for a session's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// One line of text, written with a trailing newline.
    Line(String),
    /// Flush what is queued, then close the connection.
    Close,
}

/// Fire-and-forget handle for writing to one client.
///
/// Sends never block. A send to a session whose writer is gone is dropped
/// silently. The queue is bounded: once a client falls `capacity` lines
/// behind, the outbox is marked overflowed and its writer disconnects it, so
/// a client that stops reading cannot grow server memory or affect anybody
/// else.
#[derive(Debug, Clone)]
pub struct Outbox {
    sender: mpsc::Sender<Outbound>,
    overflow: Arc<watch::Sender<bool>>,
}

impl Outbox {
    /// Create an outbox holding up to `capacity` pending items (minimum 1)
    /// and the receiving end its writer drains.
    pub fn channel(capacity: usize) -> (Self, OutboxReceiver) {
        let (sender, lines) = mpsc::channel(capacity.max(1));
        let (overflow, overflowed) = watch::channel(false);
        (
            Self {
                sender,
                overflow: Arc::new(overflow),
            },
            OutboxReceiver { lines, overflowed },
        )
    }

    /// Queue a line. Returns false if the line was not queued.
    pub fn send_line(&self, line: impl Into<String>) -> bool {
        self.push(Outbound::Line(line.into()))
    }

    /// Queue an `Error: ...` line.
    pub fn send_error(&self, error: &CommandError) -> bool {
        self.send_line(format!("Error: {error}"))
    }

    /// Ask the writer to close the connection after the queued lines.
    pub fn close(&self) {
        self.push(Outbound::Close);
    }

    fn push(&self, item: Outbound) -> bool {
        match self.sender.try_send(item) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.overflow.send_replace(true);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

/// Writer side of an [`Outbox`].
#[derive(Debug)]
pub struct OutboxReceiver {
    lines: mpsc::Receiver<Outbound>,
    overflowed: watch::Receiver<bool>,
}

impl OutboxReceiver {
    /// Next queued item.
    ///
    /// Returns None once every outbox is dropped or the queue has overflowed.
    pub async fn recv(&mut self) -> Option<Outbound> {
        if self.is_overflowed() {
            return None;
        }
        tokio::select! {
            item = self.lines.recv() => item,
            _ = wait_overflow(&mut self.overflowed) => None,
        }
    }

    /// Take a queued item without waiting.
    pub fn try_recv(&mut self) -> Result<Outbound, TryRecvError> {
        self.lines.try_recv()
    }

    /// Whether a send found the queue full.
    pub fn is_overflowed(&self) -> bool {
        *self.overflowed.borrow()
    }

    /// Resolve once the queue overflows.
    pub async fn overflowed(&mut self) {
        wait_overflow(&mut self.overflowed).await;
    }
}

async fn wait_overflow(overflowed: &mut watch::Receiver<bool>) {
    if overflowed.wait_for(|full| *full).await.is_err() {
        // Every outbox is gone without overflowing
        std::future::pending::<()>().await;
    }
}

/// State the processor keeps for each registered session.
#[derive(Debug)]
pub struct Member {
    /// Current nickname.
    pub nickname: String,
    /// Name of the room the session is in, if any.
    pub room: Option<String>,
    /// Where replies for this session go.
    pub outbox: Outbox,
    /// Remote peer label, for logging.
    pub peer: String,
}

impl Member {
    /// Create a member with the default nickname and no room.
    pub fn new(outbox: Outbox, peer: impl Into<String>) -> Self {
        Self {
            nickname: DEFAULT_NICKNAME.to_string(),
            room: None,
            outbox,
            peer: peer.into(),
        }
    }
}
