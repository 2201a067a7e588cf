//! Chat core for Parlor.
//!
//! This module provides the room model and the command pipeline:
//! - Command parsing (`/name`, `/rooms`, `/join`, `/msg`, `/quit`)
//! - Rooms with bounded message history
//! - The single processor that owns all chat state

mod command;
mod history;
mod processor;
mod room;
mod session;

pub use command::{Command, CommandError, CommandKind};
pub use history::HistoryBuffer;
pub use processor::{Processor, ProcessorHandle, Request, RoomSummary, ServerSnapshot};
pub use room::Room;
pub use session::{Member, Outbound, Outbox, OutboxReceiver, SessionId, DEFAULT_NICKNAME};
