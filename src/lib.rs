//! Parlor - a multi-room line-oriented chat server.
//!
//! Clients connect over TCP and send slash commands, one per line. Every
//! command is funneled through a single processor that owns the room state.

pub mod chat;
pub mod config;
pub mod error;
pub mod logging;
pub mod rate_limit;
pub mod server;

pub use chat::{
    Command, CommandError, CommandKind, Processor, ProcessorHandle, RoomSummary, ServerSnapshot,
    SessionId,
};
pub use config::Config;
pub use error::{ParlorError, Result};
pub use server::{ChatListener, ChatServer, ClientSession, SessionConfig};
