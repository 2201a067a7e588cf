//! Chat server module.
//!
//! This module provides the TCP listener, per-connection sessions and the
//! server that ties them to the command processor.

mod listener;
mod runner;
mod session;

pub use listener::ChatListener;
pub use runner::ChatServer;
pub use session::{ClientSession, SessionConfig};
