//! Command parser for Parlor.
//!
//! A client line such as `/msg general hello there` becomes a [`Command`]:
//! the kind selected by the first token plus every token as received,
//! including the command name at index 0.

use std::fmt;

use thiserror::Error;

use super::session::SessionId;

/// Kind of a client command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CommandKind {
    /// `/name NEWNAME`
    SetNickname,
    /// `/rooms`
    ListRooms,
    /// `/join ROOM`
    Join,
    /// `/msg ROOM TEXT...`
    SendMessage,
    /// `/quit`
    Quit,
}

impl CommandKind {
    /// All kinds, in wire-name order.
    pub const ALL: [CommandKind; 5] = [
        CommandKind::SetNickname,
        CommandKind::ListRooms,
        CommandKind::Join,
        CommandKind::SendMessage,
        CommandKind::Quit,
    ];

    /// The token that selects this kind on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::SetNickname => "/name",
            CommandKind::ListRooms => "/rooms",
            CommandKind::Join => "/join",
            CommandKind::SendMessage => "/msg",
            CommandKind::Quit => "/quit",
        }
    }

    /// Look up a kind by its exact wire token.
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == token)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors reported to the issuing client as `Error: <message>`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// A required argument is missing.
    #[error("{what} is required. usage: {usage}")]
    Usage {
        /// What is missing.
        what: &'static str,
        /// Correct syntax.
        usage: &'static str,
    },

    /// The referenced room does not exist.
    #[error("room not found: {0}")]
    RoomNotFound(String),

    /// The first token is not a known command.
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// The line exceeded the configured maximum length.
    #[error("line too long (max {0} bytes)")]
    LineTooLong(usize),

    /// The session is sending commands too fast.
    #[error("rate limit exceeded, retry in {retry_after_ms} ms")]
    RateLimited {
        /// Milliseconds until the next command will be accepted.
        retry_after_ms: u64,
    },
}

/// A parsed client request, consumed exactly once by the processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Selected command kind.
    pub kind: CommandKind,
    /// Issuing session.
    pub session: SessionId,
    /// Raw tokens, command name first.
    pub args: Vec<String>,
}

impl Command {
    /// Parse one line received from `session`.
    ///
    /// Trailing and leading CR/LF are stripped and the rest is split on single
    /// spaces. Unknown first tokens are rejected here, before the processor.
    pub fn parse(session: SessionId, line: &str) -> Result<Self, CommandError> {
        let line = line.trim_matches(&['\r', '\n'][..]);
        let args: Vec<String> = line.split(' ').map(str::to_string).collect();
        let token = args.first().map(|t| t.trim()).unwrap_or_default();

        let kind = CommandKind::from_token(token)
            .ok_or_else(|| CommandError::UnknownCommand(token.to_string()))?;

        Ok(Self {
            kind,
            session,
            args,
        })
    }

    /// Positional argument `index`, treating blank tokens as absent.
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args
            .get(index)
            .map(String::as_str)
            .filter(|arg| !arg.is_empty())
    }

    /// Tokens from `index` on, joined back with single spaces.
    pub fn rest(&self, index: usize) -> String {
        self.args.get(index..).unwrap_or_default().join(" ")
    }
}
