//! Chat room implementation for Parlor.
//!
//! A room is a named broadcast group: the outboxes of its current members
//! plus a bounded history of recent chat lines. Rooms do not synchronize
//! membership themselves; only the command processor touches them.

use std::collections::HashMap;

use super::history::HistoryBuffer;
use super::session::{Outbox, SessionId};

/// A named broadcast group.
#[derive(Debug)]
pub struct Room {
    name: String,
    members: HashMap<SessionId, Outbox>,
    history: HistoryBuffer,
}

impl Room {
    /// Create an empty room keeping `history_size` recent messages.
    pub fn new(name: impl Into<String>, history_size: usize) -> Self {
        Self {
            name: name.into(),
            members: HashMap::new(),
            history: HistoryBuffer::new(history_size),
        }
    }

    /// Get the room name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the room's message history.
    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    /// Get the number of members.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Add a member.
    ///
    /// Returns false if the session was already a member.
    pub fn add_member(&mut self, session: SessionId, outbox: Outbox) -> bool {
        self.members.insert(session, outbox).is_none()
    }

    /// Remove a member.
    ///
    /// Returns false if the session was not a member.
    pub fn remove_member(&mut self, session: SessionId) -> bool {
        self.members.remove(&session).is_some()
    }

    /// Deliver a line to every member except `sender`.
    ///
    /// Delivery is best effort: a member whose connection is gone is skipped
    /// and nothing is reported back. Returns the number of members the line
    /// was queued for.
    pub fn broadcast(&self, sender: SessionId, line: &str) -> usize {
        self.members
            .iter()
            .filter(|(id, _)| **id != sender)
            .filter(|(_, outbox)| outbox.send_line(line))
            .count()
    }
}
