//! Bounded per-room message history.

use std::sync::{Mutex, PoisonError};

/// Ring storage behind the lock.
#[derive(Debug)]
struct Ring {
    slots: Vec<Option<String>>,
    /// Index of the oldest held message.
    start: usize,
    /// Index the next message is written to.
    end: usize,
    count: usize,
}

/// Fixed-capacity ring of the most recent messages of a room.
///
/// `add` evicts the oldest entry once full; `snapshot` returns the held
/// messages oldest first regardless of where the ring has wrapped. Both take
/// the same lock, so a snapshot never observes a half-applied `add`.
#[derive(Debug)]
pub struct HistoryBuffer {
    capacity: usize,
    ring: Mutex<Ring>,
}

impl HistoryBuffer {
    /// Create a buffer holding at most `capacity` messages (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            ring: Mutex::new(Ring {
                slots: vec![None; capacity],
                start: 0,
                end: 0,
                count: 0,
            }),
        }
    }

    /// Maximum number of messages held.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of messages currently held.
    pub fn len(&self) -> usize {
        self.ring.lock().unwrap_or_else(PoisonError::into_inner).count
    }

    /// Whether no message has been added yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a message, evicting the oldest one when at capacity.
    pub fn add(&self, message: impl Into<String>) {
        let mut ring = self.ring.lock().unwrap_or_else(PoisonError::into_inner);
        let end = ring.end;
        ring.slots[end] = Some(message.into());
        ring.end = (end + 1) % self.capacity;
        if ring.count == self.capacity {
            ring.start = (ring.start + 1) % self.capacity;
        } else {
            ring.count += 1;
        }
    }

    /// Copy of the held messages in chronological order.
    pub fn snapshot(&self) -> Vec<String> {
        let ring = self.ring.lock().unwrap_or_else(PoisonError::into_inner);
        (0..ring.count)
            .filter_map(|i| ring.slots[(ring.start + i) % self.capacity].clone())
            .collect()
    }
}
