//! Capacity-bounded inbox.

/// Default number of messages an inbox holds.
pub const DEFAULT_INBOX_CAPACITY: usize = 10;

/// An ordered, capacity-bounded sequence of received messages.
///
/// Storage grows as messages arrive; the capacity is only a limit. Pushing
/// into a full inbox fails and returns the rejected text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbox {
    entries: Vec<String>,
    capacity: usize,
}

impl Inbox {
    /// Create an empty inbox holding at most `capacity` messages.
    pub fn bounded(capacity: usize) -> Self {
        Inbox {
            entries: Vec::new(),
            capacity,
        }
    }

    /// Append a message, or hand it back if the inbox is full.
    pub fn push(&mut self, text: String) -> Result<(), String> {
        if self.is_full() {
            return Err(text);
        }
        self.entries.push(text);
        Ok(())
    }

    /// Remove every message.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Messages in arrival order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Whether the inbox holds no messages.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether another push would fail.
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Maximum number of messages.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
