// Per-session mailbox of pending outbound messages

use std::collections::VecDeque;

/// Ordered, append-only queue of message texts for one session.
///
/// A mailbox is only ever reached through the [`SessionStore`] lock, so it
/// carries no synchronization of its own.
///
/// [`SessionStore`]: crate::relay::store::SessionStore
#[derive(Debug, Default)]
pub struct Mailbox {
    messages: VecDeque<String>,
}

impl Mailbox {
    /// Create an empty mailbox
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to the back of the queue
    pub fn push(&mut self, text: String) {
        self.messages.push_back(text);
    }

    /// Take every pending message in insertion order, leaving the mailbox empty
    pub fn drain(&mut self) -> Vec<String> {
        self.messages.drain(..).collect()
    }

    /// Number of pending messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
