// Session store: the single lock over every session and mailbox

use crate::relay::config::DeliveryPolicy;
use crate::relay::error::RelayError;
use crate::relay::mailbox::Mailbox;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Concurrent mapping from session identifier to [`Mailbox`].
///
/// Every create, broadcast, lookup and drain takes the same lock, so a
/// broadcast is atomic with respect to session membership: a session inserted
/// concurrently with a broadcast receives the message only if its insert
/// acquired the lock first. Sessions are never removed.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Mailbox>>,
}

impl SessionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a fresh, globally unique session identifier
    pub fn allocate_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Create a session with an empty mailbox and return its identifier
    pub async fn create_session(&self) -> String {
        let id = Self::allocate_id();
        self.insert(id.clone()).await;
        id
    }

    /// Insert an empty mailbox under a pre-allocated identifier.
    ///
    /// An existing mailbox under the same identifier is left untouched.
    pub async fn insert(&self, session_id: String) {
        let mut sessions = self.sessions.lock().await;
        sessions.entry(session_id.clone()).or_default();
        tracing::debug!(session_id = %session_id, total = sessions.len(), "Session created");
    }

    /// Append `text` to every mailbox currently in the store
    pub async fn broadcast(&self, text: &str) -> usize {
        self.broadcast_from("", text, DeliveryPolicy::Room).await
    }

    /// Append `text` to every mailbox `policy` selects for `sender`.
    ///
    /// Returns the number of mailboxes the message was appended to.
    pub async fn broadcast_from(&self, sender: &str, text: &str, policy: DeliveryPolicy) -> usize {
        let mut sessions = self.sessions.lock().await;

        let mut delivered = 0;
        for (id, mailbox) in sessions.iter_mut() {
            if policy.delivers_to(sender, id) {
                mailbox.push(text.to_string());
                delivered += 1;
            }
        }

        delivered
    }

    /// Check that a session exists
    pub async fn lookup(&self, session_id: &str) -> Result<(), RelayError> {
        let sessions = self.sessions.lock().await;
        if sessions.contains_key(session_id) {
            Ok(())
        } else {
            Err(RelayError::SessionNotFound(session_id.to_string()))
        }
    }

    /// Empty the named mailbox and return what it held, oldest first
    pub async fn drain(&self, session_id: &str) -> Result<Vec<String>, RelayError> {
        let mut sessions = self.sessions.lock().await;
        sessions
            .get_mut(session_id)
            .map(Mailbox::drain)
            .ok_or_else(|| RelayError::SessionNotFound(session_id.to_string()))
    }

    /// Number of sessions
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}
