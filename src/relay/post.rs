// Posting messages into the room

use crate::relay::config::DeliveryPolicy;
use crate::relay::error::RelayError;
use crate::relay::store::SessionStore;
use crate::relay::token::TokenCodec;
use std::sync::Arc;

/// Validates a token and broadcasts the posted text
pub struct PostHandler {
    store: Arc<SessionStore>,
    codec: Arc<TokenCodec>,
    policy: DeliveryPolicy,
}

impl PostHandler {
    /// Create a new post handler
    pub fn new(store: Arc<SessionStore>, codec: Arc<TokenCodec>, policy: DeliveryPolicy) -> Self {
        Self { store, codec, policy }
    }

    /// Broadcast `text` on behalf of the token holder.
    ///
    /// Nothing is mutated when the token does not verify. Delivery is
    /// at-most-once: the text waits in each mailbox for that session's next
    /// poll tick.
    pub async fn handle(&self, token: &str, text: &str) -> Result<(), RelayError> {
        let claims = self.codec.verify(token)?;

        let delivered = self
            .store
            .broadcast_from(&claims.session_id, text, self.policy)
            .await;

        tracing::debug!(
            method = "post",
            session_id = %claims.session_id,
            name = %claims.name,
            delivered,
            "Message broadcast"
        );

        Ok(())
    }
}
