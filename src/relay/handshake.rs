// Handshake: session creation and token issuance

use crate::relay::error::RelayError;
use crate::relay::store::SessionStore;
use crate::relay::token::TokenCodec;
use std::sync::Arc;

/// Result of a successful handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeReply {
    pub name: String,
    pub token: String,
}

/// Handshake handler
pub struct HandshakeHandler {
    store: Arc<SessionStore>,
    codec: Arc<TokenCodec>,
}

impl HandshakeHandler {
    /// Create a new handshake handler
    pub fn new(store: Arc<SessionStore>, codec: Arc<TokenCodec>) -> Self {
        Self { store, codec }
    }

    /// Issue or refresh a token.
    ///
    /// An empty `token` requests a new session. The token is signed before
    /// the session is inserted, so a signing failure never leaves an
    /// unreachable session behind.
    ///
    /// A non-empty `token` is verified and re-signed with the same claims
    /// without touching the store. The requested `name` is ignored then.
    pub async fn handle(&self, name: &str, token: &str) -> Result<HandshakeReply, RelayError> {
        if token.is_empty() {
            let session_id = SessionStore::allocate_id();
            let signed = self.codec.sign(name, &session_id)?;
            self.store.insert(session_id.clone()).await;

            tracing::info!(method = "handshake", name = %name, session_id = %session_id, "New session");

            return Ok(HandshakeReply {
                name: name.to_string(),
                token: signed,
            });
        }

        let claims = self.codec.verify(token)?;
        let signed = self.codec.sign(&claims.name, &claims.session_id)?;

        tracing::debug!(method = "handshake", name = %claims.name, session_id = %claims.session_id, "Token refreshed");

        Ok(HandshakeReply {
            name: claims.name,
            token: signed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn handler() -> (HandshakeHandler, Arc<SessionStore>, Arc<TokenCodec>) {
        let store = Arc::new(SessionStore::new());
        let codec = Arc::new(TokenCodec::default());
        (HandshakeHandler::new(store.clone(), codec.clone()), store, codec)
    }

    #[tokio::test]
    async fn test_new_session_handshake() {
        let (handler, store, codec) = handler();

        let reply = handler.handle("alice", "").await.unwrap();
        assert_eq!(reply.name, "alice");

        let claims = codec.verify(&reply.token).unwrap();
        assert_eq!(claims.name, "alice");
        assert!(store.lookup(&claims.session_id).await.is_ok());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_session_ids_unique() {
        let (handler, store, codec) = handler();

        let mut ids = HashSet::new();
        for _ in 0..50 {
            let reply = handler.handle("alice", "").await.unwrap();
            ids.insert(codec.verify(&reply.token).unwrap().session_id);
        }

        assert_eq!(ids.len(), 50);
        assert_eq!(store.len().await, 50);
    }

    #[tokio::test]
    async fn test_refresh_keeps_session() {
        let (handler, store, codec) = handler();

        let first = handler.handle("alice", "").await.unwrap();
        let refreshed = handler.handle("", &first.token).await.unwrap();

        assert_eq!(refreshed.name, "alice");
        assert_eq!(
            codec.verify(&refreshed.token).unwrap().session_id,
            codec.verify(&first.token).unwrap().session_id
        );
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_refresh_keeps_token_name() {
        let (handler, _store, codec) = handler();

        let first = handler.handle("alice", "").await.unwrap();
        let refreshed = handler.handle("mallory", &first.token).await.unwrap();

        assert_eq!(refreshed.name, "alice");
        assert_eq!(codec.verify(&refreshed.token).unwrap(), codec.verify(&first.token).unwrap());
    }

    #[tokio::test]
    async fn test_refresh_rejects_forged_token() {
        let (handler, store, _codec) = handler();
        let forged = TokenCodec::new(b"other").sign("mallory", "s1").unwrap();

        let result = handler.handle("mallory", &forged).await;

        assert!(matches!(result, Err(RelayError::Authentication(_))));
        assert!(store.is_empty().await);
    }
}
