// Relay broker: wires the handlers around one shared session store

use crate::relay::config::RelayConfig;
use crate::relay::handshake::HandshakeHandler;
use crate::relay::message::{Request, Response};
use crate::relay::post::PostHandler;
use crate::relay::store::SessionStore;
use crate::relay::stream::StreamHandler;
use crate::relay::token::TokenCodec;
use std::sync::Arc;

/// Handle bundling every relay handler.
///
/// Cheap to clone; all clones share the same [`SessionStore`].
#[derive(Clone)]
pub struct Broker {
    store: Arc<SessionStore>,
    codec: Arc<TokenCodec>,
    handshake: Arc<HandshakeHandler>,
    post: Arc<PostHandler>,
    stream: Arc<StreamHandler>,
}

impl Broker {
    /// Create a broker with a fresh store from the given configuration
    pub fn new(config: &RelayConfig) -> Self {
        let store = Arc::new(SessionStore::new());
        let codec = Arc::new(TokenCodec::new(config.secret.as_bytes()));

        Self {
            handshake: Arc::new(HandshakeHandler::new(store.clone(), codec.clone())),
            post: Arc::new(PostHandler::new(store.clone(), codec.clone(), config.delivery)),
            stream: Arc::new(StreamHandler::new(
                store.clone(),
                codec.clone(),
                config.poll_interval,
            )),
            store,
            codec,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn codec(&self) -> &Arc<TokenCodec> {
        &self.codec
    }

    pub fn handshake(&self) -> &HandshakeHandler {
        &self.handshake
    }

    pub fn post(&self) -> &PostHandler {
        &self.post
    }

    pub fn stream(&self) -> &StreamHandler {
        &self.stream
    }

    /// Answer a request-response call.
    ///
    /// Stream requests are connection-scoped and handled by the server, so
    /// they yield `None` here.
    pub async fn dispatch(&self, request: Request) -> Option<Response> {
        let response = match request {
            Request::Handshake { name, token } => match self.handshake.handle(&name, &token).await {
                Ok(reply) => Response::HandshakeReply {
                    name: reply.name,
                    token: reply.token,
                },
                Err(e) => {
                    tracing::warn!(method = "handshake", name = %name, "Handshake rejected: {}", e);
                    e.into()
                }
            },
            Request::Post { token, text } => match self.post.handle(&token, &text).await {
                Ok(()) => Response::PostAck,
                Err(e) => {
                    tracing::warn!(method = "post", "Post rejected: {}", e);
                    e.into()
                }
            },
            Request::Ping => Response::Pong,
            Request::OpenStream { .. } | Request::CloseStream => return None,
        };

        Some(response)
    }
}
