// Server-push stream: polls the caller's mailbox and pushes frames

use crate::relay::error::RelayError;
use crate::relay::store::SessionStore;
use crate::relay::token::TokenCodec;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Destination for stream frames.
///
/// A failed push ends the stream with [`RelayError::Transport`].
pub trait FrameSink: Send {
    fn push(&mut self, text: String) -> impl Future<Output = Result<(), RelayError>> + Send;
}

impl FrameSink for mpsc::Sender<String> {
    async fn push(&mut self, text: String) -> Result<(), RelayError> {
        self.send(text)
            .await
            .map_err(|_| RelayError::Transport("frame receiver closed".to_string()))
    }
}

/// Opens push streams for token holders
pub struct StreamHandler {
    store: Arc<SessionStore>,
    codec: Arc<TokenCodec>,
    poll_interval: Duration,
}

impl StreamHandler {
    /// Create a new stream handler
    pub fn new(store: Arc<SessionStore>, codec: Arc<TokenCodec>, poll_interval: Duration) -> Self {
        Self {
            store,
            codec,
            poll_interval,
        }
    }

    /// Validate the token and resolve its session.
    ///
    /// Fails before any frame is produced: with `Authentication` for a bad
    /// token, with `SessionNotFound` when the session is unknown (a token
    /// from an earlier process, for instance).
    pub async fn open(&self, token: &str) -> Result<OpenStream, RelayError> {
        let claims = self.codec.verify(token)?;
        self.store.lookup(&claims.session_id).await?;

        tracing::info!(method = "open_stream", name = %claims.name, session_id = %claims.session_id, "Stream opened");

        Ok(OpenStream {
            store: self.store.clone(),
            session_id: claims.session_id,
            poll_interval: self.poll_interval,
        })
    }

    /// Open a stream and run it until cancellation or a failed push
    pub async fn handle<S: FrameSink>(
        &self,
        token: &str,
        sink: S,
        cancel: CancellationToken,
    ) -> Result<(), RelayError> {
        self.open(token).await?.run(sink, cancel).await
    }
}

/// A validated stream bound to one session's mailbox
#[derive(Debug)]
pub struct OpenStream {
    store: Arc<SessionStore>,
    session_id: String,
    poll_interval: Duration,
}

impl OpenStream {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Poll loop.
    ///
    /// Every tick drains the mailbox and pushes each message as one frame in
    /// insertion order. Cancellation ends the loop cleanly; a failed push ends
    /// it with `Transport`, and whatever was drained but not yet pushed is
    /// dropped. The session stays in the store either way.
    pub async fn run<S: FrameSink>(self, mut sink: S, cancel: CancellationToken) -> Result<(), RelayError> {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(session_id = %self.session_id, "Stream cancelled");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    let messages = self.store.drain(&self.session_id).await?;
                    let count = messages.len();

                    for text in messages {
                        if let Err(e) = sink.push(text).await {
                            tracing::warn!(session_id = %self.session_id, "Stream push failed: {}", e);
                            return Err(e);
                        }
                    }

                    if count > 0 {
                        tracing::trace!(session_id = %self.session_id, count, "Frames pushed");
                    }
                }
            }
        }
    }
}
