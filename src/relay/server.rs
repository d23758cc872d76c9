// TCP server hosting the relay calls

use crate::relay::broker::Broker;
use crate::relay::config::RelayConfig;
use crate::relay::error::{ErrorKind, RelayError};
use crate::relay::message::{from_line, to_line, Request, Response};
use crate::relay::stream::{FrameSink, OpenStream};
use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tokio_util::sync::CancellationToken;

/// Upper bound on a single protocol line
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Responses queued per connection before the reader waits on the writer
const OUTGOING_CAPACITY: usize = 256;

/// A bound relay server
pub struct RelayServer {
    listener: TcpListener,
    broker: Broker,
}

impl RelayServer {
    /// Validate the configuration and bind the listener
    pub async fn bind(config: &RelayConfig) -> Result<Self> {
        config.validate()?;

        let listener = TcpListener::bind(config.addr)
            .await
            .with_context(|| format!("Failed to bind {}", config.addr))?;

        tracing::info!(
            addr = %listener.local_addr()?,
            poll_interval_ms = config.poll_interval.as_millis() as u64,
            delivery = ?config.delivery,
            "Relay server bound"
        );

        Ok(Self {
            listener,
            broker: Broker::new(config),
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Failed to read listener address")
    }

    pub fn broker(&self) -> &Broker {
        &self.broker
    }

    /// Accept connections until `shutdown` fires.
    ///
    /// Each connection runs in its own task; cancelling `shutdown` also
    /// closes every connection and stream.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let mut connections = 0u64;

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            connections += 1;
                            tracing::info!(count = connections, peer = %peer, "Client connected");

                            let broker = self.broker.clone();
                            let shutdown = shutdown.child_token();
                            tokio::spawn(async move {
                                handle_connection(stream, broker, shutdown).await;
                                tracing::info!(peer = %peer, "Client disconnected");
                            });
                        }
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown.cancelled() => {
                    tracing::info!("Listener shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Frames pushed onto a connection's outgoing queue
struct ResponseSink {
    tx: mpsc::Sender<Response>,
}

impl FrameSink for ResponseSink {
    async fn push(&mut self, text: String) -> Result<(), RelayError> {
        self.tx
            .send(Response::Frame { text })
            .await
            .map_err(|_| RelayError::Transport("connection closed".to_string()))
    }
}

/// The stream currently attached to a connection
struct ActiveStream {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ActiveStream {
    /// Cancel the stream and wait until it has sent its last response
    async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::error!("Stream task failed: {}", e);
        }
    }
}

/// Serve one client connection
async fn handle_connection(stream: TcpStream, broker: Broker, shutdown: CancellationToken) {
    let (read_half, write_half) = stream.into_split();
    let mut reader = FramedRead::new(read_half, LinesCodec::new_with_max_length(MAX_LINE_BYTES));
    let mut writer = FramedWrite::new(write_half, LinesCodec::new_with_max_length(MAX_LINE_BYTES));

    let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<Response>(OUTGOING_CAPACITY);

    // Spawn task to handle outgoing responses and frames
    let write_task = tokio::spawn(async move {
        while let Some(response) = outgoing_rx.recv().await {
            let line = match to_line(&response) {
                Ok(line) => line,
                Err(e) => {
                    tracing::error!("Failed to encode response: {}", e);
                    continue;
                }
            };
            if let Err(e) = writer.send(line).await {
                tracing::debug!("Write to client failed: {}", e);
                break;
            }
        }
    });

    let mut active_stream: Option<ActiveStream> = None;

    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            next = reader.next() => match next {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    tracing::warn!("Error reading from client: {}", e);
                    break;
                }
                None => break, // EOF
            },
        };

        if line.trim().is_empty() {
            continue;
        }

        let request: Request = match from_line(&line) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!("Failed to parse request: {}", e);
                let response = Response::error(ErrorKind::InvalidRequest, format!("invalid request: {}", e));
                if outgoing_tx.send(response).await.is_err() {
                    break;
                }
                continue;
            }
        };

        match request {
            Request::OpenStream { token } => {
                // The replaced stream's stream_closed goes out before the new stream_opened
                if let Some(previous) = active_stream.take() {
                    previous.stop().await;
                }

                match broker.stream().open(&token).await {
                    Ok(stream) => {
                        if outgoing_tx.send(Response::StreamOpened).await.is_err() {
                            break;
                        }

                        let cancel = shutdown.child_token();
                        let task = tokio::spawn(run_stream(stream, outgoing_tx.clone(), cancel.clone()));
                        active_stream = Some(ActiveStream { cancel, task });
                    }
                    Err(e) => {
                        tracing::warn!(method = "open_stream", "Stream rejected: {}", e);
                        if outgoing_tx.send(e.into()).await.is_err() {
                            break;
                        }
                    }
                }
            }
            Request::CloseStream => {
                if let Some(active) = active_stream.take() {
                    active.stop().await;
                }
            }
            other => {
                if let Some(response) = broker.dispatch(other).await {
                    if outgoing_tx.send(response).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    if let Some(active) = active_stream.take() {
        active.stop().await;
    }

    // The writer exits once every sender is dropped
    drop(outgoing_tx);
    if let Err(e) = write_task.await {
        tracing::error!("Writer task failed: {}", e);
    }
}

/// Drive one open stream and report how it ended
async fn run_stream(stream: OpenStream, outgoing: mpsc::Sender<Response>, cancel: CancellationToken) {
    let session_id = stream.session_id().to_string();
    let sink = ResponseSink { tx: outgoing.clone() };

    match stream.run(sink, cancel).await {
        Ok(()) => {
            let _ = outgoing.send(Response::StreamClosed).await;
        }
        Err(e) => {
            tracing::warn!(session_id = %session_id, "Stream closed with error: {}", e);
            let _ = outgoing.send(e.into()).await;
        }
    }
}
