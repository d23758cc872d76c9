// Client side of the relay protocol

use crate::relay::error::ErrorKind;
use crate::relay::handshake::HandshakeReply;
use crate::relay::message::{from_line, to_line, Request, Response};
use crate::relay::server::MAX_LINE_BYTES;
use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};

/// An error response returned by the relay
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("relay returned {kind} error: {message}")]
pub struct RemoteError {
    pub kind: ErrorKind,
    pub message: String,
}

/// A connection to a relay server
pub struct RelayClient {
    reader: FramedRead<OwnedReadHalf, LinesCodec>,
    writer: FramedWrite<OwnedWriteHalf, LinesCodec>,
}

impl RelayClient {
    /// Connect to a relay server
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("Failed to connect to relay at {}", addr))?;
        let (read_half, write_half) = stream.into_split();

        Ok(Self {
            reader: FramedRead::new(read_half, LinesCodec::new_with_max_length(MAX_LINE_BYTES)),
            writer: FramedWrite::new(write_half, LinesCodec::new_with_max_length(MAX_LINE_BYTES)),
        })
    }

    /// Send a request without waiting for a response
    async fn send(&mut self, request: &Request) -> Result<()> {
        let line = to_line(request).context("Failed to encode request")?;
        self.writer
            .send(line)
            .await
            .context("Failed to send request to relay")
    }

    /// Read the next response; `None` once the server closed the connection
    async fn recv(&mut self) -> Result<Option<Response>> {
        match self.reader.next().await {
            Some(Ok(line)) => {
                let response = from_line(&line).context("Failed to parse relay response")?;
                Ok(Some(response))
            }
            Some(Err(e)) => Err(e).context("Failed to read from relay"),
            None => Ok(None),
        }
    }

    /// Send a request and wait for its response, surfacing error responses
    async fn call(&mut self, request: Request) -> Result<Response> {
        self.send(&request).await?;

        match self.recv().await? {
            Some(Response::Error { kind, message }) => Err(RemoteError { kind, message }.into()),
            Some(response) => Ok(response),
            None => anyhow::bail!("Relay closed the connection"),
        }
    }

    /// Obtain a token; pass an empty `token` to start a new session
    pub async fn handshake(&mut self, name: &str, token: &str) -> Result<HandshakeReply> {
        let response = self
            .call(Request::Handshake {
                name: name.to_string(),
                token: token.to_string(),
            })
            .await?;

        match response {
            Response::HandshakeReply { name, token } => Ok(HandshakeReply { name, token }),
            other => anyhow::bail!("Unexpected handshake response: {:?}", other),
        }
    }

    /// Post a message into the room
    pub async fn post(&mut self, token: &str, text: &str) -> Result<()> {
        let response = self
            .call(Request::Post {
                token: token.to_string(),
                text: text.to_string(),
            })
            .await?;

        match response {
            Response::PostAck => Ok(()),
            other => anyhow::bail!("Unexpected post response: {:?}", other),
        }
    }

    pub async fn ping(&mut self) -> Result<()> {
        match self.call(Request::Ping).await? {
            Response::Pong => Ok(()),
            other => anyhow::bail!("Unexpected ping response: {:?}", other),
        }
    }

    /// Turn this connection into a push stream for `token`'s session
    pub async fn subscribe(mut self, token: &str) -> Result<Subscription> {
        let response = self
            .call(Request::OpenStream {
                token: token.to_string(),
            })
            .await?;

        match response {
            Response::StreamOpened => Ok(Subscription { client: self }),
            other => anyhow::bail!("Unexpected stream response: {:?}", other),
        }
    }
}

/// An open push stream
pub struct Subscription {
    client: RelayClient,
}

impl Subscription {
    /// Wait for the next frame.
    ///
    /// Returns `None` when the stream ended cleanly or the connection closed.
    pub async fn next_frame(&mut self) -> Result<Option<String>> {
        loop {
            match self.client.recv().await? {
                Some(Response::Frame { text }) => return Ok(Some(text)),
                Some(Response::StreamClosed) | None => return Ok(None),
                Some(Response::Error { kind, message }) => {
                    return Err(RemoteError { kind, message }.into())
                }
                Some(other) => {
                    tracing::debug!("Ignoring response on stream: {:?}", other);
                }
            }
        }
    }

    /// Ask the server to cancel the stream
    pub async fn close(&mut self) -> Result<()> {
        self.client.send(&Request::CloseStream).await
    }
}
