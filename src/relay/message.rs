// Wire protocol: newline-delimited JSON requests and responses

use crate::relay::error::{ErrorKind, RelayError};
use serde::{Deserialize, Serialize};

/// Requests a client sends to the relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Obtain a token; an empty token asks for a new session
    Handshake {
        name: String,
        #[serde(default)]
        token: String,
    },
    /// Post a message into the room
    Post {
        token: String,
        text: String,
    },
    /// Open this connection's push stream
    OpenStream {
        token: String,
    },
    /// Cancel this connection's push stream
    CloseStream,
    /// Ping to keep connection alive
    Ping,
}

/// Responses and stream frames sent by the relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    HandshakeReply {
        name: String,
        token: String,
    },
    PostAck,
    /// The stream passed validation; frames follow
    StreamOpened,
    /// One pushed message
    Frame {
        text: String,
    },
    /// The stream ended after cancellation
    StreamClosed,
    Pong,
    Error {
        kind: ErrorKind,
        message: String,
    },
}

impl Response {
    /// Build an error response
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Response::Error {
            kind,
            message: message.into(),
        }
    }
}

impl From<RelayError> for Response {
    fn from(err: RelayError) -> Self {
        Response::error(err.kind(), err.to_string())
    }
}

/// Serialize a protocol value to a single line (no trailing newline)
pub fn to_line<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(value)
}

/// Parse a protocol value from one line
pub fn from_line<'a, T: Deserialize<'a>>(line: &'a str) -> Result<T, serde_json::Error> {
    serde_json::from_str(line.trim())
}
