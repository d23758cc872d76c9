// Error taxonomy for the relay core

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by the relay handlers.
///
/// None of these are retried inside the relay; retry policy belongs to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// Missing, forged or malformed token, or a disallowed signing algorithm
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The token verified but its session is unknown to this process
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Pushing a frame on an open stream failed
    #[error("transport error: {0}")]
    Transport(String),

    /// Building a token during the handshake failed
    #[error("token signing failed: {0}")]
    Signing(String),
}

impl RelayError {
    /// Wire-level classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::Authentication(_) => ErrorKind::Authentication,
            RelayError::SessionNotFound(_) => ErrorKind::SessionNotFound,
            RelayError::Transport(_) => ErrorKind::Transport,
            RelayError::Signing(_) => ErrorKind::Signing,
        }
    }
}

/// Error classification carried in error responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authentication,
    SessionNotFound,
    Transport,
    Signing,
    /// The request line could not be parsed
    InvalidRequest,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Authentication => "authentication",
            ErrorKind::SessionNotFound => "session_not_found",
            ErrorKind::Transport => "transport",
            ErrorKind::Signing => "signing",
            ErrorKind::InvalidRequest => "invalid_request",
        };
        f.write_str(s)
    }
}
