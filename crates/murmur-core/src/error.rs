//! Error types for the chat client core.
//!
//! [`ApiError`] is the single interpretation of REST status codes: callers
//! match on variants instead of re-implementing status branching.
//! [`MessageError`] covers wire-to-domain conversion of messages.

use thiserror::Error;

use crate::friends::ConflictBody;

/// Errors returned by REST calls.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Session missing or expired (401). Triggers global sign-out.
    #[error("unauthorized")]
    Unauthorized,

    /// Resource or user does not exist (404)
    #[error("not found")]
    NotFound,

    /// Request rejected by the server (400)
    #[error("bad request")]
    BadRequest,

    /// Domain conflict (409) with the server's explanation
    #[error("conflict: {0:?}")]
    Conflict(ConflictBody),

    /// Any other non-success status
    #[error("unexpected status {0}")]
    Status(u16),

    /// Network failure before a response arrived
    #[error("transport error: {0}")]
    Transport(String),

    /// Response body did not match the expected shape
    #[error("decode error: {0}")]
    Decode(String),
}

impl ApiError {
    /// Map a non-success HTTP status and its body to an error.
    ///
    /// A 409 body that is not a valid [`ConflictBody`] maps to the default
    /// (unknown) conflict.
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            404 => Self::NotFound,
            409 => Self::Conflict(serde_json::from_str(body).unwrap_or_default()),
            other => Self::Status(other),
        }
    }

    /// Returns true if this error is transient and may succeed on retry.
    ///
    /// Authorization and domain errors are never transient: retrying them
    /// cannot change the outcome.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status(status) => *status >= 500 || *status == 408 || *status == 429,
            _ => false,
        }
    }

    /// Returns true if this error should end the session.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

/// Errors converting wire messages into domain messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageError {
    /// Timestamp is neither RFC 3339 nor a naive ISO-8601 date-time
    #[error("invalid timestamp: {raw:?}")]
    InvalidTimestamp {
        /// The string as received
        raw: String,
    },
}
