//! Protocol error types.

use thiserror::Error;

/// A client frame that cannot be interpreted. The relay drops such frames
/// without replying.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame is not JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The frame is JSON but not an object.
    #[error("message is not a JSON object")]
    NotAnObject,
    /// The object has no string `type` field.
    #[error("message has no string `type` field")]
    MissingType,
    /// A known message type whose fields have the wrong shape.
    #[error("invalid `{kind}` payload: {source}")]
    InvalidPayload {
        /// The `type` value of the offending message.
        kind: String,
        /// Underlying deserialization failure.
        source: serde_json::Error,
    },
}

/// Why a `join` was refused. The `Display` text is sent back to the client
/// in an `error` message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    /// No code, or only whitespace.
    #[error("missing session code")]
    MissingCode,
    /// No role.
    #[error("missing role")]
    MissingRole,
    /// A role other than `display` or `phone`.
    #[error("unknown role: {0}")]
    UnknownRole(String),
    /// The session has reached its connection cap for this role.
    #[error("session is full")]
    SessionFull,
}
