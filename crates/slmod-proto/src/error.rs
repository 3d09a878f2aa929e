//! Error types for identifier and content parsing.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtoError`].
pub type Result<T, E = ProtoError> = std::result::Result<T, E>;

/// Errors produced while parsing identifiers or event content.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtoError {
    /// The string is not a `@localpart:server` user identifier.
    #[error("invalid user id: {0}")]
    InvalidUserId(String),

    /// The string is not a `!opaque:server` room identifier.
    #[error("invalid room id: {0}")]
    InvalidRoomId(String),

    /// The string is neither a room identifier nor a `#alias:server`.
    #[error("invalid room reference: {0}")]
    InvalidRoomRef(String),

    /// Event content did not have the expected shape.
    #[error("invalid {kind} content: {reason}")]
    InvalidContent {
        /// Event type whose content was malformed.
        kind: String,
        /// Decoder message.
        reason: String,
    },
}
