//! Unified error handling for slmod-ng.
//!
//! Moderation commands either succeed with a human-readable outcome or fail
//! with a [`ModerationError`], which knows how to phrase itself as a room
//! notice and how to label itself in logs.

use crate::client::ClientError;
use slmod_proto::UserId;
use thiserror::Error;

/// Errors that can occur while running a moderation command.
#[derive(Debug, Error)]
pub enum ModerationError {
    /// The power-level document could not be fetched; the actor is treated
    /// as unauthorized.
    #[error("power levels unavailable: {0}")]
    PermissionUnavailable(#[source] ClientError),

    /// The actor, or the engine's own account, lacks the required level.
    #[error("{subject} has power level {actual}, {required} required")]
    Unauthorized {
        subject: UserId,
        required: i64,
        actual: i64,
    },

    /// The target is neither a user id nor a valid glob.
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// The requested state change is already in effect.
    #[error("already in state: {0}")]
    AlreadyInState(String),

    /// A remote call failed.
    #[error("remote unavailable: {0}")]
    RemoteUnavailable(#[from] ClientError),

    /// History pagination stopped advancing. Terminal, not a failure.
    #[error("history exhausted")]
    LogExhausted,
}

impl ModerationError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::PermissionUnavailable(_) => "permission_unavailable",
            Self::Unauthorized { .. } => "unauthorized",
            Self::InvalidTarget(_) => "invalid_target",
            Self::AlreadyInState(_) => "already_in_state",
            Self::RemoteUnavailable(_) => "remote_unavailable",
            Self::LogExhausted => "log_exhausted",
        }
    }

    /// Whether the error reflects the request rather than the service.
    ///
    /// These are reported to the room and never retried.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::PermissionUnavailable(_)
                | Self::Unauthorized { .. }
                | Self::InvalidTarget(_)
                | Self::AlreadyInState(_)
        )
    }

    /// Phrase the error as a notice for the invoking room.
    pub fn to_notice(&self, bot: &UserId) -> String {
        match self {
            Self::PermissionUnavailable(_) => {
                "Could not fetch power levels, refusing to act.".to_string()
            }
            Self::Unauthorized {
                subject,
                required,
                actual,
            } if subject == bot => format!(
                "I need power level {required} to do that, but only have {actual}."
            ),
            Self::Unauthorized { required, .. } => {
                format!("You need power level {required} to do that.")
            }
            Self::InvalidTarget(reason) => reason.clone(),
            Self::AlreadyInState(reason) => reason.clone(),
            Self::RemoteUnavailable(e) => format!("The room service refused: {e}"),
            Self::LogExhausted => "No more history to purge.".to_string(),
        }
    }
}

/// Result type for moderation commands: the outcome text on success.
pub type CommandResult = Result<String, ModerationError>;
