//! slmod-ng - room moderation engine.
//!
//! Evaluates power levels, resolves user and glob targets, fans out
//! ban/kick/redact actions under a shared concurrency bound, walks room
//! history for purges, and imports ban rules from policy-list rooms.

pub mod client;
pub mod config;
pub mod error;
pub mod moderation;
pub mod security;
pub mod state;

pub use error::{CommandResult, ModerationError};
pub use moderation::{Command, Moderator};
