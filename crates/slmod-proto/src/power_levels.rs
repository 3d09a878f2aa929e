//! The `m.room.power_levels` state content.
//!
//! This is only the wire shape. Effective-level derivation (defaults,
//! override precedence, moderator thresholds) lives in the engine crate so
//! that there is exactly one place deciding who may do what.

use crate::id::UserId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Threshold applied when `ban`, `kick`, `redact`, or `state_default` is absent.
pub const DEFAULT_THRESHOLD: i64 = 50;

/// Room permission document.
///
/// Fields the engine does not interpret are kept in `extra` so that a
/// read-modify-write cycle never drops them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerLevels {
    /// Level needed to ban.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ban: Option<i64>,
    /// Level needed to kick.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kick: Option<i64>,
    /// Level needed to redact other users' events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redact: Option<i64>,
    /// Level needed to invite.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invite: Option<i64>,
    /// Per-event-type thresholds.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub events: BTreeMap<String, i64>,
    /// Threshold for message events not listed in `events`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events_default: Option<i64>,
    /// Threshold for state events not listed in `events`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_default: Option<i64>,
    /// Explicit per-user levels.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub users: BTreeMap<UserId, i64>,
    /// Level of users not listed in `users`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users_default: Option<i64>,
    /// Uninterpreted fields (e.g. `notifications`).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
