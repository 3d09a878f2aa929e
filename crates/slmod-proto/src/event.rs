//! Timeline and state events.

use crate::id::{EventId, RoomId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event type names used by the moderation engine.
pub mod kinds {
    /// Room permission document.
    pub const POWER_LEVELS: &str = "m.room.power_levels";
    /// Server access control list.
    pub const SERVER_ACL: &str = "m.room.server_acl";
    /// Membership of a single user.
    pub const MEMBER: &str = "m.room.member";
    /// Ordinary chat message.
    pub const MESSAGE: &str = "m.room.message";
    /// Redaction of another event.
    pub const REDACTION: &str = "m.room.redaction";
    /// Room upgrade pointer.
    pub const TOMBSTONE: &str = "m.room.tombstone";
    /// Policy rule targeting users.
    pub const POLICY_USER: &str = "m.policy.rule.user";
    /// Policy rule targeting homeservers.
    pub const POLICY_SERVER: &str = "m.policy.rule.server";
    /// Pre-standard alias of [`POLICY_USER`] still found in older lists.
    pub const POLICY_USER_LEGACY: &str = "m.room.rule.user";

    /// Room state types that a history purge never touches.
    pub const PURGE_EXCLUDED: &[&str] = &[
        "m.room.create",
        "m.room.history_visibility",
        "m.room.join_rules",
        MEMBER,
        POWER_LEVELS,
        "m.room.avatar",
        "m.room.name",
        "m.room.pinned_events",
        "m.room.topic",
        "m.room.retention",
        TOMBSTONE,
        SERVER_ACL,
        REDACTION,
    ];
}

/// Server-added metadata that is not part of the signed event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Unsigned {
    /// Present once the event has been redacted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redacted_because: Option<Value>,
    /// Previous content of a state event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_content: Option<Value>,
}

/// A room event as returned by history, context, and state queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Globally unique event identifier.
    pub event_id: EventId,
    /// Room the event belongs to (omitted by some endpoints).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    /// Author of the event.
    pub sender: UserId,
    /// Event type, e.g. `m.room.message`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Set for state events only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_key: Option<String>,
    /// Type-specific payload.
    #[serde(default)]
    pub content: Value,
    /// Server-added metadata.
    #[serde(default)]
    pub unsigned: Unsigned,
    /// Milliseconds since the epoch on the originating server.
    #[serde(default)]
    pub origin_server_ts: u64,
}

impl Event {
    /// Whether this is a state event (carries a state key).
    pub fn is_state(&self) -> bool {
        self.state_key.is_some()
    }

    /// Whether this event is itself a redaction.
    pub fn is_redaction(&self) -> bool {
        self.kind == kinds::REDACTION
    }

    /// Whether the server reports this event as already redacted.
    pub fn is_redacted(&self) -> bool {
        self.unsigned.redacted_because.is_some()
    }

    /// Whether a membership event is a fresh join rather than a profile
    /// change of an already joined member.
    pub fn is_new_join(&self) -> bool {
        let membership = |content: &Value| {
            content
                .get("membership")
                .and_then(Value::as_str)
                .map(|m| m == "join")
                .unwrap_or(false)
        };

        if self.kind != kinds::MEMBER || !membership(&self.content) {
            return false;
        }
        !self.unsigned.prev_content.as_ref().is_some_and(membership)
    }

    /// The `m.relates_to` reply target of a message, if any.
    pub fn reply_to(&self) -> Option<EventId> {
        self.content
            .get("m.relates_to")?
            .get("m.in_reply_to")?
            .get("event_id")?
            .as_str()
            .map(EventId::from)
    }
}
