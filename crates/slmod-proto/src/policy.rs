//! Policy list rules (`m.policy.rule.*`).

use crate::error::{ProtoError, Result};
use crate::event::Event;
use serde::{Deserialize, Serialize};

/// Standard ban recommendation.
pub const RECOMMEND_BAN: &str = "m.ban";
/// Recommendation used by lists that predate the standard one.
pub const RECOMMEND_BAN_LEGACY: &str = "org.matrix.mjolnir.ban";

/// Content of a policy rule state event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    /// The user id, server name, or glob the rule applies to.
    pub entity: String,
    /// What the list recommends doing to `entity`.
    pub recommendation: String,
    /// Free-form justification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl PolicyRule {
    /// Decode the rule carried by a policy state event.
    pub fn from_event(event: &Event) -> Result<Self> {
        serde_json::from_value(event.content.clone()).map_err(|e| ProtoError::InvalidContent {
            kind: event.kind.clone(),
            reason: e.to_string(),
        })
    }

    /// Whether the rule recommends a ban.
    pub fn is_ban(&self) -> bool {
        matches!(
            self.recommendation.as_str(),
            RECOMMEND_BAN | RECOMMEND_BAN_LEGACY
        )
    }
}
