//! Room event filters for history queries.

use crate::event::kinds;
use crate::id::UserId;
use serde::{Deserialize, Serialize};

/// Server-side filter applied to `/messages` and `/context` queries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomEventFilter {
    /// Only send membership events for senders in the returned chunk.
    #[serde(default)]
    pub lazy_load_members: bool,
    /// Event types to leave out.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_types: Vec<String>,
    /// Restrict results to these senders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub senders: Option<Vec<UserId>>,
}

impl RoomEventFilter {
    /// Filter used by history purges: no room state, no redactions.
    pub fn purge() -> Self {
        Self {
            lazy_load_members: true,
            not_types: kinds::PURGE_EXCLUDED.iter().map(|k| k.to_string()).collect(),
            senders: None,
        }
    }

    /// Narrow the filter to a single sender.
    pub fn with_sender(mut self, sender: UserId) -> Self {
        self.senders = Some(vec![sender]);
        self
    }

    /// Whether an event would pass this filter.
    ///
    /// Servers apply the filter for us; this is for callers that need to
    /// re-check, and for test doubles.
    pub fn allows(&self, kind: &str, sender: &UserId) -> bool {
        if self.not_types.iter().any(|t| t == kind) {
            return false;
        }
        match &self.senders {
            Some(senders) => senders.contains(sender),
            None => true,
        }
    }

    /// Serialize for use as a query parameter.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purge_filter_excludes_state_and_redactions() {
        let filter = RoomEventFilter::purge();
        let alice = UserId::new_unchecked("@alice:example.org");
        assert!(filter.allows(kinds::MESSAGE, &alice));
        assert!(!filter.allows(kinds::REDACTION, &alice));
        assert!(!filter.allows(kinds::POWER_LEVELS, &alice));
    }

    #[test]
    fn test_sender_filter() {
        let alice = UserId::new_unchecked("@alice:example.org");
        let bob = UserId::new_unchecked("@bob:example.org");
        let filter = RoomEventFilter::purge().with_sender(alice.clone());
        assert!(filter.allows(kinds::MESSAGE, &alice));
        assert!(!filter.allows(kinds::MESSAGE, &bob));

        let json = filter.to_json().unwrap();
        assert!(json.contains("\"senders\":[\"@alice:example.org\"]"));
    }
}
