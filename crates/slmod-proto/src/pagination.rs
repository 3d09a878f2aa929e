//! Paginated history and state replies.

use crate::event::Event;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Direction of a history query relative to the continuation token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Toward older events.
    Backward,
    /// Toward newer events.
    Forward,
}

impl Direction {
    /// The `dir` query parameter value.
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Backward => "b",
            Direction::Forward => "f",
        }
    }
}

/// One page of room history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessagesPage {
    /// Events in the requested direction's order.
    #[serde(default)]
    pub chunk: Vec<Event>,
    /// Token the page started at.
    #[serde(default)]
    pub start: String,
    /// Token to continue from; absent when there is nothing further.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

/// Events surrounding a single event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventContext {
    /// The requested event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<Event>,
    /// Events immediately preceding it, newest first.
    #[serde(default)]
    pub events_before: Vec<Event>,
    /// Events immediately following it, oldest first.
    #[serde(default)]
    pub events_after: Vec<Event>,
    /// Token for paginating backward from `events_before`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    /// Token for paginating forward from `events_after`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

/// Current room state keyed by event type, then state key.
pub type StateMap = HashMap<String, HashMap<String, Event>>;

/// Index a flat state listing by type and state key.
///
/// Events without a state key are ignored.
pub fn group_state(events: Vec<Event>) -> StateMap {
    let mut state = StateMap::new();
    for event in events {
        let Some(key) = event.state_key.clone() else {
            continue;
        };
        state
            .entry(event.kind.clone())
            .or_default()
            .insert(key, event);
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_group_state() {
        let events: Vec<Event> = serde_json::from_value(json!([
            {"event_id": "$1", "sender": "@a:x", "type": "m.policy.rule.user",
             "state_key": "rule1", "content": {"entity": "@b:x", "recommendation": "m.ban"}},
            {"event_id": "$2", "sender": "@a:x", "type": "m.policy.rule.user",
             "state_key": "rule2", "content": {"entity": "@c:x", "recommendation": "m.ban"}},
            {"event_id": "$3", "sender": "@a:x", "type": "m.room.message", "content": {}}
        ]))
        .unwrap();

        let state = group_state(events);
        assert_eq!(state.len(), 1);
        assert_eq!(state["m.policy.rule.user"].len(), 2);
    }

    #[test]
    fn test_page_without_end() {
        let page: MessagesPage = serde_json::from_str(r#"{"chunk": [], "start": "s1"}"#).unwrap();
        assert_eq!(page.end, None);
    }
}
