//! In-memory [`ActionClient`] for tests.
//!
//! History is a chronological `Vec<Event>` per room; continuation tokens are
//! `t<index>` positions into it. Backward pagination drops `end` once the
//! start of history is reached; forward pagination keeps returning the same
//! token at the live end, like a real server does.

use super::{ActionClient, ClientError, MembershipSet};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use slmod_proto::{
    kinds, Direction, Event, EventContext, EventId, MessagesPage, RoomEventFilter, RoomId,
    StateMap, Unsigned, UserId,
};
use std::collections::{HashMap, HashSet};

/// A recorded remote call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Ban(RoomId, UserId),
    Kick(RoomId, UserId),
    Redact(RoomId, EventId),
    SendState(RoomId, String, String),
    Messages(RoomId, Option<String>, Direction),
    Context(RoomId, EventId),
    Join(RoomId),
}

#[derive(Default)]
struct MockState {
    state: HashMap<(RoomId, String, String), Value>,
    members: HashMap<RoomId, MembershipSet>,
    history: HashMap<RoomId, Vec<Event>>,
    room_state: HashMap<RoomId, StateMap>,
    aliases: HashMap<String, RoomId>,
    rooms: Vec<RoomId>,
    failing_users: HashSet<UserId>,
    failing_state: HashSet<String>,
    failing_notices: bool,
    power_levels_unavailable: bool,
    stuck_token: Option<String>,
    calls: Vec<Call>,
    notices: Vec<(RoomId, String)>,
}

pub struct MockClient {
    user_id: UserId,
    inner: Mutex<MockState>,
}

pub fn user(raw: &str) -> UserId {
    UserId::new_unchecked(raw)
}

pub fn room(raw: &str) -> RoomId {
    RoomId::new_unchecked(raw)
}

/// A plain message event.
pub fn message(id: &str, sender: &str) -> Event {
    Event {
        event_id: EventId::from(id),
        room_id: None,
        sender: user(sender),
        kind: kinds::MESSAGE.to_string(),
        state_key: None,
        content: json!({"msgtype": "m.text", "body": id}),
        unsigned: Unsigned::default(),
        origin_server_ts: 0,
    }
}

/// A state event of the given type.
pub fn state(id: &str, sender: &str, kind: &str, state_key: &str, content: Value) -> Event {
    Event {
        event_id: EventId::from(id),
        room_id: None,
        sender: user(sender),
        kind: kind.to_string(),
        state_key: Some(state_key.to_string()),
        content,
        unsigned: Unsigned::default(),
        origin_server_ts: 0,
    }
}

fn token(pos: usize) -> String {
    format!("t{pos}")
}

fn parse_token(raw: &str) -> Option<usize> {
    raw.strip_prefix('t')?.parse().ok()
}

impl MockClient {
    pub fn new(bot: &str) -> Self {
        Self {
            user_id: user(bot),
            inner: Mutex::new(MockState::default()),
        }
    }

    pub fn with_power_levels(self, room: &RoomId, content: Value) -> Self {
        self.inner.lock().state.insert(
            (room.clone(), kinds::POWER_LEVELS.to_string(), String::new()),
            content,
        );
        self
    }

    pub fn with_members(self, room: &RoomId, members: &[&str]) -> Self {
        {
            let mut inner = self.inner.lock();
            inner
                .members
                .insert(room.clone(), members.iter().map(|m| user(m)).collect());
            if !inner.rooms.contains(room) {
                inner.rooms.push(room.clone());
            }
        }
        self
    }

    pub fn with_history(self, room: &RoomId, events: Vec<Event>) -> Self {
        self.inner.lock().history.insert(room.clone(), events);
        self
    }

    pub fn with_room_state(self, room: &RoomId, events: Vec<Event>) -> Self {
        self.inner
            .lock()
            .room_state
            .insert(room.clone(), slmod_proto::group_state(events));
        self
    }

    pub fn with_alias(self, alias: &str, room: &RoomId) -> Self {
        self.inner.lock().aliases.insert(alias.to_string(), room.clone());
        self
    }

    pub fn failing_for(self, target: &str) -> Self {
        self.inner.lock().failing_users.insert(user(target));
        self
    }

    /// State writes of `kind` fail with a rate-limit error.
    pub fn failing_state(self, kind: &str) -> Self {
        self.inner.lock().failing_state.insert(kind.to_string());
        self
    }

    pub fn failing_notices(self) -> Self {
        self.inner.lock().failing_notices = true;
        self
    }

    pub fn without_power_levels(self) -> Self {
        self.inner.lock().power_levels_unavailable = true;
        self
    }

    /// Every history page returns `token` as its continuation.
    pub fn with_stuck_token(self, token: &str) -> Self {
        self.inner.lock().stuck_token = Some(token.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().calls.clone()
    }

    pub fn bans(&self) -> Vec<UserId> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Ban(_, u) => Some(u),
                _ => None,
            })
            .collect()
    }

    pub fn redactions(&self) -> Vec<EventId> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Redact(_, e) => Some(e),
                _ => None,
            })
            .collect()
    }

    pub fn history_fetches(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Messages(..)))
            .count()
    }

    pub fn notices(&self) -> Vec<(RoomId, String)> {
        self.inner.lock().notices.clone()
    }

    pub fn state_content(&self, room: &RoomId, kind: &str, state_key: &str) -> Option<Value> {
        self.inner
            .lock()
            .state
            .get(&(room.clone(), kind.to_string(), state_key.to_string()))
            .cloned()
    }

    fn record(&self, call: Call) {
        self.inner.lock().calls.push(call);
    }

    fn remote_error(status: u16, errcode: &str) -> ClientError {
        ClientError::Remote {
            status,
            errcode: errcode.to_string(),
            message: "mock".to_string(),
        }
    }
}

#[async_trait]
impl ActionClient for MockClient {
    fn user_id(&self) -> &UserId {
        &self.user_id
    }

    async fn state_event(
        &self,
        room: &RoomId,
        kind: &str,
        state_key: &str,
    ) -> Result<Value, ClientError> {
        let found = {
            let inner = self.inner.lock();
            if kind == kinds::POWER_LEVELS && inner.power_levels_unavailable {
                return Err(Self::remote_error(502, "M_UNKNOWN"));
            }
            inner
                .state
                .get(&(room.clone(), kind.to_string(), state_key.to_string()))
                .cloned()
        };
        // Let other tasks run between a read and the write that follows it.
        tokio::task::yield_now().await;
        found.ok_or_else(|| Self::remote_error(404, "M_NOT_FOUND"))
    }

    async fn send_state(
        &self,
        room: &RoomId,
        kind: &str,
        state_key: &str,
        content: &Value,
    ) -> Result<(), ClientError> {
        tokio::task::yield_now().await;
        let mut inner = self.inner.lock();
        inner.calls.push(Call::SendState(
            room.clone(),
            kind.to_string(),
            state_key.to_string(),
        ));
        if inner.failing_state.contains(kind) {
            return Err(Self::remote_error(429, "M_LIMIT_EXCEEDED"));
        }
        inner.state.insert(
            (room.clone(), kind.to_string(), state_key.to_string()),
            content.clone(),
        );
        Ok(())
    }

    async fn joined_members(&self, room: &RoomId) -> Result<MembershipSet, ClientError> {
        Ok(self
            .inner
            .lock()
            .members
            .get(room)
            .cloned()
            .unwrap_or_default())
    }

    async fn ban(&self, room: &RoomId, user: &UserId, _reason: &str) -> Result<(), ClientError> {
        self.record(Call::Ban(room.clone(), user.clone()));
        let mut inner = self.inner.lock();
        if inner.failing_users.contains(user) {
            return Err(Self::remote_error(429, "M_LIMIT_EXCEEDED"));
        }
        if let Some(members) = inner.members.get_mut(room) {
            members.remove(user);
        }
        Ok(())
    }

    async fn kick(&self, room: &RoomId, user: &UserId, _reason: &str) -> Result<(), ClientError> {
        self.record(Call::Kick(room.clone(), user.clone()));
        let mut inner = self.inner.lock();
        if inner.failing_users.contains(user) {
            return Err(Self::remote_error(429, "M_LIMIT_EXCEEDED"));
        }
        let removed = inner
            .members
            .get_mut(room)
            .is_some_and(|members| members.remove(user));
        if removed {
            Ok(())
        } else {
            Err(Self::remote_error(403, "M_FORBIDDEN"))
        }
    }

    async fn redact(&self, room: &RoomId, event: &EventId) -> Result<(), ClientError> {
        self.record(Call::Redact(room.clone(), event.clone()));
        let mut inner = self.inner.lock();
        if let Some(found) = inner
            .history
            .get_mut(room)
            .and_then(|h| h.iter_mut().find(|e| &e.event_id == event))
        {
            found.unsigned.redacted_because = Some(json!({"type": kinds::REDACTION}));
        }
        Ok(())
    }

    async fn messages(
        &self,
        room: &RoomId,
        from: Option<&str>,
        dir: Direction,
        filter: &RoomEventFilter,
        limit: usize,
    ) -> Result<MessagesPage, ClientError> {
        self.record(Call::Messages(room.clone(), from.map(str::to_string), dir));
        let inner = self.inner.lock();

        if let Some(stuck) = &inner.stuck_token {
            return Ok(MessagesPage {
                chunk: Vec::new(),
                start: from.unwrap_or_default().to_string(),
                end: Some(stuck.clone()),
            });
        }

        let history = inner.history.get(room).cloned().unwrap_or_default();
        let passes = |e: &Event| filter.allows(&e.kind, &e.sender);
        let mut chunk = Vec::new();

        match dir {
            Direction::Backward => {
                let mut pos = from.and_then(parse_token).unwrap_or(history.len());
                while pos > 0 && chunk.len() < limit {
                    pos -= 1;
                    if passes(&history[pos]) {
                        chunk.push(history[pos].clone());
                    }
                }
                Ok(MessagesPage {
                    chunk,
                    start: from.unwrap_or_default().to_string(),
                    end: (pos > 0).then(|| token(pos)),
                })
            }
            Direction::Forward => {
                let mut pos = from.and_then(parse_token).unwrap_or(0);
                while pos < history.len() && chunk.len() < limit {
                    if passes(&history[pos]) {
                        chunk.push(history[pos].clone());
                    }
                    pos += 1;
                }
                Ok(MessagesPage {
                    chunk,
                    start: from.unwrap_or_default().to_string(),
                    end: Some(token(pos)),
                })
            }
        }
    }

    async fn context(
        &self,
        room: &RoomId,
        event: &EventId,
        filter: &RoomEventFilter,
        limit: usize,
    ) -> Result<EventContext, ClientError> {
        self.record(Call::Context(room.clone(), event.clone()));
        let inner = self.inner.lock();
        let history = inner.history.get(room).cloned().unwrap_or_default();
        let index = history
            .iter()
            .position(|e| &e.event_id == event)
            .ok_or_else(|| Self::remote_error(404, "M_NOT_FOUND"))?;

        let mut pos = index + 1;
        let mut events_after = Vec::new();
        while pos < history.len() && events_after.len() < limit {
            if filter.allows(&history[pos].kind, &history[pos].sender) {
                events_after.push(history[pos].clone());
            }
            pos += 1;
        }

        Ok(EventContext {
            event: Some(history[index].clone()),
            events_before: Vec::new(),
            events_after,
            start: Some(token(index)),
            end: Some(token(pos)),
        })
    }

    async fn joined_rooms(&self) -> Result<Vec<RoomId>, ClientError> {
        Ok(self.inner.lock().rooms.clone())
    }

    async fn room_state(&self, room: &RoomId) -> Result<StateMap, ClientError> {
        self.inner
            .lock()
            .room_state
            .get(room)
            .cloned()
            .ok_or_else(|| Self::remote_error(403, "M_FORBIDDEN"))
    }

    async fn join_room(&self, room: &RoomId) -> Result<(), ClientError> {
        self.record(Call::Join(room.clone()));
        Ok(())
    }

    async fn resolve_alias(&self, alias: &str) -> Result<RoomId, ClientError> {
        self.inner
            .lock()
            .aliases
            .get(alias)
            .cloned()
            .ok_or_else(|| Self::remote_error(404, "M_NOT_FOUND"))
    }

    async fn send_notice(&self, room: &RoomId, body: &str) -> Result<(), ClientError> {
        let mut inner = self.inner.lock();
        if inner.failing_notices {
            return Err(Self::remote_error(429, "M_LIMIT_EXCEEDED"));
        }
        inner.notices.push((room.clone(), body.to_string()));
        Ok(())
    }
}
