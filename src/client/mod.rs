//! Remote room service abstraction.
//!
//! The engine talks to the room service only through [`ActionClient`]: one
//! async method per remote capability, plus a handful of provided methods
//! that decode well-known state documents on top of the raw state calls.

use async_trait::async_trait;
use serde_json::Value;
use slmod_proto::{
    kinds, Direction, EventContext, EventId, MessagesPage, PowerLevels, RoomEventFilter, RoomId,
    ServerAcl, StateMap, UserId,
};
use std::collections::BTreeSet;
use thiserror::Error;

pub mod http;
#[cfg(test)]
pub mod mock;

pub use http::MatrixClient;

/// Joined members of a room.
pub type MembershipSet = BTreeSet<UserId>;

/// Errors returned by the room service or the transport to it.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("remote error {status} {errcode}: {message}")]
    Remote {
        status: u16,
        errcode: String,
        message: String,
    },

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("invalid client config: {0}")]
    Config(String),
}

impl ClientError {
    /// Whether the remote reported the resource as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Remote { status: 404, .. })
    }

    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Http(_) => "http",
            Self::Remote { .. } => "remote",
            Self::Decode(_) => "decode",
            Self::InvalidUrl(_) => "invalid_url",
            Self::Config(_) => "config",
        }
    }
}

/// The room service operations the moderation engine needs.
#[async_trait]
pub trait ActionClient: Send + Sync {
    /// The identity the client acts as.
    fn user_id(&self) -> &UserId;

    /// Fetch the content of a single state event.
    async fn state_event(
        &self,
        room: &RoomId,
        kind: &str,
        state_key: &str,
    ) -> Result<Value, ClientError>;

    /// Replace the content of a single state event.
    async fn send_state(
        &self,
        room: &RoomId,
        kind: &str,
        state_key: &str,
        content: &Value,
    ) -> Result<(), ClientError>;

    /// Joined members of a room.
    async fn joined_members(&self, room: &RoomId) -> Result<MembershipSet, ClientError>;

    /// Ban a user, whether or not they are currently a member.
    async fn ban(&self, room: &RoomId, user: &UserId, reason: &str) -> Result<(), ClientError>;

    /// Remove a joined user from a room.
    async fn kick(&self, room: &RoomId, user: &UserId, reason: &str) -> Result<(), ClientError>;

    /// Redact a single event.
    async fn redact(&self, room: &RoomId, event: &EventId) -> Result<(), ClientError>;

    /// Fetch one page of history starting at `from` (or at the live end).
    async fn messages(
        &self,
        room: &RoomId,
        from: Option<&str>,
        dir: Direction,
        filter: &RoomEventFilter,
        limit: usize,
    ) -> Result<MessagesPage, ClientError>;

    /// Fetch an event together with its immediate neighbours.
    async fn context(
        &self,
        room: &RoomId,
        event: &EventId,
        filter: &RoomEventFilter,
        limit: usize,
    ) -> Result<EventContext, ClientError>;

    /// Rooms the client is joined to.
    async fn joined_rooms(&self) -> Result<Vec<RoomId>, ClientError>;

    /// Full current state of a room.
    async fn room_state(&self, room: &RoomId) -> Result<StateMap, ClientError>;

    /// Join a room by identifier.
    async fn join_room(&self, room: &RoomId) -> Result<(), ClientError>;

    /// Look up the room an alias points to.
    async fn resolve_alias(&self, alias: &str) -> Result<RoomId, ClientError>;

    /// Post a notice-type message.
    async fn send_notice(&self, room: &RoomId, body: &str) -> Result<(), ClientError>;

    /// Fetch and decode the room's power-level document.
    async fn power_levels(&self, room: &RoomId) -> Result<PowerLevels, ClientError> {
        let content = self.state_event(room, kinds::POWER_LEVELS, "").await?;
        Ok(serde_json::from_value(content)?)
    }

    /// Write back the room's power-level document.
    async fn set_power_levels(&self, room: &RoomId, power: &PowerLevels) -> Result<(), ClientError> {
        let content = serde_json::to_value(power)?;
        self.send_state(room, kinds::POWER_LEVELS, "", &content).await
    }

    /// Fetch the room's server ACL, treating a missing ACL as "allow all".
    async fn server_acl(&self, room: &RoomId) -> Result<ServerAcl, ClientError> {
        match self.state_event(room, kinds::SERVER_ACL, "").await {
            Ok(content) => Ok(serde_json::from_value(content)?),
            Err(e) if e.is_not_found() => Ok(ServerAcl::permissive()),
            Err(e) => Err(e),
        }
    }

    /// Write back the room's server ACL.
    async fn set_server_acl(&self, room: &RoomId, acl: &ServerAcl) -> Result<(), ClientError> {
        let content = serde_json::to_value(acl)?;
        self.send_state(room, kinds::SERVER_ACL, "", &content).await
    }
}

/// A membership action applied to a single user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberAction {
    Ban,
    Kick,
}

impl MemberAction {
    /// Dispatch to the matching client call.
    pub async fn apply(
        self,
        client: &dyn ActionClient,
        room: &RoomId,
        user: &UserId,
        reason: &str,
    ) -> Result<(), ClientError> {
        match self {
            MemberAction::Ban => client.ban(room, user, reason).await,
            MemberAction::Kick => client.kick(room, user, reason).await,
        }
    }

    /// Past-tense verb for outcome reports.
    pub fn verb(self) -> &'static str {
        match self {
            MemberAction::Ban => "banned",
            MemberAction::Kick => "kicked",
        }
    }
}
