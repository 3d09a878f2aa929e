//! HTTP implementation of [`ActionClient`] against the client-server API.
//!
//! Authentication is a pre-provisioned access token; there is no login flow.

use super::{ActionClient, ClientError, MembershipSet};
use crate::config::HomeserverConfig;
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use slmod_proto::{
    group_state, Direction, Event, EventContext, EventId, MessagesPage, RoomEventFilter, RoomId,
    StateMap, UserId,
};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Error body returned by the room service.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ErrorBody {
    errcode: String,
    error: String,
}

#[derive(Debug, Deserialize)]
struct JoinedMembers {
    joined: BTreeMap<UserId, Value>,
}

#[derive(Debug, Deserialize)]
struct JoinedRooms {
    joined_rooms: Vec<RoomId>,
}

#[derive(Debug, Deserialize)]
struct AliasLookup {
    room_id: RoomId,
}

/// Client-server API client.
///
/// Deliberately not `Debug`: it holds the access token.
#[derive(Clone)]
pub struct MatrixClient {
    http: reqwest::Client,
    base: Url,
    access_token: String,
    user_id: UserId,
}

impl MatrixClient {
    /// Build a client from the `[homeserver]` config block.
    pub fn new(config: &HomeserverConfig) -> Result<Self, ClientError> {
        let base = Url::parse(&config.url).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        let user_id = UserId::parse(&config.user_id)
            .map_err(|e| ClientError::Config(e.to_string()))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base,
            access_token: config.access_token.clone(),
            user_id,
        })
    }

    /// Build `/_matrix/client/v3/<segments...>`, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ClientError::InvalidUrl(self.base.to_string()))?;
            path.pop_if_empty()
                .extend(["_matrix", "client", "v3"])
                .extend(segments);
        }
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ClientError> {
        let url = self.endpoint(segments)?;
        debug!(method = %method, path = %url.path(), "room service request");
        Ok(self.http.request(method, url).bearer_auth(&self.access_token))
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            let body: ErrorBody = serde_json::from_slice(&bytes).unwrap_or_default();
            return Err(ClientError::Remote {
                status: status.as_u16(),
                errcode: body.errcode,
                message: body.error,
            });
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ClientError> {
        let response = request.send().await?;
        Self::decode(response).await
    }

    fn txn_id() -> String {
        Uuid::new_v4().to_string()
    }
}

#[async_trait]
impl ActionClient for MatrixClient {
    fn user_id(&self) -> &UserId {
        &self.user_id
    }

    async fn state_event(
        &self,
        room: &RoomId,
        kind: &str,
        state_key: &str,
    ) -> Result<Value, ClientError> {
        let request = self.request(
            Method::GET,
            &["rooms", room.as_str(), "state", kind, state_key],
        )?;
        Self::send(request).await
    }

    async fn send_state(
        &self,
        room: &RoomId,
        kind: &str,
        state_key: &str,
        content: &Value,
    ) -> Result<(), ClientError> {
        let request = self
            .request(
                Method::PUT,
                &["rooms", room.as_str(), "state", kind, state_key],
            )?
            .json(content);
        let _: Value = Self::send(request).await?;
        Ok(())
    }

    async fn joined_members(&self, room: &RoomId) -> Result<MembershipSet, ClientError> {
        let request = self.request(Method::GET, &["rooms", room.as_str(), "joined_members"])?;
        let members: JoinedMembers = Self::send(request).await?;
        Ok(members.joined.into_keys().collect())
    }

    async fn ban(&self, room: &RoomId, user: &UserId, reason: &str) -> Result<(), ClientError> {
        let request = self
            .request(Method::POST, &["rooms", room.as_str(), "ban"])?
            .json(&json!({"user_id": user, "reason": reason}));
        let _: Value = Self::send(request).await?;
        Ok(())
    }

    async fn kick(&self, room: &RoomId, user: &UserId, reason: &str) -> Result<(), ClientError> {
        let request = self
            .request(Method::POST, &["rooms", room.as_str(), "kick"])?
            .json(&json!({"user_id": user, "reason": reason}));
        let _: Value = Self::send(request).await?;
        Ok(())
    }

    async fn redact(&self, room: &RoomId, event: &EventId) -> Result<(), ClientError> {
        let txn = Self::txn_id();
        let request = self
            .request(
                Method::PUT,
                &["rooms", room.as_str(), "redact", event.as_str(), &txn],
            )?
            .json(&json!({}));
        let _: Value = Self::send(request).await?;
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
        let filter = filter.to_json()?;
        let limit = limit.to_string();
        let mut query = vec![
            ("dir", dir.as_str()),
            ("limit", limit.as_str()),
            ("filter", filter.as_str()),
        ];
        if let Some(from) = from {
            query.push(("from", from));
        }
        let request = self
            .request(Method::GET, &["rooms", room.as_str(), "messages"])?
            .query(&query);
        Self::send(request).await
    }

    async fn context(
        &self,
        room: &RoomId,
        event: &EventId,
        filter: &RoomEventFilter,
        limit: usize,
    ) -> Result<EventContext, ClientError> {
        let filter = filter.to_json()?;
        let limit = limit.to_string();
        let request = self
            .request(
                Method::GET,
                &["rooms", room.as_str(), "context", event.as_str()],
            )?
            .query(&[("limit", limit.as_str()), ("filter", filter.as_str())]);
        Self::send(request).await
    }

    async fn joined_rooms(&self) -> Result<Vec<RoomId>, ClientError> {
        let request = self.request(Method::GET, &["joined_rooms"])?;
        let rooms: JoinedRooms = Self::send(request).await?;
        Ok(rooms.joined_rooms)
    }

    async fn room_state(&self, room: &RoomId) -> Result<StateMap, ClientError> {
        let request = self.request(Method::GET, &["rooms", room.as_str(), "state"])?;
        let events: Vec<Event> = Self::send(request).await?;
        Ok(group_state(events))
    }

    async fn join_room(&self, room: &RoomId) -> Result<(), ClientError> {
        let request = self
            .request(Method::POST, &["join", room.as_str()])?
            .json(&json!({}));
        let _: Value = Self::send(request).await?;
        Ok(())
    }

    async fn resolve_alias(&self, alias: &str) -> Result<RoomId, ClientError> {
        let request = self.request(Method::GET, &["directory", "room", alias])?;
        let lookup: AliasLookup = Self::send(request).await?;
        Ok(lookup.room_id)
    }

    async fn send_notice(&self, room: &RoomId, body: &str) -> Result<(), ClientError> {
        let txn = Self::txn_id();
        let request = self
            .request(
                Method::PUT,
                &["rooms", room.as_str(), "send", "m.room.message", &txn],
            )?
            .json(&json!({"msgtype": "m.notice", "body": body}));
        let _: Value = Self::send(request).await?;
        Ok(())
    }
}
