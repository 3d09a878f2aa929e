//! Moderation engine.
//!
//! [`Moderator`] is the command surface: every command takes the room it
//! was issued in and the acting user, checks authorization against a fresh
//! power-level document, and returns a [`CommandResult`] that
//! [`Moderator::reply`] can post back as a notice.
//!
//! ```text
//! command ─▶ authorize ─▶ resolve target ─▶ BulkActionJob ─▶ BulkReport
//! purge   ─▶ authorize ─▶ PurgeCursor ─▶ RedactionWorker ─▶ outcome
//! ```

mod ban;
pub mod bulk;
mod command;
mod mute;
pub mod policy;
pub mod power;
pub mod purge;
pub mod redact;
mod rules;
pub mod target;

pub use bulk::{BulkActionJob, BulkReport, TargetOutcome};
pub use command::Command;
pub use policy::PolicyImporter;
pub use power::{Capability, ModerationDecision, PowerLevelsExt};
pub use purge::{PurgeCursor, PurgeOutcome, PurgeRequest};
pub use redact::RedactionWorker;
pub use target::Target;

use crate::client::{ActionClient, ClientError};
use crate::config::{Config, LimitsConfig};
use crate::error::{CommandResult, ModerationError};
use crate::security::{JoinRules, NoticeLimiter};
use crate::state::RoomLocks;
use slmod_proto::{kinds, Event, PowerLevels, RoomId, RoomRef, UserId};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// First word of a command line in a room message.
pub const COMMAND_PREFIX: &str = "!slmod";

/// The moderation engine bound to one account.
pub struct Moderator {
    client: Arc<dyn ActionClient>,
    limits: LimitsConfig,
    job: BulkActionJob,
    locks: RoomLocks,
    join_rules: JoinRules,
    notices: NoticeLimiter,
    permitted_rooms: Vec<RoomId>,
}

impl Moderator {
    pub fn new(client: Arc<dyn ActionClient>, limits: LimitsConfig) -> Self {
        Self {
            client,
            job: BulkActionJob::new(limits.fanout_concurrency),
            notices: NoticeLimiter::new(limits.notice_interval()),
            limits,
            locks: RoomLocks::new(),
            join_rules: JoinRules::new(),
            permitted_rooms: Vec::new(),
        }
    }

    /// Build from a validated config.
    pub fn from_config(
        client: Arc<dyn ActionClient>,
        config: &Config,
    ) -> Result<Self, ModerationError> {
        let rooms = config
            .permitted_rooms
            .iter()
            .map(|raw| {
                RoomId::parse(raw)
                    .map_err(|_| ModerationError::InvalidTarget(format!("{raw} is not a room id")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let rules = JoinRules::from_patterns(&config.join_rules)?;

        Ok(Self::new(client, config.limits.clone())
            .with_permitted_rooms(rooms)
            .with_join_rules(rules))
    }

    /// Restrict event handling to these rooms. Empty means all rooms.
    pub fn with_permitted_rooms(mut self, rooms: Vec<RoomId>) -> Self {
        self.permitted_rooms = rooms;
        self
    }

    pub fn with_join_rules(mut self, rules: JoinRules) -> Self {
        self.join_rules = rules;
        self
    }

    pub fn client(&self) -> &dyn ActionClient {
        self.client.as_ref()
    }

    /// The engine's own identity.
    pub fn bot(&self) -> &UserId {
        self.client.user_id()
    }

    pub fn join_rules(&self) -> &JoinRules {
        &self.join_rules
    }

    pub fn is_permitted(&self, room: &RoomId) -> bool {
        self.permitted_rooms.is_empty() || self.permitted_rooms.contains(room)
    }

    /// Accept `!room:server` as is and resolve `#alias:server`.
    pub async fn resolve_room(&self, raw: &str) -> Result<RoomId, ModerationError> {
        let reference = RoomRef::parse(raw.trim())
            .map_err(|_| ModerationError::InvalidTarget(format!("{raw} is not a room.")))?;
        match reference {
            RoomRef::Id(room) => Ok(room),
            RoomRef::Alias(alias) => Ok(self.client.resolve_alias(&alias).await?),
        }
    }

    /// Fetch the power-level document. Failure is fail-closed.
    pub(crate) async fn power_levels(&self, room: &RoomId) -> Result<PowerLevels, ModerationError> {
        self.client.power_levels(room).await.map_err(|e| {
            warn!(room = %room, error = %e, "failed to fetch power levels");
            ModerationError::PermissionUnavailable(e)
        })
    }

    /// Reject `actor` unless they are a moderator under `power`.
    pub(crate) fn authorize(
        &self,
        power: &PowerLevels,
        actor: &UserId,
    ) -> Result<(), ModerationError> {
        let decision = power.moderation_decision(actor);
        if decision.authorized {
            return Ok(());
        }
        debug!(actor = %actor, level = decision.actor_level, required = decision.required_level, "actor not authorized");
        Err(ModerationError::Unauthorized {
            subject: actor.clone(),
            required: decision.required_level,
            actual: decision.actor_level,
        })
    }

    /// Reject before a remote call the engine's own account would fail.
    pub(crate) fn require_self(
        &self,
        power: &PowerLevels,
        capability: &Capability,
    ) -> Result<(), ModerationError> {
        let decision = power.capability_decision(self.bot(), capability);
        if decision.authorized {
            return Ok(());
        }
        Err(ModerationError::Unauthorized {
            subject: self.bot().clone(),
            required: decision.required_level,
            actual: decision.actor_level,
        })
    }

    /// Fetch power levels and authorize `actor` in one step.
    pub(crate) async fn authorized_power(
        &self,
        room: &RoomId,
        actor: &UserId,
    ) -> Result<PowerLevels, ModerationError> {
        let power = self.power_levels(room).await?;
        self.authorize(&power, actor)?;
        Ok(power)
    }

    /// Post a command outcome back to the room.
    pub async fn reply(&self, room: &RoomId, result: &CommandResult) -> Result<(), ClientError> {
        let body = match result {
            Ok(text) => text.clone(),
            Err(e) => e.to_notice(self.bot()),
        };
        self.notice(room, &body).await
    }

    /// Send a rate-limited notice.
    pub async fn notice(&self, room: &RoomId, body: &str) -> Result<(), ClientError> {
        self.notices.until_ready().await;
        self.client.send_notice(room, body).await
    }

    /// Route an incoming room event to its handler.
    ///
    /// Self-sent events and events from rooms outside the permitted set are
    /// ignored.
    pub async fn handle_event(&self, room: &RoomId, event: &Event) -> CommandResult {
        if &event.sender == self.bot() || !self.is_permitted(room) {
            return Ok(String::new());
        }
        match event.kind.as_str() {
            kinds::MESSAGE => self.on_message(room, event).await,
            kinds::MEMBER => self.on_member_join(room, event).await,
            kinds::POLICY_USER | kinds::POLICY_USER_LEGACY => self.on_user_policy(room, event).await,
            kinds::POLICY_SERVER => self.on_server_policy(room, event).await,
            kinds::TOMBSTONE => self.on_tombstone(room, event).await,
            _ => Ok(String::new()),
        }
    }

    /// Run every `!slmod` command line in a message and reply to each.
    ///
    /// A bare `purge` purges from the message the command replies to.
    pub async fn on_message(&self, room: &RoomId, event: &Event) -> CommandResult {
        let Some(body) = event.content.get("body").and_then(|v| v.as_str()) else {
            return Ok(String::new());
        };

        let mut last = Ok(String::new());
        for line in body.lines() {
            let mut words = line.split_whitespace();
            if !words
                .next()
                .is_some_and(|w| w.eq_ignore_ascii_case(COMMAND_PREFIX))
            {
                continue;
            }
            let args: Vec<&str> = words.collect();
            let actor = &event.sender;

            let result = match args.split_first() {
                Some((&"purge", [])) => self.purge_command(room, actor, event, None).await,
                Some((name, rest)) => match Command::parse(name, rest) {
                    Ok(Command::Purge(request)) => {
                        self.purge_command(room, actor, event, Some(request)).await
                    }
                    Ok(Command::PurgeFrom { anchor }) => {
                        self.purge_from_reply(room, actor, Some(&event.event_id), Some(&anchor))
                            .await
                    }
                    Ok(command) => self.execute(room, actor, command).await,
                    Err(e) => Err(e),
                },
                None => Err(ModerationError::InvalidTarget(format!(
                    "Usage: {COMMAND_PREFIX} <command> [args...]"
                ))),
            };

            match &result {
                Err(e) if e.is_rejection() => {
                    debug!(room = %room, actor = %actor, code = e.error_code(), "command rejected")
                }
                Err(e) => {
                    warn!(room = %room, actor = %actor, code = e.error_code(), error = %e, "command failed")
                }
                Ok(_) => {}
            }
            if let Err(e) = self.reply(room, &result).await {
                warn!(room = %room, error = %e, "failed to send reply");
            }
            last = result;
        }
        last
    }

    /// Follow a room upgrade by joining the replacement room.
    pub async fn on_tombstone(&self, room: &RoomId, event: &Event) -> CommandResult {
        let replacement = event
            .content
            .get("replacement_room")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ModerationError::InvalidTarget("Tombstone without a replacement room.".into()))?;
        let next = RoomId::parse(replacement)
            .map_err(|_| ModerationError::InvalidTarget(format!("{replacement} is not a room id.")))?;

        self.client.join_room(&next).await?;
        info!(from = %room, to = %next, "followed room upgrade");
        Ok(format!("Joined {next}."))
    }

    /// Run a parsed command issued by `actor` in `room`.
    pub async fn execute(&self, room: &RoomId, actor: &UserId, command: Command) -> CommandResult {
        match command {
            Command::Mute(targets) => self.mute_users(room, actor, &targets, true).await,
            Command::Unmute(targets) => self.mute_users(room, actor, &targets, false).await,
            Command::Ban { target, reason } => self.ban(room, actor, &target, &reason).await,
            Command::Kick { target, reason } => self.kick(room, actor, &target, &reason).await,
            Command::BanEverywhere { target, reason } => {
                self.ban_everywhere(room, actor, &target, &reason).await
            }
            Command::BanServer { server } => self.ban_server(room, actor, &server).await,
            Command::BanServerEverywhere { server } => {
                self.ban_server_everywhere(room, actor, &server).await
            }
            Command::Purge(request) => self.purge(room, actor, None, request).await,
            Command::PurgeFrom { anchor } => {
                self.purge_from_reply(room, actor, None, Some(&anchor)).await
            }
            Command::Import { source } => self.import_policy(room, actor, &source).await,
            Command::RuleAdd(pattern) => self.add_join_rule(room, actor, &pattern).await,
            Command::RuleDel(pattern) => self.remove_join_rule(room, actor, &pattern).await,
            Command::Rules => self.list_join_rules(room, actor).await,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::client::mock::{self, MockClient};
    use serde_json::json;
    use slmod_proto::EventId;

    pub(crate) fn moderator(client: &Arc<MockClient>) -> Moderator {
        let limits = LimitsConfig {
            notice_interval_ms: 1,
            ..LimitsConfig::default()
        };
        Moderator::new(client.clone(), limits)
    }

    #[tokio::test]
    async fn test_power_levels_unavailable_fails_closed() {
        let room = mock::room("!r:example.org");
        let client = Arc::new(MockClient::new("@bot:example.org").without_power_levels());
        let moderator = moderator(&client);

        let err = moderator
            .authorized_power(&room, &mock::user("@mod:example.org"))
            .await
            .unwrap_err();
        assert!(matches!(err, ModerationError::PermissionUnavailable(_)));
    }

    #[tokio::test]
    async fn test_reply_posts_error_notice() {
        let room = mock::room("!r:example.org");
        let client = Arc::new(
            MockClient::new("@bot:example.org").with_power_levels(&room, json!({"users": {}})),
        );
        let moderator = moderator(&client);

        let result = moderator
            .mute(&room, &mock::user("@pleb:example.org"), "@x:example.org")
            .await;
        moderator.reply(&room, &result).await.unwrap();

        let notices = client.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].1, "You need power level 50 to do that.");
    }

    #[tokio::test]
    async fn test_handle_event_ignores_self_and_unpermitted_rooms() {
        let room = mock::room("!r:example.org");
        let other = mock::room("!other:example.org");
        let client = Arc::new(MockClient::new("@bot:example.org"));
        let moderator = moderator(&client).with_permitted_rooms(vec![room.clone()]);
        moderator.join_rules().add("*:evil.example").unwrap();

        let join = |sender: &str| {
            mock::state("$j", sender, kinds::MEMBER, sender, json!({"membership": "join"}))
        };

        moderator.handle_event(&other, &join("@x:evil.example")).await.unwrap();
        moderator.handle_event(&room, &join("@bot:example.org")).await.unwrap();
        assert!(client.bans().is_empty());
    }

    #[tokio::test]
    async fn test_message_command_purges_from_reply() {
        let room = mock::room("!r:example.org");
        let mut command = mock::message("$cmd", "@mod:example.org");
        command.content = json!({
            "msgtype": "m.text",
            "body": "> <@a:example.org> spam\n\n!slmod purge",
            "m.relates_to": {"m.in_reply_to": {"event_id": "$anchor"}}
        });
        let client = Arc::new(
            MockClient::new("@bot:example.org")
                .with_power_levels(
                    &room,
                    json!({"users": {"@bot:example.org": 100, "@mod:example.org": 50}}),
                )
                .with_history(
                    &room,
                    vec![
                        mock::message("$anchor", "@a:example.org"),
                        mock::message("$next", "@a:example.org"),
                        command.clone(),
                    ],
                ),
        );
        let moderator = moderator(&client);

        let result = moderator.handle_event(&room, &command).await.unwrap();

        assert_eq!(result, "Purged 2 messages.");
        let mut redacted = client.redactions();
        redacted.sort();
        assert_eq!(redacted, vec![EventId::from("$anchor"), EventId::from("$next")]);
        assert_eq!(client.notices().len(), 1);
    }

    #[tokio::test]
    async fn test_message_without_prefix_is_ignored() {
        let room = mock::room("!r:example.org");
        let client = Arc::new(MockClient::new("@bot:example.org"));
        let moderator = moderator(&client);

        let chatter = mock::message("$hi", "@a:example.org");
        assert_eq!(moderator.handle_event(&room, &chatter).await.unwrap(), "");
        assert!(client.notices().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_room() {
        let room = mock::room("!r:example.org");
        let client = Arc::new(MockClient::new("@bot:example.org").with_alias("#mods:example.org", &room));
        let moderator = moderator(&client);

        assert_eq!(moderator.resolve_room(" !r:example.org ").await.unwrap(), room);
        assert_eq!(moderator.resolve_room("#mods:example.org").await.unwrap(), room);
        assert!(matches!(
            moderator.resolve_room("mods").await.unwrap_err(),
            ModerationError::InvalidTarget(_)
        ));
        assert!(matches!(
            moderator.resolve_room("#nope:example.org").await.unwrap_err(),
            ModerationError::RemoteUnavailable(_)
        ));
    }

    #[tokio::test]
    async fn test_tombstone_joins_replacement() {
        let room = mock::room("!old:example.org");
        let client = Arc::new(MockClient::new("@bot:example.org"));
        let moderator = moderator(&client);

        let tombstone = mock::state(
            "$t",
            "@admin:example.org",
            kinds::TOMBSTONE,
            "",
            json!({"body": "upgraded", "replacement_room": "!new:example.org"}),
        );
        let result = moderator.handle_event(&room, &tombstone).await.unwrap();

        assert_eq!(result, "Joined !new:example.org.");
        assert_eq!(client.calls(), vec![mock::Call::Join(mock::room("!new:example.org"))]);
    }
}
