//! Policy lists: importing ban rules from another room and reacting to
//! policy events as they arrive.

use super::{BulkReport, Capability, Moderator, PowerLevelsExt, Target};
use crate::client::MembershipSet;
use crate::error::{CommandResult, ModerationError};
use serde_json::Value;
use slmod_proto::{kinds, Event, PolicyRule, RoomId, StateMap, UserId};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

const POLICY_KINDS: &[&str] = &[kinds::POLICY_USER, kinds::POLICY_USER_LEGACY];

/// A ban rule found in a policy room's state.
#[derive(Debug, Clone)]
pub struct PolicyEntry {
    pub state_key: String,
    pub rule: PolicyRule,
    pub content: Value,
}

/// Reads ban rules out of policy-list rooms.
pub struct PolicyImporter;

impl PolicyImporter {
    /// User ban rules in `state`, ordered by state key.
    ///
    /// Entries that do not decode or recommend something other than a ban
    /// are ignored.
    pub fn ban_rules(state: &StateMap) -> Vec<PolicyEntry> {
        let mut entries: Vec<PolicyEntry> = POLICY_KINDS
            .iter()
            .filter_map(|kind| state.get(*kind))
            .flat_map(|events| events.iter())
            .filter_map(|(state_key, event)| {
                let rule = match PolicyRule::from_event(event) {
                    Ok(rule) => rule,
                    Err(e) => {
                        debug!(state_key = %state_key, error = %e, "skipping undecodable policy entry");
                        return None;
                    }
                };
                rule.is_ban().then(|| PolicyEntry {
                    state_key: state_key.clone(),
                    rule,
                    content: event.content.clone(),
                })
            })
            .collect();
        entries.sort_by(|a, b| a.state_key.cmp(&b.state_key));
        entries
    }

    /// Expand every rule's entity against `members`. Invalid entities are
    /// skipped.
    pub fn targets(entries: &[PolicyEntry], members: &MembershipSet) -> BTreeSet<UserId> {
        entries
            .iter()
            .filter_map(|entry| match Target::parse(&entry.rule.entity) {
                Ok(target) => Some(target.resolve(members)),
                Err(e) => {
                    debug!(entity = %entry.rule.entity, error = %e, "skipping policy entity");
                    None
                }
            })
            .flatten()
            .collect()
    }
}

impl Moderator {
    /// Import the ban rules of another room into `room` and apply them.
    pub async fn import_policy(&self, room: &RoomId, actor: &UserId, source: &str) -> CommandResult {
        let power = self.authorized_power(room, actor).await?;
        self.require_self(&power, &Capability::state(kinds::POLICY_USER))?;
        self.require_self(&power, &Capability::Ban)?;

        let source = self.resolve_room(source).await?;
        if &source == room {
            return Err(ModerationError::InvalidTarget(
                "Refusing to import from this room.".into(),
            ));
        }

        self.job.gated(self.client().join_room(&source)).await?;
        let state = self.job.gated(self.client().room_state(&source)).await?;
        let entries = PolicyImporter::ban_rules(&state);
        if entries.is_empty() {
            return Ok(format!("No ban rules in {source}."));
        }

        let mirror_failures = self.mirror_entries(room, &entries).await;
        if mirror_failures > 0 {
            if let Err(e) = self
                .notice(room, "Could not copy some policy entries, proceeding.")
                .await
            {
                warn!(room = %room, error = %e, "failed to send mirror notice");
            }
        }

        let members = self.job.gated(self.client().joined_members(room)).await?;
        let users = PolicyImporter::targets(&entries, &members);
        let report = self.ban_guarded(room, &power, users).await;

        info!(
            actor = %actor,
            room = %room,
            source = %source,
            rules = entries.len(),
            mirror_failures,
            banned = report.succeeded(),
            "policy list imported"
        );
        Ok(format!(
            "Imported {} rules from {source}: {}",
            entries.len(),
            report.summary("banned")
        ))
    }

    /// Copy entries into `room`. Returns how many failed.
    async fn mirror_entries(&self, room: &RoomId, entries: &[PolicyEntry]) -> usize {
        let client = self.client();
        let results = self
            .job
            .for_each(entries, |entry| {
                self.job.gated(async move {
                    client
                        .send_state(room, kinds::POLICY_USER, &entry.state_key, &entry.content)
                        .await
                        .inspect_err(|e| {
                            warn!(room = %room, state_key = %entry.state_key, error = %e, "failed to mirror policy entry")
                        })
                })
            })
            .await;
        results.iter().filter(|r| r.is_err()).count()
    }

    async fn ban_guarded(
        &self,
        room: &RoomId,
        power: &slmod_proto::PowerLevels,
        users: impl IntoIterator<Item = UserId>,
    ) -> BulkReport<UserId> {
        let client = self.client();
        let bot = self.bot();
        self.job
            .run(
                users,
                |user| user != bot && !power.is_moderator(user),
                |user| async move { client.ban(room, &user, "policy list ban").await },
            )
            .await
    }

    /// Apply a live user policy event.
    pub async fn on_user_policy(&self, room: &RoomId, event: &Event) -> CommandResult {
        let rule = PolicyRule::from_event(event)
            .map_err(|e| ModerationError::InvalidTarget(e.to_string()))?;
        if !rule.is_ban() {
            return Ok(String::new());
        }
        let target = Target::parse(&rule.entity)?;

        let power = self.power_levels(room).await?;
        self.require_self(&power, &Capability::Ban)?;
        let members = if target.is_pattern() {
            self.job.gated(self.client().joined_members(room)).await?
        } else {
            MembershipSet::new()
        };

        let report = self.ban_guarded(room, &power, target.resolve(&members)).await;
        info!(room = %room, sender = %event.sender, entity = %rule.entity, banned = report.succeeded(), "user policy applied");
        Ok(report.summary("banned"))
    }

    /// Apply a live server policy event by denying the server.
    pub async fn on_server_policy(&self, room: &RoomId, event: &Event) -> CommandResult {
        let rule = PolicyRule::from_event(event)
            .map_err(|e| ModerationError::InvalidTarget(e.to_string()))?;
        if !rule.is_ban() {
            return Ok(String::new());
        }
        self.deny_server_unattended(room, &rule.entity).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::{self, Call, MockClient};
    use crate::moderation::tests::moderator;
    use serde_json::json;
    use slmod_proto::group_state;
    use std::sync::Arc;

    const BOT: &str = "@bot:example.org";
    const MOD: &str = "@mod:example.org";

    fn rule(id: &str, kind: &str, key: &str, entity: &str, recommendation: &str) -> Event {
        mock::state(
            id,
            "@listmaker:example.org",
            kind,
            key,
            json!({"entity": entity, "recommendation": recommendation, "reason": "spam"}),
        )
    }

    fn policy_state() -> Vec<Event> {
        vec![
            rule("$1", kinds::POLICY_USER, "rule-a", "@spam*:evil.example", "m.ban"),
            rule("$2", kinds::POLICY_USER_LEGACY, "rule-b", "@troll:example.org", "org.matrix.mjolnir.ban"),
            rule("$3", kinds::POLICY_USER, "rule-c", "@quiet:example.org", "m.mute"),
            rule("$4", kinds::POLICY_SERVER, "rule-d", "evil.example", "m.ban"),
        ]
    }

    #[test]
    fn test_ban_rules_filters_and_orders() {
        let state = group_state(policy_state());
        let entries = PolicyImporter::ban_rules(&state);
        let keys: Vec<&str> = entries.iter().map(|e| e.state_key.as_str()).collect();
        assert_eq!(keys, vec!["rule-a", "rule-b"]);
    }

    #[tokio::test]
    async fn test_import_mirrors_and_bans() {
        let room = mock::room("!local:example.org");
        let source = mock::room("!list:example.org");
        let client = Arc::new(
            MockClient::new(BOT)
                .with_power_levels(&room, json!({"users": {BOT: 100, MOD: 50}}))
                .with_members(&room, &[BOT, MOD, "@spam1:evil.example", "@alice:example.org"])
                .with_alias("#bans:example.org", &source)
                .with_room_state(&source, policy_state()),
        );
        let moderator = moderator(&client);

        let result = moderator
            .import_policy(&room, &mock::user(MOD), "#bans:example.org")
            .await
            .unwrap();
        assert_eq!(result, "Imported 2 rules from !list:example.org: banned 2");

        let calls = client.calls();
        assert!(calls.contains(&Call::Join(source.clone())));
        assert!(calls.contains(&Call::SendState(
            room.clone(),
            kinds::POLICY_USER.to_string(),
            "rule-b".to_string()
        )));
        let mut bans = client.bans();
        bans.sort();
        assert_eq!(
            bans,
            vec![mock::user("@spam1:evil.example"), mock::user("@troll:example.org")]
        );
    }

    #[tokio::test]
    async fn test_import_continues_when_mirroring_fails() {
        let room = mock::room("!local:example.org");
        let source = mock::room("!list:example.org");
        let client = Arc::new(
            MockClient::new(BOT)
                .with_power_levels(&room, json!({"users": {BOT: 100, MOD: 50}}))
                .with_members(&room, &[BOT, MOD, "@spam1:evil.example"])
                .with_room_state(&source, policy_state())
                .failing_state(kinds::POLICY_USER)
                .failing_notices(),
        );
        let moderator = moderator(&client);

        let result = moderator
            .import_policy(&room, &mock::user(MOD), "!list:example.org")
            .await
            .unwrap();
        assert!(result.starts_with("Imported 2 rules"));
        assert!(client.state_content(&room, kinds::POLICY_USER, "rule-a").is_none());

        let mut bans = client.bans();
        bans.sort();
        assert_eq!(
            bans,
            vec![mock::user("@spam1:evil.example"), mock::user("@troll:example.org")]
        );
    }

    #[tokio::test]
    async fn test_import_rejects_bad_sources() {
        let room = mock::room("!local:example.org");
        let client = Arc::new(
            MockClient::new(BOT).with_power_levels(&room, json!({"users": {BOT: 100, MOD: 50}})),
        );
        let moderator = moderator(&client);
        let actor = mock::user(MOD);

        let err = moderator.import_policy(&room, &actor, "bans").await.unwrap_err();
        assert!(matches!(err, ModerationError::InvalidTarget(_)));

        let err = moderator
            .import_policy(&room, &actor, "!local:example.org")
            .await
            .unwrap_err();
        assert!(matches!(err, ModerationError::InvalidTarget(_)));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_live_policies() {
        let room = mock::room("!r:example.org");
        let client = Arc::new(
            MockClient::new(BOT)
                .with_power_levels(&room, json!({"users": {BOT: 100}}))
                .with_members(&room, &[BOT, "@spam9:evil.example"]),
        );
        let moderator = moderator(&client);

        let user_rule = rule("$u", kinds::POLICY_USER, "k", "@spam*:evil.example", "m.ban");
        moderator.handle_event(&room, &user_rule).await.unwrap();
        assert_eq!(client.bans(), vec![mock::user("@spam9:evil.example")]);

        let server_rule = rule("$s", kinds::POLICY_SERVER, "k", "evil.example", "m.ban");
        moderator.handle_event(&room, &server_rule).await.unwrap();
        let acl = client.state_content(&room, kinds::SERVER_ACL, "").unwrap();
        assert_eq!(acl["deny"], json!(["evil.example"]));

        let mute_rule = rule("$m", kinds::POLICY_USER, "k2", "@other:example.org", "m.mute");
        assert_eq!(moderator.handle_event(&room, &mute_rule).await.unwrap(), "");
    }
}
