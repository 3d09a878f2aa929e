//! Join rule commands and enforcement on join.

use super::{Capability, Moderator, PowerLevelsExt};
use crate::error::{CommandResult, ModerationError};
use slmod_proto::{Event, RoomId, UserId};
use tracing::{debug, info};

impl Moderator {
    pub async fn add_join_rule(&self, room: &RoomId, actor: &UserId, pattern: &str) -> CommandResult {
        self.authorized_power(room, actor).await?;
        if !self.join_rules.add(pattern)? {
            return Err(ModerationError::AlreadyInState(format!(
                "Join rule {pattern} already exists."
            )));
        }
        info!(actor = %actor, rule = pattern, "join rule added");
        Ok(format!("Added join rule {pattern}."))
    }

    pub async fn remove_join_rule(
        &self,
        room: &RoomId,
        actor: &UserId,
        pattern: &str,
    ) -> CommandResult {
        self.authorized_power(room, actor).await?;
        if !self.join_rules.remove(pattern) {
            return Err(ModerationError::AlreadyInState(format!(
                "No join rule {pattern}."
            )));
        }
        info!(actor = %actor, rule = pattern, "join rule removed");
        Ok(format!("Removed join rule {pattern}."))
    }

    pub async fn list_join_rules(&self, room: &RoomId, actor: &UserId) -> CommandResult {
        self.authorized_power(room, actor).await?;
        let rules = self.join_rules.snapshot();
        if rules.is_empty() {
            return Ok("No join rules.".to_string());
        }
        Ok(format!("Join rules: {}", rules.join(", ")))
    }

    /// Ban a newly joined member who matches a join rule.
    pub async fn on_member_join(&self, room: &RoomId, event: &Event) -> CommandResult {
        if !event.is_new_join() {
            return Ok(String::new());
        }
        let Some(member) = event.state_key.as_deref() else {
            return Ok(String::new());
        };
        let user = UserId::new_unchecked(member);
        let Some(rule) = self.join_rules.matching(&user) else {
            return Ok(String::new());
        };

        let power = self.power_levels(room).await?;
        if &user == self.bot() || power.is_moderator(&user) {
            debug!(room = %room, user = %user, rule = %rule, "join rule match is a moderator");
            return Ok(String::new());
        }
        self.require_self(&power, &Capability::Ban)?;

        let reason = format!("matched join rule {rule}");
        self.job
            .gated(self.client().ban(room, &user, &reason))
            .await?;
        info!(room = %room, user = %user, rule = %rule, "banned on join");
        Ok(format!("Banned {user} ({reason})."))
    }
}
