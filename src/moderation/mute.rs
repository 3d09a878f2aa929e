//! Mute and unmute through the power-level document.
//!
//! A muted user has a per-user level one below the message-send threshold.

use super::{Capability, Moderator, PowerLevelsExt, Target};
use crate::error::{CommandResult, ModerationError};
use slmod_proto::{kinds, RoomId, UserId};
use tracing::{info, warn};

impl Moderator {
    pub async fn mute(&self, room: &RoomId, actor: &UserId, target: &str) -> CommandResult {
        self.set_muted(room, actor, target, true).await
    }

    pub async fn unmute(&self, room: &RoomId, actor: &UserId, target: &str) -> CommandResult {
        self.set_muted(room, actor, target, false).await
    }

    /// Mute or unmute each of `targets`, continuing past failures.
    ///
    /// A single target reports its own result; several get a summary such
    /// as `muted 2, 1 failed: @x:example.org is already muted.`
    pub async fn mute_users(
        &self,
        room: &RoomId,
        actor: &UserId,
        targets: &[String],
        mute: bool,
    ) -> CommandResult {
        if let [target] = targets {
            return self.set_muted(room, actor, target, mute).await;
        }
        self.authorized_power(room, actor).await?;

        let mut done = 0;
        let mut failures = Vec::new();
        for target in targets {
            match self.set_muted(room, actor, target, mute).await {
                Ok(_) => done += 1,
                Err(e) => {
                    warn!(room = %room, target = %target, code = e.error_code(), error = %e, "mute change failed");
                    failures.push(e.to_notice(self.bot()));
                }
            }
        }

        let verb = if mute { "muted" } else { "unmuted" };
        if failures.is_empty() {
            Ok(format!("{verb} {done}"))
        } else {
            Ok(format!("{verb} {done}, {} failed: {}", failures.len(), failures.join(" ")))
        }
    }

    async fn set_muted(
        &self,
        room: &RoomId,
        actor: &UserId,
        target: &str,
        mute: bool,
    ) -> CommandResult {
        let Target::Literal(user) = Target::parse(target)? else {
            return Err(ModerationError::InvalidTarget(
                "Mute needs a single user, not a pattern.".into(),
            ));
        };

        let _guard = self.locks.acquire(room).await;
        let mut power = self.authorized_power(room, actor).await?;
        self.require_self(&power, &Capability::state(kinds::POWER_LEVELS))?;

        let bot_level = power.user_level(self.bot());
        let current = power.user_level(&user);
        if current >= bot_level {
            return Err(ModerationError::Unauthorized {
                subject: self.bot().clone(),
                required: current + 1,
                actual: bot_level,
            });
        }

        let mute_level = power.mute_level();
        let level = if mute {
            if current <= mute_level {
                return Err(ModerationError::AlreadyInState(format!("{user} is already muted.")));
            }
            mute_level
        } else {
            if current > mute_level {
                return Err(ModerationError::AlreadyInState(format!("{user} is not muted.")));
            }
            mute_level + 1
        };

        power.set_user_level(&user, level);
        self.client().set_power_levels(room, &power).await?;

        let verb = if mute { "muted" } else { "unmuted" };
        info!(actor = %actor, target = %user, room = %room, level, "user {verb}");
        Ok(format!("{user} {verb}."))
    }
}
