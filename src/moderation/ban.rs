//! Membership actions and server bans.

use super::{BulkReport, Capability, Moderator, PowerLevelsExt, Target};
use crate::client::{MemberAction, MembershipSet};
use crate::error::{CommandResult, ModerationError};
use slmod_proto::{kinds, PowerLevels, RoomId, UserId};
use tracing::{debug, info, warn};

/// Per-room result of a server deny.
#[derive(Debug)]
enum AclOutcome {
    Denied,
    AlreadyDenied,
    Skipped,
    Failed,
}

impl Moderator {
    pub async fn ban(
        &self,
        room: &RoomId,
        actor: &UserId,
        target: &str,
        reason: &str,
    ) -> CommandResult {
        self.apply_member_action(room, actor, target, reason, MemberAction::Ban)
            .await
    }

    pub async fn kick(
        &self,
        room: &RoomId,
        actor: &UserId,
        target: &str,
        reason: &str,
    ) -> CommandResult {
        self.apply_member_action(room, actor, target, reason, MemberAction::Kick)
            .await
    }

    async fn apply_member_action(
        &self,
        room: &RoomId,
        actor: &UserId,
        target: &str,
        reason: &str,
        action: MemberAction,
    ) -> CommandResult {
        let target = Target::parse(target)?;
        let power = self.authorized_power(room, actor).await?;
        self.require_self(&power, &member_capability(action))?;

        let report = self
            .member_action_in(room, &power, &target, reason, action)
            .await?;
        info!(
            actor = %actor,
            room = %room,
            target = %target,
            succeeded = report.succeeded(),
            skipped = report.skipped(),
            failed = report.failed(),
            "member action {}", action.verb()
        );
        if report.is_empty() {
            return Ok(format!("No members match {target}."));
        }
        Ok(report.summary(action.verb()))
    }

    /// Resolve `target` in `room` and apply `action` to every non-moderator.
    async fn member_action_in(
        &self,
        room: &RoomId,
        power: &PowerLevels,
        target: &Target,
        reason: &str,
        action: MemberAction,
    ) -> Result<BulkReport<UserId>, ModerationError> {
        let members = if target.is_pattern() {
            self.job.gated(self.client().joined_members(room)).await?
        } else {
            MembershipSet::new()
        };
        let users = target.resolve(&members);

        let client = self.client();
        let bot = self.bot();
        let report = self
            .job
            .run(
                users,
                |user| user != bot && !power.is_moderator(user),
                |user| async move { action.apply(client, room, &user, reason).await },
            )
            .await;
        Ok(report)
    }

    /// Ban `target` from every joined room where `actor` is a moderator.
    pub async fn ban_everywhere(
        &self,
        room: &RoomId,
        actor: &UserId,
        target: &str,
        reason: &str,
    ) -> CommandResult {
        let target = Target::parse(target)?;
        self.authorized_power(room, actor).await?;
        let rooms = self.job.gated(self.client().joined_rooms()).await?;

        let results = self
            .job
            .for_each(rooms, |joined| {
                let target = &target;
                async move { self.ban_in_room(&joined, actor, target, reason).await }
            })
            .await;

        let mut acted = 0;
        let mut report = BulkReport::default();
        for result in results.into_iter().flatten() {
            acted += 1;
            report.merge(result);
        }
        info!(
            actor = %actor,
            target = %target,
            rooms = acted,
            succeeded = report.succeeded(),
            failed = report.failed(),
            "ban across rooms"
        );
        Ok(format!("{} across {acted} rooms", report.summary("banned")))
    }

    /// `None` when the room was skipped.
    async fn ban_in_room(
        &self,
        room: &RoomId,
        actor: &UserId,
        target: &Target,
        reason: &str,
    ) -> Option<BulkReport<UserId>> {
        let power = match self.job.gated(self.client().power_levels(room)).await {
            Ok(power) => power,
            Err(e) => {
                warn!(room = %room, error = %e, "skipping room, power levels unavailable");
                return None;
            }
        };
        if !power.is_moderator(actor) {
            debug!(room = %room, actor = %actor, "skipping room, actor is not a moderator");
            return None;
        }
        if !power.can_self_perform(self.bot(), &Capability::Ban) {
            debug!(room = %room, "skipping room, cannot ban");
            return None;
        }

        match self
            .member_action_in(room, &power, target, reason, MemberAction::Ban)
            .await
        {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(room = %room, error = %e, "ban failed in room");
                None
            }
        }
    }

    /// Add `server` to the room's ACL deny list.
    pub async fn ban_server(&self, room: &RoomId, actor: &UserId, server: &str) -> CommandResult {
        let server = self.check_server(server)?;
        let _guard = self.locks.acquire(room).await;
        let power = self.authorized_power(room, actor).await?;
        self.require_self(&power, &Capability::state(kinds::SERVER_ACL))?;

        if !self.deny_server_in(room, server).await? {
            return Err(ModerationError::AlreadyInState(format!(
                "{server} is already denied."
            )));
        }
        info!(actor = %actor, room = %room, server, "server denied");
        Ok(format!("Denied {server}."))
    }

    /// Deny `server` in every joined room where `actor` is a moderator.
    pub async fn ban_server_everywhere(
        &self,
        room: &RoomId,
        actor: &UserId,
        server: &str,
    ) -> CommandResult {
        let server = self.check_server(server)?;
        self.authorized_power(room, actor).await?;
        let rooms = self.job.gated(self.client().joined_rooms()).await?;

        let outcomes = self
            .job
            .for_each(rooms, |joined| async move {
                self.deny_server_guarded(&joined, Some(actor), server).await
            })
            .await;

        let count = |want: fn(&AclOutcome) -> bool| outcomes.iter().filter(|o| want(o)).count();
        let denied = count(|o| matches!(o, AclOutcome::Denied));
        let already = count(|o| matches!(o, AclOutcome::AlreadyDenied));
        let skipped = count(|o| matches!(o, AclOutcome::Skipped));
        let failed = count(|o| matches!(o, AclOutcome::Failed));

        info!(actor = %actor, server, denied, already, skipped, failed, "server denied across rooms");
        Ok(format!(
            "Denied {server} in {denied} rooms ({already} already, {skipped} skipped, {failed} failed)."
        ))
    }

    /// Deny under the room lock, checking `actor` (when given) and the bot.
    async fn deny_server_guarded(
        &self,
        room: &RoomId,
        actor: Option<&UserId>,
        server: &str,
    ) -> AclOutcome {
        let _guard = self.locks.acquire(room).await;
        let power = match self.job.gated(self.client().power_levels(room)).await {
            Ok(power) => power,
            Err(e) => {
                warn!(room = %room, error = %e, "skipping room, power levels unavailable");
                return AclOutcome::Skipped;
            }
        };
        let actor_ok = actor.is_none_or(|a| power.is_moderator(a));
        if !actor_ok || !power.can_self_perform(self.bot(), &Capability::state(kinds::SERVER_ACL)) {
            debug!(room = %room, "skipping room for server deny");
            return AclOutcome::Skipped;
        }

        match self.deny_server_in(room, server).await {
            Ok(true) => AclOutcome::Denied,
            Ok(false) => AclOutcome::AlreadyDenied,
            Err(e) => {
                warn!(room = %room, server, error = %e, "server deny failed");
                AclOutcome::Failed
            }
        }
    }

    /// Read-modify-write of the ACL. The caller holds the room lock.
    /// Returns `false` when the server was already denied.
    async fn deny_server_in(&self, room: &RoomId, server: &str) -> Result<bool, ModerationError> {
        let mut acl = self.job.gated(self.client().server_acl(room)).await?;
        if !acl.deny_server(server) {
            return Ok(false);
        }
        self.job
            .gated(self.client().set_server_acl(room, &acl))
            .await?;
        Ok(true)
    }

    /// Validate a server name, refusing the engine's own server.
    fn check_server<'a>(&self, server: &'a str) -> Result<&'a str, ModerationError> {
        let server = server.trim();
        if server.is_empty() || server.contains(|c: char| c.is_whitespace() || c == '@' || c == '/') {
            return Err(ModerationError::InvalidTarget(format!(
                "{server} is not a server name."
            )));
        }
        if server == self.bot().server_name() {
            return Err(ModerationError::InvalidTarget(
                "Refusing to deny my own server.".into(),
            ));
        }
        Ok(server)
    }

    /// Deny a server as a policy consequence, without an acting user.
    pub(crate) async fn deny_server_unattended(&self, room: &RoomId, server: &str) -> CommandResult {
        let server = self.check_server(server)?;
        match self.deny_server_guarded(room, None, server).await {
            AclOutcome::Denied => Ok(format!("Denied {server}.")),
            AclOutcome::AlreadyDenied => Ok(format!("{server} was already denied.")),
            AclOutcome::Skipped => Ok(format!("Not permitted to deny {server} here.")),
            AclOutcome::Failed => Ok(format!("Failed to deny {server}.")),
        }
    }
}

fn member_capability(action: MemberAction) -> Capability {
    match action {
        MemberAction::Ban => Capability::Ban,
        MemberAction::Kick => Capability::Kick,
    }
}
