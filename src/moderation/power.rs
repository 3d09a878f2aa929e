//! Effective permission levels derived from a room's power-level document.
//!
//! All functions here are pure. The document is fetched fresh by the caller
//! for every decision; nothing is cached between commands.

use slmod_proto::power_levels::DEFAULT_THRESHOLD;
use slmod_proto::{kinds, PowerLevels, UserId};
use std::fmt;

/// Something a user can be allowed to do in a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    Ban,
    Kick,
    Redact,
    Invite,
    /// Sending a message event of the given type.
    Message(String),
    /// Sending a state event of the given type.
    State(String),
}

impl Capability {
    /// Sending ordinary chat messages.
    pub fn send_message() -> Self {
        Capability::Message(kinds::MESSAGE.to_string())
    }

    /// Sending a state event of `kind`.
    pub fn state(kind: &str) -> Self {
        Capability::State(kind.to_string())
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Ban => f.write_str("ban"),
            Capability::Kick => f.write_str("kick"),
            Capability::Redact => f.write_str("redact"),
            Capability::Invite => f.write_str("invite"),
            Capability::Message(kind) | Capability::State(kind) => f.write_str(kind),
        }
    }
}

/// Outcome of comparing a user's level against a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModerationDecision {
    pub actor_level: i64,
    pub required_level: i64,
    pub authorized: bool,
}

impl ModerationDecision {
    fn new(actor_level: i64, required_level: i64) -> Self {
        Self {
            actor_level,
            required_level,
            authorized: actor_level >= required_level,
        }
    }
}

/// Permission derivations over a power-level document.
pub trait PowerLevelsExt {
    /// Explicit per-user level if present, else `users_default` (0).
    fn user_level(&self, user: &UserId) -> i64;

    /// Threshold for a capability after applying overrides and defaults.
    fn capability_level(&self, capability: &Capability) -> i64;

    /// Lowest of the ban, kick, and redact thresholds.
    fn moderator_threshold(&self) -> i64;

    /// Decision for an admin-class action by `user`.
    fn moderation_decision(&self, user: &UserId) -> ModerationDecision;

    /// Decision for `user` exercising a single capability.
    fn capability_decision(&self, user: &UserId, capability: &Capability) -> ModerationDecision;

    /// Whether `user` may perform admin-class actions.
    fn is_moderator(&self, user: &UserId) -> bool {
        self.moderation_decision(user).authorized
    }

    /// Whether the engine's own account can perform `capability`, so that a
    /// doomed remote call is never attempted.
    fn can_self_perform(&self, self_id: &UserId, capability: &Capability) -> bool {
        self.capability_decision(self_id, capability).authorized
    }

    /// Level that encodes "muted": one below the message-send threshold.
    fn mute_level(&self) -> i64 {
        self.capability_level(&Capability::send_message()) - 1
    }

    /// Set a user's level in memory. The caller persists the document.
    fn set_user_level(&mut self, user: &UserId, level: i64);
}

impl PowerLevelsExt for PowerLevels {
    fn user_level(&self, user: &UserId) -> i64 {
        self.users
            .get(user)
            .copied()
            .unwrap_or(self.users_default.unwrap_or(0))
    }

    fn capability_level(&self, capability: &Capability) -> i64 {
        match capability {
            Capability::Ban => self.ban.unwrap_or(DEFAULT_THRESHOLD),
            Capability::Kick => self.kick.unwrap_or(DEFAULT_THRESHOLD),
            Capability::Redact => self.redact.unwrap_or(DEFAULT_THRESHOLD),
            Capability::Invite => self.invite.unwrap_or(0),
            Capability::Message(kind) => self
                .events
                .get(kind)
                .copied()
                .unwrap_or(self.events_default.unwrap_or(0)),
            Capability::State(kind) => self
                .events
                .get(kind)
                .copied()
                .unwrap_or(self.state_default.unwrap_or(DEFAULT_THRESHOLD)),
        }
    }

    fn moderator_threshold(&self) -> i64 {
        [Capability::Ban, Capability::Kick, Capability::Redact]
            .iter()
            .map(|c| self.capability_level(c))
            .min()
            .unwrap_or(DEFAULT_THRESHOLD)
    }

    fn moderation_decision(&self, user: &UserId) -> ModerationDecision {
        ModerationDecision::new(self.user_level(user), self.moderator_threshold())
    }

    fn capability_decision(&self, user: &UserId, capability: &Capability) -> ModerationDecision {
        ModerationDecision::new(self.user_level(user), self.capability_level(capability))
    }

    fn set_user_level(&mut self, user: &UserId, level: i64) {
        if level == self.users_default.unwrap_or(0) {
            self.users.remove(user);
        } else {
            self.users.insert(user.clone(), level);
        }
    }
}
