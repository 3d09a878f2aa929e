//! Target resolution: a literal identity or a glob over room members.

use crate::client::MembershipSet;
use crate::error::ModerationError;
use glob::Pattern;
use slmod_proto::UserId;
use std::fmt;

/// A parsed moderation target.
#[derive(Debug, Clone)]
pub enum Target {
    /// A single identity, acted on whether or not it is a member.
    Literal(UserId),
    /// A glob matched against the full identity of each member.
    Pattern(Pattern),
}

impl Target {
    /// Classify raw input. Anything containing `*` or `?` is a glob.
    pub fn parse(raw: &str) -> Result<Self, ModerationError> {
        let raw = raw.trim();
        if raw.contains(|c| c == '*' || c == '?') {
            return Pattern::new(raw)
                .map(Target::Pattern)
                .map_err(|e| ModerationError::InvalidTarget(format!("Bad pattern {raw}: {e}")));
        }
        UserId::parse(raw)
            .map(Target::Literal)
            .map_err(|_| ModerationError::InvalidTarget(format!("{raw} is not a user or pattern")))
    }

    pub fn is_pattern(&self) -> bool {
        matches!(self, Target::Pattern(_))
    }

    /// Expand into concrete identities against `members`.
    pub fn resolve(&self, members: &MembershipSet) -> Vec<UserId> {
        match self {
            Target::Literal(user) => vec![user.clone()],
            Target::Pattern(pattern) => members
                .iter()
                .filter(|m| pattern.matches(m.as_str()))
                .cloned()
                .collect(),
        }
    }

    /// Whether a single identity is selected by this target.
    pub fn matches(&self, user: &UserId) -> bool {
        match self {
            Target::Literal(literal) => literal == user,
            Target::Pattern(pattern) => pattern.matches(user.as_str()),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Literal(user) => write!(f, "{user}"),
            Target::Pattern(pattern) => f.write_str(pattern.as_str()),
        }
    }
}

/// Parse and expand `raw` against `members` in one step.
pub fn resolve(raw: &str, members: &MembershipSet) -> Result<Vec<UserId>, ModerationError> {
    Ok(Target::parse(raw)?.resolve(members))
}
