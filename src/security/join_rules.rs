//! Join rules: glob patterns whose matching joiners are banned on sight.

use crate::error::ModerationError;
use glob::Pattern;
use parking_lot::RwLock;
use slmod_proto::UserId;

/// Shared, lock-protected list of join rules.
///
/// Only whole operations are exposed; the lock is never held across an
/// `.await`.
#[derive(Debug, Default)]
pub struct JoinRules {
    rules: RwLock<Vec<Pattern>>,
}

impl JoinRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw glob strings, rejecting the first invalid one.
    pub fn from_patterns<I, S>(patterns: I) -> Result<Self, ModerationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rules = Self::new();
        for raw in patterns {
            rules.add(raw.as_ref())?;
        }
        Ok(rules)
    }

    /// Add a rule. Returns `false` if the same rule already exists.
    pub fn add(&self, raw: &str) -> Result<bool, ModerationError> {
        let pattern = Pattern::new(raw.trim())
            .map_err(|e| ModerationError::InvalidTarget(format!("Bad pattern {raw}: {e}")))?;
        let mut rules = self.rules.write();
        if rules.iter().any(|r| r.as_str() == pattern.as_str()) {
            return Ok(false);
        }
        rules.push(pattern);
        Ok(true)
    }

    /// Remove a rule. Returns `false` if no such rule exists.
    pub fn remove(&self, raw: &str) -> bool {
        let raw = raw.trim();
        let mut rules = self.rules.write();
        let before = rules.len();
        rules.retain(|r| r.as_str() != raw);
        rules.len() != before
    }

    /// Copy of the current rules.
    pub fn snapshot(&self) -> Vec<String> {
        self.rules.read().iter().map(|r| r.as_str().to_string()).collect()
    }

    /// First rule matching `user`, if any.
    pub fn matching(&self, user: &UserId) -> Option<String> {
        self.rules
            .read()
            .iter()
            .find(|r| r.matches(user.as_str()))
            .map(|r| r.as_str().to_string())
    }

    pub fn len(&self) -> usize {
        self.rules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_dedupes_and_remove() {
        let rules = JoinRules::new();
        assert!(rules.add("@spam*:evil.example").unwrap());
        assert!(!rules.add("@spam*:evil.example").unwrap());
        assert_eq!(rules.len(), 1);

        assert!(rules.remove("@spam*:evil.example"));
        assert!(!rules.remove("@spam*:evil.example"));
        assert!(rules.is_empty());
    }

    #[test]
    fn test_matching() {
        let rules = JoinRules::from_patterns(["*:evil.example", "@bot?:example.org"]).unwrap();
        let hit = rules.matching(&UserId::new_unchecked("@x:evil.example"));
        assert_eq!(hit.as_deref(), Some("*:evil.example"));
        assert!(rules.matching(&UserId::new_unchecked("@bot1:example.org")).is_some());
        assert!(rules.matching(&UserId::new_unchecked("@alice:example.org")).is_none());
        assert_eq!(rules.snapshot(), vec!["*:evil.example", "@bot?:example.org"]);
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        assert!(JoinRules::from_patterns(["[oops"]).is_err());
    }
}
