//! Fan-out, pagination, and notice pacing limits.

use super::defaults::{
    default_context_size, default_fanout_concurrency, default_notice_interval_ms,
    default_page_size,
};
use serde::Deserialize;
use std::time::Duration;

/// Limits applied to bulk actions and history walks.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum in-flight remote calls across all bulk actions (default: 16).
    #[serde(default = "default_fanout_concurrency")]
    pub fanout_concurrency: usize,
    /// Events requested per history page (default: 1000).
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Milliseconds between outbound notices (default: 200).
    #[serde(default = "default_notice_interval_ms")]
    pub notice_interval_ms: u64,
    /// Events fetched after a reply-purge anchor (default: 1).
    #[serde(default = "default_context_size")]
    pub context_size: usize,
}

impl LimitsConfig {
    /// Notice spacing as a `Duration`.
    pub fn notice_interval(&self) -> Duration {
        Duration::from_millis(self.notice_interval_ms)
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            fanout_concurrency: default_fanout_concurrency(),
            page_size: default_page_size(),
            notice_interval_ms: default_notice_interval_ms(),
            context_size: default_context_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values_are_correct() {
        let limits = LimitsConfig::default();
        assert_eq!(limits.fanout_concurrency, 16);
        assert_eq!(limits.page_size, 1000);
        assert_eq!(limits.notice_interval(), Duration::from_millis(200));
        assert_eq!(limits.context_size, 1);
    }

    #[test]
    fn partial_table_keeps_other_defaults() {
        let limits: LimitsConfig = toml::from_str("page_size = 50").unwrap();
        assert_eq!(limits.page_size, 50);
        assert_eq!(limits.fanout_concurrency, 16);
    }
}
