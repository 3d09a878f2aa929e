//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

// =============================================================================
// Homeserver Defaults
// =============================================================================

pub fn default_request_timeout_secs() -> u64 {
    30
}

// =============================================================================
// Limits Defaults
// =============================================================================

/// Concurrent remote calls per bulk action.
pub fn default_fanout_concurrency() -> usize {
    16
}

/// Events requested per history page. Servers cap this at roughly 1000.
pub fn default_page_size() -> usize {
    1000
}

/// Minimum spacing between outbound notices.
pub fn default_notice_interval_ms() -> u64 {
    200
}

/// Events fetched after a purge anchor in the initial context request.
pub fn default_context_size() -> usize {
    1
}
