//! Security controls around the moderation engine.
//!
//! - **Join rules**: glob patterns banned on join
//! - **Notice limiting**: governor pacing for outbound notices

pub mod join_rules;
pub mod rate_limit;

pub use join_rules::JoinRules;
pub use rate_limit::NoticeLimiter;
