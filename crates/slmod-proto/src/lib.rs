//! # slmod-proto
//!
//! Data types for the room service that slmod moderates: identifiers,
//! timeline and state events, the power-level document, server ACLs, policy
//! rules, room event filters, and paginated history replies.
//!
//! Everything in this crate is plain data with serde support. Network I/O
//! lives in the `slmod-ng` crate behind its `ActionClient` trait.
//!
//! ## Quick Start
//!
//! ```rust
//! use slmod_proto::{PowerLevels, UserId};
//!
//! let raw = r#"{"ban": 50, "users": {"@mod:example.org": 100}}"#;
//! let power: PowerLevels = serde_json::from_str(raw).expect("valid content");
//! let moderator = UserId::parse("@mod:example.org").expect("valid user id");
//!
//! assert_eq!(power.users.get(&moderator), Some(&100));
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod acl;
pub mod error;
pub mod event;
pub mod filter;
pub mod id;
pub mod pagination;
pub mod policy;
pub mod power_levels;

pub use self::acl::ServerAcl;
pub use self::error::ProtoError;
pub use self::event::{kinds, Event, Unsigned};
pub use self::filter::RoomEventFilter;
pub use self::id::{EventId, RoomId, RoomRef, UserId};
pub use self::pagination::{group_state, Direction, EventContext, MessagesPage, StateMap};
pub use self::policy::PolicyRule;
pub use self::power_levels::PowerLevels;
