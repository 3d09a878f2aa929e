//! Opaque identifiers for users, rooms, and events.
//!
//! Identifiers are room-service strings with a one-character sigil:
//! `@user:server`, `!room:server`, `#alias:server`, `$event`.
//!
//! Deserialization is lenient (any string is accepted) so that a single odd
//! key in a server-provided document never makes the whole document
//! unreadable. Strict validation happens in the `parse` constructors, which
//! are what user input goes through.

use crate::error::{ProtoError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Wrap a string without validating it.
            ///
            /// Use this for identifiers that came from the room service itself.
            pub fn new_unchecked(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// A user identifier, e.g. `@alice:example.org`.
    UserId
);
string_id!(
    /// A room identifier, e.g. `!abcdef:example.org`.
    RoomId
);
string_id!(
    /// An event identifier, e.g. `$Rqnc-F-dvnEYJTyHq_iKxU2bZ1CI92-kuZq3a5lr5Zg`.
    EventId
);

/// Split `<sigil>local:server` into its two halves.
fn split_sigiled(raw: &str, sigil: char) -> Option<(&str, &str)> {
    let rest = raw.strip_prefix(sigil)?;
    let (local, server) = rest.split_once(':')?;
    if local.is_empty() || server.is_empty() {
        return None;
    }
    if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return None;
    }
    Some((local, server))
}

impl UserId {
    /// Parse and validate a user identifier.
    pub fn parse(raw: &str) -> Result<Self> {
        match split_sigiled(raw, '@') {
            Some(_) => Ok(Self(raw.to_string())),
            None => Err(ProtoError::InvalidUserId(raw.to_string())),
        }
    }

    /// The part between `@` and the first `:`.
    pub fn localpart(&self) -> &str {
        split_sigiled(&self.0, '@').map(|(l, _)| l).unwrap_or("")
    }

    /// The server name after the first `:`.
    pub fn server_name(&self) -> &str {
        split_sigiled(&self.0, '@').map(|(_, s)| s).unwrap_or("")
    }
}

impl RoomId {
    /// Parse and validate a room identifier.
    pub fn parse(raw: &str) -> Result<Self> {
        match split_sigiled(raw, '!') {
            Some(_) => Ok(Self(raw.to_string())),
            None => Err(ProtoError::InvalidRoomId(raw.to_string())),
        }
    }
}

impl From<&str> for EventId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

/// A room as a user names it: either its identifier or a published alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomRef {
    /// `!opaque:server`
    Id(RoomId),
    /// `#alias:server`, resolved through the room directory.
    Alias(String),
}

impl RoomRef {
    /// Classify a user-supplied room reference by its sigil.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.starts_with('!') {
            return RoomId::parse(raw)
                .map(RoomRef::Id)
                .map_err(|_| ProtoError::InvalidRoomRef(raw.to_string()));
        }
        match split_sigiled(raw, '#') {
            Some(_) => Ok(RoomRef::Alias(raw.to_string())),
            None => Err(ProtoError::InvalidRoomRef(raw.to_string())),
        }
    }
}

impl fmt::Display for RoomRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomRef::Id(id) => id.fmt(f),
            RoomRef::Alias(alias) => f.write_str(alias),
        }
    }
}
