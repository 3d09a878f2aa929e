//! The `m.room.server_acl` state content.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

fn default_true() -> bool {
    true
}

/// Homeserver allow/deny lists for a room.
///
/// An empty `allow` list denies every server, so a room without an ACL is
/// represented by [`ServerAcl::permissive`], never by `Default`-like empties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerAcl {
    /// Server name globs allowed to participate.
    #[serde(default)]
    pub allow: Vec<String>,
    /// Server name globs denied from participating.
    #[serde(default)]
    pub deny: Vec<String>,
    /// Whether IP-literal server names are allowed.
    #[serde(default = "default_true")]
    pub allow_ip_literals: bool,
    /// Uninterpreted fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ServerAcl {
    /// The ACL equivalent to a room that has none: every server allowed.
    pub fn permissive() -> Self {
        Self {
            allow: vec!["*".to_string()],
            deny: Vec::new(),
            allow_ip_literals: true,
            extra: Map::new(),
        }
    }

    /// Whether `server` is literally present in the deny list.
    pub fn is_denied(&self, server: &str) -> bool {
        self.deny.iter().any(|s| s == server)
    }

    /// Move `server` into the deny list.
    ///
    /// Returns `false` when it was already denied. A literal entry for the
    /// same server in `allow` is dropped.
    pub fn deny_server(&mut self, server: &str) -> bool {
        if self.is_denied(server) {
            return false;
        }
        self.allow.retain(|s| s != server);
        self.deny.push(server.to_string());
        true
    }
}
