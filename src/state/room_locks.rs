//! Per-room serialization of read-modify-write on room state.
//!
//! A room's lock is a `tokio::sync::Mutex<()>` held across the fetch and the
//! write-back of a state document. The `DashMap` guard itself is never held
//! across an `.await`: the `Arc` is cloned out and the shard lock dropped.

use dashmap::DashMap;
use slmod_proto::RoomId;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct RoomLocks {
    locks: DashMap<RoomId, Arc<Mutex<()>>>,
}

impl RoomLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, room: &RoomId) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.get(room) {
            return Arc::clone(lock.value());
        }
        Arc::clone(self.locks.entry(room.clone()).or_default().value())
    }

    /// Wait for exclusive access to `room`'s state documents.
    pub async fn acquire(&self, room: &RoomId) -> OwnedMutexGuard<()> {
        self.lock_for(room).lock_owned().await
    }

    /// Number of rooms that have been locked at least once.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
