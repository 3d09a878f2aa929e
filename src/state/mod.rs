//! In-process shared state.

mod room_locks;

pub use room_locks::RoomLocks;
