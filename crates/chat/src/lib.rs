//! Live chat over WebSocket.
//!
//! An in-memory registry of open connections keyed by room and user,
//! plus the per-connection gateway loop that authenticated upgrades
//! hand off to. The registry is process-local and rebuilt empty on
//! restart; only messages are persisted.
//!
//! ## Core Types
//!
//! - [`Registry`] — live connections, presence, broadcast
//! - [`Gateway`] — per-connection receive/persist/broadcast loop
//! - [`Frame`] — wire frames (`message`, `user_join`, `user_left`)
//! - [`ChatStorage`] — message persistence collaborator
mod frame;
mod gateway;
mod registry;
mod storage;

pub use frame::*;
pub use gateway::*;
pub use registry::*;
pub use storage::*;

/// Marker for chat room ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Room;
