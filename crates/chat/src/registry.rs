use super::*;
use agora_auth::Member;
use agora_core::ID;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::RwLock;
use tokio::sync::mpsc::UnboundedSender;

/// Writable side of one connection. Sends are non-blocking, so no await
/// ever runs under the registry lock; dropping the handle closes the
/// connection's writer task.
pub type Handle = UnboundedSender<String>;

/// Composite key for the connection map. One map serves as both the
/// room index and the user index, which keeps the two views consistent
/// under a single critical section by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Key {
    room: ID<Room>,
    user: ID<Member>,
}

/// Outcome of a join. A second connect for the same (room, user) while
/// one is open keeps the existing socket and reports `AlreadyPresent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Join {
    Joined,
    AlreadyPresent,
}

/// In-memory map of live chat connections. Never persisted; presence is
/// transient state and an empty registry after restart is correct.
#[derive(Default)]
pub struct Registry {
    connections: RwLock<HashMap<Key, Handle>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection, unless the key already holds a live one.
    pub fn join(&self, room: ID<Room>, user: ID<Member>, handle: Handle) -> Join {
        let mut connections = self.connections.write().expect("registry lock");
        match connections.entry(Key { room, user }) {
            Entry::Occupied(_) => Join::AlreadyPresent,
            Entry::Vacant(vacant) => {
                vacant.insert(handle);
                log::debug!("[registry] user {} joined room {}", user, room);
                Join::Joined
            }
        }
    }

    /// Drop a connection. Idempotent: leaving twice is a no-op. The
    /// handle is dropped here, which closes the connection's writer.
    pub fn leave(&self, room: ID<Room>, user: ID<Member>) {
        let mut connections = self.connections.write().expect("registry lock");
        if connections.remove(&Key { room, user }).is_some() {
            log::debug!("[registry] user {} left room {}", user, room);
        }
    }

    /// Best-effort unicast. A failed write is reported to the caller
    /// but never unregisters the connection; teardown belongs to the
    /// transport's own disconnect signal via [`Self::leave`].
    pub fn send(handle: &Handle, text: &str) -> anyhow::Result<()> {
        handle
            .send(text.to_string())
            .map_err(|_| anyhow::anyhow!("connection closed"))
    }

    /// Deliver to every live socket in the room, skipping any that
    /// error. Returns the number of sockets reached.
    pub fn broadcast(&self, room: ID<Room>, text: &str) -> usize {
        let connections = self.connections.read().expect("registry lock");
        connections
            .iter()
            .filter(|(key, _)| key.room == room)
            .filter(|(key, handle)| match Self::send(handle, text) {
                Ok(()) => true,
                Err(e) => {
                    log::debug!("[registry] skipping user {} in room {}: {}", key.user, room, e);
                    false
                }
            })
            .count()
    }

    /// Users currently connected to a room.
    pub fn presence(&self, room: ID<Room>) -> Vec<ID<Member>> {
        let connections = self.connections.read().expect("registry lock");
        connections
            .keys()
            .filter(|key| key.room == room)
            .map(|key| key.user)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::sync::mpsc::unbounded_channel;

    fn pipe() -> (Handle, UnboundedReceiver<String>) {
        unbounded_channel()
    }

    #[test]
    fn join_is_idempotent() {
        let registry = Registry::new();
        let (first, mut rx1) = pipe();
        let (second, mut rx2) = pipe();
        assert_eq!(registry.join(ID::from(1), ID::from(7), first), Join::Joined);
        assert_eq!(
            registry.join(ID::from(1), ID::from(7), second),
            Join::AlreadyPresent
        );
        // the original socket stays registered, the second never lands
        assert_eq!(registry.broadcast(ID::from(1), "hello"), 1);
        assert_eq!(rx1.try_recv().unwrap(), "hello");
        assert!(rx2.try_recv().is_err());
    }

    #[test]
    fn leave_is_idempotent() {
        let registry = Registry::new();
        let (handle, _rx) = pipe();
        registry.join(ID::from(1), ID::from(7), handle);
        registry.leave(ID::from(1), ID::from(7));
        registry.leave(ID::from(1), ID::from(7));
        assert!(registry.presence(ID::from(1)).is_empty());
    }

    #[test]
    fn broadcast_skips_dead_sockets() {
        let registry = Registry::new();
        let (a, mut rx_a) = pipe();
        let (b, rx_b) = pipe();
        let (c, mut rx_c) = pipe();
        registry.join(ID::from(1), ID::from(7), a);
        registry.join(ID::from(1), ID::from(8), b);
        registry.join(ID::from(1), ID::from(9), c);
        drop(rx_b);
        assert_eq!(registry.broadcast(ID::from(1), "hi"), 2);
        assert_eq!(rx_a.try_recv().unwrap(), "hi");
        assert_eq!(rx_c.try_recv().unwrap(), "hi");
        // the dead socket is still registered until an explicit leave
        assert_eq!(registry.presence(ID::from(1)).len(), 3);
    }

    #[test]
    fn broadcast_is_scoped_to_the_room() {
        let registry = Registry::new();
        let (a, mut rx_a) = pipe();
        let (b, mut rx_b) = pipe();
        registry.join(ID::from(1), ID::from(7), a);
        registry.join(ID::from(2), ID::from(7), b);
        assert_eq!(registry.broadcast(ID::from(1), "one"), 1);
        assert_eq!(rx_a.try_recv().unwrap(), "one");
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn presence_tracks_joins_and_leaves() {
        let registry = Registry::new();
        let (a, _rx_a) = pipe();
        let (b, _rx_b) = pipe();
        registry.join(ID::from(1), ID::from(7), a);
        registry.join(ID::from(1), ID::from(8), b);
        let mut present = registry.presence(ID::from(1));
        present.sort();
        assert_eq!(present, vec![ID::from(7), ID::from(8)]);
        registry.leave(ID::from(1), ID::from(7));
        assert_eq!(registry.presence(ID::from(1)), vec![ID::from(8)]);
    }

    #[test]
    fn send_failure_reports_without_unregistering() {
        let registry = Registry::new();
        let (handle, rx) = pipe();
        registry.join(ID::from(1), ID::from(7), handle.clone());
        drop(rx);
        assert!(Registry::send(&handle, "hi").is_err());
        assert_eq!(registry.presence(ID::from(1)), vec![ID::from(7)]);
    }
}
