//! Presence tracking for Courier.
//!
//! The registry maps a user id to the channel id of their live WebSocket
//! session. At most one entry per user: a new connect overwrites the old
//! entry unconditionally, and a disconnect only removes the entry when it
//! still belongs to the disconnecting channel. That scoping is what keeps a
//! stale disconnect, racing a reconnect, from evicting the newer session.

use courier_protocol::{ChannelId, UserId};
use dashmap::DashMap;
use tracing::debug;

/// Registry of live user sessions.
///
/// The contract is deliberately narrow so the in-process map can be swapped
/// for a distributed cache without touching call sites.
pub trait PresenceRegistry: Send + Sync {
    /// Bind `user` to `channel`, replacing any prior binding.
    fn register(&self, user: UserId, channel: ChannelId);

    /// Remove the binding for `user`, but only if it still points at
    /// `channel`. Returns `true` if an entry was removed.
    fn unregister(&self, user: UserId, channel: ChannelId) -> bool;

    /// The channel currently bound to `user`, if any.
    fn lookup(&self, user: UserId) -> Option<ChannelId>;

    /// All user ids with a live binding.
    fn online_users(&self) -> Vec<UserId>;
}

/// In-process presence registry. No persistence across restarts.
#[derive(Debug, Default)]
pub struct LocalPresence {
    entries: DashMap<UserId, ChannelId>,
}

impl LocalPresence {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no user is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PresenceRegistry for LocalPresence {
    fn register(&self, user: UserId, channel: ChannelId) {
        self.entries.insert(user, channel);
        debug!(user = %user, channel = %channel, "Presence: registered");
    }

    fn unregister(&self, user: UserId, channel: ChannelId) -> bool {
        // Scoped removal: a stale disconnect must not evict a newer session.
        let removed = self
            .entries
            .remove_if(&user, |_, bound| *bound == channel)
            .is_some();
        if removed {
            debug!(user = %user, channel = %channel, "Presence: unregistered");
        }
        removed
    }

    fn lookup(&self, user: UserId) -> Option<ChannelId> {
        self.entries.get(&user).map(|entry| *entry.value())
    }

    fn online_users(&self) -> Vec<UserId> {
        self.entries.iter().map(|entry| *entry.key()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_register_lookup_unregister() {
        let presence = LocalPresence::new();
        let user = Uuid::new_v4();
        let channel = Uuid::new_v4();

        assert_eq!(presence.lookup(user), None);

        presence.register(user, channel);
        assert_eq!(presence.lookup(user), Some(channel));
        assert_eq!(presence.online_users(), vec![user]);

        assert!(presence.unregister(user, channel));
        assert_eq!(presence.lookup(user), None);
        assert!(presence.is_empty());
    }

    #[test]
    fn test_last_connect_wins() {
        let presence = LocalPresence::new();
        let user = Uuid::new_v4();
        let old_channel = Uuid::new_v4();
        let new_channel = Uuid::new_v4();

        presence.register(user, old_channel);
        presence.register(user, new_channel);

        assert_eq!(presence.lookup(user), Some(new_channel));
        assert_eq!(presence.len(), 1);
    }

    #[test]
    fn test_stale_disconnect_does_not_evict_newer_session() {
        let presence = LocalPresence::new();
        let user = Uuid::new_v4();
        let old_channel = Uuid::new_v4();
        let new_channel = Uuid::new_v4();

        presence.register(user, old_channel);
        // Reconnect races ahead of the old session's disconnect.
        presence.register(user, new_channel);

        assert!(!presence.unregister(user, old_channel));
        assert_eq!(presence.lookup(user), Some(new_channel));

        assert!(presence.unregister(user, new_channel));
        assert_eq!(presence.lookup(user), None);
    }

    #[test]
    fn test_online_users_snapshot() {
        let presence = LocalPresence::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        presence.register(alice, Uuid::new_v4());
        presence.register(bob, Uuid::new_v4());

        let mut online = presence.online_users();
        online.sort();
        let mut expected = vec![alice, bob];
        expected.sort();
        assert_eq!(online, expected);
    }
}
