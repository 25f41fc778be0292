//! Realtime hub for Courier.
//!
//! The hub owns one event sender per connected WebSocket channel and the
//! presence registry binding users to channels. Delivery is best-effort and
//! at most once: a push to a dead or unknown channel is dropped, with no
//! retry and no dead-letter queue.

use crate::presence::{LocalPresence, PresenceRegistry};
use courier_protocol::{ChannelId, ServerEvent, UserId};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};
use uuid::Uuid;

/// Central dispatch point for realtime events.
pub struct Hub {
    presence: Arc<dyn PresenceRegistry>,
    channels: DashMap<ChannelId, mpsc::UnboundedSender<ServerEvent>>,
}

impl Hub {
    /// Create a hub backed by the in-process presence registry.
    #[must_use]
    pub fn new() -> Self {
        Self::with_registry(Arc::new(LocalPresence::new()))
    }

    /// Create a hub over an externally provided presence registry.
    #[must_use]
    pub fn with_registry(presence: Arc<dyn PresenceRegistry>) -> Self {
        Self {
            presence,
            channels: DashMap::new(),
        }
    }

    /// The presence registry backing this hub.
    #[must_use]
    pub fn presence(&self) -> &dyn PresenceRegistry {
        self.presence.as_ref()
    }

    /// Whether `user` currently resolves to a live channel.
    #[must_use]
    pub fn is_online(&self, user: UserId) -> bool {
        self.presence.lookup(user).is_some()
    }

    /// Number of connected channels, identified or anonymous.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Attach a new channel, optionally bound to a user identity.
    ///
    /// An anonymous channel (no user) still receives broadcasts but is never
    /// a resolvable push recipient. Every connect rebroadcasts the full
    /// online snapshot to all channels.
    pub fn connect(
        &self,
        user: Option<UserId>,
    ) -> (ChannelId, mpsc::UnboundedReceiver<ServerEvent>) {
        let channel = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.channels.insert(channel, tx);

        if let Some(user) = user {
            self.presence.register(user, channel);
        }
        debug!(channel = %channel, user = ?user, "Hub: channel connected");

        self.broadcast_online();
        (channel, rx)
    }

    /// Detach a channel and release its presence entry.
    ///
    /// The unregister is scoped to this channel's own id, so a disconnect
    /// arriving after the same user reconnected leaves the newer session's
    /// entry in place. Every disconnect rebroadcasts the online snapshot.
    pub fn disconnect(&self, channel: ChannelId, user: Option<UserId>) {
        self.channels.remove(&channel);
        if let Some(user) = user {
            self.presence.unregister(user, channel);
        }
        debug!(channel = %channel, user = ?user, "Hub: channel disconnected");

        self.broadcast_online();
    }

    /// Push an event to one channel. Returns `false` if the channel is
    /// unknown or its receiver is gone; the event is dropped either way.
    pub fn send_to_channel(&self, channel: ChannelId, event: ServerEvent) -> bool {
        match self.channels.get(&channel) {
            Some(tx) => {
                let sent = tx.send(event).is_ok();
                if !sent {
                    trace!(channel = %channel, "Hub: dropped event for dead channel");
                }
                sent
            }
            None => {
                trace!(channel = %channel, "Hub: dropped event for unknown channel");
                false
            }
        }
    }

    /// Push an event to a user's live channel, if they have one.
    pub fn send_to_user(&self, user: UserId, event: ServerEvent) -> bool {
        match self.presence.lookup(user) {
            Some(channel) => self.send_to_channel(channel, event),
            None => false,
        }
    }

    /// Push an event to every connected channel.
    ///
    /// Returns the number of channels that accepted the event.
    pub fn broadcast(&self, event: ServerEvent) -> usize {
        let mut delivered = 0;
        for entry in self.channels.iter() {
            if entry.value().send(event.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    fn broadcast_online(&self) {
        let snapshot = self.presence.online_users();
        trace!(online = snapshot.len(), "Hub: broadcasting presence snapshot");
        self.broadcast(ServerEvent::GetOnlineUsers(snapshot));
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}
