//! Per-event-type listener registries.
//!
//! Every registry is multicast: each subscribed handler sees every event, in
//! subscription order. Handlers run on the consumer tick.

use std::fmt;

use crate::connection::StateChange;
use crate::error::{ConfigurationError, ConnectionError};
use crate::event::LiveEvent;
use crate::gift_streak::GiftStreakEvent;
use crate::like_threshold::LikeMilestone;
use crate::message::{
    ChatMessage, FollowMessage, GiftMessage, LikeMessage, RoomUserMessage, ShareMessage,
    SubscribeMessage,
};

/// Token returned by [`Listeners::subscribe`]. Only meaningful for the
/// registry that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler<T> = Box<dyn FnMut(&T) + Send>;

/// Listeners for one event type.
pub struct Listeners<T> {
    next_id: u64,
    handlers: Vec<(SubscriptionId, Handler<T>)>,
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            handlers: Vec::new(),
        }
    }
}

impl<T> fmt::Debug for Listeners<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.handlers.len())
            .finish()
    }
}

impl<T> Listeners<T> {
    /// Register a handler.
    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&T) + Send + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.handlers.push((id, Box::new(handler)));
        id
    }

    /// Remove a handler. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(sid, _)| *sid != id);
        self.handlers.len() != before
    }

    /// Call every handler with `event`.
    pub fn emit(&mut self, event: &T) {
        for (_, handler) in self.handlers.iter_mut() {
            handler(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.handlers.len()
    }

    pub fn clear(&mut self) {
        self.handlers.clear();
    }
}

/// All listener registries of a client.
#[derive(Debug, Default)]
pub struct EventBus {
    pub gift: Listeners<GiftMessage>,
    pub room_user: Listeners<RoomUserMessage>,
    pub like: Listeners<LikeMessage>,
    pub chat: Listeners<ChatMessage>,
    pub share: Listeners<ShareMessage>,
    pub follow: Listeners<FollowMessage>,
    pub subscribe: Listeners<SubscribeMessage>,
    pub connection_error: Listeners<ConnectionError>,
    pub configuration_error: Listeners<ConfigurationError>,
    pub state_change: Listeners<StateChange>,
    pub gift_streak: Listeners<GiftStreakEvent>,
    pub like_milestone: Listeners<LikeMilestone>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route a decoded relay message to its registry.
    pub fn publish(&mut self, event: &LiveEvent) {
        match event {
            LiveEvent::Gift(msg) => self.gift.emit(msg),
            LiveEvent::RoomUser(msg) => self.room_user.emit(msg),
            LiveEvent::Like(msg) => self.like.emit(msg),
            LiveEvent::Chat(msg) => self.chat.emit(msg),
            LiveEvent::Share(msg) => self.share.emit(msg),
            LiveEvent::Follow(msg) => self.follow.emit(msg),
            LiveEvent::Subscribe(msg) => self.subscribe.emit(msg),
        }
    }
}
