//! Typed events produced by the dispatcher.

use strum::{AsRefStr, Display, EnumString};

use crate::message::{
    ChatMessage, FollowMessage, GiftMessage, LikeMessage, RoomUserMessage, ShareMessage,
    SubscribeMessage,
};

/// Value of the `type` discriminator for every message the core routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "camelCase")]
pub enum MessageType {
    Gift,
    RoomUser,
    Like,
    Chat,
    Share,
    Follow,
    Subscribe,
}

/// A decoded relay message, tagged by its `type` discriminator.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    Gift(GiftMessage),
    RoomUser(RoomUserMessage),
    Like(LikeMessage),
    Chat(ChatMessage),
    Share(ShareMessage),
    Follow(FollowMessage),
    Subscribe(SubscribeMessage),
}

impl LiveEvent {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Gift(_) => MessageType::Gift,
            Self::RoomUser(_) => MessageType::RoomUser,
            Self::Like(_) => MessageType::Like,
            Self::Chat(_) => MessageType::Chat,
            Self::Share(_) => MessageType::Share,
            Self::Follow(_) => MessageType::Follow,
            Self::Subscribe(_) => MessageType::Subscribe,
        }
    }
}
