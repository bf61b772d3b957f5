//! # tiktok-relay
//!
//! Consumes a TikTok live stream's events (gifts, chat, likes, viewer counts,
//! shares, follows, subscriptions) from a WebSocket relay and turns them into
//! typed events.
//!
//! On top of routing, two stateful trackers run on the event stream:
//! gift-streak coalescing ([`GiftStreakTracker`]) and cumulative like
//! milestones ([`LikeThresholdTracker`]).
//!
//! ```no_run
//! use std::time::Duration;
//! use tiktok_relay::{RelayClient, RelayConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> tiktok_relay::Result<()> {
//! let config = RelayConfig::new("my-api-key", "some_streamer");
//! let mut client = RelayClient::new(config)?;
//! client.bus_mut().chat.subscribe(|chat| {
//!     println!("{}: {}", chat.user.display_name().unwrap_or("?"), chat.comment);
//! });
//! client.connect()?;
//! client.run(Duration::from_millis(50), CancellationToken::new()).await;
//! # Ok(())
//! # }
//! ```

pub mod bus;
pub mod client;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod gift_streak;
pub mod like_threshold;
pub mod message;
pub mod queue;
pub mod websocket;

pub use bus::{EventBus, Listeners, SubscriptionId};
pub use client::RelayClient;
pub use config::RelayConfig;
pub use connection::{
    ConnectionManager, ConnectionNotice, ConnectionState, SocketHandle, StateChange, Transport,
};
pub use dispatcher::{Decoded, Dispatched, MessageDispatcher};
pub use error::{
    ConfigurationError, ConnectionError, ConnectionErrorKind, RelayError, Result,
};
pub use event::{LiveEvent, MessageType};
pub use gift_streak::{GiftStreakEntry, GiftStreakEvent, GiftStreakTracker, StreakKey};
pub use like_threshold::{LikeMilestone, LikeThresholdTracker, MAX_MILESTONES_PER_EVENT};
pub use message::{
    ChatMessage, FollowMessage, GiftMessage, LikeMessage, RankedViewer, RoomUserMessage,
    ShareMessage, SubscribeMessage, UserInfo,
};
pub use queue::{InboundEnvelope, InboundReceiver, InboundSender, SessionId, SocketEvents, SocketSignal};
pub use websocket::WebSocketTransport;
