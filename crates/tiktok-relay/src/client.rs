//! The relay client: one instance per live stream being watched.
//!
//! [`RelayClient`] wires the pipeline together:
//!
//! ```text
//! socket task -> inbound queue -> tick: connection manager -> dispatcher
//!             -> event bus -> gift streak / like threshold trackers -> bus
//! ```
//!
//! Everything after the queue runs inside [`RelayClient::tick`], so
//! listeners, trackers and connection state are only ever touched from the
//! caller's thread. Hosts with their own frame loop call `tick` once per
//! frame; others use [`RelayClient::run`].

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::bus::EventBus;
use crate::config::RelayConfig;
use crate::connection::{ConnectionManager, ConnectionNotice, ConnectionState, Transport};
use crate::dispatcher::{Dispatched, MessageDispatcher};
use crate::error::Result;
use crate::event::LiveEvent;
use crate::gift_streak::GiftStreakTracker;
use crate::like_threshold::LikeThresholdTracker;
use crate::queue::{InboundReceiver, inbound_queue};
use crate::websocket::WebSocketTransport;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);
const CLOSE_POLL: Duration = Duration::from_millis(10);

pub struct RelayClient {
    manager: ConnectionManager,
    inbound: InboundReceiver,
    dispatcher: MessageDispatcher,
    bus: EventBus,
    gift_streaks: GiftStreakTracker,
    likes: LikeThresholdTracker,
}

impl RelayClient {
    /// Create a client that connects with [`WebSocketTransport`].
    pub fn new(config: RelayConfig) -> Result<Self> {
        Self::with_transport(config, Arc::new(WebSocketTransport::new()))
    }

    /// Create a client over a custom transport.
    ///
    /// Fails if the construction-time settings are invalid. Credentials are
    /// checked on each connect instead.
    pub fn with_transport(config: RelayConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        let (tx, rx) = inbound_queue();
        Ok(Self {
            dispatcher: MessageDispatcher::new(config.verbose_logging),
            gift_streaks: GiftStreakTracker::new(config.max_log_items),
            likes: LikeThresholdTracker::new(config.like_threshold),
            bus: EventBus::new(),
            inbound: rx,
            manager: ConnectionManager::new(config, transport, tx),
        })
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Listener registries, for subscribing and unsubscribing.
    pub fn bus_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    pub fn is_connected(&self) -> bool {
        self.manager.is_connected()
    }

    pub fn config(&self) -> &RelayConfig {
        self.manager.config()
    }

    pub fn connect(&mut self) -> Result<()> {
        let result = self.manager.connect();
        self.flush_notices();
        result
    }

    pub fn disconnect(&mut self) {
        self.manager.disconnect();
        self.flush_notices();
    }

    pub fn reconnect(&mut self) -> Result<()> {
        let result = self.manager.reconnect();
        self.flush_notices();
        result
    }

    /// Change the target username; applies on the next connect.
    pub fn set_username(&mut self, username: impl Into<String>) {
        self.manager.set_username(username);
    }

    pub fn set_verbose_logging(&mut self, verbose: bool) {
        self.dispatcher.set_verbose(verbose);
    }

    /// Close the socket without waiting for the close to be reported and
    /// without reconnecting.
    pub fn shutdown(&mut self) {
        self.manager.shutdown();
        self.flush_notices();
    }

    pub fn gift_streaks(&self) -> &GiftStreakTracker {
        &self.gift_streaks
    }

    pub fn likes(&self) -> &LikeThresholdTracker {
        &self.likes
    }

    /// Forget every user's cumulative like total.
    pub fn reset_likes(&mut self) {
        self.likes.reset_all();
    }

    /// Number of socket signals waiting for the next tick.
    pub fn pending(&self) -> usize {
        self.inbound.len()
    }

    /// Drain the inbound queue and route everything in it.
    ///
    /// Returns the number of queued signals processed.
    pub fn tick(&mut self) -> usize {
        let batch = self.inbound.drain_all();
        let processed = batch.len();

        for envelope in batch {
            if let Some(payload) = self.manager.handle_signal(envelope) {
                self.route(&payload);
            }
            self.flush_notices();
        }

        if processed > 0 {
            trace!(processed, "Tick complete");
        }
        processed
    }

    /// Tick on a fixed interval until `cancel` fires, then disconnect.
    pub async fn run(&mut self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.tick();
                }
            }
        }

        debug!("Relay client loop cancelled");
        self.tick();
        self.disconnect_gracefully(CLOSE_TIMEOUT).await;
    }

    /// Disconnect and keep ticking until the close is reported, falling back
    /// to [`shutdown`](Self::shutdown) after `timeout`.
    pub async fn disconnect_gracefully(&mut self, timeout: Duration) {
        if self.state() == ConnectionState::Disconnected {
            return;
        }
        self.disconnect();

        let deadline = Instant::now() + timeout;
        while self.state() != ConnectionState::Disconnected && Instant::now() < deadline {
            tokio::time::sleep(CLOSE_POLL).await;
            self.tick();
        }

        if self.state() != ConnectionState::Disconnected {
            warn!(timeout_ms = timeout.as_millis() as u64, "Close not confirmed in time");
            self.shutdown();
        }
    }

    fn route(&mut self, payload: &str) {
        let event = match self.dispatcher.dispatch(payload) {
            Some(Dispatched::Event(event)) => event,
            Some(Dispatched::ServerError(err)) => {
                self.bus.connection_error.emit(&err);
                return;
            }
            None => return,
        };

        self.bus.publish(&event);

        match &event {
            LiveEvent::Gift(gift) => {
                for update in self.gift_streaks.record(gift) {
                    self.bus.gift_streak.emit(&update);
                }
            }
            LiveEvent::Like(like) => {
                for milestone in self.likes.record(like) {
                    self.bus.like_milestone.emit(&milestone);
                }
            }
            _ => {}
        }
    }

    fn flush_notices(&mut self) {
        for notice in self.manager.take_notices() {
            match notice {
                ConnectionNotice::StateChanged(change) => self.bus.state_change.emit(&change),
                ConnectionNotice::ConnectionError(err) => self.bus.connection_error.emit(&err),
                ConnectionNotice::ConfigurationError(err) => {
                    self.bus.configuration_error.emit(&err)
                }
            }
        }
    }
}
