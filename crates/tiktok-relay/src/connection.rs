//! Connection lifecycle.
//!
//! [`ConnectionManager`] owns the single live session and its four-state
//! lifecycle. It never touches the network directly: a [`Transport`] opens the
//! socket and reports open/message/error/close back through the inbound queue
//! as [`SocketSignal`]s, which the consumer tick feeds into
//! [`ConnectionManager::handle_signal`]. Every state transition therefore
//! happens on the consumer side.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};
use tracing::{debug, error, info, trace, warn};

use crate::config::RelayConfig;
use crate::error::{ConfigurationError, ConnectionError, ConnectionErrorKind, Result};
use crate::queue::{InboundEnvelope, InboundSender, SessionId, SocketEvents, SocketSignal};

/// Lifecycle state of a [`ConnectionManager`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

/// A state transition, published on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateChange {
    pub from: ConnectionState,
    pub to: ConnectionState,
}

/// An open socket, as seen by the manager.
pub trait SocketHandle: Send {
    /// Request a graceful close. Completion is reported as a
    /// [`SocketSignal::Closed`] for the session.
    fn close(&mut self);
}

/// Opens sockets to the relay.
///
/// `open` must not block. The implementation sends `handshake` as the first
/// frame once the socket is open and then reports [`SocketEvents::opened`].
/// A failure after `open` returned is reported as an error followed by a
/// close.
pub trait Transport: Send + Sync {
    fn open(
        &self,
        url: &str,
        handshake: String,
        events: SocketEvents,
    ) -> Result<Box<dyn SocketHandle>>;
}

/// First frame sent on every session.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Handshake<'a> {
    api_key: &'a str,
    username: &'a str,
}

/// Something the manager wants the rest of the pipeline to publish.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionNotice {
    StateChanged(StateChange),
    ConnectionError(ConnectionError),
    ConfigurationError(ConfigurationError),
}

struct Session {
    id: SessionId,
    username: String,
    socket: Box<dyn SocketHandle>,
}

/// Owns the session and drives the connection state machine.
pub struct ConnectionManager {
    config: RelayConfig,
    transport: Arc<dyn Transport>,
    inbound: InboundSender,
    state: ConnectionState,
    session: Option<Session>,
    next_session: u64,
    reconnect_requested: bool,
    notices: Vec<ConnectionNotice>,
}

impl ConnectionManager {
    pub fn new(config: RelayConfig, transport: Arc<dyn Transport>, inbound: InboundSender) -> Self {
        Self {
            config,
            transport,
            inbound,
            state: ConnectionState::Disconnected,
            session: None,
            next_session: 1,
            reconnect_requested: false,
            notices: Vec::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Id of the live session, if a socket is open or opening.
    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    /// Username of the live session, which may differ from the configured one
    /// after [`set_username`](Self::set_username).
    pub fn session_username(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.username.as_str())
    }

    pub fn reconnect_requested(&self) -> bool {
        self.reconnect_requested
    }

    /// Change the target username. Takes effect on the next connect.
    pub fn set_username(&mut self, username: impl Into<String>) {
        self.config.username = username.into();
        debug!(username = %self.config.username, "Username updated");
    }

    /// Open a session.
    ///
    /// Redundant calls while connecting or connected are ignored. While
    /// disconnecting, the request is remembered and honored once the close
    /// completes. Invalid credentials fail without opening a socket.
    pub fn connect(&mut self) -> Result<()> {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Connected => {
                warn!(state = %self.state, "Connect ignored: already {}", self.state);
                return Ok(());
            }
            ConnectionState::Disconnecting => {
                debug!("Connect requested while disconnecting; will reconnect after close");
                self.reconnect_requested = true;
                return Ok(());
            }
            ConnectionState::Disconnected => {}
        }

        let url = match self
            .config
            .validate_credentials()
            .and_then(|()| self.config.endpoint_url())
        {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Refusing to connect");
                self.notices
                    .push(ConnectionNotice::ConfigurationError(e.clone()));
                return Err(e.into());
            }
        };

        let username = self.config.username.trim().to_string();
        let handshake = serde_json::to_string(&Handshake {
            api_key: self.config.api_key.trim(),
            username: &username,
        })?;

        let id = SessionId(self.next_session);
        self.next_session += 1;

        self.transition(ConnectionState::Connecting);
        info!(session = %id, %username, "Connecting to relay");

        match self
            .transport
            .open(&url, handshake, self.inbound.for_session(id))
        {
            Ok(socket) => {
                self.session = Some(Session {
                    id,
                    username,
                    socket,
                });
                Ok(())
            }
            Err(e) => {
                error!(session = %id, error = %e, "Failed to open relay socket");
                self.notices.push(ConnectionNotice::ConnectionError(
                    ConnectionError::new(ConnectionErrorKind::Connect, e.to_string()),
                ));
                self.transition(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    /// Close the session. Cancels any pending reconnect.
    pub fn disconnect(&mut self) {
        match self.state {
            ConnectionState::Disconnected => {
                warn!("Disconnect ignored: not connected");
            }
            ConnectionState::Disconnecting => {
                debug!("Disconnect already in progress");
                self.reconnect_requested = false;
            }
            ConnectionState::Connecting | ConnectionState::Connected => {
                self.reconnect_requested = false;
                self.begin_close();
            }
        }
    }

    /// Close the session if there is one, then connect again.
    pub fn reconnect(&mut self) -> Result<()> {
        match self.state {
            ConnectionState::Connected | ConnectionState::Connecting => {
                info!("Reconnecting");
                self.reconnect_requested = true;
                self.begin_close();
                if self.state == ConnectionState::Disconnected {
                    // No socket to wait for.
                    self.reconnect_requested = false;
                    return self.connect();
                }
                Ok(())
            }
            ConnectionState::Disconnecting => {
                self.reconnect_requested = true;
                Ok(())
            }
            ConnectionState::Disconnected => self.connect(),
        }
    }

    /// Tear down immediately without waiting for the close to be reported.
    pub fn shutdown(&mut self) {
        self.reconnect_requested = false;
        if let Some(mut session) = self.session.take() {
            debug!(session = %session.id, "Shutting down relay session");
            session.socket.close();
        }
        self.transition(ConnectionState::Disconnected);
    }

    /// Apply one socket signal. Returns the payload when the signal carries a
    /// message that should be dispatched.
    pub fn handle_signal(&mut self, envelope: InboundEnvelope) -> Option<String> {
        let InboundEnvelope {
            session, signal, ..
        } = envelope;

        if self.session_id() != Some(session) {
            trace!(%session, "Ignoring signal from stale session");
            return None;
        }

        match signal {
            SocketSignal::Message(payload) => return Some(payload),
            SocketSignal::Opened => self.on_open(session),
            SocketSignal::Error(message) => self.on_error(session, message),
            SocketSignal::Closed { reason } => self.on_close(session, reason),
        }
        None
    }

    /// Notices produced since the last call.
    pub fn take_notices(&mut self) -> Vec<ConnectionNotice> {
        std::mem::take(&mut self.notices)
    }

    fn on_open(&mut self, session: SessionId) {
        match self.state {
            ConnectionState::Connecting => {
                info!(%session, "Connected to relay");
                self.transition(ConnectionState::Connected);
            }
            ConnectionState::Disconnecting => {
                debug!(%session, "Socket opened while disconnecting");
            }
            state => {
                warn!(%session, %state, "Unexpected open signal");
            }
        }
    }

    fn on_error(&mut self, session: SessionId, message: String) {
        let kind = if self.state == ConnectionState::Connecting {
            ConnectionErrorKind::Connect
        } else {
            ConnectionErrorKind::Socket
        };
        error!(%session, %kind, %message, "Relay socket error");
        self.notices
            .push(ConnectionNotice::ConnectionError(ConnectionError::new(
                kind, message,
            )));
    }

    fn on_close(&mut self, session: SessionId, reason: Option<String>) {
        self.session = None;
        self.transition(ConnectionState::Disconnected);

        match reason.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
            Some(reason) => {
                warn!(%session, %reason, "Relay closed the connection");
                self.notices
                    .push(ConnectionNotice::ConnectionError(ConnectionError::new(
                        ConnectionErrorKind::Closed,
                        reason,
                    )));
            }
            None => info!(%session, "Relay connection closed"),
        }

        if self.reconnect_requested {
            self.reconnect_requested = false;
            // Failures are already published as notices.
            let _ = self.connect();
        }
    }

    fn begin_close(&mut self) {
        self.transition(ConnectionState::Disconnecting);
        match self.session.as_mut() {
            Some(session) => {
                debug!(session = %session.id, "Closing relay socket");
                session.socket.close();
            }
            None => {
                warn!("No socket to close; forcing disconnected state");
                self.transition(ConnectionState::Disconnected);
            }
        }
    }

    fn transition(&mut self, to: ConnectionState) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        debug!(%from, %to, "Connection state changed");
        self.notices
            .push(ConnectionNotice::StateChanged(StateChange { from, to }));
    }
}
