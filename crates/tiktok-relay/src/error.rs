//! Relay error types.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Errors that can occur while connecting to or consuming the relay.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Missing or placeholder configuration; no socket was opened.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Transport-level failures (connect, socket error, close reason)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Malformed payloads or recognized messages whose fields failed to decode
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RelayError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a protocol error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Whether this error is part of the public event surface
    /// (configuration and connection errors are; protocol errors are log-only).
    pub fn is_public(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Connection(_))
    }
}

/// Reasons `connect` refuses to open a socket, or a config fails validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("API key is not set; configure a relay API key before connecting")]
    MissingApiKey,

    #[error("username is the reserved placeholder '{0}'; set a real username before connecting")]
    DefaultUsername(String),

    #[error("username is empty")]
    EmptyUsername,

    #[error("invalid relay base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("invalid setting '{name}': {reason}")]
    InvalidSetting { name: &'static str, reason: String },
}

impl ConfigurationError {
    pub(crate) fn invalid_setting(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            name,
            reason: reason.into(),
        }
    }
}

/// Where a [`ConnectionError`] originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionErrorKind {
    /// Opening the socket failed before any callback was registered.
    Connect,
    /// The socket reported an error.
    Socket,
    /// The socket closed with a non-empty reason.
    Closed,
    /// The relay sent an error notification in-band.
    Server,
}

impl fmt::Display for ConnectionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connect => "connect",
            Self::Socket => "socket",
            Self::Closed => "closed",
            Self::Server => "server",
        };
        f.write_str(s)
    }
}

/// A transport or relay failure surfaced to listeners.
///
/// Never fatal: the connection manager returns to `Disconnected` and stays connectable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
}

impl ConnectionError {
    pub fn new(kind: ConnectionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind, self.message)
    }
}

impl From<ConnectionError> for RelayError {
    fn from(err: ConnectionError) -> Self {
        Self::Connection(err.to_string())
    }
}
