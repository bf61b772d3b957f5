//! Message dispatcher.
//!
//! Decodes one raw relay payload into a [`LiveEvent`] keyed by its `type`
//! discriminator. Payloads are decoded strictly first; the case-insensitive
//! "error" text heuristic only applies to payloads that did not decode into a
//! recognized message, so a chat comment that happens to contain the word
//! "error" is still routed as chat. The text heuristic is deliberately the
//! fallback step rather than the first one.
//!
//! Nothing here fails past its own boundary: malformed input becomes a log
//! line and `None`.

use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::{ConnectionError, ConnectionErrorKind, RelayError, Result};
use crate::event::{LiveEvent, MessageType};

/// Outcome of decoding one payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// A recognized, fully decoded message.
    Event(LiveEvent),
    /// An out-of-band error notification from the relay.
    ServerError(String),
    /// Valid JSON with an unrecognized or missing `type`.
    Unknown { kind: Option<String> },
}

/// What the dispatcher forwards to the rest of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatched {
    Event(LiveEvent),
    ServerError(ConnectionError),
}

/// Decode a payload without logging.
///
/// Returns `Err` for malformed JSON and for recognized types whose fields
/// fail to decode.
pub fn decode(payload: &str) -> Result<Decoded> {
    let value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(e) => {
            if mentions_error(payload) {
                return Ok(Decoded::ServerError(payload.trim().to_string()));
            }
            return Err(RelayError::protocol(format!("invalid JSON: {e}")));
        }
    };

    let kind = value.get("type").and_then(Value::as_str);

    if kind.is_some_and(|k| k.eq_ignore_ascii_case("error")) {
        return Ok(Decoded::ServerError(server_error_text(&value, payload)));
    }

    match kind.map(MessageType::from_str) {
        Some(Ok(message_type)) => decode_typed(message_type, value).map(Decoded::Event),
        _ if mentions_error(payload) => Ok(Decoded::ServerError(server_error_text(&value, payload))),
        _ => Ok(Decoded::Unknown {
            kind: kind.map(str::to_string),
        }),
    }
}

fn decode_typed(message_type: MessageType, value: Value) -> Result<LiveEvent> {
    Ok(match message_type {
        MessageType::Gift => LiveEvent::Gift(from_value(message_type, value)?),
        MessageType::RoomUser => LiveEvent::RoomUser(from_value(message_type, value)?),
        MessageType::Like => LiveEvent::Like(from_value(message_type, value)?),
        MessageType::Chat => LiveEvent::Chat(from_value(message_type, value)?),
        MessageType::Share => LiveEvent::Share(from_value(message_type, value)?),
        MessageType::Follow => LiveEvent::Follow(from_value(message_type, value)?),
        MessageType::Subscribe => LiveEvent::Subscribe(from_value(message_type, value)?),
    })
}

fn from_value<T: DeserializeOwned>(message_type: MessageType, value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| RelayError::protocol(format!("failed to decode {message_type} message: {e}")))
}

fn mentions_error(payload: &str) -> bool {
    payload.to_ascii_lowercase().contains("error")
}

/// Prefer an explicit `message`/`error` string over the raw payload.
fn server_error_text(value: &Value, payload: &str) -> String {
    ["message", "error"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| payload.trim().to_string())
}

/// Routes decoded payloads and logs everything that is dropped.
#[derive(Debug, Clone, Default)]
pub struct MessageDispatcher {
    verbose: bool,
}

impl MessageDispatcher {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Decode one payload. `None` means the payload was dropped.
    pub fn dispatch(&self, payload: &str) -> Option<Dispatched> {
        if self.verbose {
            debug!(payload, "Processing relay message");
        }

        match decode(payload) {
            Ok(Decoded::Event(event)) => Some(Dispatched::Event(event)),
            Ok(Decoded::ServerError(message)) => {
                error!(%message, "Relay reported an error");
                Some(Dispatched::ServerError(ConnectionError::new(
                    ConnectionErrorKind::Server,
                    message,
                )))
            }
            Ok(Decoded::Unknown { kind }) => {
                if self.verbose {
                    debug!(kind = kind.as_deref().unwrap_or("<none>"), payload, "Ignoring unknown relay message");
                }
                None
            }
            Err(e) => {
                warn!(error = %e, "Dropping relay message");
                None
            }
        }
    }
}
