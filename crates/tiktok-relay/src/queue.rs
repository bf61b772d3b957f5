//! Inbound queue between the socket task and the consumer tick.
//!
//! This is the only cross-thread boundary in the pipeline. The socket side
//! enqueues without parsing; the consumer drains everything that is pending
//! once per tick, in arrival order. The queue is unbounded and never drops.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::trace;

/// Identifies one socket session of a connection manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub(crate) u64);

impl SessionId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Socket callback delivered to the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketSignal {
    /// The socket opened and the handshake frame was sent.
    Opened,
    /// A raw text payload.
    Message(String),
    /// The socket reported an error.
    Error(String),
    /// The socket closed. The reason is `None` or empty for a clean close.
    Closed { reason: Option<String> },
}

/// One queued socket callback.
#[derive(Debug, Clone)]
pub struct InboundEnvelope {
    pub session: SessionId,
    /// Monotonic across all producers of one queue.
    pub arrival_order: u64,
    pub received_at: DateTime<Utc>,
    pub signal: SocketSignal,
}

/// Create a connected producer/consumer pair.
pub fn inbound_queue() -> (InboundSender, InboundReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        InboundSender {
            tx,
            next_seq: Arc::new(Mutex::new(0)),
        },
        InboundReceiver { rx },
    )
}

/// Producer end. Cheap to clone; one clone per session.
#[derive(Debug, Clone)]
pub struct InboundSender {
    tx: mpsc::UnboundedSender<InboundEnvelope>,
    next_seq: Arc<Mutex<u64>>,
}

impl InboundSender {
    /// Push a signal. Returns `false` once the consumer is gone.
    pub fn enqueue(&self, session: SessionId, signal: SocketSignal) -> bool {
        // Sequence assignment and send happen under one lock so that
        // arrival_order matches queue order across producers.
        let mut seq = self.next_seq.lock();
        let envelope = InboundEnvelope {
            session,
            arrival_order: *seq,
            received_at: Utc::now(),
            signal,
        };
        if self.tx.send(envelope).is_err() {
            trace!(%session, "inbound queue closed, dropping signal");
            return false;
        }
        *seq += 1;
        true
    }

    /// Bind this producer to a session for handing to a transport.
    pub fn for_session(&self, session: SessionId) -> SocketEvents {
        SocketEvents {
            session,
            sender: self.clone(),
        }
    }
}

/// Consumer end, owned by the tick loop.
#[derive(Debug)]
pub struct InboundReceiver {
    rx: mpsc::UnboundedReceiver<InboundEnvelope>,
}

impl InboundReceiver {
    /// Take everything pending right now, oldest first.
    ///
    /// Items enqueued while draining are left for the next tick, so one
    /// drain is bounded by the backlog at call time.
    pub fn drain_all(&mut self) -> Vec<InboundEnvelope> {
        let pending = self.rx.len();
        let mut batch = Vec::with_capacity(pending);
        while batch.len() < pending {
            match self.rx.try_recv() {
                Ok(envelope) => batch.push(envelope),
                Err(_) => break,
            }
        }
        batch
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Socket callbacks for one session, as seen by a [`Transport`](crate::Transport).
#[derive(Debug, Clone)]
pub struct SocketEvents {
    session: SessionId,
    sender: InboundSender,
}

impl SocketEvents {
    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn opened(&self) -> bool {
        self.sender.enqueue(self.session, SocketSignal::Opened)
    }

    pub fn message(&self, payload: impl Into<String>) -> bool {
        self.sender
            .enqueue(self.session, SocketSignal::Message(payload.into()))
    }

    pub fn error(&self, message: impl Into<String>) -> bool {
        self.sender
            .enqueue(self.session, SocketSignal::Error(message.into()))
    }

    pub fn closed(&self, reason: Option<String>) -> bool {
        self.sender
            .enqueue(self.session, SocketSignal::Closed { reason })
    }
}
