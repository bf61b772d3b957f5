//! WebSocket transport backed by tokio-tungstenite.

use futures::{SinkExt, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, error, info, trace, warn};

use crate::connection::{SocketHandle, Transport};
use crate::error::{RelayError, Result};
use crate::queue::SocketEvents;

/// Opens one tokio task per session on the given (or ambient) runtime.
#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport {
    runtime: Option<Handle>,
}

impl WebSocketTransport {
    /// Spawn onto the runtime that is current when `open` is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn onto a specific runtime, for callers outside of any runtime context.
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            runtime: Some(handle),
        }
    }
}

impl Transport for WebSocketTransport {
    fn open(
        &self,
        url: &str,
        handshake: String,
        events: SocketEvents,
    ) -> Result<Box<dyn SocketHandle>> {
        let runtime = match &self.runtime {
            Some(handle) => handle.clone(),
            None => Handle::try_current()
                .map_err(|e| RelayError::connection(format!("no tokio runtime available: {e}")))?,
        };

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = runtime.spawn(run_socket(url.to_string(), handshake, events, shutdown_rx));

        Ok(Box::new(WebSocketHandle {
            shutdown_tx: Some(shutdown_tx),
            task,
        }))
    }
}

/// Handle for one spawned socket task.
struct WebSocketHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SocketHandle for WebSocketHandle {
    fn close(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for WebSocketHandle {
    fn drop(&mut self) {
        // A requested close is left to finish its handshake.
        if self.shutdown_tx.is_some() {
            self.task.abort();
        }
    }
}

async fn run_socket(
    url: String,
    handshake: String,
    events: SocketEvents,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let session = events.session();
    info!(%session, %url, "Connecting to WebSocket");

    let connect_result = tokio::select! {
        result = connect_async(url.as_str()) => result,
        _ = &mut shutdown_rx => {
            debug!(%session, "Connect cancelled");
            events.closed(None);
            return;
        }
    };

    let mut stream = match connect_result {
        Ok((stream, _)) => stream,
        Err(e) => {
            warn!(%session, error = %e, "Connection failed");
            events.error(format!("failed to connect: {e}"));
            events.closed(None);
            return;
        }
    };

    if let Err(e) = stream.send(Message::text(handshake)).await {
        error!(%session, error = %e, "Handshake failed");
        events.error(format!("handshake failed: {e}"));
        events.closed(None);
        return;
    }
    events.opened();

    loop {
        tokio::select! {
            msg_opt = stream.next() => {
                match msg_opt {
                    Some(Ok(Message::Text(text))) => {
                        events.message(text.as_str());
                    }
                    Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                        Ok(text) => {
                            events.message(text);
                        }
                        Err(_) => trace!(%session, len = data.len(), "Ignoring non-UTF-8 binary frame"),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|f| f.reason.as_str().to_string())
                            .filter(|r| !r.is_empty());
                        info!(%session, reason = reason.as_deref().unwrap_or(""), "WebSocket closed by server");
                        events.closed(reason);
                        return;
                    }
                    // Pings are answered by tungstenite on the next read.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!(%session, error = %e, "WebSocket error");
                        events.error(e.to_string());
                        events.closed(None);
                        return;
                    }
                    None => {
                        warn!(%session, "WebSocket stream closed");
                        events.closed(None);
                        return;
                    }
                }
            }

            _ = &mut shutdown_rx => {
                if let Err(e) = stream.close(None).await {
                    debug!(%session, error = %e, "Close handshake failed");
                }
                events.closed(None);
                return;
            }
        }
    }
}
