//! WebSocket connection and event loop.
//!
//! This module owns one duplex connection to the remote service,
//! including request/response correlation and event routing.
//!
//! # Event Loop
//!
//! The connection spawns a tokio task that handles:
//!
//! - Incoming frames from the server (responses, events)
//! - Outgoing request frames from the client API
//! - Correlation-first routing: a frame whose id matches a pending
//!   request of this connection's epoch completes it and is never
//!   delivered to generic dispatch
//! - Lifecycle notifications to the client router, tagged with the
//!   connection epoch

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::Epoch;
use crate::protocol::{InboundFrame, RequestFrame, ServerEvent};

use super::correlation::PendingRequests;

// ============================================================================
// Types
// ============================================================================

/// Client-side WebSocket stream type.
type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Outbound half of the split stream.
type WsSink = futures_util::stream::SplitSink<WsStream, Message>;

// ============================================================================
// SessionEvent
// ============================================================================

/// Notification from a connection's event loop to the client router.
///
/// Every variant carries the epoch of the emitting connection so the
/// router can ignore notifications from superseded connections.
#[derive(Debug)]
pub(crate) enum SessionEvent {
    /// An uncorrelated server message.
    Inbound {
        /// Emitting connection epoch.
        epoch: Epoch,
        /// Classified event.
        event: ServerEvent,
    },

    /// The connection closed. Emitted exactly once per open session.
    Closed {
        /// Emitting connection epoch.
        epoch: Epoch,
    },

    /// The underlying transport reported an error.
    TransportError {
        /// Emitting connection epoch.
        epoch: Epoch,
        /// Underlying error description.
        message: String,
    },
}

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Send a request frame.
    Send {
        /// Frame to serialize and transmit.
        frame: RequestFrame,
    },
    /// Close the connection.
    Close,
}

// ============================================================================
// Connection
// ============================================================================

/// One open duplex connection to the remote service.
///
/// Cheap to clone; all operations are non-blocking sends to the
/// internal event loop task.
#[derive(Clone, Debug)]
pub(crate) struct Connection {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    /// Epoch assigned to this connection attempt.
    epoch: Epoch,
}

impl Connection {
    /// Establishes a connection and spawns its event loop.
    ///
    /// The WebSocket handshake is bounded by `connect_timeout`.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if the handshake does not
    ///   complete in time
    /// - [`Error::Connection`] if the dial or upgrade fails
    pub(crate) async fn open(
        url: &Url,
        epoch: Epoch,
        pending: Arc<Mutex<PendingRequests>>,
        events_tx: mpsc::UnboundedSender<SessionEvent>,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let dial = connect_async(url.as_str());
        let (ws_stream, _) = timeout(connect_timeout, dial)
            .await
            .map_err(|_| Error::connection_timeout(connect_timeout.as_millis() as u64))?
            .map_err(|e| Error::connection(e.to_string()))?;

        debug!(%url, %epoch, "WebSocket connection established");

        let (command_tx, command_rx) = mpsc::unbounded_channel();

        tokio::spawn(Self::run_event_loop(
            ws_stream, command_rx, epoch, pending, events_tx,
        ));

        Ok(Self { command_tx, epoch })
    }

    /// Returns this connection's epoch.
    #[inline]
    #[must_use]
    pub(crate) fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Returns `true` while the event loop is alive.
    #[inline]
    #[must_use]
    pub(crate) fn is_open(&self) -> bool {
        !self.command_tx.is_closed()
    }

    /// Enqueues a request frame for transmission.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] once the event loop has
    /// terminated.
    pub(crate) fn send(&self, frame: RequestFrame) -> Result<()> {
        self.command_tx
            .send(ConnectionCommand::Send { frame })
            .map_err(|_| Error::NotConnected)
    }

    /// Requests a graceful close. Idempotent.
    pub(crate) fn close(&self) {
        let _ = self.command_tx.send(ConnectionCommand::Close);
    }

    /// Event loop that handles WebSocket I/O.
    async fn run_event_loop(
        ws_stream: WsStream,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        epoch: Epoch,
        pending: Arc<Mutex<PendingRequests>>,
        events_tx: mpsc::UnboundedSender<SessionEvent>,
    ) {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                // Incoming frames from the server
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            Self::handle_incoming(&text, epoch, &pending, &events_tx);
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!(%epoch, "WebSocket closed by remote");
                            break;
                        }

                        Some(Err(e)) => {
                            warn!(%epoch, error = %e, "WebSocket error");
                            let _ = events_tx.send(SessionEvent::TransportError {
                                epoch,
                                message: e.to_string(),
                            });
                            break;
                        }

                        None => {
                            debug!(%epoch, "WebSocket stream ended");
                            break;
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                // Commands from the client API
                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send { frame }) => {
                            Self::handle_send(frame, epoch, &mut ws_write, &pending).await;
                        }

                        Some(ConnectionCommand::Close) => {
                            debug!(%epoch, "Close command received");
                            let _ = ws_write.close().await;
                            break;
                        }

                        None => {
                            debug!(%epoch, "Command channel closed");
                            break;
                        }
                    }
                }
            }
        }

        // Fail requests still in flight on this epoch, then announce
        // the close exactly once.
        let failed = pending.lock().fail_epoch(epoch);
        if failed > 0 {
            debug!(%epoch, count = failed, "Failed pending requests on close");
        }

        let _ = events_tx.send(SessionEvent::Closed { epoch });
        debug!(%epoch, "Event loop terminated");
    }

    /// Routes one incoming text frame.
    ///
    /// Correlation is checked first; a frame that completes a pending
    /// request is never delivered to generic dispatch. Malformed
    /// frames are dropped with a logged side effect.
    fn handle_incoming(
        text: &str,
        epoch: Epoch,
        pending: &Arc<Mutex<PendingRequests>>,
        events_tx: &mpsc::UnboundedSender<SessionEvent>,
    ) {
        let frame = match InboundFrame::decode(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(%epoch, error = %e, "Dropping malformed frame");
                return;
            }
        };

        if let Some(id) = frame.correlation_id() {
            let outcome = frame.response_outcome();
            if pending.lock().complete(&id, epoch, outcome) {
                trace!(%id, "Completed pending request");
                return;
            }
            trace!(%id, "Unmatched correlation id, falling through to dispatch");
        }

        let event = ServerEvent::classify(frame);
        let _ = events_tx.send(SessionEvent::Inbound { epoch, event });
    }

    /// Serializes and transmits one request frame.
    async fn handle_send(
        frame: RequestFrame,
        epoch: Epoch,
        ws_write: &mut WsSink,
        pending: &Arc<Mutex<PendingRequests>>,
    ) {
        let message_id = frame.message_id.clone();

        let wire = match frame.encode() {
            Ok(wire) => wire,
            Err(e) => {
                pending.lock().complete(&message_id, epoch, Err(e));
                return;
            }
        };

        if let Err(e) = ws_write.send(Message::Text(wire.into())).await {
            pending.lock().complete(
                &message_id,
                epoch,
                Err(Error::connection(e.to_string())),
            );
            return;
        }

        trace!(%message_id, "Request sent");
    }
}

// ============================================================================
// Tests
// ============================================================================
