//! Framed message channel and event loop.
//!
//! This module owns the client stream: it frames outgoing messages,
//! decodes incoming ones, correlates responses with locally issued
//! requests and routes inbound requests and events to a [`MessageSink`].
//!
//! # Event Loop
//!
//! The channel spawns a tokio task that handles:
//!
//! - Incoming bytes from the client (decoded by [`FrameParser`])
//! - Outgoing messages from the Rust API and from answered requests
//! - Request/response correlation by sequence number
//! - Dispatch of inbound requests to the sink, one task per request

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};
use crate::protocol::{Event, ProtocolMessage, Request, Response};

use super::framing::{self, FrameParser};

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for locally issued requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Read buffer size.
const READ_CHUNK: usize = 8 * 1024;

// ============================================================================
// Types
// ============================================================================

/// Map of request sequence numbers to response channels.
type CorrelationMap = FxHashMap<i64, oneshot::Sender<Result<Response>>>;

// ============================================================================
// MessageSink
// ============================================================================

/// Receiver of inbound requests and events.
///
/// Supplied by the channel's owner. The channel writes whatever response the
/// request future yields; it never handles a request itself.
pub trait MessageSink: Send + Sync + 'static {
    /// Handles an inbound request and produces its response.
    fn on_request(&self, request: Request) -> BoxFuture<'static, Response>;

    /// Handles an inbound event.
    fn on_event(&self, event: Event);
}

// ============================================================================
// ChannelCommand
// ============================================================================

/// Internal commands for the event loop.
enum ChannelCommand {
    /// Write a message, optionally registering a response continuation.
    Send {
        message: ProtocolMessage,
        response_tx: Option<oneshot::Sender<Result<Response>>>,
    },
    /// Remove a timed-out correlation entry.
    RemoveCorrelation(i64),
    /// Shutdown the channel.
    Shutdown,
}

// ============================================================================
// Outbox
// ============================================================================

/// Stamps outgoing messages and hands them to the event loop.
///
/// Sequence assignment and enqueueing happen under one lock so the wire
/// order always matches sequence order.
#[derive(Clone)]
struct Outbox {
    command_tx: mpsc::UnboundedSender<ChannelCommand>,
    next_seq: Arc<Mutex<i64>>,
}

impl Outbox {
    fn post(
        &self,
        mut message: ProtocolMessage,
        response_tx: Option<oneshot::Sender<Result<Response>>>,
    ) -> Result<i64> {
        let mut next_seq = self.next_seq.lock();
        let seq = *next_seq;
        message.set_seq(seq);

        self.command_tx
            .send(ChannelCommand::Send {
                message,
                response_tx,
            })
            .map_err(|_| Error::ConnectionClosed)?;

        *next_seq += 1;
        Ok(seq)
    }
}

// ============================================================================
// Channel
// ============================================================================

/// Framed JSON channel to the debugging client.
///
/// # Thread Safety
///
/// `Channel` is `Send + Sync` and cheap to clone.
#[derive(Clone)]
pub struct Channel {
    /// Outgoing message queue.
    outbox: Outbox,
    /// Correlation map (shared with event loop).
    correlation: Arc<Mutex<CorrelationMap>>,
    /// Timeout used by [`Channel::send_request`].
    request_timeout: Duration,
}

impl Channel {
    /// Creates a channel over a duplex byte stream.
    ///
    /// Spawns the event loop task internally, so this must be called from
    /// within a tokio runtime.
    pub fn new<R, W>(reader: R, writer: W, sink: Arc<dyn MessageSink>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let correlation = Arc::new(Mutex::new(CorrelationMap::default()));
        let outbox = Outbox {
            command_tx,
            next_seq: Arc::new(Mutex::new(1)),
        };

        tokio::spawn(Self::run_event_loop(
            reader,
            writer,
            command_rx,
            outbox.clone(),
            Arc::clone(&correlation),
            sink,
        ));

        Self {
            outbox,
            correlation,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Sets the timeout used by [`Channel::send_request`].
    #[inline]
    #[must_use]
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Sends a request to the client and waits for its response with the
    /// channel's request timeout (30s unless configured).
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the channel is closed
    /// - [`Error::RequestTimeout`] if no response arrives in time
    pub async fn send_request(&self, command: &str, arguments: Value) -> Result<Response> {
        self.send_request_with_timeout(command, arguments, self.request_timeout)
            .await
    }

    /// Sends a request to the client and waits with a custom timeout.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the channel is closed
    /// - [`Error::RequestTimeout`] if no response arrives in time
    pub async fn send_request_with_timeout(
        &self,
        command: &str,
        arguments: Value,
        request_timeout: Duration,
    ) -> Result<Response> {
        let (response_tx, response_rx) = oneshot::channel();
        let message = ProtocolMessage::Request(Request::new(command, arguments));
        let seq = self.outbox.post(message, Some(response_tx))?;

        match timeout(request_timeout, response_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                let _ = self
                    .outbox
                    .command_tx
                    .send(ChannelCommand::RemoveCorrelation(seq));

                Err(Error::request_timeout(
                    seq,
                    request_timeout.as_millis() as u64,
                ))
            }
        }
    }

    /// Sends an event to the client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the channel is closed.
    pub fn send_event(&self, event: &str, body: Value) -> Result<()> {
        self.outbox
            .post(ProtocolMessage::Event(Event::new(event, body)), None)
            .map(|_| ())
    }

    /// Returns the number of outstanding locally issued requests.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.correlation.lock().len()
    }

    /// Shuts down the channel.
    pub fn shutdown(&self) {
        let _ = self.outbox.command_tx.send(ChannelCommand::Shutdown);
    }

    /// Event loop that handles stream I/O.
    async fn run_event_loop<R, W>(
        mut reader: R,
        mut writer: W,
        mut command_rx: mpsc::UnboundedReceiver<ChannelCommand>,
        outbox: Outbox,
        correlation: Arc<Mutex<CorrelationMap>>,
        sink: Arc<dyn MessageSink>,
    ) where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let mut parser = FrameParser::new();
        let mut chunk = vec![0u8; READ_CHUNK];

        loop {
            tokio::select! {
                // Incoming bytes from the client
                read = reader.read(&mut chunk) => {
                    match read {
                        Ok(0) => {
                            debug!("Client stream ended");
                            break;
                        }

                        Ok(n) => {
                            for frame in parser.feed(&chunk[..n]) {
                                match frame {
                                    Ok(value) => Self::handle_incoming_message(
                                        value,
                                        &outbox,
                                        &correlation,
                                        &sink,
                                    ),
                                    Err(e) => warn!(error = %e, "Dropped malformed message"),
                                }
                            }
                        }

                        Err(e) => {
                            error!(error = %e, "Client stream error");
                            break;
                        }
                    }
                }

                // Outgoing messages
                command = command_rx.recv() => {
                    match command {
                        Some(ChannelCommand::Send { message, response_tx }) => {
                            Self::handle_send_command(
                                message,
                                response_tx,
                                &mut writer,
                                &correlation,
                            ).await;
                        }

                        Some(ChannelCommand::RemoveCorrelation(seq)) => {
                            correlation.lock().remove(&seq);
                            debug!(seq, "Removed timed-out correlation");
                        }

                        Some(ChannelCommand::Shutdown) => {
                            debug!("Shutdown command received");
                            let _ = writer.shutdown().await;
                            break;
                        }

                        None => {
                            debug!("Command channel closed");
                            break;
                        }
                    }
                }
            }
        }

        Self::fail_pending_requests(&correlation);

        debug!("Event loop terminated");
    }

    /// Routes one decoded message.
    fn handle_incoming_message(
        value: Value,
        outbox: &Outbox,
        correlation: &Arc<Mutex<CorrelationMap>>,
        sink: &Arc<dyn MessageSink>,
    ) {
        let message = match ProtocolMessage::deserialize(&value) {
            Ok(message) => message,
            Err(e) => {
                Self::reject_invalid_message(&value, &e, outbox);
                return;
            }
        };

        match message {
            ProtocolMessage::Response(response) => {
                let tx = correlation.lock().remove(&response.request_seq);

                if let Some(tx) = tx {
                    let _ = tx.send(Ok(response));
                } else {
                    warn!(
                        request_seq = response.request_seq,
                        command = %response.command,
                        "Response for unknown request"
                    );
                }
            }

            ProtocolMessage::Request(request) => {
                trace!(seq = request.seq, command = %request.command, "Request received");

                let reply = sink.on_request(request);
                let outbox = outbox.clone();
                tokio::spawn(async move {
                    let response = reply.await;
                    if let Err(e) = outbox.post(ProtocolMessage::Response(response), None) {
                        debug!(error = %e, "Dropped response after channel close");
                    }
                });
            }

            ProtocolMessage::Event(event) => {
                trace!(event = %event.event, "Event received");
                sink.on_event(event);
            }
        }
    }

    /// Answers a structurally invalid request with a failed response.
    fn reject_invalid_message(value: &Value, err: &serde_json::Error, outbox: &Outbox) {
        if value.get("type").and_then(Value::as_str) != Some("request") {
            warn!(error = %err, "Failed to parse incoming message");
            return;
        }

        let request_seq = value.get("seq").and_then(Value::as_i64).unwrap_or_default();
        let command = value
            .get("command")
            .and_then(Value::as_str)
            .unwrap_or("unknown");

        warn!(request_seq, command, error = %err, "Invalid request");

        let response = Response::failure(request_seq, command, format!("Invalid request: {err}"));
        let _ = outbox.post(ProtocolMessage::Response(response), None);
    }

    /// Writes one framed message.
    async fn handle_send_command<W>(
        message: ProtocolMessage,
        response_tx: Option<oneshot::Sender<Result<Response>>>,
        writer: &mut W,
        correlation: &Arc<Mutex<CorrelationMap>>,
    ) where
        W: AsyncWrite + Unpin,
    {
        let seq = message.seq();

        let frame = match framing::encode(&message) {
            Ok(frame) => frame,
            Err(e) => {
                if let Some(tx) = response_tx {
                    let _ = tx.send(Err(e));
                } else {
                    error!(seq, error = %e, "Failed to encode message");
                }
                return;
            }
        };

        // Store correlation before sending
        if let Some(tx) = response_tx {
            correlation.lock().insert(seq, tx);
        }

        let written = match writer.write_all(&frame).await {
            Ok(()) => writer.flush().await,
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            warn!(seq, error = %e, "Failed to write message");
            if let Some(tx) = correlation.lock().remove(&seq) {
                let _ = tx.send(Err(Error::Io(e)));
            }
            return;
        }

        trace!(seq, name = message.name(), "Message sent");
    }

    /// Fails all pending requests with `ConnectionClosed`.
    fn fail_pending_requests(correlation: &Arc<Mutex<CorrelationMap>>) {
        let pending: Vec<_> = correlation.lock().drain().collect();
        let count = pending.len();

        for (_, tx) in pending {
            let _ = tx.send(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(count, "Failed pending requests on shutdown");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
