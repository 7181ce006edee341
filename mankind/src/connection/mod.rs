//! WebSocket channel to the duel server.
//!
//! [`Connection::connect`] returns at once with a send handle and a stream
//! of [`ConnectionEvent`]s. A background task performs the handshake, then
//! owns the socket: it is the only writer, forwards outbound messages
//! handed to [`Connection::send`], and decodes every inbound frame. The
//! event stream always ends with exactly one `Closed` or `Failed`.

mod endpoint;

pub use endpoint::{
    DEFAULT_SERVER, Endpoint, InvalidPlayerId, MAX_PLAYER_ID_LEN, PlayerId, check_server_url,
};

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use mankind_core::protocol::{ClientMessage, ServerMessage};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::error::ProtocolError as WsProtocolError;
use tokio_tungstenite::tungstenite::{Error as WsError, Message, protocol::CloseFrame};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, trace, warn};

use crate::error::{ConnectionError, ProtocolError, SendError};
use crate::session::Outbound;

/// Default bound on the WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest excerpt of a malformed frame kept for diagnostics.
const MAX_RAW_EXCERPT: usize = 256;

// ============================================================================
// Events and state
// ============================================================================

/// Something that happened on the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The handshake completed; sends are now accepted.
    Opened,
    /// A well-formed server message.
    Message(ServerMessage),
    /// A frame that could not be decoded. The channel stays open.
    Malformed {
        /// The frame text (truncated).
        raw: String,
        /// Why it was rejected.
        error: ProtocolError,
    },
    /// The channel closed cleanly (by either side). Terminal.
    Closed {
        /// Close reason, as reported by the server or set locally.
        reason: String,
    },
    /// The channel could not be opened or broke. Terminal.
    Failed {
        /// What went wrong.
        error: ConnectionError,
    },
}

impl ConnectionEvent {
    /// Whether this event ends the stream.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed { .. } | Self::Failed { .. })
    }
}

/// Observable lifecycle of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// Handshake in flight.
    Connecting = 0,
    /// Sends are accepted.
    Open = 1,
    /// Closed or failed; nothing more will be sent.
    Closed = 2,
}

impl ConnectionState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Open,
            _ => Self::Closed,
        }
    }
}

/// Inbound side of a connection.
pub type ConnectionEvents = UnboundedReceiverStream<ConnectionEvent>;

/// Options for [`Connection::connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Bound on the WebSocket handshake.
    pub connect_timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

// ============================================================================
// Connection handle
// ============================================================================

/// Handle on a WebSocket channel.
///
/// Cheap to clone. When the last clone is dropped the channel is closed.
#[derive(Debug, Clone)]
pub struct Connection {
    state: Arc<AtomicU8>,
    outbound: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
    _guard: Arc<DropGuard>,
}

impl Connection {
    /// Starts connecting to `endpoint` on a background task.
    ///
    /// Must be called from within a tokio runtime. Handshake failures are
    /// reported on the returned stream, not here.
    #[must_use]
    pub fn connect(endpoint: &Endpoint, options: ConnectOptions) -> (Self, ConnectionEvents) {
        let state = Arc::new(AtomicU8::new(ConnectionState::Connecting as u8));
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let task = ChannelTask {
            url: endpoint.url(),
            options,
            state: Arc::clone(&state),
            outbound: outbound_rx,
            events: EventReporter { tx: events_tx },
            cancel: cancel.clone(),
        };
        tokio::spawn(task.run());

        let connection = Self {
            state,
            outbound: outbound_tx,
            _guard: Arc::new(cancel.clone().drop_guard()),
            cancel,
        };
        (connection, UnboundedReceiverStream::new(events_rx))
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Hands `message` to the socket writer.
    ///
    /// `Ok` means the writer accepted the message, not that it is on the
    /// wire. Accepted messages are flushed before a client-initiated close;
    /// if the server closes first they are lost with the connection.
    /// Nothing is queued on failure: the caller learns immediately that
    /// the message did not go out.
    ///
    /// # Errors
    ///
    /// [`SendError::NotReady`] before the handshake completes,
    /// [`SendError::Closed`] after the channel ended, or
    /// [`SendError::Encode`] if serialization fails.
    pub fn send(&self, message: &ClientMessage) -> Result<(), SendError> {
        match self.state() {
            ConnectionState::Connecting => return Err(SendError::NotReady),
            ConnectionState::Closed => return Err(SendError::Closed),
            ConnectionState::Open => {}
        }
        let text = message.to_json()?;
        self.outbound.send(text).map_err(|_| SendError::Closed)?;
        trace!(kind = message.kind(), "message handed to writer");
        Ok(())
    }

    /// Closes the channel from this side. Repeated calls do nothing.
    pub fn close(&self) {
        if !self.cancel.is_cancelled() {
            debug!("closing connection");
            self.cancel.cancel();
        }
    }
}

impl Outbound for Connection {
    fn send(&self, message: &ClientMessage) -> Result<(), SendError> {
        Self::send(self, message)
    }

    fn close(&self) {
        Self::close(self);
    }
}

// ============================================================================
// Background task
// ============================================================================

/// Sending side of the event stream. Consumed by its terminal event, so
/// the stream cannot end twice.
struct EventReporter {
    tx: mpsc::UnboundedSender<ConnectionEvent>,
}

impl EventReporter {
    fn emit(&self, event: ConnectionEvent) {
        if self.tx.send(event).is_err() {
            trace!("connection events receiver dropped");
        }
    }

    fn finish(self, terminal: ConnectionEvent) {
        debug_assert!(terminal.is_terminal());
        self.emit(terminal);
    }
}

struct ChannelTask {
    url: String,
    options: ConnectOptions,
    state: Arc<AtomicU8>,
    outbound: mpsc::UnboundedReceiver<String>,
    events: EventReporter,
    cancel: CancellationToken,
}

impl ChannelTask {
    async fn run(mut self) {
        debug!(url = %self.url, "connecting");
        let timeout = self.options.connect_timeout;
        let handshake = tokio::time::timeout(timeout, connect_async(self.url.as_str()));

        let result = tokio::select! {
            () = self.cancel.cancelled() => Err(ConnectionEvent::Closed {
                reason: "closed by client before the handshake completed".to_owned(),
            }),
            result = handshake => match result {
                Err(_) => Err(ConnectionEvent::Failed {
                    error: ConnectionError::Timeout {
                        url: self.url.clone(),
                        timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    },
                }),
                Ok(Err(e)) => Err(ConnectionEvent::Failed {
                    error: ConnectionError::Handshake {
                        url: self.url.clone(),
                        reason: e.to_string(),
                    },
                }),
                Ok(Ok((stream, _response))) => Ok(stream),
            },
        };

        let stream = match result {
            Ok(stream) => stream,
            Err(terminal) => {
                warn_terminal(&terminal);
                self.set_state(ConnectionState::Closed);
                self.events.finish(terminal);
                return;
            }
        };

        info!(url = %self.url, "connected");
        self.set_state(ConnectionState::Open);
        self.events.emit(ConnectionEvent::Opened);

        let (mut writer, mut reader) = stream.split();
        let mut close_reason: Option<String> = None;

        let terminal = loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    self.set_state(ConnectionState::Closed);
                    while let Ok(text) = self.outbound.try_recv() {
                        if let Err(e) = writer.send(Message::text(text)).await {
                            debug!(error = %e, "pending message not flushed");
                            break;
                        }
                    }
                    if let Err(e) = writer.send(Message::Close(None)).await {
                        debug!(error = %e, "close frame not sent");
                    }
                    break ConnectionEvent::Closed { reason: "closed by client".to_owned() };
                }
                Some(text) = self.outbound.recv() => {
                    if let Err(e) = writer.send(Message::text(text)).await {
                        if close_reason.is_some() || is_closed(&e) {
                            debug!(error = %e, "server closed before the message went out");
                            break ConnectionEvent::Closed {
                                reason: close_reason.take().unwrap_or_else(|| "connection closed".to_owned()),
                            };
                        }
                        break ConnectionEvent::Failed {
                            error: ConnectionError::Transport(e.to_string()),
                        };
                    }
                }
                frame = reader.next() => match frame {
                    None => {
                        break ConnectionEvent::Closed {
                            reason: close_reason.take().unwrap_or_else(|| "connection closed".to_owned()),
                        };
                    }
                    Some(Err(e)) if is_closed(&e) => {
                        break ConnectionEvent::Closed {
                            reason: close_reason.take().unwrap_or_else(|| "connection closed".to_owned()),
                        };
                    }
                    Some(Err(e)) => {
                        break ConnectionEvent::Failed {
                            error: ConnectionError::Transport(e.to_string()),
                        };
                    }
                    Some(Ok(Message::Text(text))) => self.events.emit(decode(text.as_str())),
                    Some(Ok(Message::Binary(bytes))) => {
                        self.events.emit(ConnectionEvent::Malformed {
                            raw: format!("<{} bytes>", bytes.len()),
                            error: ProtocolError::UnexpectedFrame("binary"),
                        });
                    }
                    Some(Ok(Message::Close(frame))) => {
                        close_reason = Some(describe_close(frame.as_ref()));
                    }
                    Some(Ok(_)) => {}
                },
            }
        };

        warn_terminal(&terminal);
        self.set_state(ConnectionState::Closed);
        self.events.finish(terminal);
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }
}

/// Whether `error` only says the socket is already closing or closed.
const fn is_closed(error: &WsError) -> bool {
    matches!(
        error,
        WsError::ConnectionClosed
            | WsError::AlreadyClosed
            | WsError::Protocol(WsProtocolError::SendAfterClosing)
    )
}

fn decode(text: &str) -> ConnectionEvent {
    match ServerMessage::from_json(text) {
        Ok(message) => ConnectionEvent::Message(message),
        Err(error) => ConnectionEvent::Malformed {
            raw: excerpt(text),
            error,
        },
    }
}

fn excerpt(text: &str) -> String {
    if text.chars().count() <= MAX_RAW_EXCERPT {
        return text.to_owned();
    }
    let mut cut: String = text.chars().take(MAX_RAW_EXCERPT).collect();
    cut.push('…');
    cut
}

fn describe_close(frame: Option<&CloseFrame>) -> String {
    match frame {
        Some(frame) if !frame.reason.is_empty() => {
            format!("{} ({})", frame.reason.as_str(), u16::from(frame.code))
        }
        Some(frame) => format!("close code {}", u16::from(frame.code)),
        None => "connection closed".to_owned(),
    }
}

fn warn_terminal(event: &ConnectionEvent) {
    match event {
        ConnectionEvent::Failed { error } => warn!(error = %error, "connection failed"),
        ConnectionEvent::Closed { reason } => info!(reason = %reason, "connection closed"),
        _ => {}
    }
}
