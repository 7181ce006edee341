//! Client runtime.
//!
//! [`run`] wires a [`Connection`], an [`IntentSource`] and a
//! [`DuelSession`] around one input queue and drives the session until the
//! connection ends.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ClientSettings;
use crate::connection::{ConnectOptions, Connection, ConnectionEvent, ConnectionEvents, Endpoint};
use crate::error::{ConnectionError, MankindError};
use crate::observability::events::{Event, EventEmitter};
use crate::session::{DuelSession, Flow, InputSender, Intent, SessionInput, input_queue};
use crate::sink::PresentationSink;

/// Longest line accepted from an intent reader.
pub const MAX_INPUT_LINE: usize = 4096;

// ============================================================================
// Intent sources
// ============================================================================

/// Supplies user intents to the runner.
///
/// `None` means the user is gone; the runner then leaves the session.
#[async_trait]
pub trait IntentSource: Send {
    /// Waits for the next intent.
    async fn next_intent(&mut self) -> Option<Intent>;
}

/// Reads intents one line at a time, using [`Intent::from_line`].
#[derive(Debug)]
pub struct LineIntents<R> {
    lines: FramedRead<R, LinesCodec>,
}

impl<R: AsyncRead + Unpin + Send> LineIntents<R> {
    /// Wraps a reader. Lines longer than [`MAX_INPUT_LINE`] are dropped.
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self {
            lines: FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_INPUT_LINE)),
        }
    }
}

impl LineIntents<tokio::io::Stdin> {
    /// Reads the terminal.
    #[must_use]
    pub fn stdin() -> Self {
        Self::new(tokio::io::stdin())
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> IntentSource for LineIntents<R> {
    async fn next_intent(&mut self) -> Option<Intent> {
        loop {
            match self.lines.next().await? {
                Ok(line) => {
                    if let Some(intent) = Intent::from_line(&line) {
                        return Some(intent);
                    }
                }
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    warn!(max = MAX_INPUT_LINE, "input line too long, discarded");
                }
                Err(LinesCodecError::Io(e)) => {
                    warn!(error = %e, "failed to read input");
                    return None;
                }
            }
        }
    }
}

#[async_trait]
impl IntentSource for mpsc::UnboundedReceiver<Intent> {
    async fn next_intent(&mut self) -> Option<Intent> {
        self.recv().await
    }
}

// ============================================================================
// Runner
// ============================================================================

/// Everything [`run`] needs besides the sink and the intents.
#[derive(Debug)]
pub struct RunOptions {
    /// Resolved client settings.
    pub settings: ClientSettings,
    /// Structured event stream.
    pub events: Arc<EventEmitter>,
    /// Cancelled on Ctrl+C / SIGTERM.
    pub cancel: CancellationToken,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// `quit`, `interrupted` or `disconnected`.
    pub reason: &'static str,
    /// Duels that reached a result.
    pub duels_completed: u64,
}

/// Plays until the connection ends.
///
/// Cancellation and the `quit` intent both close the connection; the run
/// finishes once the close has been applied to the session.
///
/// # Errors
///
/// Returns [`MankindError::Connection`] if the endpoint is invalid or the
/// connection failed (as opposed to being closed), unless the run was
/// cancelled.
pub async fn run<I>(
    options: RunOptions,
    sink: Box<dyn PresentationSink>,
    intents: I,
) -> Result<RunSummary, MankindError>
where
    I: IntentSource + 'static,
{
    let RunOptions {
        settings,
        events,
        cancel,
    } = options;

    let endpoint = Endpoint::new(&settings.server, settings.player_id.clone())?;
    info!(endpoint = %endpoint, "connecting");
    events.emit(Event::SessionStarted {
        timestamp: Utc::now(),
        endpoint: endpoint.url(),
        player_id: endpoint.player_id().to_string(),
    });

    let (inputs, mut queue) = input_queue();
    let (connection, connection_events) = Connection::connect(
        &endpoint,
        ConnectOptions {
            connect_timeout: settings.connect_timeout,
        },
    );
    let forwarder = tokio::spawn(forward_connection(connection_events, inputs.clone()));
    let pump = tokio::spawn(pump_intents(intents, inputs.clone()));

    let mut session = DuelSession::new(inputs, sink, Box::new(connection.clone()))
        .with_duel_duration(settings.duel_duration)
        .with_events(Arc::clone(&events));

    let mut reason = None;
    let mut failure: Option<ConnectionError> = None;
    loop {
        let input = tokio::select! {
            biased;
            () = cancel.cancelled(), if reason != Some("interrupted") => {
                info!("interrupted, closing connection");
                reason = Some("interrupted");
                session.quit();
                continue;
            }
            input = queue.recv() => input,
        };
        let Some(input) = input else {
            debug!("input queue closed");
            break;
        };

        match &input {
            SessionInput::Intent(Intent::Quit) if reason.is_none() => reason = Some("quit"),
            SessionInput::Connection(ConnectionEvent::Failed { error }) => {
                failure = Some(error.clone());
            }
            _ => {}
        }
        if session.handle(input) == Flow::Stop {
            break;
        }
    }

    forwarder.abort();
    pump.abort();
    connection.close();

    let summary = RunSummary {
        reason: reason.unwrap_or("disconnected"),
        duels_completed: session.duels_completed(),
    };
    events.emit(Event::SessionEnded {
        timestamp: Utc::now(),
        reason: summary.reason.to_owned(),
        duels_completed: summary.duels_completed,
    });
    info!(
        reason = summary.reason,
        duels = summary.duels_completed,
        "session ended"
    );

    match failure {
        Some(error) if !cancel.is_cancelled() => Err(error.into()),
        _ => Ok(summary),
    }
}

async fn forward_connection(mut events: ConnectionEvents, inputs: InputSender) {
    while let Some(event) = events.next().await {
        if inputs.send(SessionInput::Connection(event)).is_err() {
            return;
        }
    }
}

async fn pump_intents<I: IntentSource>(mut source: I, inputs: InputSender) {
    while let Some(intent) = source.next_intent().await {
        if inputs.send(SessionInput::Intent(intent)).is_err() {
            return;
        }
    }
    debug!("intent source exhausted, leaving");
    if inputs.send(SessionInput::Intent(Intent::Quit)).is_err() {
        debug!("session already gone");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn line_intents_skip_blank_lines() {
        let mut source = LineIntents::new(&b"hello\n\n   \n/human\n/quit\n"[..]);
        assert_eq!(
            source.next_intent().await,
            Some(Intent::Chat("hello".to_owned()))
        );
        assert_eq!(
            source.next_intent().await,
            Some(Intent::Decide("human".to_owned()))
        );
        assert_eq!(source.next_intent().await, Some(Intent::Quit));
        assert_eq!(source.next_intent().await, None);
    }

    #[tokio::test]
    async fn line_intents_drop_overlong_lines() {
        let mut input = "x".repeat(MAX_INPUT_LINE + 10);
        input.push_str("\nafter\n");
        let mut source = LineIntents::new(input.as_bytes());
        assert_eq!(
            source.next_intent().await,
            Some(Intent::Chat("after".to_owned()))
        );
    }

    #[tokio::test]
    async fn read_error_ends_the_source() {
        let reader = tokio_test::io::Builder::new()
            .read(b"/ai\n")
            .read_error(std::io::Error::other("terminal gone"))
            .build();
        let mut source = LineIntents::new(reader);
        assert_eq!(
            source.next_intent().await,
            Some(Intent::Decide("ai".to_owned()))
        );
        assert_eq!(source.next_intent().await, None);
    }

    #[tokio::test]
    async fn exhausted_source_sends_quit() {
        let (tx, mut rx) = input_queue();
        let (intent_tx, intent_rx) = mpsc::unbounded_channel();
        intent_tx.send(Intent::Help).unwrap();
        drop(intent_tx);

        pump_intents(intent_rx, tx).await;

        assert!(matches!(
            rx.recv().await,
            Some(SessionInput::Intent(Intent::Help))
        ));
        assert!(matches!(
            rx.recv().await,
            Some(SessionInput::Intent(Intent::Quit))
        ));
    }

    #[tokio::test]
    async fn invalid_endpoint_fails_before_connecting() {
        let settings = ClientSettings {
            server: "http://localhost:8001".to_owned(),
            ..ClientSettings::default()
        };
        let (sink, _transcript) = crate::sink::MemorySink::new();
        let (_tx, rx) = mpsc::unbounded_channel::<Intent>();
        let err = run(
            RunOptions {
                settings,
                events: Arc::new(EventEmitter::noop()),
                cancel: CancellationToken::new(),
            },
            Box::new(sink),
            rx,
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            MankindError::Connection(ConnectionError::InvalidEndpoint { .. })
        ));
    }
}
