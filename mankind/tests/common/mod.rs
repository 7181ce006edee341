//! Shared integration-test harness: a scripted duel server on a local
//! port, helpers for driving the client runner, and a wrapper for running
//! the `mankind` binary.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_util::sync::CancellationToken;

use mankind::client::{self, RunOptions, RunSummary};
use mankind::config::ClientSettings;
use mankind::connection::PlayerId;
use mankind::error::MankindError;
use mankind::observability::EventEmitter;
use mankind::session::Intent;
use mankind::sink::{MemorySink, Transcript};

/// Default timeout for a single step of a scripted exchange.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Scripted server
// ============================================================================

/// A listening socket that plays the server side of one duel session.
pub struct ScriptedServer {
    listener: TcpListener,
}

impl ScriptedServer {
    #[allow(clippy::missing_panics_doc)]
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind test listener");
        Self { listener }
    }

    /// `ws://` base URL of this server.
    #[allow(clippy::missing_panics_doc)]
    pub fn url(&self) -> String {
        format!("ws://{}", self.listener.local_addr().expect("local addr"))
    }

    /// Accepts the TCP connection without answering the handshake.
    #[allow(clippy::missing_panics_doc)]
    pub async fn accept_tcp(&self) -> TcpStream {
        let (stream, _) = tokio::time::timeout(DEFAULT_TIMEOUT, self.listener.accept())
            .await
            .expect("client never connected")
            .expect("accept failed");
        stream
    }

    /// Accepts and upgrades the next client.
    pub async fn accept(&self) -> ServerSide {
        let stream = self.accept_tcp().await;
        ServerSide::upgrade(stream).await
    }
}

/// Server end of an upgraded WebSocket.
pub struct ServerSide {
    ws: WebSocketStream<TcpStream>,
    /// Request path the client dialed.
    pub path: String,
}

impl ServerSide {
    /// Completes the WebSocket handshake on an accepted stream.
    #[allow(clippy::missing_panics_doc)]
    pub async fn upgrade(stream: TcpStream) -> Self {
        let mut path = String::new();
        let ws = tokio_tungstenite::accept_hdr_async(
            stream,
            |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                path = req.uri().path().to_owned();
                Ok(resp)
            },
        )
        .await
        .expect("websocket handshake failed");
        Self { ws, path }
    }

    /// Sends one JSON text frame.
    #[allow(clippy::missing_panics_doc)]
    pub async fn send(&mut self, frame: Value) {
        self.ws
            .send(Message::text(frame.to_string()))
            .await
            .expect("server send failed");
    }

    /// Sends raw text, valid JSON or not.
    #[allow(clippy::missing_panics_doc)]
    pub async fn send_raw(&mut self, text: &str) {
        self.ws
            .send(Message::text(text.to_owned()))
            .await
            .expect("server send failed");
    }

    /// Next frame from the client: `Some(json)` for text, `None` once the
    /// client closed.
    #[allow(clippy::missing_panics_doc)]
    pub async fn recv(&mut self) -> Option<Value> {
        let next = tokio::time::timeout(DEFAULT_TIMEOUT, self.ws.next())
            .await
            .expect("timed out waiting for a client frame");
        match next {
            Some(Ok(Message::Text(text))) => {
                Some(serde_json::from_str(text.as_str()).expect("client sent invalid JSON"))
            }
            Some(Ok(Message::Close(_)) | Err(_)) | None => None,
            Some(Ok(other)) => panic!("unexpected frame from client: {other:?}"),
        }
    }

    /// Closes from the server side.
    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}

// ============================================================================
// Client under test
// ============================================================================

/// A client runner on a background task, with its sink transcript and the
/// intent queue that plays the user.
pub struct TestClient {
    pub transcript: Transcript,
    pub intents: mpsc::UnboundedSender<Intent>,
    pub cancel: CancellationToken,
    handle: JoinHandle<Result<RunSummary, MankindError>>,
}

impl TestClient {
    /// Starts a client against `server` with the given duel length.
    #[allow(clippy::missing_panics_doc)]
    pub fn start(server: &str, duel_duration: u32) -> Self {
        let settings = ClientSettings {
            server: server.to_owned(),
            player_id: PlayerId::parse("tester").expect("valid id"),
            duel_duration,
            connect_timeout: Duration::from_secs(2),
            ..ClientSettings::default()
        };
        let (sink, transcript) = MemorySink::new();
        let (intents, intent_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(client::run(
            RunOptions {
                settings,
                events: Arc::new(EventEmitter::noop()),
                cancel: cancel.clone(),
            },
            Box::new(sink),
            intent_rx,
        ));
        Self {
            transcript,
            intents,
            cancel,
            handle,
        }
    }

    /// Queues a user intent.
    #[allow(clippy::missing_panics_doc)]
    pub fn intend(&self, intent: Intent) {
        self.intents.send(intent).expect("runner stopped");
    }

    /// Polls the transcript until `check` holds.
    #[allow(clippy::missing_panics_doc)]
    pub async fn wait_for(&self, what: &str, check: impl Fn(&Transcript) -> bool) {
        let deadline = tokio::time::Instant::now() + DEFAULT_TIMEOUT;
        while !check(&self.transcript) {
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {what}; transcript: {:#?}",
                self.transcript.calls()
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Waits for the runner to return.
    #[allow(clippy::missing_panics_doc)]
    pub async fn finish(self) -> Result<RunSummary, MankindError> {
        tokio::time::timeout(DEFAULT_TIMEOUT, self.handle)
            .await
            .expect("runner did not finish")
            .expect("runner panicked")
    }
}

// ============================================================================
// Binary
// ============================================================================

/// Runs the `mankind` binary to completion.
#[allow(clippy::missing_panics_doc)]
pub fn run_binary(args: &[&str]) -> std::process::Output {
    std::process::Command::new(env!("CARGO_BIN_EXE_mankind"))
        .args(args)
        .env_remove("MANKIND_LOG_LEVEL")
        .output()
        .expect("failed to run mankind")
}

/// Path of a file under `tests/fixtures`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}
