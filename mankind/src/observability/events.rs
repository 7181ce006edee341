//! JSONL stream of session events.
//!
//! Each event is one JSON object per line, tagged with `"type"` and
//! carrying a monotonically increasing `sequence` so a run can be replayed
//! in order even when lines are merged from several sources.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// Something that happened during a duel session.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// The client started dialing the server.
    SessionStarted {
        /// When the session began.
        timestamp: DateTime<Utc>,
        /// Full WebSocket URL.
        endpoint: String,
        /// Identifier sent in the URL path.
        player_id: String,
    },

    /// The session finished.
    SessionEnded {
        /// When the session ended.
        timestamp: DateTime<Utc>,
        /// Human-readable reason (`quit`, `interrupted`, server close reason).
        reason: String,
        /// Number of duels that reached a result.
        duels_completed: u64,
    },

    /// The session moved between phases.
    PhaseChanged {
        /// When the transition happened.
        timestamp: DateTime<Utc>,
        /// Previous phase.
        from: String,
        /// New phase.
        to: String,
    },

    /// A chat line arrived from the server.
    MessageReceived {
        /// Arrival time.
        timestamp: DateTime<Utc>,
        /// Sender reported by the server.
        sender: String,
        /// Length of the line in characters.
        length: usize,
        /// Server countdown carried by the message, if any.
        time_remaining: Option<i64>,
    },

    /// A chat line was handed to the connection.
    MessageSent {
        /// Send time.
        timestamp: DateTime<Utc>,
        /// Length of the trimmed line in characters.
        length: usize,
    },

    /// A decision was handed to the connection.
    DecisionSent {
        /// Send time.
        timestamp: DateTime<Utc>,
        /// `human`, `ai`, or `null` for an abstention.
        decision: Option<String>,
        /// True when the timer expired and the client abstained on its own.
        automatic: bool,
    },

    /// The server scored a duel.
    DuelResolved {
        /// When the result arrived.
        timestamp: DateTime<Utc>,
        /// Whether the guess was right.
        correct: bool,
        /// What the opponent actually was.
        opponent_type: String,
        /// Score change.
        score_delta: i64,
        /// Level after scoring.
        new_level: i64,
    },

    /// An inbound frame was dropped.
    ProtocolAnomaly {
        /// When the frame was dropped.
        timestamp: DateTime<Utc>,
        /// Short classification (`out_of_phase`, `invalid_json`, ...).
        category: String,
        /// Phase the session was in.
        phase: String,
        /// Free-form description.
        detail: String,
    },
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct EventEnvelope {
    sequence: u64,
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Buffered JSONL event writer shared across threads.
///
/// Each [`emit`](Self::emit) takes the next sequence number, writes one
/// line and flushes. Write failures are dropped: a full disk must not end a
/// duel.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter over an arbitrary writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter that discards everything.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates (or truncates) `path` and writes events to it.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Writes `event` as a single line.
    pub fn emit(&self, event: Event) {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope { sequence, event };

        if let Ok(mut w) = self.writer.lock() {
            if let Ok(line) = serde_json::to_string(&envelope) {
                let _ = writeln!(w, "{line}");
                let _ = w.flush();
            }
        }
    }

    /// Number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::noop()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{Arc, Mutex as StdMutex};

    use super::*;

    /// In-memory writer for capturing emitter output.
    #[derive(Clone, Default)]
    pub(crate) struct TestWriter(Arc<StdMutex<Vec<u8>>>);

    impl TestWriter {
        pub(crate) fn contents(&self) -> String {
            let buf = self.0.lock().unwrap();
            String::from_utf8_lossy(&buf).into_owned()
        }

        pub(crate) fn lines(&self) -> Vec<serde_json::Value> {
            self.contents()
                .lines()
                .map(|l| serde_json::from_str(l).unwrap())
                .collect()
        }
    }

    impl Write for TestWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn emits_flat_jsonl_with_sequence() {
        let tw = TestWriter::default();
        let emitter = EventEmitter::new(Box::new(tw.clone()));
        emitter.emit(Event::PhaseChanged {
            timestamp: Utc::now(),
            from: "waiting".to_owned(),
            to: "in_progress".to_owned(),
        });
        emitter.emit(Event::DecisionSent {
            timestamp: Utc::now(),
            decision: None,
            automatic: true,
        });

        let lines = tw.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["sequence"], 0);
        assert_eq!(lines[0]["type"], "PhaseChanged");
        assert_eq!(lines[0]["to"], "in_progress");
        assert!(lines[0].get("event").is_none());
        assert_eq!(lines[1]["sequence"], 1);
        assert_eq!(lines[1]["decision"], serde_json::Value::Null);
        assert_eq!(emitter.event_count(), 2);
    }

    #[test]
    fn noop_counts_but_writes_nothing() {
        let emitter = EventEmitter::noop();
        emitter.emit(Event::MessageSent {
            timestamp: Utc::now(),
            length: 5,
        });
        assert_eq!(emitter.event_count(), 1);
    }

    #[test]
    fn from_file_writes_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        {
            let emitter = EventEmitter::from_file(&path).unwrap();
            emitter.emit(Event::SessionEnded {
                timestamp: Utc::now(),
                reason: "quit".to_owned(),
                duels_completed: 2,
            });
        }
        let text = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(value["type"], "SessionEnded");
        assert_eq!(value["duels_completed"], 2);
    }
}
