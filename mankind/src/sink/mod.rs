//! Where the session reports what the participant should see.
//!
//! The session never renders anything itself; it calls a
//! [`PresentationSink`]. [`TerminalSink`] draws the duel as a chat
//! transcript, [`MemorySink`] records the calls for headless use.

mod memory;
mod terminal;

pub use memory::{MemorySink, SinkCall, Transcript};
pub use terminal::TerminalSink;

use crate::error::RejectReason;
use crate::session::{Affordances, DuelResult, Phase};

/// Severity of a system notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Status information.
    Info,
    /// Something was ignored or refused but the duel goes on.
    Warning,
    /// The session cannot continue.
    Error,
}

/// A system-style line, as opposed to a chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// How serious it is.
    pub level: NoticeLevel,
    /// What to show.
    pub text: String,
}

impl Notice {
    /// Informational notice.
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    /// Warning notice.
    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            text: text.into(),
        }
    }

    /// Error notice.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}

/// Receiver of everything the session wants displayed.
///
/// Calls arrive in the order the session handled its inputs. Chat lines
/// passed to [`on_message`](Self::on_message) form an append-only
/// transcript: they are never reordered or repeated.
pub trait PresentationSink: Send {
    /// The session entered `phase`.
    fn on_phase_changed(&mut self, phase: Phase);

    /// A chat line to append. Local lines use the sender `"you"`.
    fn on_message(&mut self, sender: &str, content: &str);

    /// Seconds left in the running duel.
    fn on_tick(&mut self, remaining: u32);

    /// The server scored the duel.
    fn on_result(&mut self, result: &DuelResult);

    /// A decision was refused before reaching the server.
    fn on_decision_rejected(&mut self, reason: &RejectReason);

    /// A system line (connection status, dropped frames, refused sends).
    fn on_notice(&mut self, notice: &Notice) {
        let _ = notice;
    }

    /// Which actions are currently available. Sent after every input.
    fn on_affordances(&mut self, affordances: Affordances) {
        let _ = affordances;
    }
}
