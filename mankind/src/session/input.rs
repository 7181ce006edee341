//! Everything the session reacts to, funnelled through one queue.
//!
//! The connection reader, the countdown ticker and the user's terminal each
//! run on their own task but only ever push [`SessionInput`] values into
//! the same unbounded channel. The runner pops them one by one, so session
//! state is mutated by a single consumer in arrival order.

use tokio::sync::mpsc;

use crate::connection::ConnectionEvent;

/// Sending half of the session input queue.
pub type InputSender = mpsc::UnboundedSender<SessionInput>;

/// Receiving half of the session input queue.
pub type InputReceiver = mpsc::UnboundedReceiver<SessionInput>;

/// Creates a new session input queue.
#[must_use]
pub fn input_queue() -> (InputSender, InputReceiver) {
    mpsc::unbounded_channel()
}

/// One unit of work for the session.
#[derive(Debug)]
pub enum SessionInput {
    /// Lifecycle or payload event from the connection.
    Connection(ConnectionEvent),
    /// A countdown tick.
    Tick(TimerTick),
    /// Something the local participant asked for.
    Intent(Intent),
}

/// A one-second tick tagged with the epoch of the timer that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerTick {
    /// Epoch of the countdown this tick belongs to.
    pub epoch: u64,
}

/// A request from the local participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Send a chat line.
    Chat(String),
    /// Submit a guess; the text is validated by the session.
    Decide(String),
    /// Ask for another duel.
    NextDuel,
    /// Show the command list.
    Help,
    /// A `/command` that does not exist.
    Unknown(String),
    /// Leave: close the connection.
    Quit,
}

impl Intent {
    /// Interprets one line typed at the terminal.
    ///
    /// Lines starting with `/` are commands, everything else is chat.
    /// Blank lines yield `None`.
    #[must_use]
    pub fn from_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Some(Self::Chat(line.to_owned()));
        };
        let mut parts = command.split_whitespace();
        let name = parts.next().unwrap_or_default().to_ascii_lowercase();
        let intent = match name.as_str() {
            "human" | "ai" => Self::Decide(name),
            "decide" => Self::Decide(parts.next().unwrap_or_default().to_owned()),
            "next" => Self::NextDuel,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            _ => Self::Unknown(line.to_owned()),
        };
        Some(intent)
    }
}

/// Command reference shown by `/help`.
pub const HELP_TEXT: &str = "\
Commands:
  /human        guess that your opponent is a human
  /ai           guess that your opponent is an AI
  /next         start another duel once the result is in
  /help         show this list
  /quit         leave
Anything else you type is sent as a chat message.";
