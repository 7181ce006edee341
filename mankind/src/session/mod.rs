//! Duel session state machine.
//!
//! [`DuelSession`] is the single owner of the duel's state. Everything it
//! reacts to arrives as a [`SessionInput`] on one queue; what it wants
//! shown goes to a [`PresentationSink`](crate::sink::PresentationSink) and
//! what it wants sent goes through an [`Outbound`] handle.

mod duel;
pub mod input;
mod phase;
pub mod timer;

pub use duel::{DEFAULT_DUEL_DURATION, DEFAULT_TIME_UP_TEXT, DuelSession};
pub use input::{HELP_TEXT, InputReceiver, InputSender, Intent, SessionInput, TimerTick, input_queue};
pub use phase::Phase;
pub use timer::{TickOutcome, Timer};

use mankind_core::protocol::ClientMessage;

use crate::error::SendError;

/// The session's way out to the server.
pub trait Outbound: Send {
    /// Hands a message to the channel.
    ///
    /// # Errors
    ///
    /// Returns a [`SendError`] if the channel cannot take it right now.
    fn send(&self, message: &ClientMessage) -> Result<(), SendError>;

    /// Closes the channel from the client side. Idempotent.
    fn close(&self);
}

/// A scored duel, as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuelResult {
    /// Whether the local guess was right.
    pub correct: bool,
    /// Whether the opponent was a person.
    pub opponent_was_human: bool,
    /// Opponent type as sent by the server.
    pub opponent_type: String,
    /// Score change; negative for a loss.
    pub score_delta: i64,
    /// Level after scoring.
    pub new_level: i64,
    /// Experience after scoring.
    pub new_xp: i64,
}

/// Which user actions are currently available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Affordances {
    /// A chat line may be sent.
    pub can_chat: bool,
    /// A decision may be submitted.
    pub can_decide: bool,
    /// A next duel may be requested.
    pub can_request_next: bool,
}

/// Whether the runner should keep feeding inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep going.
    Continue,
    /// The session reached its terminal phase.
    Stop,
}
