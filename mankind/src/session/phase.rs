//! Duel session phases and the transitions allowed between them.

use std::fmt;

/// Where the session currently stands.
///
/// Exactly one phase is active at a time. [`Phase::Disconnected`] is the
/// only terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    /// The WebSocket handshake is in flight.
    #[default]
    Connecting,
    /// Connected, waiting for the server to pair us with an opponent.
    Waiting,
    /// The chat window is open and the countdown is running.
    InProgress,
    /// The chat window closed; waiting for a decision or the result.
    TimeUp,
    /// The server scored the duel.
    Resolved,
    /// The connection is gone. Nothing leaves this phase.
    Disconnected,
}

impl Phase {
    /// Every phase, in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::Connecting,
        Self::Waiting,
        Self::InProgress,
        Self::TimeUp,
        Self::Resolved,
        Self::Disconnected,
    ];

    /// Stable snake_case name used in logs, events and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Waiting => "waiting",
            Self::InProgress => "in_progress",
            Self::TimeUp => "time_up",
            Self::Resolved => "resolved",
            Self::Disconnected => "disconnected",
        }
    }

    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Disconnected)
    }

    /// Whether a duel is running and a decision may be submitted.
    #[must_use]
    pub const fn accepts_decision(self) -> bool {
        matches!(self, Self::InProgress | Self::TimeUp)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// Staying in the same phase is not a transition and returns `false`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Disconnected, _) => false,
            (_, Self::Disconnected) => true,
            (Self::Connecting, Self::Waiting)
            | (Self::Waiting | Self::Resolved, Self::InProgress)
            | (Self::InProgress, Self::TimeUp | Self::Resolved)
            | (Self::TimeUp, Self::Resolved)
            | (Self::Resolved, Self::Waiting) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
