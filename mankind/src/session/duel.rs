use std::sync::Arc;

use chrono::Utc;
use mankind_core::protocol::{ClientMessage, Decision, ServerMessage};
use tracing::{debug, info, warn};

use super::input::{HELP_TEXT, Intent, SessionInput, TimerTick};
use super::timer::{TickOutcome, Timer};
use super::{Affordances, DuelResult, Flow, InputSender, Outbound, Phase};
use crate::connection::ConnectionEvent;
use crate::error::{ConnectionError, IntentError, ProtocolError, RejectReason, SendError};
use crate::observability::events::{Event, EventEmitter};
use crate::observability::metrics;
use crate::sink::{Notice, PresentationSink};

/// Length of a duel when not configured otherwise, in seconds.
pub const DEFAULT_DUEL_DURATION: u32 = 120;

/// Shown when the chat window closes and the server sent no text of its own.
pub const DEFAULT_TIME_UP_TEXT: &str = "Time's up! Make your decision: Human or AI?";

/// State of one client's duel session.
///
/// Owns the countdown, the sink and the outbound handle; mutated only by
/// [`handle`](Self::handle) and the intent methods, which the runner calls
/// one input at a time.
pub struct DuelSession {
    phase: Phase,
    time_remaining: u32,
    level: Option<i64>,
    decision_submitted: bool,
    last_result: Option<DuelResult>,
    duel_duration: u32,
    duels_completed: u64,
    timer: Timer,
    sink: Box<dyn PresentationSink>,
    outbound: Box<dyn Outbound>,
    events: Arc<EventEmitter>,
}

impl std::fmt::Debug for DuelSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuelSession")
            .field("phase", &self.phase)
            .field("time_remaining", &self.time_remaining)
            .field("level", &self.level)
            .field("decision_submitted", &self.decision_submitted)
            .field("last_result", &self.last_result)
            .field("duel_duration", &self.duel_duration)
            .field("timer", &self.timer)
            .finish_non_exhaustive()
    }
}

impl DuelSession {
    /// Creates a session in [`Phase::Connecting`].
    ///
    /// `inputs` is the queue the session's own countdown ticks go to; it
    /// must be the queue the runner feeds back into [`handle`](Self::handle).
    #[must_use]
    pub fn new(
        inputs: InputSender,
        sink: Box<dyn PresentationSink>,
        outbound: Box<dyn Outbound>,
    ) -> Self {
        Self {
            phase: Phase::Connecting,
            time_remaining: 0,
            level: None,
            decision_submitted: false,
            last_result: None,
            duel_duration: DEFAULT_DUEL_DURATION,
            duels_completed: 0,
            timer: Timer::new(inputs),
            sink,
            outbound,
            events: Arc::new(EventEmitter::noop()),
        }
    }

    /// Sets the full length of a duel in seconds.
    #[must_use]
    pub fn with_duel_duration(mut self, seconds: u32) -> Self {
        self.duel_duration = seconds;
        self
    }

    /// Routes structured events to `events`.
    #[must_use]
    pub fn with_events(mut self, events: Arc<EventEmitter>) -> Self {
        self.events = events;
        self
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Seconds left in the current duel.
    #[must_use]
    pub const fn time_remaining(&self) -> u32 {
        self.time_remaining
    }

    /// Level of the current duel, once one has started.
    #[must_use]
    pub const fn level(&self) -> Option<i64> {
        self.level
    }

    /// Whether a decision (or abstention) went out for the current duel.
    #[must_use]
    pub const fn decision_submitted(&self) -> bool {
        self.decision_submitted
    }

    /// Result of the last duel, until the next one starts.
    #[must_use]
    pub const fn last_result(&self) -> Option<&DuelResult> {
        self.last_result.as_ref()
    }

    /// Configured duel length in seconds.
    #[must_use]
    pub const fn duel_duration(&self) -> u32 {
        self.duel_duration
    }

    /// Number of duels that reached a result.
    #[must_use]
    pub const fn duels_completed(&self) -> u64 {
        self.duels_completed
    }

    /// Whether the countdown is running.
    #[must_use]
    pub const fn timer_running(&self) -> bool {
        self.timer.is_running()
    }

    /// Actions currently available to the participant.
    #[must_use]
    pub const fn affordances(&self) -> Affordances {
        let live = !self.phase.is_terminal() && !matches!(self.phase, Phase::Connecting);
        Affordances {
            can_chat: live,
            can_decide: self.phase.accepts_decision() && !self.decision_submitted,
            can_request_next: matches!(self.phase, Phase::Resolved),
        }
    }

    // ------------------------------------------------------------------
    // Input dispatch
    // ------------------------------------------------------------------

    /// Applies one input and reports whether the runner should continue.
    pub fn handle(&mut self, input: SessionInput) -> Flow {
        match input {
            SessionInput::Connection(event) => {
                self.on_connection_event(event);
                self.publish_affordances();
            }
            SessionInput::Tick(tick) => {
                self.on_tick(tick);
                self.publish_affordances();
            }
            SessionInput::Intent(intent) => self.on_intent(intent),
        }
        if self.phase.is_terminal() {
            Flow::Stop
        } else {
            Flow::Continue
        }
    }

    fn on_connection_event(&mut self, event: ConnectionEvent) {
        if self.phase.is_terminal() {
            debug!(?event, "connection event after disconnect ignored");
            return;
        }
        match event {
            ConnectionEvent::Opened => {
                metrics::record_connection_event("opened");
                if self.phase == Phase::Connecting {
                    self.transition(Phase::Waiting);
                    self.sink
                        .on_notice(&Notice::info("Connected to the server successfully"));
                } else {
                    self.anomaly("out_of_phase", "connection opened twice");
                }
            }
            ConnectionEvent::Message(message) => self.on_server_message(message),
            ConnectionEvent::Malformed { raw, error } => self.on_malformed(&raw, &error),
            ConnectionEvent::Closed { reason } => {
                metrics::record_connection_event("closed");
                self.disconnect(Notice::info(format!("Connection closed: {reason}")));
            }
            ConnectionEvent::Failed { error } => {
                metrics::record_connection_event("failed");
                let text = match &error {
                    ConnectionError::Handshake { .. } | ConnectionError::Timeout { .. } => {
                        format!("Could not connect to the server: {error}")
                    }
                    _ => format!("Connection lost: {error}"),
                };
                self.disconnect(Notice::error(text));
            }
        }
    }

    fn on_server_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::GameStart {
                level,
                message,
                time_remaining,
            } => self.on_game_start(level, message, time_remaining),
            ServerMessage::Message {
                sender,
                content,
                time_remaining,
            } => self.on_chat(&sender, &content, time_remaining),
            ServerMessage::TimeUp { message } => self.on_time_up(message),
            ServerMessage::GameResult {
                correct,
                score,
                opponent_type,
                new_level,
                new_xp,
            } => {
                let opponent_was_human = opponent_type.eq_ignore_ascii_case("human");
                self.on_result(DuelResult {
                    correct,
                    opponent_was_human,
                    opponent_type,
                    score_delta: score,
                    new_level,
                    new_xp,
                });
            }
        }
    }

    fn on_game_start(
        &mut self,
        level: i64,
        message: Option<String>,
        time_remaining: Option<i64>,
    ) {
        if !matches!(self.phase, Phase::Waiting | Phase::Resolved) {
            self.anomaly("out_of_phase", "game_start");
            return;
        }
        // The server's countdown wins over the configured length.
        let duration = time_remaining
            .filter(|&t| t > 0)
            .map_or(self.duel_duration, |t| u32::try_from(t).unwrap_or(u32::MAX));
        self.timer.start(duration);
        self.time_remaining = duration;
        self.decision_submitted = false;
        self.last_result = None;
        self.level = Some(level);
        self.transition(Phase::InProgress);

        let banner = message.unwrap_or_else(|| "Duel started!".to_owned());
        self.sink
            .on_notice(&Notice::info(format!("{banner} (level {level})")));
        self.sink.on_tick(self.time_remaining);
        metrics::set_time_remaining(self.time_remaining);
    }

    fn on_chat(&mut self, sender: &str, content: &str, time_remaining: Option<i64>) {
        self.sink.on_message(sender, content);
        metrics::record_message_received(sender);
        self.events.emit(Event::MessageReceived {
            timestamp: Utc::now(),
            sender: sender.to_owned(),
            length: content.chars().count(),
            time_remaining,
        });

        if let Some(reported) = time_remaining {
            let reported = u32::try_from(reported.max(0)).unwrap_or(u32::MAX);
            if self.timer.resync(reported) {
                self.time_remaining = reported;
                self.sink.on_tick(reported);
                metrics::set_time_remaining(reported);
            }
        }
    }

    fn on_time_up(&mut self, message: Option<String>) {
        match self.phase {
            Phase::InProgress => {
                self.timer.cancel();
                self.transition(Phase::TimeUp);
                let text = message.unwrap_or_else(|| DEFAULT_TIME_UP_TEXT.to_owned());
                self.sink.on_notice(&Notice::info(text));
            }
            // The local countdown got there first.
            Phase::TimeUp => {
                debug!("server time_up after local expiry");
                if let Some(text) = message {
                    self.sink.on_notice(&Notice::info(text));
                }
            }
            _ => self.anomaly("out_of_phase", "time_up"),
        }
    }

    fn on_result(&mut self, result: DuelResult) {
        if !matches!(self.phase, Phase::InProgress | Phase::TimeUp) {
            self.anomaly("out_of_phase", "game_result");
            return;
        }
        self.timer.cancel();
        self.duels_completed += 1;
        metrics::record_duel_resolved(result.correct);
        self.events.emit(Event::DuelResolved {
            timestamp: Utc::now(),
            correct: result.correct,
            opponent_type: result.opponent_type.clone(),
            score_delta: result.score_delta,
            new_level: result.new_level,
        });
        info!(
            correct = result.correct,
            opponent = %result.opponent_type,
            score = result.score_delta,
            "duel resolved"
        );
        self.transition(Phase::Resolved);
        self.sink.on_result(&result);
        self.last_result = Some(result);
    }

    fn on_malformed(&mut self, raw: &str, error: &ProtocolError) {
        warn!(error = %error, raw, "dropping malformed server message");
        metrics::record_protocol_anomaly(error.category());
        self.events.emit(Event::ProtocolAnomaly {
            timestamp: Utc::now(),
            category: error.category().to_owned(),
            phase: self.phase.as_str().to_owned(),
            detail: error.to_string(),
        });
        self.sink.on_notice(&Notice::warning(format!(
            "Ignored a message the server sent: {error}"
        )));
    }

    fn on_tick(&mut self, tick: TimerTick) {
        match self.timer.on_tick(tick) {
            TickOutcome::Stale => {}
            TickOutcome::Ticked(remaining) => {
                self.time_remaining = remaining;
                self.sink.on_tick(remaining);
                metrics::set_time_remaining(remaining);
            }
            TickOutcome::Expired => {
                self.time_remaining = 0;
                self.sink.on_tick(0);
                metrics::set_time_remaining(0);
                self.on_local_expiry();
            }
        }
    }

    fn on_local_expiry(&mut self) {
        if self.phase != Phase::InProgress {
            return;
        }
        info!("countdown expired before the server ended the duel");
        self.transition(Phase::TimeUp);
        self.sink.on_notice(&Notice::info(DEFAULT_TIME_UP_TEXT));
        if self.decision_submitted {
            return;
        }
        match self.send_decision(None) {
            Ok(()) => {
                self.sink.on_notice(&Notice::info(
                    "No decision was made in time; your turn was submitted as an abstention.",
                ));
            }
            Err(e) => {
                warn!(error = %e, "automatic abstention not sent");
                self.sink.on_notice(&Notice::warning(format!(
                    "Could not submit an abstention: {e}"
                )));
            }
        }
    }

    fn on_intent(&mut self, intent: Intent) {
        // Errors are already reported to the sink.
        let result = match intent {
            Intent::Chat(text) => self.send_chat(&text),
            Intent::Decide(choice) => match choice.parse::<Decision>() {
                Ok(decision) => self.submit_decision(decision).map(drop),
                Err(_) => {
                    let error = self.reject_decision(RejectReason::InvalidChoice(choice));
                    self.publish_affordances();
                    Err(error)
                }
            },
            Intent::NextDuel => self.request_next_duel(),
            Intent::Help => {
                self.sink.on_notice(&Notice::info(HELP_TEXT));
                self.publish_affordances();
                Ok(())
            }
            Intent::Unknown(command) => {
                self.sink.on_notice(&Notice::warning(format!(
                    "Unknown command '{command}'. Type /help for the list."
                )));
                self.publish_affordances();
                Ok(())
            }
            Intent::Quit => {
                self.quit();
                Ok(())
            }
        };
        if let Err(e) = result {
            debug!(error = %e, "intent not carried out");
        }
    }

    // ------------------------------------------------------------------
    // Intents
    // ------------------------------------------------------------------

    /// Sends a chat line, trimmed. Blank text is silently ignored.
    ///
    /// On success the line is echoed to the sink with sender `"you"`.
    ///
    /// # Errors
    ///
    /// [`IntentError::Rejected`] before the connection opened or after
    /// disconnecting, or [`IntentError::Send`] if the connection refused it.
    pub fn send_chat(&mut self, text: &str) -> Result<(), IntentError> {
        let content = text.trim();
        let result = if content.is_empty() {
            Ok(())
        } else if !self.affordances().can_chat {
            let reason = if self.phase.is_terminal() {
                RejectReason::Disconnected
            } else {
                RejectReason::NotConnected
            };
            self.sink.on_notice(&Notice::warning(format!(
                "Message not sent: {reason}"
            )));
            Err(IntentError::Rejected(reason))
        } else {
            let message = ClientMessage::Message {
                content: content.to_owned(),
            };
            match self.outbound.send(&message) {
                Ok(()) => {
                    self.sink.on_message("you", content);
                    metrics::record_message_sent();
                    self.events.emit(Event::MessageSent {
                        timestamp: Utc::now(),
                        length: content.chars().count(),
                    });
                    Ok(())
                }
                Err(e) => Err(self.send_failed("Message not sent", e)),
            }
        };
        self.publish_affordances();
        result
    }

    /// Submits the participant's guess for the current duel.
    ///
    /// Only one decision per duel reaches the server. The guard is set only
    /// once the connection accepted the message, so a failed send can be
    /// retried.
    ///
    /// # Errors
    ///
    /// [`IntentError::Rejected`] outside a running duel or when a decision
    /// was already submitted, [`IntentError::Send`] if the connection
    /// refused it.
    pub fn submit_decision(&mut self, decision: Decision) -> Result<Decision, IntentError> {
        let result = if self.phase.is_terminal() {
            Err(self.reject_decision(RejectReason::Disconnected))
        } else if !self.phase.accepts_decision() {
            Err(self.reject_decision(RejectReason::NoDuelInProgress))
        } else if self.decision_submitted {
            Err(self.reject_decision(RejectReason::AlreadyDecided))
        } else {
            match self.send_decision(Some(decision)) {
                Ok(()) => {
                    self.sink.on_notice(&Notice::info(format!(
                        "Decision submitted: {}",
                        decision.as_str().to_uppercase()
                    )));
                    Ok(decision)
                }
                Err(e) => Err(self.send_failed("Decision not sent", e)),
            }
        };
        self.publish_affordances();
        result
    }

    /// Asks the server for another duel. Only allowed once the current
    /// duel is resolved.
    ///
    /// # Errors
    ///
    /// [`IntentError::Rejected`] before the result arrived,
    /// [`IntentError::Send`] if the connection refused it.
    pub fn request_next_duel(&mut self) -> Result<(), IntentError> {
        let result = if self.phase == Phase::Resolved {
            match self.outbound.send(&ClientMessage::NextDuel) {
                Ok(()) => {
                    self.transition(Phase::Waiting);
                    self.sink
                        .on_notice(&Notice::info("Looking for a new opponent..."));
                    Ok(())
                }
                Err(e) => Err(self.send_failed("Next duel not requested", e)),
            }
        } else {
            let reason = if self.phase.is_terminal() {
                RejectReason::Disconnected
            } else {
                RejectReason::DuelNotResolved
            };
            self.sink.on_notice(&Notice::warning(format!(
                "Cannot start another duel: {reason}"
            )));
            Err(IntentError::Rejected(reason))
        };
        self.publish_affordances();
        result
    }

    /// Closes the connection. The session ends when the close is reported.
    pub fn quit(&mut self) {
        if !self.phase.is_terminal() {
            info!("leaving the session");
            self.sink.on_notice(&Notice::info("Leaving..."));
        }
        self.outbound.close();
        self.publish_affordances();
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn send_decision(&mut self, decision: Option<Decision>) -> Result<(), SendError> {
        self.outbound.send(&ClientMessage::Decision { decision })?;
        self.decision_submitted = true;
        let kind = decision.map_or("abstain", Decision::as_str);
        metrics::record_decision(kind);
        self.events.emit(Event::DecisionSent {
            timestamp: Utc::now(),
            decision: decision.map(|d| d.as_str().to_owned()),
            automatic: decision.is_none(),
        });
        info!(decision = kind, "decision sent");
        Ok(())
    }

    fn reject_decision(&mut self, reason: RejectReason) -> IntentError {
        debug!(%reason, phase = %self.phase, "decision rejected");
        self.sink.on_decision_rejected(&reason);
        IntentError::Rejected(reason)
    }

    fn send_failed(&mut self, what: &str, error: SendError) -> IntentError {
        warn!(error = %error, phase = %self.phase, "{what}");
        let reason = match error {
            SendError::NotReady => "not_ready",
            SendError::Closed => "closed",
            SendError::Encode(_) => "encode",
        };
        metrics::record_send_failure(reason);
        self.sink
            .on_notice(&Notice::warning(format!("{what}: {error}")));
        IntentError::Send(error)
    }

    fn disconnect(&mut self, notice: Notice) {
        self.timer.cancel();
        self.transition(Phase::Disconnected);
        self.sink.on_notice(&notice);
    }

    fn anomaly(&self, category: &'static str, detail: &str) {
        warn!(
            category,
            detail,
            phase = %self.phase,
            "ignoring server event not valid in the current phase"
        );
        metrics::record_protocol_anomaly(category);
        self.events.emit(Event::ProtocolAnomaly {
            timestamp: Utc::now(),
            category: category.to_owned(),
            phase: self.phase.as_str().to_owned(),
            detail: detail.to_owned(),
        });
    }

    fn transition(&mut self, next: Phase) {
        let from = self.phase;
        if !from.can_transition_to(next) {
            warn!(%from, to = %next, "refusing illegal phase transition");
            return;
        }
        self.phase = next;
        info!(%from, to = %next, "phase changed");
        metrics::record_phase_transition(from.as_str(), next.as_str());
        self.events.emit(Event::PhaseChanged {
            timestamp: Utc::now(),
            from: from.as_str().to_owned(),
            to: next.as_str().to_owned(),
        });
        self.sink.on_phase_changed(next);
    }

    fn publish_affordances(&mut self) {
        let affordances = self.affordances();
        self.sink.on_affordances(affordances);
    }
}
