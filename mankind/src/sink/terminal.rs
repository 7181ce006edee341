use std::io::Write;

use tracing::debug;

use super::{Notice, NoticeLevel, PresentationSink};
use crate::error::RejectReason;
use crate::session::{DuelResult, Phase};

/// Countdown values worth printing; the rest of the ticks stay silent.
const ANNOUNCED_MARKS: [u32; 4] = [90, 60, 30, 10];
const FINAL_COUNTDOWN: u32 = 5;

/// Renders `mm:ss`.
#[must_use]
pub fn format_clock(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Plain-text chat transcript for an interactive terminal.
pub struct TerminalSink {
    out: Box<dyn Write + Send>,
}

impl std::fmt::Debug for TerminalSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalSink").finish_non_exhaustive()
    }
}

impl TerminalSink {
    /// Writes to an arbitrary writer.
    #[must_use]
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self { out }
    }

    /// Writes to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    fn line(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{text}").and_then(|()| self.out.flush()) {
            debug!(error = %e, "terminal write failed");
        }
    }

    fn system(&mut self, text: &str) {
        self.line(&format!(">> {text}"));
    }
}

impl PresentationSink for TerminalSink {
    fn on_phase_changed(&mut self, phase: Phase) {
        match phase {
            Phase::Waiting => self.system("Waiting for an opponent..."),
            Phase::InProgress => {
                self.system("Duel in progress. Chat, then decide with /human or /ai.");
            }
            Phase::Disconnected => self.system("Disconnected."),
            Phase::Connecting | Phase::TimeUp | Phase::Resolved => {}
        }
    }

    fn on_message(&mut self, sender: &str, content: &str) {
        let who = sender.to_uppercase();
        self.line(&format!("{who}: {content}"));
    }

    fn on_tick(&mut self, remaining: u32) {
        if ANNOUNCED_MARKS.contains(&remaining) || (1..=FINAL_COUNTDOWN).contains(&remaining) {
            self.system(&format!("{} remaining", format_clock(remaining)));
        }
    }

    fn on_result(&mut self, result: &DuelResult) {
        let headline = if result.correct { "YOU WON!" } else { "YOU LOST!" };
        let opponent = if result.opponent_was_human {
            "a HUMAN"
        } else {
            "an AI"
        };
        self.line("");
        self.line(&format!("*** {headline} ***"));
        self.system(&format!("Your opponent was {opponent}."));
        self.system(&format!(
            "Score {:+} | Level {} | XP {}",
            result.score_delta, result.new_level, result.new_xp
        ));
        self.system("Type /next for another duel or /quit to leave.");
    }

    fn on_decision_rejected(&mut self, reason: &RejectReason) {
        self.system(&format!("Decision not sent: {reason}"));
    }

    fn on_notice(&mut self, notice: &Notice) {
        match notice.level {
            NoticeLevel::Info => self.system(&notice.text),
            NoticeLevel::Warning => self.system(&format!("warning: {}", notice.text)),
            NoticeLevel::Error => self.system(&format!("error: {}", notice.text)),
        }
    }
}
