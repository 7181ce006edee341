use std::sync::{Arc, Mutex, MutexGuard};

use super::{Notice, PresentationSink};
use crate::error::RejectReason;
use crate::session::{Affordances, DuelResult, Phase};

/// One recorded sink call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCall {
    /// `on_phase_changed`
    Phase(Phase),
    /// `on_message`
    Message {
        /// Sender as passed by the session.
        sender: String,
        /// Line content.
        content: String,
    },
    /// `on_tick`
    Tick(u32),
    /// `on_result`
    Result(DuelResult),
    /// `on_decision_rejected`
    Rejected(RejectReason),
    /// `on_notice`
    Notice(Notice),
    /// `on_affordances`
    Affordances(Affordances),
}

/// Shared, inspectable log of sink calls.
#[derive(Debug, Clone, Default)]
pub struct Transcript(Arc<Mutex<Vec<SinkCall>>>);

impl Transcript {
    fn lock(&self) -> MutexGuard<'_, Vec<SinkCall>> {
        self.0
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn push(&self, call: SinkCall) {
        self.lock().push(call);
    }

    /// Every call so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<SinkCall> {
        self.lock().clone()
    }

    /// Phases entered, in order.
    #[must_use]
    pub fn phases(&self) -> Vec<Phase> {
        self.lock()
            .iter()
            .filter_map(|c| match c {
                SinkCall::Phase(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    /// Chat lines as `(sender, content)`, in order.
    #[must_use]
    pub fn messages(&self) -> Vec<(String, String)> {
        self.lock()
            .iter()
            .filter_map(|c| match c {
                SinkCall::Message { sender, content } => Some((sender.clone(), content.clone())),
                _ => None,
            })
            .collect()
    }

    /// Notices, in order.
    #[must_use]
    pub fn notices(&self) -> Vec<Notice> {
        self.lock()
            .iter()
            .filter_map(|c| match c {
                SinkCall::Notice(n) => Some(n.clone()),
                _ => None,
            })
            .collect()
    }

    /// Rejected decisions, in order.
    #[must_use]
    pub fn rejections(&self) -> Vec<RejectReason> {
        self.lock()
            .iter()
            .filter_map(|c| match c {
                SinkCall::Rejected(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    /// Most recent affordances report.
    #[must_use]
    pub fn last_affordances(&self) -> Option<Affordances> {
        self.lock().iter().rev().find_map(|c| match c {
            SinkCall::Affordances(a) => Some(*a),
            _ => None,
        })
    }

    /// Most recent countdown value.
    #[must_use]
    pub fn last_tick(&self) -> Option<u32> {
        self.lock().iter().rev().find_map(|c| match c {
            SinkCall::Tick(t) => Some(*t),
            _ => None,
        })
    }

    /// Results received, in order.
    #[must_use]
    pub fn results(&self) -> Vec<DuelResult> {
        self.lock()
            .iter()
            .filter_map(|c| match c {
                SinkCall::Result(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Headless sink that records every call into a [`Transcript`].
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    transcript: Transcript,
}

impl MemorySink {
    /// Creates a sink and returns it together with a handle on its log.
    #[must_use]
    pub fn new() -> (Self, Transcript) {
        let sink = Self::default();
        let transcript = sink.transcript.clone();
        (sink, transcript)
    }
}

impl PresentationSink for MemorySink {
    fn on_phase_changed(&mut self, phase: Phase) {
        self.transcript.push(SinkCall::Phase(phase));
    }

    fn on_message(&mut self, sender: &str, content: &str) {
        self.transcript.push(SinkCall::Message {
            sender: sender.to_owned(),
            content: content.to_owned(),
        });
    }

    fn on_tick(&mut self, remaining: u32) {
        self.transcript.push(SinkCall::Tick(remaining));
    }

    fn on_result(&mut self, result: &DuelResult) {
        self.transcript.push(SinkCall::Result(result.clone()));
    }

    fn on_decision_rejected(&mut self, reason: &RejectReason) {
        self.transcript.push(SinkCall::Rejected(reason.clone()));
    }

    fn on_notice(&mut self, notice: &Notice) {
        self.transcript.push(SinkCall::Notice(notice.clone()));
    }

    fn on_affordances(&mut self, affordances: Affordances) {
        self.transcript.push(SinkCall::Affordances(affordances));
    }
}
