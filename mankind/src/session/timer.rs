//! Cancellable one-second countdown.
//!
//! The ticker runs as a spawned task that pushes [`TimerTick`]s into the
//! session input queue. The countdown value itself lives here and is only
//! touched by the session, so a tick that was already queued when the timer
//! was cancelled or restarted is recognised by its epoch and discarded.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::input::{InputSender, SessionInput, TimerTick};

/// Countdown resolution.
pub const TICK: Duration = Duration::from_secs(1);

/// What a tick did to the countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The tick belongs to a cancelled or replaced countdown.
    Stale,
    /// One second elapsed; this many remain.
    Ticked(u32),
    /// The countdown reached zero and stopped.
    Expired,
}

struct Ticker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Countdown owned by the session.
pub struct Timer {
    inputs: InputSender,
    epoch: u64,
    remaining: u32,
    running: Option<Ticker>,
}

impl std::fmt::Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timer")
            .field("epoch", &self.epoch)
            .field("remaining", &self.remaining)
            .field("running", &self.running.is_some())
            .finish_non_exhaustive()
    }
}

impl Timer {
    /// Creates a stopped timer that will deliver its ticks into `inputs`.
    #[must_use]
    pub fn new(inputs: InputSender) -> Self {
        Self {
            inputs,
            epoch: 0,
            remaining: 0,
            running: None,
        }
    }

    /// Starts a fresh countdown of `seconds`, replacing any running one.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, seconds: u32) {
        self.cancel();
        self.remaining = seconds;

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_ticker(self.inputs.clone(), self.epoch, cancel.clone()));
        self.running = Some(Ticker { cancel, handle });
        debug!(epoch = self.epoch, seconds, "countdown started");
    }

    /// Stops the countdown. Calling it on a stopped timer does nothing.
    ///
    /// Ticks already sitting in the queue become stale immediately.
    pub fn cancel(&mut self) {
        if let Some(ticker) = self.running.take() {
            ticker.cancel.cancel();
            ticker.handle.abort();
            debug!(epoch = self.epoch, "countdown cancelled");
        }
        self.epoch = self.epoch.wrapping_add(1);
    }

    /// Replaces the remaining time with an authoritative value.
    ///
    /// Ignored (returns `false`) when no countdown is running.
    pub fn resync(&mut self, remaining: u32) -> bool {
        if self.running.is_none() {
            return false;
        }
        if remaining != self.remaining {
            debug!(from = self.remaining, to = remaining, "countdown resynced");
        }
        self.remaining = remaining;
        true
    }

    /// Applies a tick popped from the input queue.
    pub fn on_tick(&mut self, tick: TimerTick) -> TickOutcome {
        if self.running.is_none() || tick.epoch != self.epoch {
            trace!(tick = tick.epoch, current = self.epoch, "stale tick");
            return TickOutcome::Stale;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.cancel();
            TickOutcome::Expired
        } else {
            TickOutcome::Ticked(self.remaining)
        }
    }

    /// Seconds left on the countdown.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Whether a countdown is running.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Epoch of the current (or next) countdown.
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if let Some(ticker) = self.running.take() {
            ticker.cancel.cancel();
            ticker.handle.abort();
        }
    }
}

async fn run_ticker(inputs: InputSender, epoch: u64, cancel: CancellationToken) {
    let mut interval = tokio::time::interval_at(Instant::now() + TICK, TICK);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                if inputs.send(SessionInput::Tick(TimerTick { epoch })).is_err() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::input::{InputReceiver, input_queue};

    async fn next_tick(rx: &mut InputReceiver) -> TimerTick {
        match rx.recv().await {
            Some(SessionInput::Tick(tick)) => tick,
            other => panic!("expected a tick, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn counts_down_to_expiry() {
        let (tx, mut rx) = input_queue();
        let mut timer = Timer::new(tx);
        timer.start(3);

        let mut outcomes = Vec::new();
        for _ in 0..3 {
            let tick = next_tick(&mut rx).await;
            outcomes.push(timer.on_tick(tick));
        }
        assert_eq!(
            outcomes,
            vec![
                TickOutcome::Ticked(2),
                TickOutcome::Ticked(1),
                TickOutcome::Expired
            ]
        );
        assert!(!timer.is_running());
        assert_eq!(timer.remaining(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_arrives_after_one_second() {
        let (tx, mut rx) = input_queue();
        let mut timer = Timer::new(tx);
        let started = Instant::now();
        timer.start(10);
        let _ = next_tick(&mut rx).await;
        assert_eq!(started.elapsed(), TICK);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_makes_queued_ticks_stale() {
        let (tx, mut rx) = input_queue();
        let mut timer = Timer::new(tx);
        timer.start(5);
        let old = next_tick(&mut rx).await;

        timer.start(5);
        assert_eq!(timer.on_tick(old), TickOutcome::Stale);
        assert_eq!(timer.remaining(), 5);

        let fresh = next_tick(&mut rx).await;
        assert_eq!(timer.on_tick(fresh), TickOutcome::Ticked(4));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_idempotent_and_effective() {
        let (tx, mut rx) = input_queue();
        let mut timer = Timer::new(tx);
        timer.cancel();
        timer.cancel();
        assert!(!timer.is_running());

        timer.start(5);
        let queued = next_tick(&mut rx).await;
        timer.cancel();
        timer.cancel();
        assert_eq!(timer.on_tick(queued), TickOutcome::Stale);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(rx.try_recv().is_err(), "no ticks after cancel");
    }

    #[tokio::test(start_paused = true)]
    async fn resync_only_applies_while_running() {
        let (tx, mut rx) = input_queue();
        let mut timer = Timer::new(tx);
        assert!(!timer.resync(30));
        assert_eq!(timer.remaining(), 0);

        timer.start(120);
        assert!(timer.resync(45));
        let tick = next_tick(&mut rx).await;
        assert_eq!(timer.on_tick(tick), TickOutcome::Ticked(44));
    }

    #[tokio::test(start_paused = true)]
    async fn resync_to_zero_expires_on_next_tick() {
        let (tx, mut rx) = input_queue();
        let mut timer = Timer::new(tx);
        timer.start(60);
        timer.resync(0);
        let tick = next_tick(&mut rx).await;
        assert_eq!(timer.on_tick(tick), TickOutcome::Expired);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_stops_the_ticker() {
        let (tx, mut rx) = input_queue();
        let mut timer = Timer::new(tx);
        timer.start(30);
        drop(timer);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }
}
