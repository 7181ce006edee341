//! Prometheus metrics for the duel client.
//!
//! All label values are either compile-time constants or pass through a
//! sanitizer, since server-supplied strings (sender names) must not be
//! able to grow the label set.

use std::sync::atomic::{AtomicBool, Ordering};

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::MankindError;

static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Sender names kept verbatim as labels.
const KNOWN_SENDERS: [&str; 3] = ["opponent", "you", "system"];

/// Buckets a message sender into a bounded label.
#[must_use]
pub fn sanitize_sender_label(sender: &str) -> &str {
    if KNOWN_SENDERS.contains(&sender) {
        sender
    } else {
        "__other__"
    }
}

/// Installs the global recorder.
///
/// With `Some(port)` a Prometheus scrape endpoint is served on
/// `127.0.0.1:<port>`; with `None` metrics are recorded but not exported.
/// A second call is a no-op.
///
/// # Errors
///
/// Returns `MankindError::Io` if the recorder or listener cannot be
/// installed (for example when the port is taken).
pub fn init_metrics(port: Option<u16>) -> Result<(), MankindError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| MankindError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    describe_counter!(
        "mankind_phase_transitions_total",
        "Session phase transitions"
    );
    describe_gauge!("mankind_current_phase", "Active session phase (1 = active)");
    describe_counter!("mankind_messages_total", "Chat lines by direction");
    describe_counter!("mankind_decisions_total", "Decisions sent by kind");
    describe_counter!("mankind_duels_total", "Resolved duels by outcome");
    describe_counter!(
        "mankind_protocol_anomalies_total",
        "Inbound frames dropped by category"
    );
    describe_counter!(
        "mankind_connection_events_total",
        "Connection lifecycle events"
    );
    describe_gauge!(
        "mankind_time_remaining_seconds",
        "Seconds left in the running duel"
    );
    describe_counter!("mankind_send_failures_total", "Outbound sends refused");
}

/// Records a phase transition and moves the current-phase gauge.
pub fn record_phase_transition(from: &'static str, to: &'static str) {
    counter!("mankind_phase_transitions_total", "from" => from, "to" => to).increment(1);
    gauge!("mankind_current_phase", "phase" => from).set(0.0);
    gauge!("mankind_current_phase", "phase" => to).set(1.0);
}

/// Records an inbound chat line.
pub fn record_message_received(sender: &str) {
    counter!(
        "mankind_messages_total",
        "direction" => "inbound",
        "sender" => sanitize_sender_label(sender).to_owned(),
    )
    .increment(1);
}

/// Records an outbound chat line.
pub fn record_message_sent() {
    counter!("mankind_messages_total", "direction" => "outbound", "sender" => "you").increment(1);
}

/// Records a decision; `kind` is `human`, `ai` or `abstain`.
pub fn record_decision(kind: &'static str) {
    counter!("mankind_decisions_total", "kind" => kind).increment(1);
}

/// Records a resolved duel.
pub fn record_duel_resolved(correct: bool) {
    let outcome = if correct { "correct" } else { "incorrect" };
    counter!("mankind_duels_total", "outcome" => outcome).increment(1);
}

/// Records a dropped inbound frame.
pub fn record_protocol_anomaly(category: &'static str) {
    counter!("mankind_protocol_anomalies_total", "category" => category).increment(1);
}

/// Records a connection lifecycle event (`opened`, `closed`, `failed`).
pub fn record_connection_event(event: &'static str) {
    counter!("mankind_connection_events_total", "event" => event).increment(1);
}

/// Publishes the countdown.
pub fn set_time_remaining(seconds: u32) {
    gauge!("mankind_time_remaining_seconds").set(f64::from(seconds));
}

/// Records an outbound send refused by the connection.
pub fn record_send_failure(reason: &'static str) {
    counter!("mankind_send_failures_total", "reason" => reason).increment(1);
}
