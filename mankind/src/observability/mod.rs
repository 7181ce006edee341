//! Observability for the duel client.
//!
//! Diagnostic logging, Prometheus metrics and a JSONL stream of session
//! events.

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{Event, EventEmitter};
pub use logging::{LogFormat, init_logging};
pub use metrics::init_metrics;
