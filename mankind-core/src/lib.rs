//! `mankind` Core: wire protocol and shared error types
//!
//! This crate provides the JSON message types exchanged with the duel
//! server and the error types shared between the protocol layer and the
//! `mankind` client.

pub mod error;
pub mod protocol;

pub use error::{ConfigError, InvalidDecision, ProtocolError, Severity, ValidationIssue};
pub use protocol::{ClientMessage, Decision, ServerMessage};
