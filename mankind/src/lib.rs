//! `mankind` - terminal client for the human-or-AI chat duel
//!
//! This library provides the pieces of the duel client: the WebSocket
//! connection manager, the duel session state machine with its countdown,
//! and the presentation sinks the session reports to.

pub mod cli;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod observability;
pub mod session;
pub mod sink;
