//! Error types for `mankind`
//!
//! This module provides the error hierarchy for the duel client and the
//! process exit codes it maps to.

use thiserror::Error;

pub use mankind_core::error::{ConfigError, ProtocolError, Severity, ValidationIssue};

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `mankind` CLI operations.
///
/// These codes follow Unix conventions.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Connection error (handshake failed, server unreachable)
    pub const CONNECTION_ERROR: i32 = 4;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `mankind` operations.
///
/// Aggregates all domain-specific errors and maps each to an exit code.
#[derive(Debug, Error)]
pub enum MankindError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Connection to the duel server failed
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Invalid command-line usage
    #[error("usage error: {0}")]
    Usage(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl MankindError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) | Self::Yaml(_) => ExitCode::CONFIG_ERROR,
            Self::Connection(_) => ExitCode::CONNECTION_ERROR,
            Self::Usage(_) => ExitCode::USAGE_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
        }
    }
}

// ============================================================================
// Connection Errors
// ============================================================================

/// Terminal failures of the WebSocket channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// The endpoint could not be turned into a WebSocket request
    #[error("invalid endpoint '{url}': {reason}")]
    InvalidEndpoint {
        /// The rejected URL
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// The WebSocket handshake failed
    #[error("handshake with {url} failed: {reason}")]
    Handshake {
        /// Endpoint being dialed
        url: String,
        /// Underlying error message
        reason: String,
    },

    /// The handshake did not complete in time
    #[error("connecting to {url} timed out after {timeout_ms}ms")]
    Timeout {
        /// Endpoint being dialed
        url: String,
        /// Configured connect timeout in milliseconds
        timeout_ms: u64,
    },

    /// The open channel failed while reading or writing
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// Send Errors
// ============================================================================

/// Why an outbound message could not be handed to the channel.
#[derive(Debug, Error)]
pub enum SendError {
    /// The channel has not finished opening
    #[error("connection is not open yet")]
    NotReady,

    /// The channel has closed or failed; no further sends are attempted
    #[error("connection is closed")]
    Closed,

    /// The message could not be serialized
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

// ============================================================================
// Intent Errors
// ============================================================================

/// Why a guarded user intent was refused by the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    /// No duel is running (waiting for an opponent, or already resolved)
    #[error("no duel in progress")]
    NoDuelInProgress,

    /// A decision was already sent for this duel
    #[error("a decision was already submitted for this duel")]
    AlreadyDecided,

    /// The decision value is neither `human` nor `ai`
    #[error("'{0}' is not a valid decision; choose human or ai")]
    InvalidChoice(String),

    /// The connection has not opened yet
    #[error("not connected to the server yet")]
    NotConnected,

    /// A next duel can only be requested once the current one is resolved
    #[error("the current duel has not been resolved yet")]
    DuelNotResolved,

    /// The connection is gone
    #[error("disconnected from the server")]
    Disconnected,
}

/// Failure of a user intent: either refused by the session guards or
/// refused by the connection.
#[derive(Debug, Error)]
pub enum IntentError {
    /// Refused by the session state machine
    #[error("rejected: {0}")]
    Rejected(RejectReason),

    /// Accepted by the session but the connection could not send it
    #[error(transparent)]
    Send(#[from] SendError),
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `mankind` operations.
pub type Result<T> = std::result::Result<T, MankindError>;

// ============================================================================
// Tests
// ============================================================================
