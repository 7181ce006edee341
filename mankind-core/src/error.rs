//! Core error types for `mankind`
//!
//! Protocol decoding and configuration error types shared across the
//! workspace.

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Protocol Errors
// ============================================================================

/// Failure to decode a frame received from the duel server.
///
/// Every variant is recoverable: the frame is dropped and the session
/// keeps its current phase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The frame is not valid JSON
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// The frame is valid JSON but not an object
    #[error("message must be a JSON object")]
    NotAnObject,

    /// The object carries no string `type` field
    #[error("message has no 'type' field")]
    MissingType,

    /// The `type` field names an event this client does not know
    #[error("unknown message type '{0}'")]
    UnknownType(String),

    /// A known event type with missing or mistyped fields
    #[error("invalid '{kind}' payload: {reason}")]
    InvalidPayload {
        /// The `type` value of the rejected message
        kind: String,
        /// Decoder error message
        reason: String,
    },

    /// A non-text frame arrived where a JSON text frame was expected
    #[error("unexpected {0} frame")]
    UnexpectedFrame(&'static str),
}

impl ProtocolError {
    /// Short, bounded label used for metrics and structured events.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::InvalidJson(_) => "invalid_json",
            Self::NotAnObject => "not_an_object",
            Self::MissingType => "missing_type",
            Self::UnknownType(_) => "unknown_type",
            Self::InvalidPayload { .. } => "invalid_payload",
            Self::UnexpectedFrame(_) => "unexpected_frame",
        }
    }
}

/// A decision string other than `"human"` or `"ai"`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid decision '{0}': expected \"human\" or \"ai\"")]
pub struct InvalidDecision(pub String);

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}{}: {message}", line.map_or_else(String::new, |l| format!(" (line {l})")))]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Configuration validation failed
    #[error("validation failed for {path}: {}", summarize(errors))]
    ValidationError {
        /// Path to the configuration file (or `<cli>` for flag overrides)
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },

    /// Environment variable referenced in configuration is not set
    #[error("environment variable '{var}' not set (referenced at {location})")]
    EnvVarNotSet {
        /// Name of the environment variable
        var: String,
        /// Location in the configuration where it was referenced
        location: String,
    },
}

fn summarize(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .filter(|i| i.severity == Severity::Error)
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found during configuration validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the problematic field (e.g., "server")
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Error - validation failure that prevents configuration from being used
    Error,
    /// Warning - potential issue that does not prevent configuration loading
    Warning,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_issue_display() {
        let issue = ValidationIssue {
            path: "player_id".to_string(),
            message: "must not be empty".to_string(),
            severity: Severity::Error,
        };
        assert_eq!(issue.to_string(), "error: must not be empty at player_id");
    }

    #[test]
    fn test_validation_error_lists_only_errors() {
        let err = ConfigError::ValidationError {
            path: "client.yaml".to_string(),
            errors: vec![
                ValidationIssue {
                    path: "server".to_string(),
                    message: "scheme must be ws or wss".to_string(),
                    severity: Severity::Error,
                },
                ValidationIssue {
                    path: "duel_duration".to_string(),
                    message: "unusually long duel".to_string(),
                    severity: Severity::Warning,
                },
            ],
        };
        let text = err.to_string();
        assert!(text.contains("scheme must be ws or wss"));
        assert!(!text.contains("unusually long"));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::ParseError {
            path: PathBuf::from("client.yaml"),
            line: Some(3),
            message: "unexpected token".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "parse error in client.yaml (line 3): unexpected token"
        );
    }

    #[test]
    fn test_protocol_error_categories_are_distinct() {
        let errors = [
            ProtocolError::InvalidJson("eof".into()),
            ProtocolError::NotAnObject,
            ProtocolError::MissingType,
            ProtocolError::UnknownType("x".into()),
            ProtocolError::InvalidPayload {
                kind: "message".into(),
                reason: "missing field".into(),
            },
            ProtocolError::UnexpectedFrame("binary"),
        ];
        let mut categories: Vec<_> = errors.iter().map(ProtocolError::category).collect();
        categories.sort_unstable();
        categories.dedup();
        assert_eq!(categories.len(), errors.len());
    }

    #[test]
    fn test_invalid_decision_display() {
        let err = InvalidDecision("maybe".to_string());
        assert!(err.to_string().contains("maybe"));
    }
}
