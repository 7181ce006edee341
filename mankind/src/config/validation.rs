//! Validation of client configuration.
//!
//! Every problem is collected rather than stopping at the first, and a
//! valid configuration is turned into [`ClientSettings`] in the same pass.

use std::time::Duration;

use crate::config::schema::{ClientConfig, ClientSettings};
use crate::connection::{PlayerId, check_server_url};
use crate::error::{Severity, ValidationIssue};

/// Whether `wss://` servers can be reached by this build.
const TLS_ENABLED: bool = cfg!(feature = "tls");

/// Duels longer than this are allowed but flagged.
const LONG_DUEL: Duration = Duration::from_secs(60 * 60);

/// Outcome of validating a [`ClientConfig`].
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Problems that prevent use.
    pub errors: Vec<ValidationIssue>,
    /// Informational findings.
    pub warnings: Vec<ValidationIssue>,
    /// Resolved settings; `Some` exactly when there are no errors.
    pub settings: Option<ClientSettings>,
}

impl ValidationResult {
    /// Whether any error was found.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Configuration validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates `config` and resolves defaults for unset fields.
    pub fn validate(&mut self, config: &ClientConfig) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();
        let defaults = ClientSettings::default();

        let server = config
            .server
            .as_deref()
            .map_or_else(|| defaults.server.clone(), |s| s.trim().to_owned());
        if let Err(reason) = check_server_url(&server) {
            self.error("server", reason);
        } else if !TLS_ENABLED && server.starts_with("wss://") {
            self.warning(
                "server",
                "wss:// needs TLS support; this build was compiled without the `tls` feature",
            );
        }

        let player_id = match config.player_id.as_deref() {
            None => Some(defaults.player_id.clone()),
            Some(raw) => match PlayerId::parse(raw) {
                Ok(id) => Some(id),
                Err(e) => {
                    self.error("player_id", e.to_string());
                    None
                }
            },
        };

        let duel_duration = config
            .duel_duration
            .as_deref()
            .map_or(Some(Duration::from_secs(u64::from(defaults.duel_duration))), |raw| {
                self.duration("duel_duration", raw)
            })
            .and_then(|d| self.whole_seconds(d));

        let connect_timeout = config
            .connect_timeout
            .as_deref()
            .map_or(Some(defaults.connect_timeout), |raw| {
                self.duration("connect_timeout", raw)
            });

        if config.metrics_port == Some(0) {
            self.error("metrics_port", "port 0 is not a valid scrape port");
        }

        let settings = match (player_id, duel_duration, connect_timeout) {
            (Some(player_id), Some(duel_duration), Some(connect_timeout))
                if self.errors.is_empty() =>
            {
                Some(ClientSettings {
                    server,
                    player_id,
                    duel_duration,
                    connect_timeout,
                    events_file: config.events_file.clone(),
                    metrics_port: config.metrics_port,
                })
            }
            _ => None,
        };

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
            settings,
        }
    }

    fn duration(&mut self, field: &str, raw: &str) -> Option<Duration> {
        match humantime::parse_duration(raw.trim()) {
            Ok(d) if d.is_zero() => {
                self.error(field, "must be greater than zero");
                None
            }
            Ok(d) => Some(d),
            Err(e) => {
                self.error(field, format!("'{raw}' is not a duration: {e}"));
                None
            }
        }
    }

    fn whole_seconds(&mut self, duration: Duration) -> Option<u32> {
        if duration < Duration::from_secs(1) {
            self.error("duel_duration", "must be at least one second");
            return None;
        }
        if duration.subsec_nanos() != 0 {
            self.warning(
                "duel_duration",
                format!(
                    "fractional seconds are dropped; using {}s",
                    duration.as_secs()
                ),
            );
        }
        if duration > LONG_DUEL {
            self.warning(
                "duel_duration",
                format!("{} is unusually long", humantime::format_duration(duration)),
            );
        }
        match u32::try_from(duration.as_secs()) {
            Ok(secs) => Some(secs),
            Err(_) => {
                self.error("duel_duration", "is too long");
                None
            }
        }
    }

    fn error(&mut self, path: &str, message: impl Into<String>) {
        self.errors.push(ValidationIssue {
            path: path.to_owned(),
            message: message.into(),
            severity: Severity::Error,
        });
    }

    fn warning(&mut self, path: &str, message: impl Into<String>) {
        self.warnings.push(ValidationIssue {
            path: path.to_owned(),
            message: message.into(),
            severity: Severity::Warning,
        });
    }
}
