//! `play` command handler.

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::args::PlayArgs;
use crate::client::{self, LineIntents, RunOptions};
use crate::config::{ClientConfig, ClientSettings, ConfigLoader, Validator};
use crate::error::{ConfigError, MankindError};
use crate::observability::{EventEmitter, init_metrics};
use crate::sink::TerminalSink;

/// Label used in validation errors when no file was given.
const FLAGS_SOURCE: &str = "<cli>";

/// Connect and play in the terminal until the user quits or the server
/// goes away.
///
/// # Errors
///
/// Returns a configuration error if the file or flags are invalid, an I/O
/// error if the events file or metrics listener cannot be opened, or a
/// connection error if the server cannot be reached.
pub async fn run(args: &PlayArgs, cancel: CancellationToken) -> Result<(), MankindError> {
    let settings = resolve_settings(args)?;

    if let Some(port) = settings.metrics_port {
        init_metrics(Some(port))?;
        info!(port, "Prometheus metrics endpoint started");
    }

    let events = match &settings.events_file {
        Some(path) => {
            info!(path = %path.display(), "writing session events");
            EventEmitter::from_file(path)?
        }
        None => EventEmitter::noop(),
    };

    let summary = client::run(
        RunOptions {
            settings,
            events: Arc::new(events),
            cancel,
        },
        Box::new(TerminalSink::stdout()),
        LineIntents::stdin(),
    )
    .await?;

    info!(
        reason = summary.reason,
        duels = summary.duels_completed,
        "goodbye"
    );
    Ok(())
}

/// Loads `--config` (if any), applies flag overrides and validates.
///
/// # Errors
///
/// Returns the loader error, or [`ConfigError::ValidationError`] listing
/// every problem found.
pub fn resolve_settings(args: &PlayArgs) -> Result<ClientSettings, ConfigError> {
    let base = match &args.config {
        Some(path) => load_file(path)?,
        None => ClientConfig::default(),
    };
    let config = base.overlay(args.overrides());

    let result = Validator::new().validate(&config);
    for issue in &result.warnings {
        warn!(field = %issue.path, "{}", issue.message);
    }
    let source = args
        .config
        .as_ref()
        .map_or_else(|| FLAGS_SOURCE.to_owned(), |p| p.display().to_string());
    match result.settings {
        Some(settings) if !result.has_errors() => Ok(settings),
        _ => Err(ConfigError::ValidationError {
            path: source,
            errors: result.errors,
        }),
    }
}

fn load_file(path: &Path) -> Result<ClientConfig, ConfigError> {
    info!(config = %path.display(), "loading configuration");
    let loaded = ConfigLoader::new().load(path)?;
    for warning in &loaded.warnings {
        warn!(
            location = warning.location.as_deref().unwrap_or("<unknown>"),
            "{}",
            warning.message
        );
    }
    Ok(loaded.config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn flags_alone_resolve() {
        let args = PlayArgs {
            server: Some("wss://duel.example".to_owned()),
            player_id: Some("grace".to_owned()),
            duel_duration: Some("45s".to_owned()),
            ..PlayArgs::default()
        };
        let settings = resolve_settings(&args).unwrap();
        assert_eq!(settings.server, "wss://duel.example");
        assert_eq!(settings.player_id.as_str(), "grace");
        assert_eq!(settings.duel_duration, 45);
    }

    #[test]
    fn flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "server: ws://from-file:8001\nplayer_id: from-file\nduel_duration: 2m"
        )
        .unwrap();
        let args = PlayArgs {
            config: Some(file.path().to_path_buf()),
            player_id: Some("from-flag".to_owned()),
            ..PlayArgs::default()
        };
        let settings = resolve_settings(&args).unwrap();
        assert_eq!(settings.server, "ws://from-file:8001");
        assert_eq!(settings.player_id.as_str(), "from-flag");
        assert_eq!(settings.duel_duration, 120);
    }

    #[test]
    fn invalid_flags_name_the_cli() {
        let args = PlayArgs {
            server: Some("localhost:8001".to_owned()),
            ..PlayArgs::default()
        };
        match resolve_settings(&args).unwrap_err() {
            ConfigError::ValidationError { path, errors } => {
                assert_eq!(path, FLAGS_SOURCE);
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].path, "server");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
