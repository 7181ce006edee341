//! Logging initialization.
//!
//! Diagnostics always go to stderr so they never interleave with the chat
//! transcript on stdout. `MANKIND_LOG_LEVEL` takes any `EnvFilter`
//! directive and overrides the verbosity flags.

use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

use crate::cli::args::ColorChoice;

/// Environment variable that overrides `-v`/`-q`.
pub const LOG_LEVEL_ENV: &str = "MANKIND_LOG_LEVEL";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines, colored when the terminal allows it.
    #[default]
    Human,
    /// Newline-delimited JSON.
    Json,
}

/// Maps the `-v` count (and `-q`) to a filter directive.
///
/// `quiet` wins over any verbosity and only lets errors through. Without
/// flags the client logs warnings, since protocol anomalies are warnings.
#[must_use]
pub const fn verbosity_to_directive(verbosity: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Installs the global tracing subscriber.
///
/// Safe to call more than once: later calls are ignored.
pub fn init_logging(format: LogFormat, verbosity: u8, quiet: bool, color: ColorChoice) {
    let filter = EnvFilter::try_from_env(LOG_LEVEL_ENV)
        .unwrap_or_else(|_| EnvFilter::new(verbosity_to_directive(verbosity, quiet)));

    let show_target = verbosity >= 2;

    let use_ansi = match color {
        ColorChoice::Auto => {
            std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
        }
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    let result = match format {
        LogFormat::Human => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(use_ansi)
            .with_target(show_target)
            .with_writer(std::io::stderr)
            .try_init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_target(show_target)
            .with_current_span(false)
            .with_writer(std::io::stderr)
            .try_init(),
    };
    if result.is_err() {
        tracing::trace!("tracing subscriber already installed");
    }
}
