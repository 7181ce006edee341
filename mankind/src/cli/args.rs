//! CLI argument definitions
//!
//! All Clap derive structs for `mankind` command-line parsing.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::config::ClientConfig;
use crate::observability::LogFormat;

// ============================================================================
// Root CLI
// ============================================================================

/// Terminal client for the human-or-AI chat duel.
#[derive(Parser, Debug)]
#[command(name = "mankind", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "MANKIND_COLOR")]
    pub color: ColorChoice,

    /// Diagnostic log format on stderr.
    #[arg(long, default_value = "human", global = true, env = "MANKIND_LOG_FORMAT")]
    pub log_format: LogFormat,
}

// ============================================================================
// Top-Level Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect to a duel server and play in the terminal.
    Play(PlayArgs),

    /// Validate client configuration files without connecting.
    Validate(ValidateArgs),

    /// Generate shell completion scripts.
    Completions(CompletionsArgs),

    /// Display version information.
    Version(VersionArgs),
}

// ============================================================================
// Play / Validate
// ============================================================================

/// Arguments for `play`.
///
/// Flags override values from `--config`.
#[derive(Args, Debug, Default)]
pub struct PlayArgs {
    /// Path to YAML configuration file.
    #[arg(short, long, env = "MANKIND_CONFIG")]
    pub config: Option<PathBuf>,

    /// Base WebSocket URL of the duel server.
    #[arg(short, long, env = "MANKIND_SERVER")]
    pub server: Option<String>,

    /// Player identifier used in the socket path (random when unset).
    #[arg(short, long, env = "MANKIND_PLAYER_ID")]
    pub player_id: Option<String>,

    /// Length of a duel, e.g. `2m` or `90s`.
    #[arg(long, env = "MANKIND_DUEL_DURATION")]
    pub duel_duration: Option<String>,

    /// Bound on the WebSocket handshake, e.g. `10s`.
    #[arg(long, env = "MANKIND_CONNECT_TIMEOUT")]
    pub connect_timeout: Option<String>,

    /// Write JSONL session events to this file.
    #[arg(long, env = "MANKIND_EVENTS_FILE")]
    pub events_file: Option<PathBuf>,

    /// Serve Prometheus metrics on 127.0.0.1:PORT.
    #[arg(long, env = "MANKIND_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

impl PlayArgs {
    /// The flag values as a configuration overlay.
    #[must_use]
    pub fn overrides(&self) -> ClientConfig {
        ClientConfig {
            server: self.server.clone(),
            player_id: self.player_id.clone(),
            duel_duration: self.duel_duration.clone(),
            connect_timeout: self.connect_timeout.clone(),
            events_file: self.events_file.clone(),
            metrics_port: self.metrics_port,
        }
    }
}

/// Arguments for `validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Configuration files to validate.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Enable strict validation (warnings become errors).
    #[arg(long)]
    pub strict: bool,
}

// ============================================================================
// Completions / Version
// ============================================================================

/// Arguments for shell completion generation.
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell for completion script.
    pub shell: Shell,
}

/// Arguments for version display.
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

/// Output format for structured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}

/// Shell type for completion generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    /// Bash shell.
    Bash,
    /// Zsh shell.
    Zsh,
    /// Fish shell.
    Fish,
    /// `PowerShell`.
    #[value(name = "powershell")]
    PowerShell,
    /// Elvish shell.
    Elvish,
}

// ============================================================================
// Tests
// ============================================================================
