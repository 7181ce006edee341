//! `mankind` - terminal client for the human-or-AI chat duel

use clap::Parser;
use tokio_util::sync::CancellationToken;

use mankind::cli::args::Cli;
use mankind::cli::commands;
use mankind::error::ExitCode;
use mankind::observability::init_logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.log_format, cli.verbose, cli.quiet, cli.color);

    let cancel = CancellationToken::new();
    tokio::spawn(watch_signals(cancel.clone()));

    let result = commands::dispatch(cli, cancel.clone()).await;

    match result {
        Ok(()) if cancel.is_cancelled() => std::process::exit(ExitCode::INTERRUPTED),
        Ok(()) => std::process::exit(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}

/// First signal closes the session gracefully, the second exits at once.
async fn watch_signals(cancel: CancellationToken) {
    let mut sigterm =
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(signal) => Some(signal),
            Err(e) => {
                tracing::warn!(error = %e, "failed to register SIGTERM handler");
                None
            }
        };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        () = recv_sigterm(sigterm.as_mut()) => {}
    }

    eprintln!("\nShutting down gracefully... (press Ctrl+C again to force)");
    cancel.cancel();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => std::process::exit(ExitCode::INTERRUPTED),
        () = recv_sigterm(sigterm.as_mut()) => std::process::exit(ExitCode::TERMINATED),
    }
}

async fn recv_sigterm(signal: Option<&mut tokio::signal::unix::Signal>) {
    match signal {
        Some(signal) => {
            signal.recv().await;
        }
        None => std::future::pending().await,
    }
}
