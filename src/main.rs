//! `escaperoom` - timed escape-room puzzles

use clap::Parser;
use tokio::signal::unix::{Signal, SignalKind, signal};
use tokio_util::sync::CancellationToken;

use escaperoom::cli::args::Cli;
use escaperoom::cli::commands;
use escaperoom::error::ExitCode;
use escaperoom::observability::{LogSettings, init_logging};

/// Waits for SIGINT or SIGTERM and returns the matching exit code.
async fn next_signal(sigterm: &mut Option<Signal>) -> i32 {
    match sigterm {
        Some(sigterm) => tokio::select! {
            _ = tokio::signal::ctrl_c() => ExitCode::INTERRUPTED,
            _ = sigterm.recv() => ExitCode::TERMINATED,
        },
        None => {
            let _ = tokio::signal::ctrl_c().await;
            ExitCode::INTERRUPTED
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(LogSettings {
        format: cli.log_format,
        verbosity: cli.verbose,
        quiet: cli.quiet,
        color: cli.color,
    });

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();

    // First signal cancels gracefully; a second one exits immediately.
    tokio::spawn(async move {
        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| tracing::warn!(error = %e, "failed to register SIGTERM handler"))
            .ok();

        next_signal(&mut sigterm).await;
        eprintln!("\nShutting down gracefully... (press Ctrl+C again to force)");
        signal_cancel.cancel();

        std::process::exit(next_signal(&mut sigterm).await);
    });

    match commands::dispatch(cli, cancel).await {
        Ok(()) => std::process::exit(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}
