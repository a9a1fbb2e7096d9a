//! Logging initialization for `escaperoom`.
//!
//! Structured logging via `tracing`, rendered for humans or as JSON lines.
//! Logs always go to stderr: stdout belongs to the play screen and to
//! command output. `ESCAPEROOM_LOG_LEVEL` overrides the CLI verbosity.

use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

use crate::cli::args::ColorChoice;

/// Environment variable holding an `EnvFilter` directive.
pub const LOG_LEVEL_ENV: &str = "ESCAPEROOM_LOG_LEVEL";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with optional ANSI colors.
    #[default]
    Human,
    /// Newline-delimited JSON for machine consumption.
    Json,
}

/// How the global subscriber should be set up.
#[derive(Debug, Clone, Copy)]
pub struct LogSettings {
    /// Output format
    pub format: LogFormat,
    /// `-v` count
    pub verbosity: u8,
    /// `--quiet`: errors only
    pub quiet: bool,
    /// ANSI color policy
    pub color: ColorChoice,
}

/// Maps a verbosity level to a tracing directive string.
///
/// - 0 → `"warn"`
/// - 1 → `"info"`
/// - 2 → `"debug"`
/// - 3+ → `"trace"` (saturates)
#[must_use]
pub const fn verbosity_to_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Directive used when the environment does not override it.
#[must_use]
pub const fn effective_directive(verbosity: u8, quiet: bool) -> &'static str {
    if quiet {
        "error"
    } else {
        verbosity_to_directive(verbosity)
    }
}

fn use_ansi(color: ColorChoice) -> bool {
    match color {
        ColorChoice::Auto => {
            std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
        }
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    }
}

/// Initializes the global tracing subscriber.
///
/// Uses `try_init()`, so a second call (tests, nested commands) is ignored.
pub fn init_logging(settings: LogSettings) {
    let filter = EnvFilter::try_from_env(LOG_LEVEL_ENV)
        .unwrap_or_else(|_| EnvFilter::new(effective_directive(settings.verbosity, settings.quiet)));

    let show_target = settings.verbosity >= 2;

    match settings.format {
        LogFormat::Human => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(use_ansi(settings.color))
                .with_target(show_target)
                .with_writer(std::io::stderr)
                .try_init();
        }
        LogFormat::Json => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .with_current_span(false)
                .with_target(show_target)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
}
