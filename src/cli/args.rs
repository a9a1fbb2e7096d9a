//! CLI argument definitions
//!
//! All clap derive structs for `escaperoom` command-line parsing. Options
//! that make sense per machine fall back to `ESCAPEROOM_*` variables.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::observability::LogFormat;
use crate::preferences::Theme;

// ============================================================================
// Root CLI
// ============================================================================

/// Timed escape-room puzzles with a shared run history.
#[derive(Parser, Debug)]
#[command(name = "escaperoom", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "ESCAPEROOM_COLOR")]
    pub color: ColorChoice,

    /// Log output format.
    #[arg(long, default_value = "human", global = true, env = "ESCAPEROOM_LOG_FORMAT")]
    pub log_format: LogFormat,
}

// ============================================================================
// Top-Level Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Play a scenario in the terminal.
    Play(PlayArgs),

    /// List, show or validate scenarios.
    Scenarios(ScenariosCommand),

    /// Manage saved runs in a remote store.
    Runs(RunsCommand),

    /// Run a shared run store.
    Store(StoreCommand),

    /// Show or change player preferences.
    Prefs(PrefsCommand),

    /// Display version information.
    Version(VersionArgs),
}

// ============================================================================
// Play
// ============================================================================

/// Arguments for `play`.
#[derive(Args, Debug)]
pub struct PlayArgs {
    /// Scenario id to play (defaults to the last played one).
    #[arg(short, long, env = "ESCAPEROOM_SCENARIO")]
    pub scenario: Option<String>,

    /// Extra scenario files to add to the built-in catalog.
    #[arg(long = "scenario-file", value_name = "PATH")]
    pub scenario_files: Vec<PathBuf>,

    /// Run store URL; runs are kept in memory when omitted.
    #[arg(long, env = "ESCAPEROOM_STORE_URL")]
    pub store_url: Option<String>,

    /// Per-request store timeout (e.g. "10s").
    #[arg(long, default_value = "10s", value_parser = parse_duration)]
    pub store_timeout: Duration,

    /// Write gameplay events as JSON lines to this file.
    #[arg(long, env = "ESCAPEROOM_EVENTS_FILE")]
    pub events_file: Option<PathBuf>,

    /// Preferences file.
    #[arg(long, env = "ESCAPEROOM_PREFS")]
    pub prefs: Option<PathBuf>,
}

// ============================================================================
// Scenarios
// ============================================================================

/// Scenario commands.
#[derive(Args, Debug)]
pub struct ScenariosCommand {
    /// Scenarios subcommand.
    #[command(subcommand)]
    pub subcommand: ScenariosSubcommand,
}

/// Scenario subcommands.
#[derive(Subcommand, Debug)]
pub enum ScenariosSubcommand {
    /// List built-in scenarios.
    List(ScenariosListArgs),

    /// Print the YAML of a built-in scenario.
    Show(ScenariosShowArgs),

    /// Validate scenario files.
    Validate(ScenariosValidateArgs),
}

/// Arguments for `scenarios list`.
#[derive(Args, Debug)]
pub struct ScenariosListArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `scenarios show`.
#[derive(Args, Debug)]
pub struct ScenariosShowArgs {
    /// Scenario id.
    pub id: String,
}

/// Arguments for `scenarios validate`.
#[derive(Args, Debug)]
pub struct ScenariosValidateArgs {
    /// Scenario files to validate.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Treat warnings as errors.
    #[arg(long)]
    pub strict: bool,
}

// ============================================================================
// Runs
// ============================================================================

/// Saved run commands.
#[derive(Args, Debug)]
pub struct RunsCommand {
    /// Store URL.
    #[arg(long, env = "ESCAPEROOM_STORE_URL", global = true)]
    pub store_url: Option<String>,

    /// Per-request timeout (e.g. "10s").
    #[arg(long, default_value = "10s", value_parser = parse_duration, global = true)]
    pub timeout: Duration,

    /// Runs subcommand.
    #[command(subcommand)]
    pub subcommand: RunsSubcommand,
}

/// Saved run subcommands.
#[derive(Subcommand, Debug)]
pub enum RunsSubcommand {
    /// List runs, newest first.
    List(RunsListArgs),

    /// Show one run with its stage answers.
    Show(RunsShowArgs),

    /// Rename a run.
    Rename(RunsRenameArgs),

    /// Delete a run.
    Delete(RunsDeleteArgs),
}

/// Arguments for `runs list`.
#[derive(Args, Debug)]
pub struct RunsListArgs {
    /// Scenario id; every scenario when omitted.
    #[arg(short, long)]
    pub scenario: Option<String>,

    /// Maximum number of runs (at most 50).
    #[arg(short, long, default_value_t = crate::persistence::DEFAULT_PAGE_SIZE)]
    pub limit: usize,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `runs show`.
#[derive(Args, Debug)]
pub struct RunsShowArgs {
    /// Run id.
    pub id: String,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `runs rename`.
#[derive(Args, Debug)]
pub struct RunsRenameArgs {
    /// Run id.
    pub id: String,

    /// New display name.
    pub name: String,
}

/// Arguments for `runs delete`.
#[derive(Args, Debug)]
pub struct RunsDeleteArgs {
    /// Run id.
    pub id: String,
}

// ============================================================================
// Store
// ============================================================================

/// Run store commands.
#[derive(Args, Debug)]
pub struct StoreCommand {
    /// Store subcommand.
    #[command(subcommand)]
    pub subcommand: StoreSubcommand,
}

/// Run store subcommands.
#[derive(Subcommand, Debug)]
pub enum StoreSubcommand {
    /// Serve an in-memory run store over HTTP.
    Serve(StoreServeArgs),
}

/// Arguments for `store serve`.
#[derive(Args, Debug)]
pub struct StoreServeArgs {
    /// Bind address as `[host]:port`.
    #[arg(long, default_value = "127.0.0.1:8787", env = "ESCAPEROOM_BIND")]
    pub bind: String,

    /// Expose Prometheus metrics on this port.
    #[arg(long, env = "ESCAPEROOM_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

// ============================================================================
// Prefs / Version
// ============================================================================

/// Preference commands.
#[derive(Args, Debug)]
pub struct PrefsCommand {
    /// Preferences file.
    #[arg(long, env = "ESCAPEROOM_PREFS", global = true)]
    pub prefs: Option<PathBuf>,

    /// Prefs subcommand.
    #[command(subcommand)]
    pub subcommand: PrefsSubcommand,
}

/// Preference subcommands.
#[derive(Subcommand, Debug)]
pub enum PrefsSubcommand {
    /// Print current preferences.
    Show(PrefsShowArgs),

    /// Change preferences.
    Set(PrefsSetArgs),
}

/// Arguments for `prefs show`.
#[derive(Args, Debug)]
pub struct PrefsShowArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `prefs set`.
#[derive(Args, Debug)]
pub struct PrefsSetArgs {
    /// Color theme.
    #[arg(long)]
    pub theme: Option<Theme>,

    /// Scenario to resume by default.
    #[arg(long)]
    pub scenario: Option<String>,
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

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}

fn parse_duration(raw: &str) -> Result<Duration, String> {
    humantime::parse_duration(raw).map_err(|e| format!("invalid duration '{raw}': {e}"))
}

// ============================================================================
// Tests
// ============================================================================
