//! Saved run command handlers
//!
//! Implements `runs list`, `runs show`, `runs rename` and `runs delete`
//! against a remote store.

use std::sync::Arc;

use crate::cli::args::{
    OutputFormat, RunsCommand, RunsDeleteArgs, RunsListArgs, RunsRenameArgs, RunsShowArgs,
};
use crate::error::{EscapeRoomError, PersistenceError};
use crate::persistence::{DEFAULT_PAGE_SIZE, HttpStore, RunStore, RunsClient, SavedRun};
use crate::timer::format_clock;

fn store(cmd: &RunsCommand) -> Result<Arc<HttpStore>, EscapeRoomError> {
    let url = cmd.store_url.as_deref().ok_or_else(|| {
        EscapeRoomError::Usage(
            "no store URL; pass --store-url or set ESCAPEROOM_STORE_URL".to_string(),
        )
    })?;
    Ok(Arc::new(HttpStore::new(url, cmd.timeout)?))
}

/// List runs for a scenario, or for every scenario.
///
/// Unlike the play screen, a listing failure is reported as an error.
///
/// # Errors
///
/// Returns a persistence error if the store cannot be reached.
pub async fn list(cmd: &RunsCommand, args: &RunsListArgs) -> Result<(), EscapeRoomError> {
    let store = store(cmd)?;
    let limit = args.limit.clamp(1, DEFAULT_PAGE_SIZE);
    let runs = store.list(args.scenario.as_deref(), limit).await?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&runs)?),
        OutputFormat::Human => print_runs(args.scenario.as_deref(), &runs),
    }
    Ok(())
}

fn print_runs(scenario_id: Option<&str>, runs: &[SavedRun]) {
    let scope = scenario_id.map_or_else(|| "all scenarios".to_string(), |id| format!("'{id}'"));
    if runs.is_empty() {
        println!("No saved runs for {scope}.");
        return;
    }
    println!("Saved runs for {scope} ({})\n", runs.len());
    for run in runs {
        if scenario_id.is_some() {
            println!(
                "  {:<38}{:<28}{:<8}{}",
                run.id,
                run.label(),
                clock(run.duration_seconds),
                run.created_at.format("%Y-%m-%d %H:%M")
            );
        } else {
            println!(
                "  {:<38}{:<16}{:<28}{:<8}{}",
                run.id,
                run.scenario_id,
                run.label(),
                clock(run.duration_seconds),
                run.created_at.format("%Y-%m-%d %H:%M")
            );
        }
    }
}

fn clock(seconds: u64) -> String {
    u32::try_from(seconds).map_or_else(|_| "--:--".to_string(), format_clock)
}

/// Show one run.
///
/// # Errors
///
/// Returns a persistence error for an unknown id or an unreachable store.
pub async fn show(cmd: &RunsCommand, args: &RunsShowArgs) -> Result<(), EscapeRoomError> {
    let run = store(cmd)?.get(&args.id).await?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&run)?),
        OutputFormat::Human => {
            println!("{} ({})", run.label(), run.id);
            println!("  scenario:  {} ({})", run.scenario_name, run.scenario_id);
            println!("  result:    {}", if run.success { "escaped" } else { "failed" });
            println!("  duration:  {}", clock(run.duration_seconds));
            println!("  saved:     {}", run.created_at.format("%Y-%m-%d %H:%M"));
            for answer in &run.stage_answers {
                println!(
                    "\n  [{}] {} ({})",
                    answer.index + 1,
                    answer.title,
                    format_clock(answer.time_limit_seconds)
                );
                if answer.answer.is_empty() {
                    println!("      (no answer)");
                } else {
                    for line in answer.answer.lines() {
                        println!("      {line}");
                    }
                }
            }
        }
    }
    Ok(())
}

/// Rename a run.
///
/// # Errors
///
/// Returns a persistence error for a blank name, an unknown id, or an
/// unreachable store.
pub async fn rename(cmd: &RunsCommand, args: &RunsRenameArgs) -> Result<(), EscapeRoomError> {
    let client = RunsClient::new(store(cmd)?);
    let run = client.rename(&args.id, &args.name).await?;
    println!("renamed {} to '{}'", run.id, run.label());
    Ok(())
}

/// Delete a run. Deleting an id that is already gone succeeds.
///
/// # Errors
///
/// Returns a persistence error if the store cannot be reached.
pub async fn delete(cmd: &RunsCommand, args: &RunsDeleteArgs) -> Result<(), EscapeRoomError> {
    let client = RunsClient::new(store(cmd)?);
    match client.delete(&args.id).await {
        Ok(()) => {
            println!("deleted {}", args.id);
            Ok(())
        }
        Err(e @ PersistenceError::Timeout) => {
            tracing::warn!(id = %args.id, "delete timed out; the run may or may not be gone");
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}
