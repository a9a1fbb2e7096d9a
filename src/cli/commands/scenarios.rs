//! Scenario command handlers
//!
//! Implements `scenarios list`, `scenarios show` and `scenarios validate`.

use std::fmt::Write as _;

use serde_json::json;

use crate::cli::args::{OutputFormat, ScenariosListArgs, ScenariosShowArgs, ScenariosValidateArgs};
use crate::config::ScenarioLoader;
use crate::error::{ConfigError, EscapeRoomError, Severity, ValidationIssue};
use crate::scenarios::{self, Catalog};

/// List built-in scenarios with their stage count and total time.
///
/// # Errors
///
/// Returns a config error if a built-in scenario fails to load.
pub fn list(args: &ScenariosListArgs) -> Result<(), EscapeRoomError> {
    let catalog = Catalog::builtin(&ScenarioLoader::with_defaults())?;

    match args.format {
        OutputFormat::Json => {
            let entries: Vec<serde_json::Value> = catalog
                .iter()
                .map(|s| {
                    let builtin = scenarios::find_builtin(&s.id);
                    json!({
                        "id": s.id,
                        "name": s.name,
                        "description": builtin.map(|b| b.description),
                        "stages": s.stages.len(),
                        "totalSeconds": s.stages.iter().map(|st| st.time_limit_seconds).sum::<u32>(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        OutputFormat::Human => {
            println!("Built-in scenarios ({} available)\n", catalog.len());
            for s in catalog.iter() {
                let description = scenarios::find_builtin(&s.id).map_or("", |b| b.description);
                println!("  {:<16}{:<24}{description}", s.id, s.name);
                for stage in &s.stages {
                    println!(
                        "      {:<6}{:<40}{}",
                        stage.id,
                        stage.title,
                        crate::timer::format_clock(stage.time_limit_seconds)
                    );
                }
                println!();
            }
            println!("Play a scenario: escaperoom play --scenario <id>");
        }
    }
    Ok(())
}

/// Print the YAML of a built-in scenario.
///
/// # Errors
///
/// Returns a usage error naming the closest match if the id is unknown.
pub fn show(args: &ScenariosShowArgs) -> Result<(), EscapeRoomError> {
    let builtin = scenarios::find_builtin(&args.id).ok_or_else(|| {
        let mut message = format!("Unknown scenario '{}'", args.id);
        let ids = scenarios::list_builtin().iter().map(|b| b.id);
        if let Some(suggestion) = scenarios::suggest(&args.id, ids) {
            let _ = write!(message, "\n\nDid you mean '{suggestion}'?");
        }
        message.push_str("\n\nAvailable scenarios:");
        for b in scenarios::list_builtin() {
            let _ = write!(message, "\n  {:<16}{}", b.id, b.description);
        }
        EscapeRoomError::Usage(message)
    })?;

    print!("{}", builtin.yaml);
    Ok(())
}

/// Validate scenario files, reporting every problem found.
///
/// # Errors
///
/// Returns a config error if any file is invalid, or has warnings while
/// `--strict` is set.
pub fn validate(args: &ScenariosValidateArgs) -> Result<(), EscapeRoomError> {
    let loader = ScenarioLoader::with_defaults();
    let mut reports = Vec::with_capacity(args.files.len());
    let mut failures = 0usize;

    for path in &args.files {
        tracing::info!(file = %path.display(), "validating scenario");
        let report = match loader.load(path) {
            Ok(result) => {
                let warnings: Vec<ValidationIssue> = result
                    .warnings
                    .iter()
                    .map(|w| ValidationIssue {
                        path: w.location.clone().unwrap_or_default(),
                        message: w.message.clone(),
                        severity: Severity::Warning,
                    })
                    .collect();
                let ok = !(args.strict && !warnings.is_empty());
                FileReport {
                    file: path.display().to_string(),
                    scenario: Some(result.scenario.id.clone()),
                    ok,
                    issues: warnings,
                }
            }
            Err(e) => FileReport {
                file: path.display().to_string(),
                scenario: None,
                ok: false,
                issues: issues_of(&e),
            },
        };
        if !report.ok {
            failures += 1;
        }
        reports.push(report);
    }

    match args.format {
        OutputFormat::Json => {
            let entries: Vec<serde_json::Value> = reports.iter().map(FileReport::to_json).collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        OutputFormat::Human => {
            for report in &reports {
                let mark = if report.ok { "ok" } else { "FAIL" };
                match &report.scenario {
                    Some(id) => println!("{mark:<5}{} ({id})", report.file),
                    None => println!("{mark:<5}{}", report.file),
                }
                for issue in &report.issues {
                    let label = severity_label(issue.severity);
                    if issue.path.is_empty() {
                        println!("       {label}: {}", issue.message);
                    } else {
                        println!("       {label}: {}: {}", issue.path, issue.message);
                    }
                }
            }
        }
    }

    if failures > 0 {
        return Err(ConfigError::ValidationError {
            path: "scenarios".to_string(),
            errors: vec![ValidationIssue {
                path: String::new(),
                message: format!("{failures} of {} file(s) failed validation", args.files.len()),
                severity: Severity::Error,
            }],
        }
        .into());
    }
    Ok(())
}

struct FileReport {
    file: String,
    scenario: Option<String>,
    ok: bool,
    issues: Vec<ValidationIssue>,
}

impl FileReport {
    fn to_json(&self) -> serde_json::Value {
        json!({
            "file": self.file,
            "scenario": self.scenario,
            "valid": self.ok,
            "issues": self.issues.iter().map(|i| json!({
                "path": i.path,
                "message": i.message,
                "severity": severity_label(i.severity),
            })).collect::<Vec<_>>(),
        })
    }
}

fn issues_of(error: &ConfigError) -> Vec<ValidationIssue> {
    match error {
        ConfigError::ValidationError { errors, .. } => errors.clone(),
        other => vec![ValidationIssue {
            path: String::new(),
            message: other.to_string(),
            severity: Severity::Error,
        }],
    }
}

const fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
    }
}
