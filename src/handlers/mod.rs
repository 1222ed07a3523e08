//! Command handlers for the binary.
//!
//! Each handler loads nothing itself: `main` passes a fresh settings snapshot
//! in, and the handler reports whether the command succeeded so `main` can
//! pick the exit code.

pub mod config;
pub mod remote;
pub mod repo;

use colored::Colorize;
use serde::Serialize;

use dashboard_git_sync::error::{Completed, SyncOutcome};
use dashboard_git_sync::logger;

/// JSON view of an outcome.
#[derive(Serialize)]
struct OutcomeView<'a> {
    operation: &'a str,
    success: bool,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    completed: Option<&'a Completed>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Print an outcome and record it in the log file. Returns `is_success()`.
pub fn report(operation: &str, outcome: &SyncOutcome, json: bool) -> bool {
    if let Err(e) = logger::log_to_file(&format!("{operation}: {outcome}")) {
        log::debug!("Could not write to log file: {e}");
    }

    if json {
        let view = OutcomeView {
            operation,
            success: outcome.is_success(),
            status: match outcome {
                SyncOutcome::Succeeded(_) => "succeeded",
                SyncOutcome::Failed(_) => "failed",
                SyncOutcome::RequiresManualResolution(_) => "requires_manual_resolution",
            },
            completed: outcome.completed(),
            error_kind: outcome.error().map(|e| e.kind()),
            error: outcome.error().map(|e| e.to_string()),
        };
        print_json(&view);
    } else {
        match outcome {
            SyncOutcome::Succeeded(_) => {
                println!("  {} {}: {}", "✓".green(), operation, outcome.to_string().green())
            }
            SyncOutcome::RequiresManualResolution(_) => {
                println!("  {} {}: {}", "!".yellow(), operation, outcome.to_string().yellow());
                println!(
                    "    {}",
                    "Resolve the conflict in the dashboards repository with git, then push again."
                        .yellow()
                );
            }
            SyncOutcome::Failed(_) => {
                println!("  {} {}: {}", "✗".red(), operation, outcome.to_string().red())
            }
        }
    }

    outcome.is_success()
}

pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => log::error!("Failed to serialize output: {e}"),
    }
}
