//! Sync, status, sync-all and resnapshot command implementations

use std::path::Path;

use colored::Colorize;
use hub_core::{ActionKind, BulkSyncReport, SyncEngine, SyncOptions, SyncPlan, SyncReport, SyncResult};

use super::{Outcome, print_json};
use crate::error::Result;

/// Run the sync command
pub fn run_sync(engine: &SyncEngine, project: &Path, sets: &[String], options: &SyncOptions, json: bool) -> Result<Outcome> {
    let report = engine.sync(project, sets, options)?;

    if json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }

    Ok(Outcome::from_flags(
        report.has_conflicts(),
        report.has_failures() || report.is_cancelled(),
    ))
}

/// Run the status command: a dry-run plan per set
pub fn run_status(engine: &SyncEngine, project: &Path, sets: &[String], options: &SyncOptions, json: bool) -> Result<Outcome> {
    let plans = engine.status(project, sets, options)?;

    if json {
        print_json(&plans)?;
    } else {
        for plan in &plans {
            print_plan(plan);
        }
    }

    let conflicts = plans.iter().any(SyncPlan::has_conflicts);
    let unreadable = plans.iter().any(|plan| plan.count(ActionKind::Unreadable) > 0);
    Ok(Outcome::from_flags(conflicts, unreadable))
}

/// Run the sync-all command
pub fn run_sync_all(engine: &SyncEngine, set: &str, options: &SyncOptions, json: bool) -> Result<Outcome> {
    println_unless(json, format!("{} Syncing every project using {}...", "=>".blue().bold(), set.cyan()));

    let bulk = engine.sync_all_for_set(set, options)?;

    if json {
        print_json(&bulk)?;
    } else {
        print_bulk(&bulk);
    }

    Ok(Outcome::from_flags(bulk.has_conflicts(), bulk.has_failures()))
}

/// Run the resnapshot command
pub fn run_resnapshot(engine: &SyncEngine, project: &Path, set: &str, paths: &[String], json: bool) -> Result<Outcome> {
    let recorded = engine.resnapshot(project, set, paths)?;

    if json {
        print_json(&recorded)?;
    } else if recorded.is_empty() {
        println!("{} No file agrees with its template; nothing recorded.", "!".yellow().bold());
    } else {
        println!("{} Recorded {} file(s):", "OK".green().bold(), recorded.len());
        for path in &recorded {
            println!("   {} {}", "+".green(), path);
        }
    }

    Ok(Outcome::Success)
}

fn println_unless(quiet: bool, line: String) {
    if !quiet {
        println!("{line}");
    }
}

fn print_report(report: &SyncReport) {
    for result in &report.results {
        print_result(result);
    }

    if report.is_cancelled() {
        println!("{} Cancelled; registry not updated.", "CANCELLED".yellow().bold());
    } else if report.is_success() {
        if report.applied_count() == 0 {
            println!("{} Already synchronized. No changes needed.", "OK".green().bold());
        } else {
            println!("{} Synchronization complete.", "OK".green().bold());
        }
    } else {
        println!();
        if report.has_failures() {
            println!(
                "Some files could not be read or written; fix the paths above and rerun. {}",
                "The registry was not updated for those sets.".dimmed()
            );
        }
        if report.has_conflicts() {
            println!(
                "Resolve conflicts by hand, or rerun with {} or {}.",
                "--policy prefer-template".cyan(),
                "--policy prefer-project".cyan()
            );
        }
    }
}

fn print_result(result: &SyncResult) {
    println!("{} {} {}", "=>".blue().bold(), result.set_name.bold(), result.project.to_string().dimmed());

    for applied in &result.applied {
        println!("   {} {} ({})", "+".green(), applied.relative_path, applied.kind);
    }
    for skipped in result.skipped.iter().filter(|s| s.note.is_some()) {
        println!(
            "   {} {}: {}",
            "-".dimmed(),
            skipped.relative_path,
            skipped.note.as_deref().unwrap_or_default().dimmed()
        );
    }
    for conflict in &result.conflicts {
        println!(
            "   {} {}: {}",
            "CONFLICT".red().bold(),
            conflict.relative_path,
            conflict.note.as_deref().unwrap_or("both sides changed")
        );
    }
    for failure in &result.failures {
        println!("   {} {}: {}", "FAILED".red().bold(), failure.relative_path, failure.message);
    }
}

fn print_plan(plan: &SyncPlan) {
    println!("{} {} ({} sync)", "=>".blue().bold(), plan.set_name.bold(), plan.direction);
    for action in &plan.actions {
        let label = match action.kind {
            ActionKind::Adopt => "adopt".green(),
            ActionKind::Pull => "pull".green(),
            ActionKind::Push => "push".cyan(),
            ActionKind::Skip => "skip".dimmed(),
            ActionKind::Conflict => "conflict".red().bold(),
            ActionKind::Unreadable => "unreadable".red(),
        };
        match &action.note {
            Some(note) => println!("   {:<10} {}  {}", label, action.relative_path, note.dimmed()),
            None => println!("   {:<10} {}", label, action.relative_path),
        }
    }
    if plan.is_noop() && !plan.has_conflicts() && plan.count(ActionKind::Unreadable) == 0 {
        println!("   {}", "in sync".green());
    }
}

fn print_bulk(bulk: &BulkSyncReport) {
    for report in &bulk.reports {
        let status = if report.has_failures() {
            "FAILED".red().bold()
        } else if report.has_conflicts() {
            "CONFLICT".yellow().bold()
        } else {
            "OK".green().bold()
        };
        println!("   {} {} ({} applied)", status, report.project, report.applied_count());
    }
    for error in &bulk.errors {
        println!("   {} {}: {}", "ERROR".red().bold(), error.project, error.message);
    }
    println!(
        "{} {} synced, {} failed",
        "=>".blue().bold(),
        bulk.reports.len(),
        bulk.errors.len()
    );
}
