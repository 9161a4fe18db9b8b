//! List, register, unregister, projects and reconcile command implementations

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use colored::Colorize;
use hub_core::{ProjectEntry, ProjectId, SyncEngine};
use serde::Serialize;

use super::{Outcome, print_json};
use crate::error::Result;

#[derive(Serialize)]
struct SetRow<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    files: Vec<&'a str>,
    active: bool,
}

/// Run the list command
pub fn run_list(engine: &SyncEngine, project: Option<&Path>, json: bool) -> Result<Outcome> {
    let active = match project {
        Some(project) => engine.active_sets(project)?,
        None => Vec::new(),
    };

    let rows: Vec<SetRow<'_>> = engine
        .templates()
        .sets()
        .iter()
        .map(|set| SetRow {
            name: &set.name,
            description: set.description.as_deref(),
            files: set.files().iter().map(|f| f.relative_path.as_str()).collect(),
            active: active.contains(&set.name),
        })
        .collect();

    if json {
        print_json(&rows)?;
        return Ok(Outcome::Success);
    }

    if rows.is_empty() {
        println!("{}", "No environment sets in the catalog".dimmed());
        return Ok(Outcome::Success);
    }

    println!("{}", "Environment sets:".bold());
    for row in &rows {
        let marker = if row.active { "*".green() } else { "-".dimmed() };
        println!(
            "   {} {}: {}",
            marker,
            row.name.cyan(),
            row.description.unwrap_or("No description")
        );
        if row.active {
            println!("     {}", row.files.join(", ").dimmed());
        }
    }
    for name in &active {
        if !engine.templates().names().any(|known| known == name) {
            println!("   {} {}: not in the catalog", "!".yellow().bold(), name.cyan());
        }
    }
    if let Some(project) = project {
        println!();
        println!("{} active for {}", "*".green(), project.display());
    }
    Ok(Outcome::Success)
}

/// Run the register command
pub fn run_register(engine: &SyncEngine, project: &Path, set: &str, json: bool) -> Result<Outcome> {
    let added = engine.register(project, set)?;

    if json {
        print_json(&serde_json::json!({ "set": set, "added": added }))?;
    } else if added {
        println!("{} Registered {} for {}", "OK".green().bold(), set.cyan(), project.display());
        println!("Run {} to copy its files.", "dotconfig-hub sync".cyan());
    } else {
        println!("{} {} already uses {}", "OK".green().bold(), project.display(), set.cyan());
    }
    Ok(Outcome::Success)
}

/// Run the unregister command
pub fn run_unregister(engine: &SyncEngine, project: &Path, set: &str, json: bool) -> Result<Outcome> {
    let removed = engine.unregister(project, set)?;

    if json {
        print_json(&serde_json::json!({ "set": set, "removed": removed }))?;
    } else if removed {
        println!("{} Unregistered {} from {}", "OK".green().bold(), set.cyan(), project.display());
    } else {
        println!("{} {} did not use {}", "!".yellow().bold(), project.display(), set.cyan());
    }
    Ok(Outcome::Success)
}

#[derive(Serialize)]
struct ProjectRow<'a> {
    project: ProjectId,
    #[serde(flatten)]
    entry: &'a ProjectEntry,
}

/// Run the projects command
pub fn run_projects(
    engine: &SyncEngine,
    set: Option<&str>,
    prune: bool,
    stale_hours: Option<u64>,
    json: bool,
) -> Result<Outcome> {
    if prune {
        let pruned = engine.prune_missing_projects()?;
        if !json {
            for project in &pruned {
                println!("{} {}", "pruned".yellow(), project);
            }
        }
    }

    let registry = engine.registry()?;
    let stale: Option<Vec<ProjectId>> = stale_hours
        .map(|hours| registry.stale_projects(stale_window(hours), Utc::now()));

    let rows: Vec<ProjectRow<'_>> = registry
        .projects()
        .filter(|(_, entry)| set.is_none_or(|name| entry.uses(name)))
        .filter(|(id, _)| stale.as_ref().is_none_or(|stale| stale.contains(id)))
        .map(|(project, entry)| ProjectRow { project, entry })
        .collect();

    if json {
        print_json(&rows)?;
        return Ok(Outcome::Success);
    }

    if rows.is_empty() {
        println!("{}", "No registered projects".dimmed());
        return Ok(Outcome::Success);
    }

    for row in &rows {
        let synced = row
            .entry
            .last_synced
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never synced".to_string());
        println!(
            "{} {} [{}] {}",
            "+".green(),
            row.project.to_string().bold(),
            row.entry.environment_sets.join(", ").cyan(),
            synced.dimmed()
        );
    }

    if set.is_none() && stale.is_none() {
        println!();
        for (name, count) in registry.set_usage() {
            println!("   {}: {} project(s)", name.cyan(), count);
        }
    }
    Ok(Outcome::Success)
}

fn stale_window(hours: u64) -> Duration {
    Duration::from_secs(hours.saturating_mul(3600))
}

/// Run the reconcile command
pub fn run_reconcile(engine: &SyncEngine, project: &Path, json: bool) -> Result<Outcome> {
    let reconciliation = engine.reconcile(project)?;

    if json {
        print_json(&reconciliation)?;
    } else if reconciliation.is_consistent() {
        println!("{} Manifest and registry agree.", "OK".green().bold());
    } else {
        for set in &reconciliation.requested_only {
            println!("   {} {} requested but not registered", "+".yellow(), set.cyan());
        }
        for set in &reconciliation.registered_only {
            println!("   {} {} registered but no longer requested", "-".yellow(), set.cyan());
        }
    }
    Ok(Outcome::Success)
}
