//! dotconfig-hub CLI
//!
//! Thin front end over hub-core: parses arguments, resolves the hub
//! configuration and maps sync outcomes to exit codes.

mod cli;
mod commands;
mod context;
mod error;

use clap::Parser;
use colored::Colorize;
use hub_core::{SyncEngine, SyncOptions};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use cli::{Cli, Commands};
use commands::Outcome;
use error::Result;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = match run(cli) {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("{}: tracing subscriber already set", "warning".yellow());
    }
    tracing::debug!("Verbose mode enabled");
}

fn run(cli: Cli) -> Result<Outcome> {
    let Some(command) = cli.command else {
        println!("{} keeps dotfile sets in sync with your projects", "dotconfig-hub".green().bold());
        println!();
        println!("Run {} for available commands.", "dotconfig-hub --help".cyan());
        return Ok(Outcome::Success);
    };

    let config = context::resolve_config(&cli.locations)?;
    tracing::debug!(catalog = %config.catalog, registry = %config.registry, "resolved config");
    let engine = SyncEngine::open(&config)?;
    let json = cli.json;

    match command {
        Commands::Sync {
            project,
            sets,
            direction,
            policy,
            files,
        } => {
            let options = SyncOptions::new(direction).with_policy(policy).with_files(files);
            commands::run_sync(&engine, &project, &sets, &options, json)
        }
        Commands::Status {
            project,
            sets,
            direction,
            policy,
            files,
        } => {
            let options = SyncOptions::new(direction).with_policy(policy).with_files(files);
            commands::run_status(&engine, &project, &sets, &options, json)
        }
        Commands::List { project } => commands::run_list(&engine, project.as_deref(), json),
        Commands::Register { project, set } => commands::run_register(&engine, &project, &set, json),
        Commands::Unregister { project, set } => commands::run_unregister(&engine, &project, &set, json),
        Commands::Projects {
            set,
            prune,
            stale_hours,
        } => commands::run_projects(&engine, set.as_deref(), prune, stale_hours, json),
        Commands::SyncAll {
            set,
            direction,
            policy,
        } => {
            let options = SyncOptions::new(direction).with_policy(policy);
            commands::run_sync_all(&engine, &set, &options, json)
        }
        Commands::Resnapshot { project, set, paths } => {
            commands::run_resnapshot(&engine, &project, &set, &paths, json)
        }
        Commands::Reconcile { project } => commands::run_reconcile(&engine, &project, json),
    }
}
