//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use hub_core::{ConflictPolicy, Direction};

/// dotconfig-hub - Keep shared dotfile sets in sync with the projects that use them
#[derive(Parser, Debug)]
#[command(name = "dotconfig-hub")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON for scripting
    #[arg(long, global = true)]
    pub json: bool,

    #[command(flatten)]
    pub locations: Locations,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Where the catalog and registry live. Flags override the config file.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct Locations {
    /// Config file [default: <config dir>/dotconfig-hub/config.toml]
    #[arg(long, global = true, env = "DOTCONFIG_HUB_CONFIG")]
    pub config: Option<PathBuf>,

    /// Catalog of environment sets
    #[arg(long, global = true, env = "DOTCONFIG_HUB_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// Project registry [default: project_mapping.yaml next to the catalog]
    #[arg(long, global = true, env = "DOTCONFIG_HUB_REGISTRY")]
    pub registry: Option<PathBuf>,

    /// Seconds to wait for a lock before giving up
    #[arg(long, global = true)]
    pub lock_timeout: Option<u64>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Sync a project with one or more environment sets
    ///
    /// With no sets named, the sets registered for the project are used,
    /// falling back to the project's .dotconfig-hub.yaml.
    ///
    /// Exit codes: 0 synced, 2 conflicts, 3 file failures, 4 lock timeout,
    /// 5 registry changed on disk.
    ///
    /// Examples:
    ///   dotconfig-hub sync ~/work/api shell
    ///   dotconfig-hub sync . shell --direction pull
    ///   dotconfig-hub sync . --policy prefer-template
    ///   dotconfig-hub sync . shell --file .gitignore
    Sync {
        /// Project directory
        project: PathBuf,

        /// Environment sets to sync
        sets: Vec<String>,

        /// bidirectional, pull (template to project) or push (project to template)
        #[arg(short, long, default_value_t = Direction::Bidirectional)]
        direction: Direction,

        /// report, always-prefer-template or always-prefer-project
        #[arg(short, long, default_value_t = ConflictPolicy::Report)]
        policy: ConflictPolicy,

        /// Only sync this relative path (repeatable)
        #[arg(short = 'f', long = "file")]
        files: Vec<String>,
    },

    /// Show what sync would do, without writing anything
    Status {
        /// Project directory
        project: PathBuf,

        /// Environment sets to check
        sets: Vec<String>,

        #[arg(short, long, default_value_t = Direction::Bidirectional)]
        direction: Direction,

        #[arg(short, long, default_value_t = ConflictPolicy::Report)]
        policy: ConflictPolicy,

        /// Only check this relative path (repeatable)
        #[arg(short = 'f', long = "file")]
        files: Vec<String>,
    },

    /// List the catalog's environment sets
    List {
        /// Mark the sets active for this project
        #[arg(long)]
        project: Option<PathBuf>,
    },

    /// Associate a set with a project without syncing
    Register {
        /// Project directory
        project: PathBuf,

        /// Environment set name
        set: String,
    },

    /// Remove a set from a project's registry entry
    Unregister {
        /// Project directory (need not exist any more)
        project: PathBuf,

        /// Environment set name
        set: String,
    },

    /// List registered projects
    Projects {
        /// Only projects using this set
        #[arg(long)]
        set: Option<String>,

        /// Drop projects whose directory no longer exists
        #[arg(long)]
        prune: bool,

        /// Only projects not synced within this many hours
        #[arg(long)]
        stale_hours: Option<u64>,
    },

    /// Sync every registered project that uses a set
    SyncAll {
        /// Environment set name
        set: String,

        #[arg(short, long, default_value_t = Direction::Bidirectional)]
        direction: Direction,

        #[arg(short, long, default_value_t = ConflictPolicy::Report)]
        policy: ConflictPolicy,
    },

    /// Record snapshot digests after a sync whose registry write failed
    Resnapshot {
        /// Project directory
        project: PathBuf,

        /// Environment set name
        set: String,

        /// Relative paths to record (default: every file of the set)
        paths: Vec<String>,
    },

    /// Compare the project's .dotconfig-hub.yaml with its registry entry
    Reconcile {
        /// Project directory
        project: PathBuf,
    },
}
