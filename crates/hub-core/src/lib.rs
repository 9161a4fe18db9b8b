//! Core of dotconfig-hub: environment sets kept in sync with the projects
//! that adopt them
//!
//! This crate provides:
//!
//! - **Template store**: the catalog of environment sets and their files
//! - **Project registry**: which projects use which sets, with the snapshot
//!   recorded at each project's last sync
//! - **Sync planner**: three-way classification of every file against that
//!   snapshot
//! - **Sync executor**: atomic application of a plan
//! - **SyncEngine**: the facade that sequences them under the registry locks
//!
//! # Architecture
//!
//! ```text
//!                  hub-cli
//!                     |
//!                 hub-core
//!   catalog  registry  manifest  sync
//!                     |
//!                  hub-fs
//!   paths  atomic io  locks  digests  config
//! ```
//!
//! # Example
//!
//! ```no_run
//! use hub_core::{Direction, HubConfig, SyncEngine, SyncOptions};
//!
//! fn example() -> hub_core::Result<()> {
//!     let config = HubConfig::for_catalog("/srv/templates/catalog.yaml");
//!     let engine = SyncEngine::open(&config)?;
//!     let report = engine.sync("/work/api", &["shell".to_string()], &SyncOptions::new(Direction::PullOnly))?;
//!     assert!(report.is_success());
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod manifest;
pub mod registry;
pub mod sync;

pub use catalog::{EnvironmentSet, FileSpec, TemplateStore};
pub use config::HubConfig;
pub use error::{Error, Result};
pub use manifest::{MANIFEST_FILE, ProjectManifest, Reconciliation};
pub use registry::{ProjectEntry, ProjectId, Registry, RegistryLock, RegistryStore, StagedRegistry, SyncSnapshot};
pub use sync::{
    ActionKind, BulkSyncReport, Comparison, ConflictPolicy, Decision, Direction, Executor, FileAction, ProjectFailure,
    SyncEngine, SyncOptions, SyncPlan, SyncReport, SyncResult,
};
