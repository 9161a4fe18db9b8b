//! Planning and applying syncs between templates and projects
//!
//! - **plan**: the transient plan types
//! - **planner**: three-way classification of each file
//! - **resolver**: conflict policy
//! - **executor**: atomic application of a plan
//! - **engine**: the [`SyncEngine`] facade used by callers

mod engine;
mod executor;
mod plan;
mod planner;
mod resolver;

pub use engine::{BulkSyncReport, ProjectFailure, SyncEngine, SyncOptions, SyncReport};
pub use executor::{AppliedFile, ConflictReport, Executor, FileFailure, SkippedFile, SyncResult, next_snapshot};
pub use plan::{ActionKind, Comparison, Direction, FileAction, SyncPlan};
pub use planner::{classify, plan, plan_selected};
pub use resolver::{ConflictPolicy, Decision, resolve};
