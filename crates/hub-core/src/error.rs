//! Error types for hub-core
//!
//! Only structural failures live here. Per-file outcomes (conflicts and
//! failed copies) are reported as data in [`crate::SyncResult`].

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Result type for hub-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in hub-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The catalog file is missing or structurally invalid
    #[error("Invalid catalog at {path}: {message}")]
    CatalogParse { path: PathBuf, message: String },

    /// Two environment sets share a name
    #[error("Environment set '{name}' is defined more than once")]
    DuplicateSet { name: String },

    /// An environment set lists the same relative path twice
    #[error("Environment set '{set}' lists '{path}' more than once")]
    DuplicatePath { set: String, path: String },

    /// The catalog has no set with this name
    #[error("Environment set not found: {name}")]
    SetNotFound { name: String },

    /// The registry has no entry for this project
    #[error("Project not registered: {project}")]
    ProjectNotFound { project: String },

    /// The registry file exists but cannot be understood
    #[error("Invalid registry at {path}: {message}")]
    RegistryParse { path: PathBuf, message: String },

    /// The registry changed on disk since it was read
    #[error("Registry {path} changed on disk (read version {expected}, found {found}); refusing to overwrite")]
    RegistryConflict {
        path: PathBuf,
        expected: u64,
        found: u64,
    },

    /// Files were written but the registry could not record the new snapshot
    #[error(
        "Synced {} file(s) in {project} but failed to record the snapshot: {source}",
        applied.values().map(Vec::len).sum::<usize>()
    )]
    SnapshotNotRecorded {
        project: String,
        /// Applied relative paths, per set
        applied: BTreeMap<String, Vec<String>>,
        #[source]
        source: Box<Error>,
    },

    /// A file filter names a path no requested set manages
    #[error("No requested environment set manages '{path}'")]
    FileNotManaged { path: String },

    /// Unknown value for a sync option such as direction or policy
    #[error("Invalid {option}: {value}")]
    InvalidOption { option: &'static str, value: String },

    /// Configuration file not found at expected path
    #[error("Configuration not found at {path}")]
    ConfigNotFound { path: PathBuf },

    /// Filesystem error from hub-fs
    #[error(transparent)]
    Fs(#[from] hub_fs::Error),

}

impl Error {
    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, Self::Fs(hub_fs::Error::LockTimeout { .. }))
    }
}
