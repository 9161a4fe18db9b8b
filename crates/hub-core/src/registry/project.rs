//! Per-project registry records

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use hub_fs::{Digest, NormalizedPath};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Canonical identifier of a project: its absolute, symlink-free path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ProjectId(NormalizedPath);

impl ProjectId {
    /// Resolve a user-supplied path to its canonical key.
    ///
    /// The directory must exist; symlinks and relative segments are
    /// resolved here, once, so every later lookup uses the same key.
    pub fn resolve(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self(NormalizedPath::canonicalize(path)?))
    }

    /// Wrap a key that is already canonical, e.g. one read back from the
    /// registry.
    pub fn from_key(key: impl Into<String>) -> Self {
        Self(NormalizedPath::new(key.into()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn root(&self) -> &NormalizedPath {
        &self.0
    }
}

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Digests of a set's files as of the last successful sync of one project.
///
/// This is the common ancestor for three-way comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSnapshot {
    pub taken_at: DateTime<Utc>,
    #[serde(default)]
    pub files: BTreeMap<String, Digest>,
}

impl SyncSnapshot {
    pub fn new(files: BTreeMap<String, Digest>) -> Self {
        Self {
            taken_at: Utc::now(),
            files,
        }
    }

    pub fn digest(&self, relative_path: &str) -> Option<&Digest> {
        self.files.get(relative_path)
    }

    /// Same file digests, regardless of when they were taken.
    pub fn same_files(&self, other: &Self) -> bool {
        self.files == other.files
    }
}

/// Everything the registry knows about one project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectEntry {
    /// Active set names in adoption order
    #[serde(default)]
    pub environment_sets: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub snapshots: BTreeMap<String, SyncSnapshot>,
}

impl ProjectEntry {
    pub fn uses(&self, set_name: &str) -> bool {
        self.environment_sets.iter().any(|s| s == set_name)
    }
}
