//! Project registry: which projects use which environment sets
//!
//! The registry is a single versioned document shared by every project on
//! the host. It is loaded whole, mutated in memory and written back whole
//! through [`RegistryStore`], which guards writes with an advisory lock and
//! an optimistic version check.

mod project;
mod store;

pub use project::{ProjectEntry, ProjectId, SyncSnapshot};
pub use store::{RegistryLock, RegistryStore, StagedRegistry};

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::EnvironmentSet;
use crate::{Error, Result};

/// In-memory copy of the registry document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    /// Bumped on every persisted write; 0 means never written
    #[serde(default)]
    version: u64,
    /// Keyed by canonical project path
    #[serde(default)]
    projects: BTreeMap<String, ProjectEntry>,
}

impl Registry {
    /// An empty registry at version 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Version this copy was read at.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    pub fn project(&self, project: &ProjectId) -> Option<&ProjectEntry> {
        self.projects.get(project.as_str())
    }

    /// All projects, sorted by path.
    pub fn projects(&self) -> impl Iterator<Item = (ProjectId, &ProjectEntry)> {
        self.projects
            .iter()
            .map(|(key, entry)| (ProjectId::from_key(key.as_str()), entry))
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Snapshot recorded at the last successful sync of `set_name`.
    pub fn get_snapshot(&self, project: &ProjectId, set_name: &str) -> Option<&SyncSnapshot> {
        self.project(project)?.snapshots.get(set_name)
    }

    /// Record a successful sync of `set` into `project`.
    ///
    /// Adds the association if needed and stores `snapshot`, dropping any
    /// entries for paths the set no longer declares. Registering the same
    /// file digests again keeps the stored snapshot but still bumps
    /// `last_synced`.
    ///
    /// Taking a resolved [`EnvironmentSet`] rather than a name ensures a
    /// project is only ever associated with sets the catalog knows.
    pub fn register(&mut self, project: &ProjectId, set: &EnvironmentSet, mut snapshot: SyncSnapshot) {
        let before = snapshot.files.len();
        snapshot.files.retain(|path, _| set.contains(path));
        if snapshot.files.len() != before {
            tracing::warn!(
                project = %project,
                set = %set.name,
                pruned = before - snapshot.files.len(),
                "dropped snapshot entries for paths the set no longer declares"
            );
        }

        let entry = self.projects.entry(project.as_str().to_string()).or_default();
        if !entry.uses(&set.name) {
            entry.environment_sets.push(set.name.clone());
        }

        let unchanged = entry
            .snapshots
            .get(&set.name)
            .is_some_and(|existing| existing.same_files(&snapshot));
        entry.last_synced = Some(snapshot.taken_at);
        if !unchanged {
            entry.snapshots.insert(set.name.clone(), snapshot);
        }
        tracing::debug!(project = %project, set = %set.name, unchanged, "registered snapshot");
    }

    /// Associate `set` with `project` without syncing.
    ///
    /// Returns `false` if the association already existed. No snapshot is
    /// recorded, so the next sync treats every file as never synced.
    pub fn adopt(&mut self, project: &ProjectId, set: &EnvironmentSet) -> bool {
        let entry = self.projects.entry(project.as_str().to_string()).or_default();
        if entry.uses(&set.name) {
            return false;
        }
        entry.environment_sets.push(set.name.clone());
        true
    }

    /// Remove the association between `project` and `set_name`.
    ///
    /// Removing the project's last set removes the project entry. Returns
    /// `false` if the project did not use the set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProjectNotFound`] if the project is not registered.
    pub fn unregister(&mut self, project: &ProjectId, set_name: &str) -> Result<bool> {
        let entry = self
            .projects
            .get_mut(project.as_str())
            .ok_or_else(|| Error::ProjectNotFound {
                project: project.to_string(),
            })?;

        let had_set = entry.uses(set_name);
        entry.environment_sets.retain(|s| s != set_name);
        entry.snapshots.remove(set_name);

        if entry.environment_sets.is_empty() {
            self.projects.remove(project.as_str());
            tracing::debug!(project = %project, "removed project with no remaining sets");
        }
        Ok(had_set)
    }

    /// Projects that use `set_name`, sorted by path.
    pub fn projects_using<'a>(&'a self, set_name: &'a str) -> impl Iterator<Item = (ProjectId, &'a ProjectEntry)> + 'a {
        self.projects().filter(move |(_, entry)| entry.uses(set_name))
    }

    /// Number of projects using each set.
    pub fn set_usage(&self) -> BTreeMap<String, usize> {
        let mut usage = BTreeMap::new();
        for entry in self.projects.values() {
            for set in &entry.environment_sets {
                *usage.entry(set.clone()).or_insert(0) += 1;
            }
        }
        usage
    }

    /// Drop projects whose directory no longer exists.
    pub fn prune_missing_projects(&mut self) -> Vec<ProjectId> {
        let missing: Vec<String> = self
            .projects
            .keys()
            .filter(|key| !std::path::Path::new(key.as_str()).is_dir())
            .cloned()
            .collect();

        for key in &missing {
            self.projects.remove(key);
        }
        missing.into_iter().map(ProjectId::from_key).collect()
    }

    /// Projects never synced, or last synced more than `max_age` before `now`.
    pub fn stale_projects(&self, max_age: Duration, now: DateTime<Utc>) -> Vec<ProjectId> {
        let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
        let cutoff = now.checked_sub_signed(max_age).unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.projects()
            .filter(|(_, entry)| entry.last_synced.is_none_or(|at| at < cutoff))
            .map(|(id, _)| id)
            .collect()
    }
}
