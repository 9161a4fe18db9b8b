//! SyncEngine: sequences catalog, registry, planner and executor
//!
//! One invocation of [`SyncEngine::sync`] does, in order:
//!
//! 1. resolve the project path
//! 2. take the per-project lock (held until the end)
//! 3. resolve every requested set and read the registry snapshots
//! 4. plan and apply each set in turn; a path an earlier set already manages
//!    is not written again
//! 5. take the global registry lock and record all new snapshots in one write
//!
//! Structural failures in steps 1-3 abort before any file is written.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use hub_fs::{NormalizedPath, RobustnessConfig, digest_file};
use serde::Serialize;

use super::executor::{Executor, SyncResult, next_snapshot};
use super::plan::{Direction, SyncPlan};
use super::planner;
use super::resolver::ConflictPolicy;
use crate::catalog::{EnvironmentSet, TemplateStore};
use crate::config::HubConfig;
use crate::manifest::{ProjectManifest, Reconciliation};
use crate::registry::{ProjectId, Registry, RegistryStore, SyncSnapshot};
use crate::{Error, Result};

/// Per-call sync options. Nothing here is read from global state.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub direction: Direction,
    pub policy: ConflictPolicy,
    /// Checked between file actions
    pub cancel: Option<Arc<AtomicBool>>,
    /// Relative paths to sync; empty means every file
    pub files: Vec<String>,
}

impl SyncOptions {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            ..Self::default()
        }
    }

    pub fn with_policy(mut self, policy: ConflictPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Only sync these relative paths. Snapshot entries of other files are
    /// kept as they are.
    pub fn with_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.files = files.into_iter().map(Into::into).collect();
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

/// Outcome of syncing one project.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub project: ProjectId,
    /// One result per set, in request order
    pub results: Vec<SyncResult>,
    /// Registry version written, if any snapshot was recorded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_version: Option<u64>,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.results.iter().all(SyncResult::is_success)
    }

    pub fn has_conflicts(&self) -> bool {
        self.results.iter().any(|r| !r.conflicts.is_empty())
    }

    pub fn has_failures(&self) -> bool {
        self.results.iter().any(|r| !r.failures.is_empty())
    }

    pub fn is_cancelled(&self) -> bool {
        self.results.iter().any(|r| r.cancelled)
    }

    pub fn applied_count(&self) -> usize {
        self.results.iter().map(|r| r.applied.len()).sum()
    }
}

/// A project that could not be synced during a bulk run.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectFailure {
    pub project: ProjectId,
    pub message: String,
}

/// Aggregated outcome of [`SyncEngine::sync_all_for_set`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkSyncReport {
    pub set_name: String,
    pub reports: Vec<SyncReport>,
    pub errors: Vec<ProjectFailure>,
}

impl BulkSyncReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && self.reports.iter().all(SyncReport::is_success)
    }

    pub fn has_conflicts(&self) -> bool {
        self.reports.iter().any(SyncReport::has_conflicts)
    }

    pub fn has_failures(&self) -> bool {
        !self.errors.is_empty() || self.reports.iter().any(SyncReport::has_failures)
    }
}

/// Entry point for every operation that touches both templates and
/// projects.
#[derive(Debug, Clone)]
pub struct SyncEngine {
    templates: TemplateStore,
    store: RegistryStore,
    robustness: RobustnessConfig,
}

impl SyncEngine {
    pub fn new(templates: TemplateStore, store: RegistryStore) -> Self {
        Self {
            templates,
            store,
            robustness: RobustnessConfig::default(),
        }
    }

    /// Load the catalog named by `config` and point at its registry.
    pub fn open(config: &HubConfig) -> Result<Self> {
        let templates = TemplateStore::load(&config.catalog)?;
        Ok(Self::new(templates, config.registry_store()))
    }

    pub fn with_robustness(mut self, robustness: RobustnessConfig) -> Self {
        self.robustness = robustness;
        self.store = self.store.with_robustness(robustness);
        self
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    pub fn store(&self) -> &RegistryStore {
        &self.store
    }

    /// Current registry, read without locking.
    pub fn registry(&self) -> Result<Registry> {
        self.store.load()
    }

    /// Dry run: the plan for each set without writing anything.
    ///
    /// With no `set_names`, the sets registered for the project (or
    /// requested by its manifest) are used.
    pub fn status(
        &self,
        project: impl AsRef<Path>,
        set_names: &[String],
        options: &SyncOptions,
    ) -> Result<Vec<SyncPlan>> {
        let project = ProjectId::resolve(project)?;
        let registry = self.store.load()?;
        let sets = self.sets_for(&project, set_names, &registry)?;
        check_file_filter(&sets, &options.files)?;

        let mut claimed = BTreeMap::new();
        let mut plans = Vec::with_capacity(sets.len());
        for set in sets {
            let mut plan = self.plan_set(&project, set, &registry, options);
            if plan.actions.is_empty() && !options.files.is_empty() {
                continue;
            }
            planner::hold_shared_paths(&mut plan, &claimed);
            planner::claim_paths(&plan, &mut claimed);
            plans.push(plan);
        }
        Ok(plans)
    }

    /// Sync `project` with each named set and record the new snapshots.
    ///
    /// Conflicts and per-file failures are reported in the returned
    /// [`SyncReport`]; only structural problems are errors. A set is
    /// registered only if all of its writes succeeded, and nothing is
    /// registered if the run was cancelled.
    ///
    /// # Errors
    ///
    /// - [`Error::SetNotFound`] / [`Error::ProjectNotFound`] /
    ///   [`Error::FileNotManaged`] before any write
    /// - lock timeouts, see [`Error::is_lock_timeout`]
    /// - [`Error::SnapshotNotRecorded`] if files were written but the
    ///   registry could not be updated; retry with [`SyncEngine::resnapshot`]
    pub fn sync(&self, project: impl AsRef<Path>, set_names: &[String], options: &SyncOptions) -> Result<SyncReport> {
        let project = ProjectId::resolve(project)?;
        self.sync_resolved(&project, set_names, options)
    }

    fn sync_resolved(&self, project: &ProjectId, set_names: &[String], options: &SyncOptions) -> Result<SyncReport> {
        let _project_lock = self.store.lock_project(project)?;
        let registry = self.store.load()?;
        let sets = self.sets_for(project, set_names, &registry)?;
        check_file_filter(&sets, &options.files)?;

        // Each set is planned right before it is applied so it sees what the
        // sets before it wrote.
        let executor = Executor::new(self.robustness).with_cancel(options.cancel.clone());
        let mut claimed = BTreeMap::new();
        let mut synced = Vec::with_capacity(sets.len());
        let mut plans = Vec::with_capacity(sets.len());
        let mut results = Vec::with_capacity(sets.len());
        for set in sets {
            let mut plan = self.plan_set(project, set, &registry, options);
            if plan.actions.is_empty() && !options.files.is_empty() {
                tracing::debug!(set = %set.name, "no filtered file in set");
                continue;
            }
            planner::hold_shared_paths(&mut plan, &claimed);
            planner::claim_paths(&plan, &mut claimed);

            let result = executor.apply(&plan);
            let cancelled = result.cancelled;
            synced.push(set);
            plans.push(plan);
            results.push(result);
            if cancelled {
                break;
            }
        }

        let mut report = SyncReport {
            project: project.clone(),
            results,
            registry_version: None,
        };

        if report.is_cancelled() {
            tracing::warn!(project = %project, "sync cancelled; registry left unchanged");
            return Ok(report);
        }

        let recorded: Vec<(&EnvironmentSet, SyncSnapshot)> = synced
            .iter()
            .zip(&plans)
            .zip(&report.results)
            .filter(|(_, result)| result.is_recordable())
            .map(|((set, plan), result)| {
                let previous = registry.get_snapshot(project, &set.name);
                (*set, next_snapshot(plan, result, previous))
            })
            .collect();

        if recorded.is_empty() {
            return Ok(report);
        }

        match self.record(project, recorded) {
            Ok(version) => report.registry_version = Some(version),
            Err(e) => {
                let applied: BTreeMap<String, Vec<String>> = report
                    .results
                    .iter()
                    .filter(|r| !r.applied.is_empty())
                    .map(|r| (r.set_name.clone(), r.applied_paths()))
                    .collect();
                if applied.is_empty() {
                    return Err(e);
                }
                tracing::error!(
                    project = %project,
                    applied = ?applied,
                    error = %e,
                    "files were written but the registry snapshot was not recorded"
                );
                return Err(Error::SnapshotNotRecorded {
                    project: project.to_string(),
                    applied,
                    source: Box::new(e),
                });
            }
        }

        tracing::info!(
            project = %project,
            sets = report.results.len(),
            applied = report.applied_count(),
            conflicts = report.has_conflicts(),
            "sync finished"
        );
        Ok(report)
    }

    /// Sync every registered project that uses `set_name`.
    ///
    /// Best-effort: a project that fails is recorded in
    /// [`BulkSyncReport::errors`] and the loop moves on.
    pub fn sync_all_for_set(&self, set_name: &str, options: &SyncOptions) -> Result<BulkSyncReport> {
        self.templates.resolve(set_name)?;
        let registry = self.store.load()?;
        let projects: Vec<ProjectId> = registry.projects_using(set_name).map(|(id, _)| id).collect();

        let mut bulk = BulkSyncReport {
            set_name: set_name.to_string(),
            ..BulkSyncReport::default()
        };
        let names = [set_name.to_string()];

        for project in projects {
            if options.is_cancelled() {
                tracing::warn!(set = set_name, "bulk sync cancelled");
                break;
            }
            if !project.root().is_dir() {
                bulk.errors.push(ProjectFailure {
                    message: format!("project directory {project} no longer exists"),
                    project,
                });
                continue;
            }
            match self.sync_resolved(&project, &names, options) {
                Ok(report) => bulk.reports.push(report),
                Err(e) => {
                    tracing::warn!(project = %project, error = %e, "project sync failed");
                    bulk.errors.push(ProjectFailure {
                        project,
                        message: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            set = set_name,
            synced = bulk.reports.len(),
            failed = bulk.errors.len(),
            "bulk sync finished"
        );
        Ok(bulk)
    }

    /// Associate `set_name` with `project` without syncing any file.
    ///
    /// Returns `false` if the project already used the set.
    pub fn register(&self, project: impl AsRef<Path>, set_name: &str) -> Result<bool> {
        let project = ProjectId::resolve(project)?;
        let set = self.templates.resolve(set_name)?;
        let added = self.store.transaction(|registry| Ok(registry.adopt(&project, set)))?;
        tracing::info!(project = %project, set = set_name, added, "registered");
        Ok(added)
    }

    /// Remove the association between `project` and `set_name`.
    ///
    /// The project directory need not exist any more.
    pub fn unregister(&self, project: impl AsRef<Path>, set_name: &str) -> Result<bool> {
        let project = project_key(project.as_ref());
        self.store
            .transaction(|registry| registry.unregister(&project, set_name))
    }

    /// Record fresh snapshot digests for `paths` without copying anything.
    ///
    /// This is the retry for [`Error::SnapshotNotRecorded`]. A path is
    /// recorded only where the template and the project now hold the same
    /// bytes; others keep their previous entry. An empty `paths` means every
    /// file of the set. Returns the paths that were recorded.
    pub fn resnapshot(&self, project: impl AsRef<Path>, set_name: &str, paths: &[String]) -> Result<Vec<String>> {
        let project = ProjectId::resolve(project)?;
        let set = self.templates.resolve(set_name)?;
        let _project_lock = self.store.lock_project(&project)?;

        let registry = self.store.load()?;
        let mut files = registry
            .get_snapshot(&project, set_name)
            .map(|s| s.files.clone())
            .unwrap_or_default();

        let mut recorded = Vec::new();
        for spec in set.files() {
            if !paths.is_empty() && !paths.contains(&spec.relative_path) {
                continue;
            }
            let template = digest_file(spec.template_source.as_ref())?;
            let local = digest_file(spec.project_path(project.root()).as_ref())?;
            match (template, local) {
                (Some(t), Some(p)) if t == p => {
                    files.insert(spec.relative_path.clone(), t);
                    recorded.push(spec.relative_path.clone());
                }
                _ => tracing::debug!(file = %spec.relative_path, "sides differ, snapshot entry unchanged"),
            }
        }

        self.record(&project, vec![(set, SyncSnapshot::new(files))])?;
        Ok(recorded)
    }

    /// Sets active for `project`: those registered for it, then any its
    /// manifest requests that are not registered yet.
    pub fn active_sets(&self, project: impl AsRef<Path>) -> Result<Vec<String>> {
        let project = ProjectId::resolve(project)?;
        let registry = self.store.load()?;
        let mut active = registry
            .project(&project)
            .map(|entry| entry.environment_sets.clone())
            .unwrap_or_default();
        if let Some(manifest) = ProjectManifest::load(project.root())? {
            for name in manifest.environment_sets {
                if !active.contains(&name) {
                    active.push(name);
                }
            }
        }
        Ok(active)
    }

    /// Compare the sets `project` requests in its manifest with the sets
    /// registered for it. A project without a manifest requests nothing.
    pub fn reconcile(&self, project: impl AsRef<Path>) -> Result<Reconciliation> {
        let project = ProjectId::resolve(project)?;
        let requested = ProjectManifest::load(project.root())?
            .map(|m| m.environment_sets)
            .unwrap_or_default();
        let registry = self.store.load()?;
        let registered = registry
            .project(&project)
            .map(|entry| entry.environment_sets.clone())
            .unwrap_or_default();
        Ok(Reconciliation::compute(&requested, &registered))
    }

    /// Drop registry entries whose project directory is gone.
    ///
    /// Writes only when something was pruned.
    pub fn prune_missing_projects(&self) -> Result<Vec<ProjectId>> {
        let lock = self.store.lock()?;
        let mut registry = self.store.load()?;
        let pruned = registry.prune_missing_projects();
        if !pruned.is_empty() {
            self.store.persist(&mut registry, &lock)?;
            tracing::info!(count = pruned.len(), "pruned missing projects");
        }
        Ok(pruned)
    }

    fn plan_set(
        &self,
        project: &ProjectId,
        set: &EnvironmentSet,
        registry: &Registry,
        options: &SyncOptions,
    ) -> SyncPlan {
        planner::plan_selected(
            project,
            set,
            registry.get_snapshot(project, &set.name),
            options.direction,
            options.policy,
            &options.files,
        )
    }

    /// Resolve the requested sets, falling back to the registry and then
    /// the project's manifest when none are named.
    fn sets_for(&self, project: &ProjectId, set_names: &[String], registry: &Registry) -> Result<Vec<&EnvironmentSet>> {
        let names: Vec<String> = if !set_names.is_empty() {
            set_names.to_vec()
        } else if let Some(entry) = registry.project(project).filter(|e| !e.environment_sets.is_empty()) {
            entry.environment_sets.clone()
        } else if let Some(manifest) = ProjectManifest::load(project.root())? {
            manifest.environment_sets
        } else {
            return Err(Error::ProjectNotFound {
                project: project.to_string(),
            });
        };

        names.iter().map(|name| self.templates.resolve(name)).collect()
    }

    /// Register snapshots under the global lock in a single write.
    fn record(&self, project: &ProjectId, snapshots: Vec<(&EnvironmentSet, SyncSnapshot)>) -> Result<u64> {
        let lock = self.store.lock()?;
        let mut registry = self.store.load()?;
        for (set, snapshot) in snapshots {
            registry.register(project, set, snapshot);
        }
        self.store.persist(&mut registry, &lock)?;
        Ok(registry.version())
    }
}

/// Every filtered path must belong to at least one of `sets`.
fn check_file_filter(sets: &[&EnvironmentSet], files: &[String]) -> Result<()> {
    match files
        .iter()
        .find(|path| !sets.iter().any(|set| set.file(path).is_some()))
    {
        Some(path) => Err(Error::FileNotManaged { path: path.clone() }),
        None => Ok(()),
    }
}

/// Registry key for a path that may no longer exist on disk.
fn project_key(path: &Path) -> ProjectId {
    ProjectId::resolve(path).unwrap_or_else(|_| ProjectId::from_key(NormalizedPath::new(path).as_str()))
}
