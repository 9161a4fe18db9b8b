//! Sync executor: applies a plan to the filesystem
//!
//! Every write is an independent atomic copy, so re-running a partially
//! applied plan is safe. Per-file failures are collected, not raised.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use hub_fs::{Digest, RobustnessConfig, digest_file, io};
use serde::Serialize;

use super::plan::{ActionKind, Comparison, SyncPlan};
use crate::registry::{ProjectId, SyncSnapshot};

/// A file that was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedFile {
    pub relative_path: String,
    pub kind: ActionKind,
    /// Digest of the bytes now on both sides
    pub digest: Digest,
}

/// A file that needed nothing, or was held back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub relative_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// A file left untouched because both sides diverged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictReport {
    pub relative_path: String,
    pub comparison: Comparison,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// A write that failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub relative_path: String,
    pub kind: ActionKind,
    pub message: String,
}

/// Outcome of applying one plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub project: ProjectId,
    pub set_name: String,
    pub applied: Vec<AppliedFile>,
    pub skipped: Vec<SkippedFile>,
    pub conflicts: Vec<ConflictReport>,
    pub failures: Vec<FileFailure>,
    /// Stopped before the last action; the registry is not updated
    pub cancelled: bool,
}

impl SyncResult {
    fn empty(plan: &SyncPlan) -> Self {
        Self {
            project: plan.project.clone(),
            set_name: plan.set_name.clone(),
            applied: Vec::new(),
            skipped: Vec::new(),
            conflicts: Vec::new(),
            failures: Vec::new(),
            cancelled: false,
        }
    }

    /// Every action landed and nothing is left to report.
    pub fn is_success(&self) -> bool {
        self.conflicts.is_empty() && self.failures.is_empty() && !self.cancelled
    }

    /// Whether this result may be recorded as the new snapshot.
    pub fn is_recordable(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    pub fn applied_paths(&self) -> Vec<String> {
        self.applied.iter().map(|a| a.relative_path.clone()).collect()
    }
}

/// Applies plans. Holds no state between plans.
#[derive(Debug, Clone, Default)]
pub struct Executor {
    robustness: RobustnessConfig,
    cancel: Option<Arc<AtomicBool>>,
}

impl Executor {
    pub fn new(robustness: RobustnessConfig) -> Self {
        Self {
            robustness,
            cancel: None,
        }
    }

    /// Stop between actions once `flag` is set.
    pub fn with_cancel(mut self, flag: Option<Arc<AtomicBool>>) -> Self {
        self.cancel = flag;
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Apply every action of `plan` in order.
    ///
    /// Conflicts are never written. A failed write is recorded and the
    /// remaining actions still run.
    pub fn apply(&self, plan: &SyncPlan) -> SyncResult {
        let mut result = SyncResult::empty(plan);

        for action in &plan.actions {
            if self.is_cancelled() {
                tracing::warn!(
                    project = %plan.project,
                    set = %plan.set_name,
                    applied = result.applied.len(),
                    "sync cancelled between file actions"
                );
                result.cancelled = true;
                break;
            }

            match action.kind {
                ActionKind::Skip => result.skipped.push(SkippedFile {
                    relative_path: action.relative_path.clone(),
                    note: action.note.clone(),
                }),
                ActionKind::Conflict => result.conflicts.push(ConflictReport {
                    relative_path: action.relative_path.clone(),
                    comparison: action.comparison.clone(),
                    note: action.note.clone(),
                }),
                ActionKind::Unreadable => result.failures.push(FileFailure {
                    relative_path: action.relative_path.clone(),
                    kind: action.kind,
                    message: action.note.clone().unwrap_or_else(|| "file could not be read".into()),
                }),
                ActionKind::Adopt | ActionKind::Pull | ActionKind::Push => {
                    let written = io::copy_atomic(&action.source, &action.destination, self.robustness)
                        .and_then(|_| digest_file(action.destination.as_ref()));
                    match written {
                        Ok(Some(digest)) => {
                            tracing::info!(
                                project = %plan.project,
                                file = %action.relative_path,
                                action = %action.kind,
                                "applied"
                            );
                            result.applied.push(AppliedFile {
                                relative_path: action.relative_path.clone(),
                                kind: action.kind,
                                digest,
                            });
                        }
                        Ok(None) => result.failures.push(FileFailure {
                            relative_path: action.relative_path.clone(),
                            kind: action.kind,
                            message: format!("{} vanished after writing", action.destination),
                        }),
                        Err(e) => {
                            tracing::warn!(file = %action.relative_path, error = %e, "file action failed");
                            result.failures.push(FileFailure {
                                relative_path: action.relative_path.clone(),
                                kind: action.kind,
                                message: e.to_string(),
                            });
                        }
                    }
                }
            }
        }

        result
    }
}

/// Build the snapshot to record after `result`.
///
/// A path gets a fresh digest when both sides now hold the same bytes,
/// either because it was just written or because it already matched.
/// Conflicts and held-back files keep their previous ancestor so the next
/// run classifies them the same way. Paths the plan did not cover keep their
/// previous entry.
pub fn next_snapshot(plan: &SyncPlan, result: &SyncResult, previous: Option<&SyncSnapshot>) -> SyncSnapshot {
    let applied: BTreeMap<&str, &Digest> = result
        .applied
        .iter()
        .map(|a| (a.relative_path.as_str(), &a.digest))
        .collect();

    let mut files = previous.map(|p| p.files.clone()).unwrap_or_default();
    for action in &plan.actions {
        let path = action.relative_path.as_str();
        let in_agreement = match action.kind {
            ActionKind::Skip if action.comparison.template == action.comparison.project => {
                action.comparison.template.as_ref()
            }
            _ => applied.get(path).copied(),
        };

        if let Some(digest) = in_agreement {
            files.insert(path.to_string(), digest.clone());
        }
    }

    SyncSnapshot::new(files)
}
