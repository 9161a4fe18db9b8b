//! Three-way sync planner
//!
//! Each file is classified from three digests: the template's current
//! content, the project's current content and the snapshot recorded at the
//! last successful sync. The snapshot is the common ancestor that tells
//! "only the template moved" apart from "only the project moved" and "both
//! moved". Modification times are never consulted.

use std::collections::BTreeMap;

use hub_fs::digest_file;

use super::plan::{ActionKind, Comparison, Direction, FileAction, SyncPlan};
use super::resolver::{self, ConflictPolicy, Decision};
use crate::catalog::EnvironmentSet;
use crate::registry::{ProjectId, SyncSnapshot};

/// Classify one file from its three digests.
///
/// | snapshot | template vs project | template vs snapshot | project vs snapshot | action   |
/// |----------|---------------------|----------------------|---------------------|----------|
/// | any      | equal               |                      |                     | skip     |
/// | none     | project missing     |                      |                     | adopt    |
/// | none     | differ              |                      |                     | conflict |
/// | some     | differ              | differ               | equal               | pull     |
/// | some     | differ              | equal                | differ              | push     |
/// | some     | differ              | differ               | differ              | conflict |
pub fn classify(comparison: &Comparison) -> ActionKind {
    let Comparison {
        template,
        project,
        snapshot,
    } = comparison;

    if template == project {
        return ActionKind::Skip;
    }

    match snapshot {
        None if project.is_none() => ActionKind::Adopt,
        None => ActionKind::Conflict,
        Some(base) => {
            let template_moved = template.as_ref() != Some(base);
            let project_moved = project.as_ref() != Some(base);
            match (template_moved, project_moved) {
                (true, false) => ActionKind::Pull,
                (false, true) => ActionKind::Push,
                // (false, false) would mean template == project, handled above
                _ => ActionKind::Conflict,
            }
        }
    }
}

/// Compute the plan for syncing `set` into `project`.
///
/// Reads the template and project files to digest them but never writes.
/// Conflicts are settled here through the resolver, so the returned plan
/// already reflects `policy`. A file that cannot be read becomes an
/// [`ActionKind::Unreadable`] action; the rest of the set is still planned.
pub fn plan(
    project: &ProjectId,
    set: &EnvironmentSet,
    snapshot: Option<&SyncSnapshot>,
    direction: Direction,
    policy: ConflictPolicy,
) -> SyncPlan {
    plan_selected(project, set, snapshot, direction, policy, &[])
}

/// Like [`plan`], restricted to the files of `set` whose relative path is in
/// `only`. An empty `only` selects every file.
pub fn plan_selected(
    project: &ProjectId,
    set: &EnvironmentSet,
    snapshot: Option<&SyncSnapshot>,
    direction: Direction,
    policy: ConflictPolicy,
    only: &[String],
) -> SyncPlan {
    let mut actions = Vec::with_capacity(set.files().len());

    for spec in set.files() {
        if !only.is_empty() && !only.contains(&spec.relative_path) {
            continue;
        }

        let project_path = spec.project_path(project.root());
        let template = digest_file(spec.template_source.as_ref());
        let local = digest_file(project_path.as_ref());
        let base = snapshot.and_then(|s| s.digest(&spec.relative_path)).cloned();

        let (comparison, kind, note) = match (template, local) {
            (Ok(template), Ok(local)) => {
                let comparison = Comparison {
                    template,
                    project: local,
                    snapshot: base,
                };
                let (kind, note) = decide(classify(&comparison), &comparison, direction, policy);
                (comparison, kind, note)
            }
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(project = %project, file = %spec.relative_path, error = %e, "cannot read file");
                let comparison = Comparison {
                    snapshot: base,
                    ..Comparison::default()
                };
                (comparison, ActionKind::Unreadable, Some(e.to_string()))
            }
        };

        tracing::debug!(
            project = %project,
            set = %set.name,
            file = %spec.relative_path,
            action = %kind,
            "classified"
        );

        let (source, destination) = match kind {
            ActionKind::Push => (project_path, spec.template_source.clone()),
            _ => (spec.template_source.clone(), project_path),
        };

        actions.push(FileAction {
            relative_path: spec.relative_path.clone(),
            kind,
            source,
            destination,
            comparison,
            note,
        });
    }

    SyncPlan {
        project: project.clone(),
        set_name: set.name.clone(),
        direction,
        actions,
    }
}

/// Hold back writes to paths an earlier set of the same run already
/// manages.
///
/// `claimed` maps relative paths to the set that owns them. A writing action
/// on a claimed path becomes a conflict; files whose two templates agree are
/// left alone since there is nothing to choose between.
pub(crate) fn hold_shared_paths(plan: &mut SyncPlan, claimed: &BTreeMap<String, String>) {
    for action in &mut plan.actions {
        let Some(owner) = claimed.get(&action.relative_path) else {
            continue;
        };
        if action.kind.writes() {
            tracing::warn!(
                file = %action.relative_path,
                set = %plan.set_name,
                owner = %owner,
                "path managed by more than one requested set"
            );
            action.kind = ActionKind::Conflict;
            action.note = Some(format!("also managed by set '{owner}' in this run"));
        }
    }
}

/// Record every path of `plan` as owned by its set unless an earlier set
/// already owns it.
pub(crate) fn claim_paths(plan: &SyncPlan, claimed: &mut BTreeMap<String, String>) {
    for action in &plan.actions {
        claimed
            .entry(action.relative_path.clone())
            .or_insert_with(|| plan.set_name.clone());
    }
}

/// Apply direction limits, deletion rules and the conflict policy to a raw
/// classification.
fn decide(
    raw: ActionKind,
    comparison: &Comparison,
    direction: Direction,
    policy: ConflictPolicy,
) -> (ActionKind, Option<String>) {
    match raw {
        ActionKind::Conflict => match resolver::resolve(comparison, policy) {
            Decision::KeepTemplate if direction.allows_pull() => {
                (ActionKind::Pull, Some(format!("conflict resolved by {policy}")))
            }
            Decision::KeepProject if direction.allows_push() => {
                (ActionKind::Push, Some(format!("conflict resolved by {policy}")))
            }
            Decision::KeepTemplate | Decision::KeepProject => (
                ActionKind::Conflict,
                Some(format!("{policy} not applicable to a {direction} sync")),
            ),
            Decision::SkipAndReport => (ActionKind::Conflict, conflict_note(comparison)),
        },
        ActionKind::Adopt if !direction.allows_pull() => {
            (ActionKind::Skip, Some("not adopted in a push-only sync".into()))
        }
        ActionKind::Pull if comparison.template.is_none() => (
            ActionKind::Skip,
            Some("template source removed; deletions are not propagated".into()),
        ),
        ActionKind::Pull if !direction.allows_pull() => {
            (ActionKind::Skip, Some("template changed; not pulled in a push-only sync".into()))
        }
        ActionKind::Push if comparison.project.is_none() => (
            ActionKind::Skip,
            Some("project copy removed; deletions are not propagated".into()),
        ),
        ActionKind::Push if !direction.allows_push() => {
            (ActionKind::Skip, Some("project diverged from template; not pushed in a pull-only sync".into()))
        }
        other => (other, None),
    }
}

fn conflict_note(comparison: &Comparison) -> Option<String> {
    let note = match (&comparison.snapshot, &comparison.template, &comparison.project) {
        (None, None, _) => "project file exists but the template source is missing",
        (None, _, _) => "project already has a different file and was never synced",
        (Some(_), None, _) => "template source removed while the project copy changed",
        (Some(_), _, None) => "project copy removed while the template changed",
        (Some(_), _, _) => "template and project both changed since the last sync",
    };
    Some(note.to_string())
}
