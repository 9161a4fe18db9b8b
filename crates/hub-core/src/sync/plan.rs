//! Sync plan types
//!
//! A plan is computed fresh for every invocation and never persisted.

use std::fmt;
use std::str::FromStr;

use hub_fs::{Digest, NormalizedPath};
use serde::Serialize;

use crate::registry::ProjectId;
use crate::{Error, Result};

/// Which way files may flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    #[default]
    Bidirectional,
    /// Template to project only
    PullOnly,
    /// Project to template only
    PushOnly,
}

impl Direction {
    pub fn allows_pull(self) -> bool {
        matches!(self, Self::Bidirectional | Self::PullOnly)
    }

    pub fn allows_push(self) -> bool {
        matches!(self, Self::Bidirectional | Self::PushOnly)
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "bidirectional" | "both" => Ok(Self::Bidirectional),
            "pull" | "pull-only" => Ok(Self::PullOnly),
            "push" | "push-only" => Ok(Self::PushOnly),
            other => Err(Error::InvalidOption {
                option: "direction",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bidirectional => "bidirectional",
            Self::PullOnly => "pull",
            Self::PushOnly => "push",
        })
    }
}

/// What to do with one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// First introduction of a template file into the project
    Adopt,
    /// Template changed, project did not: copy template to project
    Pull,
    /// Project changed, template did not: copy project to template
    Push,
    /// Nothing to do
    Skip,
    /// Both sides moved, or the first sync found a differing project file
    Conflict,
    /// The template or project file could not be read
    Unreadable,
}

impl ActionKind {
    /// Whether applying this action writes a file.
    pub fn writes(self) -> bool {
        matches!(self, Self::Adopt | Self::Pull | Self::Push)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Adopt => "adopt",
            Self::Pull => "pull",
            Self::Push => "push",
            Self::Skip => "skip",
            Self::Conflict => "conflict",
            Self::Unreadable => "unreadable",
        })
    }
}

/// The three digests a file is classified by. `None` means the file is
/// missing (template, project) or was never synced (snapshot).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Comparison {
    pub template: Option<Digest>,
    pub project: Option<Digest>,
    pub snapshot: Option<Digest>,
}

/// One step of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileAction {
    pub relative_path: String,
    pub kind: ActionKind,
    /// File that would be read
    pub source: NormalizedPath,
    /// File that would be written
    pub destination: NormalizedPath,
    pub comparison: Comparison,
    /// Why a file was held back or how a conflict was settled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Ordered actions for one (project, set) pair, in the set's declared file
/// order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncPlan {
    pub project: ProjectId,
    pub set_name: String,
    pub direction: Direction,
    pub actions: Vec<FileAction>,
}

impl SyncPlan {
    pub fn count(&self, kind: ActionKind) -> usize {
        self.actions.iter().filter(|a| a.kind == kind).count()
    }

    /// True when applying the plan would write nothing.
    pub fn is_noop(&self) -> bool {
        self.actions.iter().all(|a| !a.kind.writes())
    }

    pub fn has_conflicts(&self) -> bool {
        self.count(ActionKind::Conflict) > 0
    }
}
