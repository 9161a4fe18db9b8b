//! Conflict resolution policy
//!
//! A pure decision over the three digests of a conflicting file. The
//! default policy never picks a side.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::plan::Comparison;
use crate::{Error, Result};

/// Caller-supplied policy for conflicts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Leave both sides alone and report the conflict
    #[default]
    Report,
    AlwaysPreferTemplate,
    AlwaysPreferProject,
}

impl FromStr for ConflictPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "report" | "skip" => Ok(Self::Report),
            "always-prefer-template" | "prefer-template" | "template" => Ok(Self::AlwaysPreferTemplate),
            "always-prefer-project" | "prefer-project" | "project" => Ok(Self::AlwaysPreferProject),
            other => Err(Error::InvalidOption {
                option: "conflict policy",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Report => "report",
            Self::AlwaysPreferTemplate => "always-prefer-template",
            Self::AlwaysPreferProject => "always-prefer-project",
        })
    }
}

/// Outcome for one conflicting file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Decision {
    KeepProject,
    KeepTemplate,
    SkipAndReport,
}

/// Decide a conflict under `policy`.
///
/// A side that is missing can never win: keeping it would mean deleting
/// the other copy, and deletions are not propagated.
pub fn resolve(conflict: &Comparison, policy: ConflictPolicy) -> Decision {
    match policy {
        ConflictPolicy::Report => Decision::SkipAndReport,
        ConflictPolicy::AlwaysPreferTemplate if conflict.template.is_some() => Decision::KeepTemplate,
        ConflictPolicy::AlwaysPreferProject if conflict.project.is_some() => Decision::KeepProject,
        _ => Decision::SkipAndReport,
    }
}
