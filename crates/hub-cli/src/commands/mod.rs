//! Command implementations for hub-cli

pub mod projects;
pub mod sync;

pub use projects::{run_list, run_projects, run_reconcile, run_register, run_unregister};
pub use sync::{run_resnapshot, run_status, run_sync, run_sync_all};

use serde::Serialize;

use crate::error::Result;

/// How a command that completed should exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// At least one file was left in conflict
    Conflicts,
    /// At least one file operation failed, or the run was cancelled
    Failures,
}

impl Outcome {
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Conflicts => 2,
            Self::Failures => 3,
        }
    }

    /// Failures outrank conflicts.
    pub fn from_flags(conflicts: bool, failures: bool) -> Self {
        if failures {
            Self::Failures
        } else if conflicts {
            Self::Conflicts
        } else {
            Self::Success
        }
    }
}

/// Print `value` as pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_outrank_conflicts() {
        assert_eq!(Outcome::from_flags(true, true), Outcome::Failures);
        assert_eq!(Outcome::from_flags(true, false).exit_code(), 2);
        assert_eq!(Outcome::from_flags(false, false).exit_code(), 0);
    }
}
