//! Per-project manifest: the sets a project asks for
//!
//! Lives at `<project>/.dotconfig-hub.yaml` and is owned by the project, not
//! the hub. The core only reads it to reconcile against the registry.

use hub_fs::{ConfigStore, NormalizedPath};
use serde::{Deserialize, Serialize};

use crate::Result;

/// File name of the manifest inside a project.
pub const MANIFEST_FILE: &str = ".dotconfig-hub.yaml";

/// Sets requested by a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectManifest {
    #[serde(default)]
    pub environment_sets: Vec<String>,
}

impl ProjectManifest {
    /// Read the manifest from `project_root`, if there is one.
    pub fn load(project_root: &NormalizedPath) -> Result<Option<Self>> {
        let path = project_root.join(MANIFEST_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(ConfigStore::new().load(&path)?))
    }
}

/// Differences between what a project requests and what is registered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    /// Requested in the manifest but not registered
    pub requested_only: Vec<String>,
    /// Registered but no longer requested
    pub registered_only: Vec<String>,
}

impl Reconciliation {
    pub fn compute(requested: &[String], registered: &[String]) -> Self {
        Self {
            requested_only: requested
                .iter()
                .filter(|s| !registered.contains(s))
                .cloned()
                .collect(),
            registered_only: registered
                .iter()
                .filter(|s| !requested.contains(s))
                .cloned()
                .collect(),
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.requested_only.is_empty() && self.registered_only.is_empty()
    }
}
