//! On-disk catalog schema and the validated types built from it

use hub_fs::NormalizedPath;
use serde::{Deserialize, Serialize};

/// Top-level catalog document as written by users.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogDocument {
    pub environment_sets: Vec<SetDocument>,
}

/// One `environment_sets` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetDocument {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub files: Vec<FileDocument>,
}

/// One file entry of a set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileDocument {
    /// Location inside the project
    pub path: String,
    /// Template location, relative to the catalog directory unless absolute.
    /// Defaults to `<set name>/<path>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// A single file managed by an environment set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSpec {
    /// Normalized path relative to the project root; unique within its set
    pub relative_path: String,
    /// Absolute location of the canonical template content
    pub template_source: NormalizedPath,
}

impl FileSpec {
    /// Where this file lives inside `project_root`.
    pub fn project_path(&self, project_root: &NormalizedPath) -> NormalizedPath {
        project_root.join(&self.relative_path)
    }
}

/// A named, ordered bundle of template files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentSet {
    pub name: String,
    pub description: Option<String>,
    files: Vec<FileSpec>,
}

impl EnvironmentSet {
    pub(crate) fn new(name: String, description: Option<String>, files: Vec<FileSpec>) -> Self {
        Self {
            name,
            description,
            files,
        }
    }

    /// Files in declared order.
    pub fn files(&self) -> &[FileSpec] {
        &self.files
    }

    pub fn file(&self, relative_path: &str) -> Option<&FileSpec> {
        self.files.iter().find(|f| f.relative_path == relative_path)
    }

    pub fn contains(&self, relative_path: &str) -> bool {
        self.file(relative_path).is_some()
    }
}
