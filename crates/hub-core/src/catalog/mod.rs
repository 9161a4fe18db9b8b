//! Template store: the catalog of environment sets
//!
//! The catalog maps set names to ordered file lists. It is loaded once per
//! run and never mutated afterwards, so a `TemplateStore` can be shared
//! freely between planning operations.
//!
//! ```yaml
//! environment_sets:
//!   - name: shell
//!     description: Interactive shell dotfiles
//!     files:
//!       - path: .bashrc
//!         source: shell/bashrc
//!       - path: .vimrc
//! ```

mod schema;

pub use schema::{CatalogDocument, EnvironmentSet, FileDocument, FileSpec, SetDocument};

use std::collections::{HashMap, HashSet};

use hub_fs::{ConfigStore, NormalizedPath, normalize_relative};

use crate::{Error, Result};

/// Read-only view of the loaded catalog.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    /// Directory template sources are resolved against
    root: NormalizedPath,
    /// Sets in declared order
    sets: Vec<EnvironmentSet>,
    index: HashMap<String, usize>,
}

impl TemplateStore {
    /// Load and validate the catalog at `location`.
    ///
    /// The format follows the file extension (YAML, TOML or JSON).
    ///
    /// # Errors
    ///
    /// - [`Error::ConfigNotFound`] if the file does not exist
    /// - [`Error::CatalogParse`] on malformed structure or invalid paths
    /// - [`Error::DuplicateSet`] / [`Error::DuplicatePath`] on repeated names
    pub fn load(location: &NormalizedPath) -> Result<Self> {
        if !location.is_file() {
            return Err(Error::ConfigNotFound {
                path: location.to_native(),
            });
        }

        let document: CatalogDocument = ConfigStore::new().load(location).map_err(|e| match e {
            hub_fs::Error::Io { .. } => Error::Fs(e),
            other => Error::CatalogParse {
                path: location.to_native(),
                message: other.to_string(),
            },
        })?;

        let root = location.parent().unwrap_or_else(|| NormalizedPath::new("."));
        let store = Self::from_document(root, document).map_err(|e| match e {
            Error::CatalogParse { message, .. } => Error::CatalogParse {
                path: location.to_native(),
                message,
            },
            other => other,
        })?;

        tracing::debug!(catalog = %location, sets = store.sets.len(), "loaded catalog");
        Ok(store)
    }

    /// Build a store from an already-parsed document.
    ///
    /// Relative template sources are resolved against `root`.
    pub fn from_document(root: NormalizedPath, document: CatalogDocument) -> Result<Self> {
        let mut sets = Vec::with_capacity(document.environment_sets.len());
        let mut index = HashMap::new();

        for raw in document.environment_sets {
            let name = raw.name.trim().to_string();
            if name.is_empty() {
                return Err(invalid("environment set name must not be empty"));
            }
            if index.contains_key(&name) {
                return Err(Error::DuplicateSet { name });
            }

            let mut seen = HashSet::new();
            let mut files = Vec::with_capacity(raw.files.len());
            for file in raw.files {
                let relative_path = normalize_relative(&file.path)
                    .map_err(|reason| invalid(format!("set '{name}': {reason}")))?;
                if !seen.insert(relative_path.clone()) {
                    return Err(Error::DuplicatePath {
                        set: name,
                        path: relative_path,
                    });
                }

                let template_source = match file.source.as_deref() {
                    Some(source) if is_absolute(source) => NormalizedPath::new(source),
                    Some(source) => {
                        let source = normalize_relative(source)
                            .map_err(|reason| invalid(format!("set '{name}': source {reason}")))?;
                        root.join(&source)
                    }
                    None => root.join(&name).join(&relative_path),
                };

                files.push(FileSpec {
                    relative_path,
                    template_source,
                });
            }

            index.insert(name.clone(), sets.len());
            sets.push(EnvironmentSet::new(name, raw.description, files));
        }

        Ok(Self { root, sets, index })
    }

    /// Look up a set by name.
    pub fn resolve(&self, name: &str) -> Result<&EnvironmentSet> {
        self.index
            .get(name)
            .map(|&i| &self.sets[i])
            .ok_or_else(|| Error::SetNotFound {
                name: name.to_string(),
            })
    }

    /// All sets in declared order.
    pub fn sets(&self) -> &[EnvironmentSet] {
        &self.sets
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sets.iter().map(|s| s.name.as_str())
    }

    /// Directory relative template sources resolve against.
    pub fn root(&self) -> &NormalizedPath {
        &self.root
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::CatalogParse {
        path: Default::default(),
        message: message.into(),
    }
}

fn is_absolute(source: &str) -> bool {
    source.starts_with('/') || std::path::Path::new(source).is_absolute()
}
