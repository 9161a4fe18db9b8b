//! Durable storage for the registry document
//!
//! Layout next to the registry file:
//!
//! ```text
//! project_mapping.yaml          the document
//! project_mapping.yaml.lock     global lock, held across load -> mutate -> persist
//! project_mapping.yaml.locks/   one lock per project, held for a whole sync
//! ```

use hub_fs::{ConfigStore, FileLock, Format, LockOptions, NormalizedPath, RobustnessConfig, StagedFile, io};

use super::{ProjectId, Registry};
use crate::{Error, Result};

/// Proof that the global registry lock is held.
#[derive(Debug)]
pub struct RegistryLock {
    _lock: FileLock,
}

/// A registry write that has been staged but not yet renamed into place.
#[derive(Debug)]
pub struct StagedRegistry {
    staged: StagedFile,
    version: u64,
}

impl StagedRegistry {
    /// Version the document will carry once committed.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Rename the staged document over the registry file and advance the
    /// in-memory version to match.
    pub fn commit(self, registry: &mut Registry) -> Result<()> {
        self.staged.commit()?;
        registry.set_version(self.version);
        Ok(())
    }
}

/// Location and locking policy for the registry file.
#[derive(Debug, Clone)]
pub struct RegistryStore {
    path: NormalizedPath,
    lock_options: LockOptions,
    robustness: RobustnessConfig,
}

impl RegistryStore {
    pub fn new(path: NormalizedPath) -> Self {
        Self {
            path,
            lock_options: LockOptions::default(),
            robustness: RobustnessConfig::default(),
        }
    }

    pub fn with_lock_options(mut self, lock_options: LockOptions) -> Self {
        self.lock_options = lock_options;
        self.robustness.lock_timeout = lock_options.timeout;
        self
    }

    pub fn with_robustness(mut self, robustness: RobustnessConfig) -> Self {
        self.robustness = robustness;
        self
    }

    pub fn path(&self) -> &NormalizedPath {
        &self.path
    }

    pub fn lock_options(&self) -> LockOptions {
        self.lock_options
    }

    fn lock_path(&self) -> std::path::PathBuf {
        let mut native = self.path.to_native().into_os_string();
        native.push(".lock");
        native.into()
    }

    fn project_lock_path(&self, project: &ProjectId) -> std::path::PathBuf {
        let mut dir = self.path.to_native().into_os_string();
        dir.push(".locks");
        let key = hub_fs::digest(project.as_str().as_bytes());
        std::path::PathBuf::from(dir).join(format!("{}.lock", &key.hex()[..16]))
    }

    /// Read the registry without locking.
    ///
    /// A missing file is an empty registry at version 0. Writes replace the
    /// file by rename, so an unlocked read always sees a complete document.
    pub fn load(&self) -> Result<Registry> {
        let Some(bytes) = io::read_optional(&self.path)? else {
            tracing::debug!(registry = %self.path, "no registry yet, starting empty");
            return Ok(Registry::new());
        };

        let text = String::from_utf8(bytes).map_err(|e| Error::RegistryParse {
            path: self.path.to_native(),
            message: e.to_string(),
        })?;
        if text.trim().is_empty() {
            return Ok(Registry::new());
        }

        let format = Format::detect(&self.path)?;
        ConfigStore::parse(&self.path, format, &text).map_err(|e| Error::RegistryParse {
            path: self.path.to_native(),
            message: e.to_string(),
        })
    }

    /// Take the global registry lock, waiting up to the configured timeout.
    pub fn lock(&self) -> Result<RegistryLock> {
        let lock = FileLock::acquire(&self.lock_path(), self.lock_options)?;
        Ok(RegistryLock { _lock: lock })
    }

    /// Take the per-project lock that serializes syncs of one project.
    pub fn lock_project(&self, project: &ProjectId) -> Result<FileLock> {
        Ok(FileLock::acquire(&self.project_lock_path(project), self.lock_options)?)
    }

    /// Serialize `registry` at the next version into a temp file beside the
    /// registry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RegistryConflict`] if the file on disk is at a newer
    /// version than `registry` was read at.
    pub fn stage(&self, registry: &Registry, _lock: &RegistryLock) -> Result<StagedRegistry> {
        let on_disk = self.load()?.version();
        if on_disk > registry.version() {
            return Err(Error::RegistryConflict {
                path: self.path.to_native(),
                expected: registry.version(),
                found: on_disk,
            });
        }

        let mut next = registry.clone();
        let version = on_disk.max(registry.version()) + 1;
        next.set_version(version);

        let content = ConfigStore::render(&self.path, &next)?;
        let staged = io::stage_atomic(&self.path, content.as_bytes(), self.robustness)?;
        Ok(StagedRegistry { staged, version })
    }

    /// Atomically write `registry` and advance its version.
    pub fn persist(&self, registry: &mut Registry, lock: &RegistryLock) -> Result<()> {
        let staged = self.stage(registry, lock)?;
        let version = staged.version();
        staged.commit(registry)?;
        tracing::info!(registry = %self.path, version, "registry persisted");
        Ok(())
    }

    /// Lock, load, apply `mutate`, persist, unlock.
    ///
    /// Nothing is written if `mutate` fails.
    pub fn transaction<T>(&self, mutate: impl FnOnce(&mut Registry) -> Result<T>) -> Result<T> {
        let lock = self.lock()?;
        let mut registry = self.load()?;
        let value = mutate(&mut registry)?;
        self.persist(&mut registry, &lock)?;
        Ok(value)
    }
}
