//! Atomic I/O operations
//!
//! Every write goes through a temp file in the target's own directory
//! followed by a rename, so readers only ever observe the old bytes or the
//! new bytes. The two halves are exposed separately as [`stage_atomic`] and
//! [`StagedFile::commit`] so callers can run checks between them.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Error, NormalizedPath, Result};

/// Tuning knobs for file locking and durability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RobustnessConfig {
    /// How long to keep retrying a contended lock before giving up
    pub lock_timeout: Duration,
    /// Whether to fsync temp files before renaming them into place
    pub enable_fsync: bool,
}

impl Default for RobustnessConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(30),
            enable_fsync: true,
        }
    }
}

/// A fully written temp file waiting to be renamed over its target.
///
/// Dropping a `StagedFile` without calling [`commit`](Self::commit) removes
/// the temp file and leaves the target untouched.
#[derive(Debug)]
pub struct StagedFile {
    temp_path: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl StagedFile {
    /// The temp file holding the new content.
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// The file that will be replaced on commit.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Atomically rename the staged content over the target.
    pub fn commit(mut self) -> Result<()> {
        fs::rename(&self.temp_path, &self.target).map_err(|e| Error::io(&self.target, e))?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.temp_path);
        }
    }
}

/// Write `content` to a temp file next to `path`, creating parent
/// directories as needed. The target is not touched until the returned
/// [`StagedFile`] is committed.
pub fn stage_atomic(path: &NormalizedPath, content: &[u8], config: RobustnessConfig) -> Result<StagedFile> {
    let native_path = path.to_native();

    if let Some(parent) = native_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    // Same directory keeps the rename on one filesystem. The uuid keeps
    // concurrent writers in one process from sharing a temp file.
    let temp_name = format!(
        ".{}.{}.tmp",
        path.file_name().unwrap_or("file"),
        uuid::Uuid::new_v4().simple()
    );
    let temp_path = native_path.with_file_name(&temp_name);

    let staged = StagedFile {
        temp_path,
        target: native_path,
        committed: false,
    };

    let mut temp_file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&staged.temp_path)
        .map_err(|e| Error::io(&staged.temp_path, e))?;

    temp_file
        .write_all(content)
        .map_err(|e| Error::io(&staged.temp_path, e))?;

    if config.enable_fsync {
        temp_file
            .sync_all()
            .map_err(|e| Error::io(&staged.temp_path, e))?;
    }

    Ok(staged)
}

/// Write content atomically to a file.
///
/// Uses write-to-temp-then-rename strategy to prevent partial writes.
pub fn write_atomic(path: &NormalizedPath, content: &[u8], config: RobustnessConfig) -> Result<()> {
    stage_atomic(path, content, config)?.commit()
}

/// Copy `from` over `to` atomically.
///
/// Returns the bytes that were written so callers can fingerprint exactly
/// what landed on disk.
pub fn copy_atomic(from: &NormalizedPath, to: &NormalizedPath, config: RobustnessConfig) -> Result<Vec<u8>> {
    let content = read_bytes(from)?;
    write_atomic(to, &content, config)?;
    tracing::debug!(from = %from, to = %to, bytes = content.len(), "copied file");
    Ok(content)
}

/// Read a whole file.
pub fn read_bytes(path: &NormalizedPath) -> Result<Vec<u8>> {
    let native_path = path.to_native();
    fs::read(&native_path).map_err(|e| Error::io(&native_path, e))
}

/// Read a file, treating a missing file as `None`.
pub fn read_optional(path: &NormalizedPath) -> Result<Option<Vec<u8>>> {
    let native_path = path.to_native();
    match fs::read(&native_path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::io(&native_path, e)),
    }
}

/// Read text content from a file.
pub fn read_text(path: &NormalizedPath) -> Result<String> {
    let native_path = path.to_native();
    fs::read_to_string(&native_path).map_err(|e| Error::io(&native_path, e))
}

/// Write text content to a file atomically.
pub fn write_text(path: &NormalizedPath, content: &str, config: RobustnessConfig) -> Result<()> {
    write_atomic(path, content.as_bytes(), config)
}
