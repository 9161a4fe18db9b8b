//! Advisory file locks with a bounded wait
//!
//! Locks are OS-level (`fs2`) exclusive locks on a dedicated `.lock` file, so
//! the kernel releases them when the holding process dies. The lock file
//! also carries a small holder record (pid and acquisition time). It is
//! cleared on a clean release; a record still present when the lock is
//! next acquired means the previous holder crashed. Old records are
//! reclaimed with a warning.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use backoff::ExponentialBackoff;
use chrono::{DateTime, Utc};
use fs2::FileExt;

use crate::{Error, Result};

/// Holder record written into a held lock file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHolder {
    pub pid: u32,
    pub acquired_at: DateTime<Utc>,
}

impl LockHolder {
    fn current() -> Self {
        Self {
            pid: std::process::id(),
            acquired_at: Utc::now(),
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        let (pid, at) = raw.trim().split_once(' ')?;
        Some(Self {
            pid: pid.parse().ok()?,
            acquired_at: DateTime::parse_from_rfc3339(at).ok()?.with_timezone(&Utc),
        })
    }

    fn render(&self) -> String {
        format!("{} {}\n", self.pid, self.acquired_at.to_rfc3339())
    }

    /// How long ago this record was written.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.acquired_at).to_std().unwrap_or_default()
    }
}

impl std::fmt::Display for LockHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pid {} since {}", self.pid, self.acquired_at.to_rfc3339())
    }
}

/// Options for [`FileLock::acquire`].
#[derive(Debug, Clone, Copy)]
pub struct LockOptions {
    /// Give up after waiting this long
    pub timeout: Duration,
    /// A leftover holder record older than this is treated as a crashed holder
    pub stale_after: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            stale_after: Duration::from_secs(600),
        }
    }
}

/// An exclusive advisory lock, released on drop.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Acquire an exclusive lock on `path`, creating the lock file if needed.
    ///
    /// Retries with exponential backoff until `options.timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockTimeout`] with the current holder record if the
    /// lock stays contended for the whole timeout.
    pub fn acquire(path: &Path, options: LockOptions) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| Error::io(path, e))?;

        let started = Instant::now();
        let policy = ExponentialBackoff {
            initial_interval: Duration::from_millis(10),
            max_interval: Duration::from_millis(250),
            max_elapsed_time: Some(options.timeout),
            ..ExponentialBackoff::default()
        };

        let attempt = || -> std::result::Result<(), backoff::Error<std::io::Error>> {
            match file.try_lock_exclusive() {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    Err(backoff::Error::transient(e))
                }
                Err(e) => Err(backoff::Error::permanent(e)),
            }
        };

        match backoff::retry(policy, attempt) {
            Ok(()) => {}
            Err(backoff::Error::Transient { .. }) => {
                let holder = read_holder(path).map(|h| h.to_string());
                return Err(Error::LockTimeout {
                    path: path.to_path_buf(),
                    waited: started.elapsed(),
                    holder,
                });
            }
            Err(backoff::Error::Permanent(e)) => {
                tracing::debug!(path = %path.display(), error = %e, "lock attempt failed");
                return Err(Error::LockFailed {
                    path: path.to_path_buf(),
                });
            }
        }

        let mut lock = Self {
            file,
            path: path.to_path_buf(),
        };
        lock.reclaim_leftover(options.stale_after)?;
        lock.write_holder(&LockHolder::current())?;
        tracing::debug!(path = %lock.path.display(), waited = ?started.elapsed(), "lock acquired");
        Ok(lock)
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn reclaim_leftover(&mut self, stale_after: Duration) -> Result<()> {
        let mut raw = String::new();
        self.file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.file.read_to_string(&mut raw))
            .map_err(|e| Error::io(&self.path, e))?;

        if let Some(previous) = LockHolder::parse(&raw) {
            let age = previous.age(Utc::now());
            if age >= stale_after {
                tracing::warn!(
                    path = %self.path.display(),
                    holder = %previous,
                    age = ?age,
                    "reclaiming stale lock left by a holder that did not release it"
                );
            } else {
                tracing::debug!(
                    path = %self.path.display(),
                    holder = %previous,
                    "previous holder exited without clearing its lock record"
                );
            }
        }
        Ok(())
    }

    fn write_holder(&mut self, holder: &LockHolder) -> Result<()> {
        self.file
            .set_len(0)
            .and_then(|_| self.file.seek(SeekFrom::Start(0)))
            .and_then(|_| self.file.write_all(holder.render().as_bytes()))
            .and_then(|_| self.file.flush())
            .map_err(|e| Error::io(&self.path, e))
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = self.file.set_len(0);
        let _ = self.file.unlock();
        tracing::debug!(path = %self.path.display(), "lock released");
    }
}

/// Read the holder record of a lock file without taking the lock.
pub fn read_holder(path: &Path) -> Option<LockHolder> {
    let raw = std::fs::read_to_string(path).ok()?;
    LockHolder::parse(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holder_record_parses_back() {
        let holder = LockHolder::current();
        let parsed = LockHolder::parse(&holder.render()).unwrap();
        assert_eq!(parsed.pid, holder.pid);
    }

    #[test]
    fn garbage_holder_record_is_ignored() {
        assert!(LockHolder::parse("").is_none());
        assert!(LockHolder::parse("not a record").is_none());
    }

    #[test]
    fn release_clears_holder_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.lock");

        let lock = FileLock::acquire(&path, LockOptions::default()).unwrap();
        assert!(read_holder(&path).is_some());
        drop(lock);
        assert!(read_holder(&path).is_none());
    }
}
