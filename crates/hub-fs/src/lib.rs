//! Filesystem layer for dotconfig-hub
//!
//! Provides normalized paths, content digests, atomic writes and advisory
//! locks. Everything above this crate treats files as opaque byte blobs.

pub mod config;
pub mod digest;
pub mod error;
pub mod io;
pub mod lock;
pub mod path;

pub use config::{ConfigStore, Format};
pub use digest::{Digest, digest, digest_file};
pub use error::{Error, Result};
pub use io::{RobustnessConfig, StagedFile};
pub use lock::{FileLock, LockHolder, LockOptions};
pub use path::{NormalizedPath, normalize_relative};
