//! Error types for hub-cli

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Errors that can occur in CLI operations
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Error from hub-core
    #[error(transparent)]
    Core(#[from] hub_core::Error),

    /// Error from hub-fs
    #[error(transparent)]
    Fs(#[from] hub_fs::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON output error
    #[error("Failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// User-facing error with a message
    #[error("{message}")]
    User { message: String },
}

impl CliError {
    /// Create a new user error with the given message
    pub fn user(message: impl Into<String>) -> Self {
        Self::User {
            message: message.into(),
        }
    }

    /// Process exit code for this error.
    ///
    /// 3 for a sync whose snapshot was not recorded, 4 for a lock timeout,
    /// 5 for a registry changed on disk, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Core(e) if e.is_lock_timeout() => 4,
            Self::Core(hub_core::Error::RegistryConflict { .. }) => 5,
            Self::Core(hub_core::Error::SnapshotNotRecorded { .. }) => 3,
            Self::Fs(hub_fs::Error::LockTimeout { .. }) => 4,
            _ => 1,
        }
    }
}
