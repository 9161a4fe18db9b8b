//! Hub configuration: where the catalog and registry live
//!
//! Read from `<config dir>/dotconfig-hub/config.toml` when present:
//!
//! ```toml
//! catalog = "~/dotconfig-templates/catalog.yaml"
//! registry = "~/dotconfig-templates/project_mapping.yaml"   # optional
//! lock_timeout_secs = 30                                      # optional
//! stale_lock_secs = 600                                       # optional
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use hub_fs::{ConfigStore, LockOptions, NormalizedPath};
use serde::{Deserialize, Serialize};

use crate::registry::RegistryStore;
use crate::{Error, Result};

/// Default registry file name, placed next to the catalog.
pub const REGISTRY_FILE: &str = "project_mapping.yaml";

const DEFAULT_LOCK_TIMEOUT_SECS: u64 = 30;
const DEFAULT_STALE_LOCK_SECS: u64 = 600;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    catalog: Option<String>,
    registry: Option<String>,
    lock_timeout_secs: Option<u64>,
    stale_lock_secs: Option<u64>,
}

/// Resolved locations and lock policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    pub catalog: NormalizedPath,
    pub registry: NormalizedPath,
    pub lock_timeout: Duration,
    pub stale_lock_after: Duration,
}

impl HubConfig {
    /// Config with default lock settings and the registry next to `catalog`.
    pub fn for_catalog(catalog: impl AsRef<Path>) -> Self {
        let catalog = NormalizedPath::new(catalog);
        let registry = catalog
            .parent()
            .map(|dir| dir.join(REGISTRY_FILE))
            .unwrap_or_else(|| NormalizedPath::new(REGISTRY_FILE));
        Self {
            catalog,
            registry,
            lock_timeout: Duration::from_secs(DEFAULT_LOCK_TIMEOUT_SECS),
            stale_lock_after: Duration::from_secs(DEFAULT_STALE_LOCK_SECS),
        }
    }

    pub fn with_registry(mut self, registry: impl AsRef<Path>) -> Self {
        self.registry = NormalizedPath::new(registry);
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Default location of the config file.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("dotconfig-hub").join("config.toml"))
    }

    /// Load a config file. `~/` prefixes are expanded.
    pub fn load(path: &Path) -> Result<Self> {
        let normalized = NormalizedPath::new(path);
        if !normalized.is_file() {
            return Err(Error::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        let file: ConfigFile = ConfigStore::new().load(&normalized)?;

        let catalog = file.catalog.ok_or_else(|| Error::ConfigNotFound {
            path: path.to_path_buf(),
        })?;
        let mut config = Self::for_catalog(expand_home(&catalog));
        if let Some(registry) = file.registry {
            config.registry = NormalizedPath::new(expand_home(&registry));
        }
        if let Some(secs) = file.lock_timeout_secs {
            config.lock_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.stale_lock_secs {
            config.stale_lock_after = Duration::from_secs(secs);
        }
        Ok(config)
    }

    pub fn lock_options(&self) -> LockOptions {
        LockOptions {
            timeout: self.lock_timeout,
            stale_after: self.stale_lock_after,
        }
    }

    pub fn registry_store(&self) -> RegistryStore {
        RegistryStore::new(self.registry.clone()).with_lock_options(self.lock_options())
    }
}

fn expand_home(raw: &str) -> PathBuf {
    match raw.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map(|home| home.join(rest)).unwrap_or_else(|| PathBuf::from(raw)),
        None => PathBuf::from(raw),
    }
}
