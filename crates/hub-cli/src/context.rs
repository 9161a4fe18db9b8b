//! Hub configuration resolution
//!
//! Precedence, lowest first: the config file, then environment variables and
//! flags (clap merges those two into [`Locations`]).

use std::time::Duration;

use hub_core::HubConfig;

use crate::cli::Locations;
use crate::error::{CliError, Result};

/// Build the effective [`HubConfig`] for this invocation.
///
/// An explicit `--config` must exist. The default config file is optional.
pub fn resolve_config(locations: &Locations) -> Result<HubConfig> {
    let from_file = match &locations.config {
        Some(path) => Some(HubConfig::load(path)?),
        None => match HubConfig::default_path().filter(|path| path.is_file()) {
            Some(path) => {
                tracing::debug!(config = %path.display(), "using default config file");
                Some(HubConfig::load(&path)?)
            }
            None => None,
        },
    };

    let mut config = match (&locations.catalog, from_file) {
        (Some(catalog), Some(file)) => HubConfig {
            lock_timeout: file.lock_timeout,
            stale_lock_after: file.stale_lock_after,
            ..HubConfig::for_catalog(catalog)
        },
        (Some(catalog), None) => HubConfig::for_catalog(catalog),
        (None, Some(file)) => file,
        (None, None) => {
            return Err(CliError::user(
                "No catalog configured; pass --catalog or set DOTCONFIG_HUB_CATALOG",
            ));
        }
    };

    if let Some(registry) = &locations.registry {
        config = config.with_registry(registry);
    }
    if let Some(secs) = locations.lock_timeout {
        config = config.with_lock_timeout(Duration::from_secs(secs));
    }
    Ok(config)
}
