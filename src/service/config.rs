//! `VaultService` configuration (ambient; not part of the component spec)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::error::VaultError;

const DEFAULT_EXPIRY_TICK_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for a `VaultService` instance. Derives `Serialize`/
/// `Deserialize` so an embedding process may load it from its own config
/// source (file, env, flags) — this crate itself never reads files or
/// env vars beyond the store path it's given (§6: config loading is out
/// of scope for the core). The master passphrase is supplied separately,
/// never through this struct, since it must never round-trip through a
/// config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultConfig {
    pub store_path: PathBuf,
    #[serde(with = "humantime_serde")]
    pub expiry_tick_interval: Duration,
}

impl VaultConfig {
    #[must_use]
    pub fn builder() -> VaultConfigBuilder {
        VaultConfigBuilder::new()
    }
}

/// Builder for [`VaultConfig`], mirroring the fluent builder shape used
/// elsewhere in this crate for multi-field construction.
#[derive(Debug, Default)]
pub struct VaultConfigBuilder {
    store_path: Option<PathBuf>,
    expiry_tick_interval: Option<Duration>,
}

impl VaultConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn store_path(mut self, path: impl AsRef<Path>) -> Self {
        self.store_path = Some(path.as_ref().to_path_buf());
        self
    }

    #[must_use]
    pub fn expiry_tick_interval(mut self, interval: Duration) -> Self {
        self.expiry_tick_interval = Some(interval);
        self
    }

    pub fn build(self) -> Result<VaultConfig, VaultError> {
        let store_path = self
            .store_path
            .ok_or_else(|| VaultError::InvalidInput("store_path is required".to_string()))?;
        Ok(VaultConfig {
            store_path,
            expiry_tick_interval: self
                .expiry_tick_interval
                .unwrap_or(DEFAULT_EXPIRY_TICK_INTERVAL),
        })
    }
}
