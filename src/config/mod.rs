//! Configuration
//!
//! `CacheConfig` is assembled by [`ConfigLoader`] from defaults, the global
//! config file, an optional explicit file and `OUTLINE_CACHE__*` environment
//! variables, in increasing precedence.

pub mod facade;
pub mod merge;
pub mod paths;
pub mod sources;
pub mod storage_paths;

pub use facade::ConfigLoader;
pub use paths::xdg_root as xdg;
pub use storage_paths::StoreLocations;

use crate::codec::migration::DEFAULT_PAGE_SIZE;
use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::store::BackendKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_true() -> bool {
    true
}

fn default_migration_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

/// Cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// When false every read is a miss and writes are skipped.
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub backend: BackendKind,

    /// Parent directory of all store roots; platform cache dir when unset.
    #[serde(default)]
    pub base_dir: Option<PathBuf>,

    /// Entries per batch during protocol migration.
    #[serde(default = "default_migration_page_size")]
    pub migration_page_size: usize,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            backend: BackendKind::default(),
            base_dir: None,
            migration_page_size: default_migration_page_size(),
            logging: LoggingConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Default settings with every store under `base_dir`.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
            ..Self::default()
        }
    }

    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Render as a TOML document suitable for the global config file.
    pub fn to_toml(&self) -> Result<String, ApiError> {
        toml::to_string_pretty(self).map_err(|e| ApiError::ConfigError(e.to_string()))
    }
}
