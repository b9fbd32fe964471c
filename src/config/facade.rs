//! ConfigLoader facade delegating to the merge service.

use super::merge::service::MergeService;
use super::CacheConfig;
use crate::error::ApiError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from the global config file and the environment.
    pub fn load() -> Result<CacheConfig, ApiError> {
        Ok(MergeService::load(None)?)
    }

    /// Load with `path` layered above the global file.
    pub fn load_from_file(path: &Path) -> Result<CacheConfig, ApiError> {
        if !path.is_file() {
            return Err(ApiError::ConfigError(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        Ok(MergeService::load(Some(path))?)
    }

    /// Create default configuration.
    pub fn default() -> CacheConfig {
        CacheConfig::default()
    }
}
