//! MergeService: orchestrates sources and deserializes to CacheConfig.

use crate::config::sources::{environment, global_file};
use crate::config::CacheConfig;
use config::{ConfigError, File};
use std::path::Path;

use super::merge_policy;

/// Merge service for config composition.
pub struct MergeService;

impl MergeService {
    /// Precedence: global file (lowest) -> explicit file -> environment (highest).
    pub fn load(explicit: Option<&Path>) -> Result<CacheConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = match explicit {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder,
        };
        let builder = environment::add_to_builder(builder)?;

        let config = builder.build()?;
        config.try_deserialize()
    }
}
