//! Baseline values every source is layered on top of.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Builder pre-seeded with the defaults of the scalar settings.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("enabled", true)?
        .set_default("backend", "filesystem")?
        .set_default("migration_page_size", 200_i64)
}
