//! Environment variable source: OUTLINE_CACHE__* with __ separator

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

/// Environment prefix; `OUTLINE_CACHE__BACKEND=sqlite` sets `backend`.
pub const ENV_PREFIX: &str = "OUTLINE_CACHE";

/// Add environment variable overlay to builder.
///
/// Nested keys use `__`, e.g. `OUTLINE_CACHE__LOGGING__LEVEL=debug`.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    ))
}
