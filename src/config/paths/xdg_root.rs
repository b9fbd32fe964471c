//! XDG Base Directory utilities.

use std::path::PathBuf;

/// Application directory name under the config and cache roots.
pub const APP_DIR: &str = "outline-cache";

/// Get XDG config home directory
///
/// Returns `$XDG_CONFIG_HOME` if set, otherwise defaults to `$HOME/.config`
pub fn config_home() -> Option<PathBuf> {
    if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg_config_home.is_empty() {
            return Some(PathBuf::from(xdg_config_home));
        }
    }
    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".config"))
}

/// `$XDG_CONFIG_HOME/outline-cache/config.toml`
pub fn global_config_path() -> Option<PathBuf> {
    config_home().map(|home| home.join(APP_DIR).join("config.toml"))
}

/// Platform cache directory for stores (e.g. `~/.cache/outline-cache`).
pub fn default_cache_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", APP_DIR, APP_DIR).map(|dirs| dirs.cache_dir().to_path_buf())
}
