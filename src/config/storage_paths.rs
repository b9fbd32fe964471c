//! Store root resolution.
//!
//! Every document gets its own store directory under a shared base:
//! `<base>/<stem>_<hash>`, where `stem` is the sanitized document file stem
//! and `hash` identifies the absolute document path. Process-wide bookkeeping
//! lives in `<base>/global`.

use crate::config::{xdg, CacheConfig};
use crate::error::ApiError;
use std::path::{Path, PathBuf};

const GLOBAL_DIR: &str = "global";
const MAX_STEM_CHARS: usize = 16;
const HASH_HEX_CHARS: usize = 16;

/// Resolved store locations for one configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLocations {
    base: PathBuf,
}

impl StoreLocations {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        StoreLocations { base: base.into() }
    }

    /// Use `config.base_dir`, else the platform cache directory.
    pub fn resolve(config: &CacheConfig) -> Result<Self, ApiError> {
        if let Some(base) = &config.base_dir {
            return Ok(Self::new(base));
        }
        xdg::default_cache_dir().map(Self::new).ok_or_else(|| {
            ApiError::ConfigError("Could not determine platform cache directory".to_string())
        })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn global_root(&self) -> PathBuf {
        self.base.join(GLOBAL_DIR)
    }

    pub fn document_root(&self, document: &Path) -> PathBuf {
        self.base.join(document_dir_name(document))
    }
}

/// `<stem>_<hash>` directory name for a document.
pub fn document_dir_name(document: &Path) -> String {
    let absolute = absolute_path(document);
    let digest = blake3::hash(absolute.to_string_lossy().as_bytes());
    let hex = digest.to_hex();
    let hash = &hex[..HASH_HEX_CHARS];

    let stem: String = document
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .take(MAX_STEM_CHARS)
        .collect();
    let stem = if stem.is_empty() { "document".to_string() } else { stem };
    format!("{}_{}", stem, hash)
}

fn absolute_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = dunce::canonicalize(path) {
        return canonical;
    }
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
