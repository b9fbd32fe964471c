//! Core types shared across the outline cache.

use serde::{Deserialize, Serialize};
use std::fmt;

/// NodeId: stable, globally unique node identifier, never reused.
pub type NodeId = String;

/// Namespace prefix shared by every outline snapshot key.
pub const SNAPSHOT_KEY_PREFIX: &str = "fcache/";

/// CacheKey: opaque key derived from (branch, path, content).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wrap an already-derived key string.
    pub fn new(key: impl Into<String>) -> Self {
        CacheKey(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
