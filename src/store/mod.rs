//! Key-Value Store
//!
//! Persistent key → bytes mapping with two interchangeable backends: a
//! filesystem tree (one file per key) and a single-table SQLite database.
//! Backends are selected at construction time and used through the
//! [`KeyValueStore`] trait.

pub mod filesystem;
pub mod freshness;
pub mod hashed;
pub mod sqlite;

pub use filesystem::FileSystemStore;
pub use freshness::{FreshnessCache, StoreEntry};
pub use hashed::HashedCategory;
pub use sqlite::SqliteStore;

use crate::error::StorageError;
use globset::{Glob, GlobMatcher};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Reserved key prefix for store bookkeeping (protocol sentinel, cursors).
pub const META_PREFIX: &str = "_meta/";

/// Which backend a store uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Filesystem,
    Sqlite,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Filesystem => f.write_str("filesystem"),
            BackendKind::Sqlite => f.write_str("sqlite"),
        }
    }
}

/// Key-value store interface shared by both backends.
///
/// Every write is independently durable; there are no multi-key transactions
/// apart from the batch scope used by protocol migration.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Overwrite semantics; last writer wins.
    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// No-op if the key is absent.
    fn delete(&self, key: &str) -> Result<(), StorageError>;

    fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// All keys, or those matching `pattern`.
    ///
    /// A pattern without `/` matches the last key segment only; a pattern
    /// with `/` matches the whole key.
    fn keys(&self, pattern: Option<&str>) -> Result<Vec<String>, StorageError>;

    fn clear(&self) -> Result<(), StorageError>;

    /// Drop in-process copies of `keys`, or of everything when empty.
    fn uncache(&self, _keys: &[&str]) {}

    /// Up to `limit` keys strictly greater than `cursor`, in key order.
    fn keys_after(&self, cursor: Option<&str>, limit: usize) -> Result<Vec<String>, StorageError> {
        let mut keys = self.keys(None)?;
        keys.sort();
        Ok(keys
            .into_iter()
            .filter(|k| cursor.map_or(true, |c| k.as_str() > c))
            .take(limit)
            .collect())
    }

    /// Widen the transaction scope until `end_batch`.
    fn begin_batch(&self) -> Result<(), StorageError> {
        Ok(())
    }

    /// Commit the batch opened by `begin_batch` and restore per-call
    /// durability.
    fn end_batch(&self) -> Result<(), StorageError> {
        Ok(())
    }

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

/// Open a persistent store of the given kind rooted at `root`.
pub fn open_store(kind: BackendKind, root: &Path) -> Result<Arc<dyn KeyValueStore>, StorageError> {
    match kind {
        BackendKind::Filesystem => Ok(Arc::new(FileSystemStore::open(root)?)),
        BackendKind::Sqlite => Ok(Arc::new(SqliteStore::open(&root.join(sqlite::DB_FILE_NAME))?)),
    }
}

/// Open an ephemeral store of the given kind; nothing survives the process.
pub fn open_in_memory(kind: BackendKind) -> Result<Arc<dyn KeyValueStore>, StorageError> {
    match kind {
        BackendKind::Filesystem => Ok(Arc::new(FileSystemStore::in_memory()?)),
        BackendKind::Sqlite => Ok(Arc::new(SqliteStore::in_memory()?)),
    }
}

/// Compiled key pattern shared by both backends.
pub(crate) struct KeyPattern {
    matcher: GlobMatcher,
    whole_key: bool,
}

impl KeyPattern {
    pub(crate) fn new(pattern: &str) -> Result<Self, StorageError> {
        let glob = Glob::new(pattern).map_err(|e| StorageError::InvalidKey {
            key: pattern.to_string(),
            reason: format!("bad glob pattern: {}", e),
        })?;
        Ok(KeyPattern {
            matcher: glob.compile_matcher(),
            whole_key: pattern.contains('/'),
        })
    }

    pub(crate) fn whole_key(&self) -> bool {
        self.whole_key
    }

    /// Leading text every matching key starts with; empty for last-segment
    /// patterns.
    pub(crate) fn literal_prefix(&self) -> &str {
        if !self.whole_key {
            return "";
        }
        let glob = self.matcher.glob().glob();
        let end = glob
            .find(|c| matches!(c, '*' | '?' | '[' | '{' | '\\'))
            .unwrap_or(glob.len());
        &glob[..end]
    }

    pub(crate) fn matches(&self, key: &str) -> bool {
        if self.whole_key {
            self.matcher.is_match(key)
        } else {
            let name = key.rsplit('/').next().unwrap_or(key);
            self.matcher.is_match(name)
        }
    }
}
