//! Process-local freshness cache
//!
//! Holds the last value read or written for a key together with the backing
//! file's modification time. An entry is only served while that timestamp is
//! unchanged; the backing storage stays the source of truth.

use std::collections::HashMap;
use std::time::SystemTime;

/// Backend-level record: key, value bytes and last modification time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEntry {
    pub key: String,
    pub value: Vec<u8>,
    pub last_modified: SystemTime,
}

/// Small map of `key -> StoreEntry`.
#[derive(Debug, Default)]
pub struct FreshnessCache {
    entries: HashMap<String, StoreEntry>,
}

impl FreshnessCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached value for `key`, if it was recorded at `modified`.
    pub fn get_fresh(&self, key: &str, modified: SystemTime) -> Option<&[u8]> {
        self.entries
            .get(key)
            .filter(|entry| entry.last_modified == modified)
            .map(|entry| entry.value.as_slice())
    }

    pub fn put(&mut self, key: &str, value: Vec<u8>, last_modified: SystemTime) {
        self.entries.insert(
            key.to_string(),
            StoreEntry {
                key: key.to_string(),
                value,
                last_modified,
            },
        );
    }

    pub fn remove(&mut self, key: &str) -> Option<StoreEntry> {
        self.entries.remove(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
