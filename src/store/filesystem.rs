//! Filesystem tree backend
//!
//! Each key maps to a file under the store root; `/`-separated key segments
//! become nested subdirectories. Values are written verbatim.

use crate::error::StorageError;
use crate::store::freshness::FreshnessCache;
use crate::store::{KeyPattern, KeyValueStore};
use parking_lot::Mutex;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Name prefix of in-flight temporaries written by `set`.
const TEMP_PREFIX: &str = ".outline-cache-tmp-";

/// Store keeping one file per key under a root directory.
pub struct FileSystemStore {
    root: PathBuf,
    cache: Mutex<FreshnessCache>,
    /// Backing directory of an in-memory store; removed on drop.
    ephemeral: Option<TempDir>,
}

impl FileSystemStore {
    /// Open (and create if missing) a store rooted at `root`.
    pub fn open(root: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(root).map_err(|e| StorageError::Unavailable {
            path: root.to_path_buf(),
            reason: e.to_string(),
        })?;
        let root = dunce::canonicalize(root).map_err(|e| StorageError::Unavailable {
            path: root.to_path_buf(),
            reason: e.to_string(),
        })?;
        debug!("Opened filesystem cache store at {}", root.display());
        Ok(FileSystemStore {
            root,
            cache: Mutex::new(FreshnessCache::new()),
            ephemeral: None,
        })
    }

    /// Throwaway store in a private temporary directory.
    pub fn in_memory() -> Result<Self, StorageError> {
        let dir = tempfile::Builder::new()
            .prefix("outline-cache-")
            .tempdir()
            .map_err(|e| StorageError::Unavailable {
                path: std::env::temp_dir(),
                reason: e.to_string(),
            })?;
        let mut store = Self::open(dir.path())?;
        store.ephemeral = Some(dir);
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key onto a path below the root, rejecting keys that escape it.
    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let invalid = |reason: &str| StorageError::InvalidKey {
            key: key.to_string(),
            reason: reason.to_string(),
        };
        if key.is_empty() {
            return Err(invalid("empty key"));
        }
        let mut path = self.root.clone();
        for segment in key.split('/') {
            if segment.is_empty() {
                return Err(invalid("empty path segment"));
            }
            let mut components = Path::new(segment).components();
            match (components.next(), components.next()) {
                (Some(Component::Normal(name)), None) => path.push(name),
                _ => return Err(invalid("segment must be a plain file name")),
            }
        }
        Ok(path)
    }

    /// Root-relative, forward-slash key for a file below the root.
    fn key_for(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }
}

impl KeyValueStore for FileSystemStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.path_for(key)?;
        // Missing and unreadable files both read as absent.
        let modified = match std::fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(_) => return Ok(None),
        };

        let mut cache = self.cache.lock();
        if let Some(value) = cache.get_fresh(key, modified) {
            return Ok(Some(value.to_vec()));
        }
        match std::fs::read(&path) {
            Ok(value) => {
                cache.put(key, value.clone(), modified);
                Ok(Some(value))
            }
            Err(e) => {
                debug!("Unreadable cache file {}: {}", path.display(), e);
                cache.remove(key);
                Ok(None)
            }
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let parent = path.parent().unwrap_or(&self.root);
        let path_io = |source: std::io::Error| StorageError::PathIo {
            path: path.clone(),
            source,
        };
        std::fs::create_dir_all(parent).map_err(path_io)?;

        // Write beside the target and rename so readers never see a torn value.
        let mut tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(parent)
            .map_err(path_io)?;
        tmp.write_all(value).map_err(path_io)?;
        tmp.persist(&path).map_err(|e| path_io(e.error))?;

        let mut cache = self.cache.lock();
        match std::fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(modified) => cache.put(key, value.to_vec(), modified),
            Err(_) => {
                cache.remove(key);
            }
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        self.cache.lock().remove(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::PathIo { path, source: e }),
        }
    }

    fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.path_for(key)?;
        Ok(path.is_file())
    }

    fn keys(&self, pattern: Option<&str>) -> Result<Vec<String>, StorageError> {
        let pattern = pattern.map(KeyPattern::new).transpose()?;
        let mut keys = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Failed to walk cache directory {}: {}", self.root.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(key) = self.key_for(entry.path()) else {
                continue;
            };
            // Skip half-written temporaries from an interrupted `set`.
            if key.rsplit('/').next().is_some_and(|name| name.starts_with(TEMP_PREFIX)) {
                continue;
            }
            if pattern.as_ref().map_or(true, |p| p.matches(&key)) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.cache.lock().clear();
        let entries = std::fs::read_dir(&self.root).map_err(|e| StorageError::PathIo {
            path: self.root.clone(),
            source: e,
        })?;
        for entry in entries {
            let path = entry?.path();
            let result = if path.is_dir() {
                std::fs::remove_dir_all(&path)
            } else {
                std::fs::remove_file(&path)
            };
            match result {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(StorageError::PathIo { path, source: e }),
            }
        }
        Ok(())
    }

    fn uncache(&self, keys: &[&str]) {
        let mut cache = self.cache.lock();
        if keys.is_empty() {
            cache.clear();
        } else {
            for key in keys {
                cache.remove(key);
            }
        }
    }

    fn describe(&self) -> String {
        match self.ephemeral {
            Some(_) => format!("filesystem (ephemeral) {}", self.root.display()),
            None => format!("filesystem {}", self.root.display()),
        }
    }
}
