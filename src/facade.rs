//! Cache Facade
//!
//! Entry points used by the file loader: [`CacheFacade::read_file`] on load
//! and [`CacheFacade::write_file`] after a full parse. The facade owns two
//! stores with different lifetimes:
//!
//! - the global store lives as long as the facade and keeps cross-document
//!   bookkeeping (which files are currently open);
//! - the document store belongs to the currently loaded document and holds
//!   its snapshots. It is replaced on `open_document`/`reinit_document` and
//!   dropped on `close_document`.
//!
//! A store that cannot be opened on disk is replaced by an in-memory store of
//! the same backend; the cache then works for the session only.

use crate::codec::migration::{Migrator, PROTOCOL_KEY};
use crate::codec::{CacheCodec, MigrationReport};
use crate::config::{CacheConfig, StoreLocations};
use crate::error::ApiError;
use crate::fingerprint::{normalize_path, BranchSource, FingerprintComputer, GitBranch};
use crate::reconcile::{ConflictLog, ReconcileReport, ReconciliationEngine};
use crate::store::{open_in_memory, open_store, BackendKind, HashedCategory, KeyValueStore};
use crate::tree::{NodeGraph, Snapshot, SnapshotBuilder};
use crate::types::{CacheKey, SNAPSHOT_KEY_PREFIX};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Global-store category listing open documents.
const OPEN_FILES_CATEGORY: &str = "open-files";

/// Result of [`CacheFacade::read_file`].
#[derive(Debug, Clone)]
pub struct ReadOutcome {
    /// Raw file bytes, for the caller to parse on a miss.
    pub content: Vec<u8>,
    pub used_cache: bool,
    pub key: CacheKey,
    /// Present on a hit.
    pub report: Option<ReconcileReport>,
}

/// Entry counts for the open stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub backend: BackendKind,
    pub document: Option<PathBuf>,
    pub snapshot_entries: usize,
    pub document_entries: usize,
    pub global_entries: usize,
    pub conflicts: usize,
}

struct DocumentStore {
    path: PathBuf,
    store: Arc<dyn KeyValueStore>,
}

/// Session-level cache API.
pub struct CacheFacade {
    config: CacheConfig,
    /// `None` keeps every store in memory.
    locations: Option<StoreLocations>,
    branch: Option<Box<dyn BranchSource>>,
    global: Arc<dyn KeyValueStore>,
    document: Option<DocumentStore>,
    conflicts: ConflictLog,
    fallback_warned: bool,
}

impl CacheFacade {
    /// Open the global store under the configured base directory.
    pub fn new(config: CacheConfig) -> Result<Self, ApiError> {
        let locations = StoreLocations::resolve(&config)?;
        let mut fallback_warned = false;
        let global = open_or_fallback(config.backend, &locations.global_root(), &mut fallback_warned)?;
        info!(
            "Outline cache ready ({} backend, base {})",
            config.backend,
            locations.base().display()
        );
        Ok(CacheFacade {
            config,
            locations: Some(locations),
            branch: None,
            global,
            document: None,
            conflicts: ConflictLog::new(),
            fallback_warned,
        })
    }

    /// Facade whose stores never touch the disk.
    pub fn in_memory(backend: BackendKind) -> Result<Self, ApiError> {
        let config = CacheConfig::default().backend(backend);
        Ok(CacheFacade {
            global: open_in_memory(backend)?,
            config,
            locations: None,
            branch: None,
            document: None,
            conflicts: ConflictLog::new(),
            fallback_warned: false,
        })
    }

    /// Scope keys with `branch` instead of asking git next to each document.
    pub fn with_branch_source(mut self, branch: impl BranchSource + 'static) -> Self {
        self.branch = Some(Box::new(branch));
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Path of the document whose store is open.
    pub fn document_path(&self) -> Option<&Path> {
        self.document.as_ref().map(|d| d.path.as_path())
    }

    /// Open the per-document store for `path`, closing any previous one.
    ///
    /// Entries written by an older protocol are migrated before the store is
    /// used.
    pub fn open_document(&mut self, path: &Path) -> Result<(), ApiError> {
        if self.document.is_some() {
            self.close_document()?;
        }
        let store = match &self.locations {
            Some(locations) => open_or_fallback(
                self.config.backend,
                &locations.document_root(path),
                &mut self.fallback_warned,
            )?,
            None => open_in_memory(self.config.backend)?,
        };

        if Migrator::needs_migration(store.as_ref())? {
            info!("Migrating cache for {} ({})", path.display(), store.describe());
            Migrator::new(store.as_ref())
                .with_page_size(self.config.migration_page_size)
                .run()?;
        } else if !store.exists(PROTOCOL_KEY)? {
            Migrator::mark_current(store.as_ref())?;
        }

        debug!("Opened document cache {}", store.describe());
        self.document = Some(DocumentStore {
            path: path.to_path_buf(),
            store,
        });
        self.mark_open(path)
    }

    /// Flush the document store.
    pub fn commit(&self) -> Result<(), ApiError> {
        if let Some(doc) = &self.document {
            doc.store.end_batch()?;
            doc.store.uncache(&[]);
            debug!("Committed document cache {}", doc.store.describe());
        }
        Ok(())
    }

    /// Commit and drop the document store.
    pub fn close_document(&mut self) -> Result<(), ApiError> {
        self.commit()?;
        if let Some(doc) = self.document.take() {
            self.mark_closed(&doc.path)?;
            debug!("Closed document cache for {}", doc.path.display());
        }
        Ok(())
    }

    /// Re-point the document store at `new_path` (e.g. after "save as").
    pub fn reinit_document(&mut self, new_path: &Path) -> Result<(), ApiError> {
        self.close_document()?;
        self.open_document(new_path)
    }

    /// Read `path` and try to populate `root` from the cache.
    pub fn read_file(
        &mut self,
        graph: &mut NodeGraph,
        root: &str,
        path: &Path,
    ) -> Result<ReadOutcome, ApiError> {
        let content = std::fs::read(path).map_err(|e| crate::error::StorageError::PathIo {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.read_bytes(graph, root, path, content)
    }

    /// Like [`read_file`](Self::read_file) with content already in hand.
    ///
    /// On a hit the children of `root` are replaced by the cached subtree. A
    /// cached entry that cannot be decoded counts as a miss and is left in
    /// place.
    pub fn read_bytes(
        &mut self,
        graph: &mut NodeGraph,
        root: &str,
        path: &Path,
        content: Vec<u8>,
    ) -> Result<ReadOutcome, ApiError> {
        let key = self.compute_key(path, &content);
        let miss = |content: Vec<u8>, key: CacheKey| ReadOutcome {
            content,
            used_cache: false,
            key,
            report: None,
        };
        if !self.config.enabled {
            return Ok(miss(content, key));
        }
        graph.get_or_error(root)?;

        let store = self.document_store()?;
        let Some(bytes) = store.get(key.as_str())? else {
            debug!("Cache miss for {} ({})", path.display(), key);
            return Ok(miss(content, key));
        };
        let snapshot: Snapshot = match CacheCodec::decode(&bytes) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Undecodable cache entry {} for {}: {}", key, path.display(), e);
                return Ok(miss(content, key));
            }
        };

        graph.clear_children(root);
        // Same normalization as the key, so case variants count as one file.
        let origin = normalize_path(path);
        let report = ReconciliationEngine::new(graph, &mut self.conflicts).reconcile(root, &snapshot, &origin);
        debug!("Cache hit for {} ({} nodes)", path.display(), snapshot.count());
        Ok(ReadOutcome {
            content,
            used_cache: true,
            key,
            report: Some(report),
        })
    }

    /// Store the snapshot of `root` under `key` unless it is already cached.
    ///
    /// Returns whether an entry was written.
    pub fn write_file(&self, graph: &NodeGraph, root: &str, key: &CacheKey) -> Result<bool, ApiError> {
        if !self.config.enabled {
            return Ok(false);
        }
        let store = self.document_store()?;
        if store.exists(key.as_str())? {
            return Ok(false);
        }
        let snapshot = SnapshotBuilder::build(graph, root)
            .ok_or_else(|| ApiError::NodeNotFound(root.to_string()))?;
        store.set(key.as_str(), &CacheCodec::encode(&snapshot)?)?;
        debug!("Cached {} nodes under {}", snapshot.count(), key);
        Ok(true)
    }

    /// Key for `content` read from `path`.
    pub fn compute_key(&self, path: &Path, content: &[u8]) -> CacheKey {
        match &self.branch {
            Some(branch) => FingerprintComputer::new(branch.as_ref()).compute_key(path, content),
            None => {
                let git = GitBranch::for_document(path);
                FingerprintComputer::new(&git).compute_key(path, content)
            }
        }
    }

    pub fn mark_open(&self, path: &Path) -> Result<(), ApiError> {
        self.open_files_category().set(&path_key(path), true)
    }

    pub fn mark_closed(&self, path: &Path) -> Result<(), ApiError> {
        self.open_files_category().remove::<bool>(&path_key(path))
    }

    pub fn is_open(&self, path: &Path) -> Result<bool, ApiError> {
        Ok(self
            .open_files_category()
            .get::<bool>(&path_key(path))?
            .unwrap_or(false))
    }

    /// Documents currently marked open, sorted.
    pub fn open_files(&self) -> Result<Vec<PathBuf>, ApiError> {
        let all = self.open_files_category().all::<bool>()?;
        Ok(all
            .into_iter()
            .filter(|(_, open)| *open)
            .map(|(path, _)| PathBuf::from(path))
            .collect())
    }

    /// Conflicts recorded since the last session reset.
    pub fn conflicts(&self) -> &ConflictLog {
        &self.conflicts
    }

    /// Start a new load session: drop conflicts and origin-file claims.
    pub fn reset_session(&mut self, graph: &mut NodeGraph) {
        self.conflicts.clear();
        graph.clear_origin_files();
    }

    /// Migrate the document store to the current protocol.
    pub fn migrate(&self) -> Result<MigrationReport, ApiError> {
        let store = self.document_store()?;
        Ok(Migrator::new(store.as_ref())
            .with_page_size(self.config.migration_page_size)
            .run()?)
    }

    /// Remove every entry of the document store.
    pub fn clear(&self) -> Result<(), ApiError> {
        let store = self.document_store()?;
        store.clear()?;
        Migrator::mark_current(store.as_ref())?;
        info!("Cleared document cache {}", store.describe());
        Ok(())
    }

    /// Clear the document store (if open) and the global store.
    pub fn clear_all(&self) -> Result<(), ApiError> {
        if self.document.is_some() {
            self.clear()?;
        }
        self.global.clear()?;
        info!("Cleared global cache {}", self.global.describe());
        Ok(())
    }

    pub fn stats(&self) -> Result<CacheStats, ApiError> {
        let (snapshot_entries, document_entries) = match &self.document {
            Some(doc) => {
                let keys = doc.store.keys(None)?;
                let snapshots = keys
                    .iter()
                    .filter(|k| k.starts_with(SNAPSHOT_KEY_PREFIX))
                    .count();
                (snapshots, keys.len())
            }
            None => (0, 0),
        };
        Ok(CacheStats {
            backend: self.config.backend,
            document: self.document.as_ref().map(|d| d.path.clone()),
            snapshot_entries,
            document_entries,
            global_entries: self.global.keys(None)?.len(),
            conflicts: self.conflicts.len(),
        })
    }

    fn document_store(&self) -> Result<Arc<dyn KeyValueStore>, ApiError> {
        self.document
            .as_ref()
            .map(|doc| Arc::clone(&doc.store))
            .ok_or(ApiError::NoDocumentOpen)
    }

    fn open_files_category(&self) -> HashedCategory<'_> {
        HashedCategory::new(self.global.as_ref(), OPEN_FILES_CATEGORY)
    }
}

impl Drop for CacheFacade {
    fn drop(&mut self) {
        if let Err(e) = self.close_document() {
            warn!("Failed to close document cache: {}", e);
        }
    }
}

fn path_key(path: &Path) -> String {
    dunce::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .into_owned()
}

fn open_or_fallback(
    kind: BackendKind,
    root: &Path,
    warned: &mut bool,
) -> Result<Arc<dyn KeyValueStore>, ApiError> {
    match open_store(kind, root) {
        Ok(store) => Ok(store),
        Err(e) => {
            if !*warned {
                warn!(
                    "Cache store unavailable ({}); using an in-memory store for this session",
                    e
                );
                *warned = true;
            }
            Ok(open_in_memory(kind)?)
        }
    }
}
