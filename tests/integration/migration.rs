//! Protocol migration through the facade and across interruptions.

use outline_cache::codec::migration::{Migrator, CURSOR_KEY};
use outline_cache::codec::{CacheCodec, LEGACY_PROTOCOL, PROTOCOL_VERSION};
use outline_cache::store::{open_store, BackendKind, KeyValueStore, META_PREFIX};
use outline_cache::{CacheConfig, CacheFacade, FixedBranch, NodeGraph, Snapshot, StorageError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use tempfile::TempDir;

/// Store wrapper counting writes of data entries per key.
struct CountingStore {
    inner: Box<dyn KeyValueStore>,
    writes: Mutex<HashMap<String, usize>>,
}

impl CountingStore {
    fn new(inner: Box<dyn KeyValueStore>) -> Self {
        CountingStore {
            inner,
            writes: Mutex::new(HashMap::new()),
        }
    }

    fn total_writes(&self) -> usize {
        self.writes.lock().values().sum()
    }

    fn max_writes_per_key(&self) -> usize {
        self.writes.lock().values().copied().max().unwrap_or(0)
    }
}

impl KeyValueStore for CountingStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        if !key.starts_with(META_PREFIX) {
            *self.writes.lock().entry(key.to_string()).or_default() += 1;
        }
        self.inner.set(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.inner.delete(key)
    }

    fn exists(&self, key: &str) -> Result<bool, StorageError> {
        self.inner.exists(key)
    }

    fn keys(&self, pattern: Option<&str>) -> Result<Vec<String>, StorageError> {
        self.inner.keys(pattern)
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.inner.clear()
    }

    fn keys_after(&self, cursor: Option<&str>, limit: usize) -> Result<Vec<String>, StorageError> {
        self.inner.keys_after(cursor, limit)
    }

    fn begin_batch(&self) -> Result<(), StorageError> {
        self.inner.begin_batch()
    }

    fn end_batch(&self) -> Result<(), StorageError> {
        self.inner.end_batch()
    }

    fn describe(&self) -> String {
        format!("counting {}", self.inner.describe())
    }
}

fn seed_legacy(store: &dyn KeyValueStore, count: usize) {
    for i in 0..count {
        let snapshot = Snapshot::new(format!("h{}", i), "body", format!("gnx{}", i), vec![]);
        let bytes = CacheCodec::encode_with_protocol(&snapshot, LEGACY_PROTOCOL).unwrap();
        store.set(&format!("fcache/{:04}", i), &bytes).unwrap();
    }
}

fn boxed(kind: BackendKind, root: &Path) -> Box<dyn KeyValueStore> {
    match kind {
        BackendKind::Filesystem => Box::new(outline_cache::store::FileSystemStore::open(root).unwrap()),
        BackendKind::Sqlite => Box::new(
            outline_cache::store::SqliteStore::open(&root.join("cache.sqlite")).unwrap(),
        ),
    }
}

#[test]
fn test_interrupted_migration_never_reencodes_twice() {
    for kind in [BackendKind::Filesystem, BackendKind::Sqlite] {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("store");
        seed_legacy(boxed(kind, &root).as_ref(), 25);

        let first = CountingStore::new(boxed(kind, &root));
        let report = Migrator::new(&first)
            .with_page_size(4)
            .with_max_pages(3)
            .run()
            .unwrap();
        assert!(!report.completed);
        assert_eq!(first.total_writes(), 12);
        assert!(first.exists(CURSOR_KEY).unwrap());

        // A new process picks up the stored cursor.
        let second = CountingStore::new(boxed(kind, &root));
        let report = Migrator::new(&second).with_page_size(4).run().unwrap();
        assert!(report.completed);
        assert_eq!(second.total_writes(), 13);
        assert_eq!(second.max_writes_per_key(), 1);
        assert_eq!(report.skipped, 0);

        for key in second.keys(Some("fcache/*")).unwrap() {
            let bytes = second.get(&key).unwrap().unwrap();
            assert_eq!(CacheCodec::protocol_of(&bytes).unwrap(), PROTOCOL_VERSION);
            let snapshot: Snapshot = CacheCodec::decode(&bytes).unwrap();
            assert_eq!(snapshot.body, "body");
        }
    }
}

#[test]
fn test_open_document_migrates_legacy_entries() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path().join("cache");
    let doc = temp_dir.path().join("project.leo");
    let source = Path::new("/src/a.py");

    // Plant a legacy entry under the key the facade will compute.
    let root = outline_cache::config::StoreLocations::new(&base).document_root(&doc);
    let key = outline_cache::fingerprint::compute_key_with_branch("main", source, b"content");
    let snapshot = Snapshot::new("A", "", "gnx1", vec![Snapshot::new("B", "", "gnx2", vec![])]);
    open_store(BackendKind::Sqlite, &root)
        .unwrap()
        .set(
            key.as_str(),
            &CacheCodec::encode_with_protocol(&snapshot, LEGACY_PROTOCOL).unwrap(),
        )
        .unwrap();

    let mut cache = CacheFacade::new(CacheConfig::with_base_dir(&base).backend(BackendKind::Sqlite))
        .unwrap()
        .with_branch_source(FixedBranch::new("main"));
    cache.open_document(&doc).unwrap();
    assert!(cache.migrate().unwrap().completed);

    let mut graph = NodeGraph::new();
    graph.create_node(Some("gnx1"), "", "");
    let outcome = cache
        .read_bytes(&mut graph, "gnx1", source, b"content".to_vec())
        .unwrap();
    assert!(outcome.used_cache);
    assert_eq!(graph.children("gnx1"), &["gnx2".to_string()]);

    let bytes = open_store(BackendKind::Sqlite, &root)
        .unwrap()
        .get(key.as_str())
        .unwrap()
        .unwrap();
    assert_eq!(CacheCodec::protocol_of(&bytes).unwrap(), PROTOCOL_VERSION);
}
