//! Contract checks shared by both store backends.

use outline_cache::store::{open_store, BackendKind, KeyValueStore};
use std::sync::Arc;
use tempfile::TempDir;

fn each_backend(check: impl Fn(Arc<dyn KeyValueStore>)) {
    for kind in [BackendKind::Filesystem, BackendKind::Sqlite] {
        let temp_dir = TempDir::new().unwrap();
        check(open_store(kind, &temp_dir.path().join("store")).unwrap());
    }
}

#[test]
fn test_set_get_overwrite_delete() {
    each_backend(|store| {
        assert_eq!(store.get("fcache/k").unwrap(), None);
        store.set("fcache/k", b"one").unwrap();
        store.set("fcache/k", b"two").unwrap();
        assert_eq!(store.get("fcache/k").unwrap(), Some(b"two".to_vec()));
        assert!(store.exists("fcache/k").unwrap());

        store.delete("fcache/k").unwrap();
        store.delete("fcache/k").unwrap();
        assert!(!store.exists("fcache/k").unwrap());
    });
}

#[test]
fn test_binary_values_preserved() {
    each_backend(|store| {
        let value: Vec<u8> = (0..=255u8).collect();
        store.set("bin", &value).unwrap();
        assert_eq!(store.get("bin").unwrap(), Some(value));
        store.set("empty", b"").unwrap();
        assert_eq!(store.get("empty").unwrap(), Some(Vec::new()));
    });
}

#[test]
fn test_pattern_semantics_match() {
    each_backend(|store| {
        for key in ["fcache/aa01", "fcache/bb02", "recent/aa", "top"] {
            store.set(key, b"v").unwrap();
        }
        assert_eq!(
            store.keys(Some("fcache/*")).unwrap(),
            vec!["fcache/aa01", "fcache/bb02"]
        );
        assert_eq!(store.keys(Some("aa*")).unwrap(), vec!["fcache/aa01", "recent/aa"]);
        assert_eq!(store.keys(Some("top")).unwrap(), vec!["top"]);
        assert_eq!(
            store.keys(Some("fcache/{aa,bb}*")).unwrap(),
            vec!["fcache/aa01", "fcache/bb02"]
        );
        assert_eq!(store.keys(Some("fcache/[!a]*")).unwrap(), vec!["fcache/bb02"]);
        assert_eq!(store.keys(Some("{fcache,recent}/aa*")).unwrap(), vec!["fcache/aa01", "recent/aa"]);
        assert_eq!(store.keys(None).unwrap().len(), 4);

        store.clear().unwrap();
        assert!(store.keys(None).unwrap().is_empty());
    });
}

#[test]
fn test_values_persist_across_reopen() {
    for kind in [BackendKind::Filesystem, BackendKind::Sqlite] {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("store");
        open_store(kind, &root).unwrap().set("fcache/k", b"kept").unwrap();
        let reopened = open_store(kind, &root).unwrap();
        assert_eq!(reopened.get("fcache/k").unwrap(), Some(b"kept".to_vec()), "{}", kind);
    }
}
