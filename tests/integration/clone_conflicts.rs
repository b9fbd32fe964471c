//! Clone detection and conflict recording across files.

use outline_cache::{
    BackendKind, CacheFacade, CacheKey, ConflictKind, FixedBranch, NodeGraph, Snapshot,
    SnapshotBuilder,
};
use std::path::Path;

fn leaf(headline: &str, body: &str, id: &str) -> Snapshot {
    Snapshot::new(headline, body, id, vec![])
}

/// Write `snapshot` into the cache as if `path` had been parsed into it.
fn seed(cache: &CacheFacade, path: &Path, content: &[u8], snapshot: &Snapshot) -> CacheKey {
    let mut graph = NodeGraph::new();
    build(&mut graph, None, snapshot);
    let key = cache.compute_key(path, content);
    assert!(cache.write_file(&graph, &snapshot.id, &key).unwrap());
    key
}

fn build(graph: &mut NodeGraph, parent: Option<&str>, snapshot: &Snapshot) {
    let id = graph.create_node(Some(&snapshot.id), snapshot.headline.clone(), snapshot.body.clone());
    if let Some(parent) = parent {
        graph.link_child(parent, &id);
    }
    for child in &snapshot.children {
        build(graph, Some(&id), child);
    }
}

fn open_cache() -> CacheFacade {
    let mut cache = CacheFacade::in_memory(BackendKind::Sqlite)
        .unwrap()
        .with_branch_source(FixedBranch::new("main"));
    cache.open_document(Path::new("session.leo")).unwrap();
    cache
}

#[test]
fn test_gnx1_scenario_records_both_files() {
    let mut cache = open_cache();
    let file_a = Path::new("/src/a.py");
    let file_b = Path::new("/src/b.py");
    let snap_a = Snapshot::new("A", "body-a", "gnx1", vec![leaf("B", "body-b", "gnx2")]);
    let snap_b = Snapshot::new("A2", "body-a2", "gnx1", vec![leaf("C", "body-c", "gnx3")]);
    seed(&cache, file_a, b"a", &snap_a);
    seed(&cache, file_b, b"b", &snap_b);

    let mut graph = NodeGraph::new();
    let root1 = graph.create_node(Some("gnx1"), "", "");
    let hit = cache.read_bytes(&mut graph, &root1, file_a, b"a".to_vec()).unwrap();
    assert!(hit.used_cache);

    let root = graph.lookup_by_id("gnx1").unwrap();
    assert_eq!((root.headline.as_str(), root.body.as_str()), ("A", "body-a"));
    assert_eq!(graph.children("gnx1"), &["gnx2".to_string()]);
    let b = graph.lookup_by_id("gnx2").unwrap();
    assert_eq!((b.headline.as_str(), b.body.as_str()), ("B", "body-b"));
    assert!(cache.conflicts().is_empty());

    let root2 = graph.create_node(Some("root2"), "", "");
    cache.read_bytes(&mut graph, &root2, file_b, b"b".to_vec()).unwrap();

    let records: Vec<_> = cache.conflicts().for_node("gnx1").collect();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, ConflictKind::CrossFile);
    assert!(records[0].involves("/src/a.py"));
    assert!(records[0].involves("/src/b.py"));

    let gnx1 = graph.lookup_by_id("gnx1").unwrap();
    assert_eq!((gnx1.headline.as_str(), gnx1.body.as_str()), ("A2", "body-a2"));
    assert!(gnx1.dirty);
}

#[test]
fn test_case_variant_paths_are_one_file() {
    let mut cache = open_cache();
    let snap = Snapshot::new("A", "body-a", "gnx1", vec![leaf("B", "body-b", "gnx2")]);
    seed(&cache, Path::new("/src/a.py"), b"a", &snap);

    let mut graph = NodeGraph::new();
    let root1 = graph.create_node(Some("gnx1"), "", "");
    let hit = cache
        .read_bytes(&mut graph, &root1, Path::new("/src/A.py"), b"a".to_vec())
        .unwrap();
    assert!(hit.used_cache);
    graph.lookup_by_id_mut("gnx2").unwrap().body = "edited".into();

    let root2 = graph.create_node(Some("root2"), "", "");
    cache
        .read_bytes(&mut graph, &root2, Path::new("/src/a.py"), b"a".to_vec())
        .unwrap();

    assert_eq!(cache.conflicts().cross_file().count(), 0);
    let records: Vec<_> = cache.conflicts().for_node("gnx2").collect();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, ConflictKind::SameFile);
    assert_eq!(records[0].file_name, "/src/a.py");
}

#[test]
fn test_shared_clone_last_reconciled_wins() {
    let mut cache = open_cache();
    let file_a = Path::new("/src/a.py");
    let file_b = Path::new("/src/b.py");
    seed(
        &cache,
        file_a,
        b"a",
        &Snapshot::new("a.py", "", "ra", vec![leaf("X", "version a\n", "x")]),
    );
    seed(
        &cache,
        file_b,
        b"b",
        &Snapshot::new("b.py", "", "rb", vec![leaf("X", "version b\n", "x")]),
    );

    let mut graph = NodeGraph::new();
    graph.create_node(Some("ra"), "", "");
    graph.create_node(Some("rb"), "", "");
    cache.read_bytes(&mut graph, "ra", file_a, b"a".to_vec()).unwrap();
    cache.read_bytes(&mut graph, "rb", file_b, b"b".to_vec()).unwrap();

    assert_eq!(graph.lookup_by_id("x").unwrap().body, "version b\n");
    assert_eq!(graph.parents_of("x"), vec!["ra".to_string(), "rb".to_string()]);
    let record = cache.conflicts().records().last().unwrap();
    assert_eq!(record.files(), vec!["/src/a.py", "/src/b.py"]);
    assert_eq!(record.old_body, "version a\n");
}

#[test]
fn test_reset_session_forgets_claims() {
    let mut cache = open_cache();
    let file_a = Path::new("/src/a.py");
    seed(
        &cache,
        file_a,
        b"a",
        &Snapshot::new("a.py", "", "ra", vec![leaf("X", "cached", "x")]),
    );

    let mut graph = NodeGraph::new();
    graph.create_node(Some("ra"), "", "");
    graph.create_node(Some("x"), "X", "edited");
    graph.lookup_by_id_mut("x").unwrap().origin_files.insert("/src/other.py".into());
    cache.read_bytes(&mut graph, "ra", file_a, b"a".to_vec()).unwrap();
    assert_eq!(cache.conflicts().cross_file().count(), 1);

    cache.reset_session(&mut graph);
    assert!(cache.conflicts().is_empty());
    assert!(graph.lookup_by_id("x").unwrap().origin_files.is_empty());
}

#[test]
fn test_pruned_child_remains_referenced_elsewhere() {
    let mut cache = open_cache();
    let file_a = Path::new("/src/a.py");
    seed(
        &cache,
        file_a,
        b"a",
        &Snapshot::new("a.py", "", "ra", vec![leaf("Kept", "", "kept")]),
    );

    let mut graph = NodeGraph::new();
    graph.create_node(Some("ra"), "", "");
    graph.create_node(Some("elsewhere"), "", "");
    graph.create_node(Some("stale"), "Stale", "");
    graph.link_child("ra", "stale");
    graph.link_child("elsewhere", "stale");

    cache.read_bytes(&mut graph, "ra", file_a, b"a".to_vec()).unwrap();

    assert_eq!(graph.children("ra"), &["kept".to_string()]);
    assert!(graph.contains("stale"));
    assert_eq!(graph.parents_of("stale"), vec!["elsewhere".to_string()]);
    assert_eq!(
        SnapshotBuilder::build(&graph, "ra").unwrap().children,
        vec![leaf("Kept", "", "kept")]
    );
}
