//! Load/save cycle through the facade against on-disk stores.

use outline_cache::{
    BackendKind, CacheConfig, CacheFacade, FixedBranch, NodeGraph, SnapshotBuilder,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn facade(base: &Path, backend: BackendKind) -> CacheFacade {
    CacheFacade::new(CacheConfig::with_base_dir(base.join("cache")).backend(backend))
        .unwrap()
        .with_branch_source(FixedBranch::new("main"))
}

fn write_source(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// Stand-in for the full parser: one node per line under the root.
fn parse_into(graph: &mut NodeGraph, root: &str, content: &[u8]) {
    let text = String::from_utf8_lossy(content);
    for (i, line) in text.lines().enumerate() {
        let id = graph.create_node(Some(&format!("{}.{}", root, i)), line, format!("body {}\n", i));
        graph.link_child(root, &id);
    }
}

fn load(facade: &mut CacheFacade, graph: &mut NodeGraph, root: &str, path: &Path) -> bool {
    let outcome = facade.read_file(graph, root, path).unwrap();
    if !outcome.used_cache {
        parse_into(graph, root, &outcome.content);
        facade.write_file(graph, root, &outcome.key).unwrap();
    }
    outcome.used_cache
}

#[test]
fn test_hit_reconstructs_parsed_tree() {
    for backend in [BackendKind::Filesystem, BackendKind::Sqlite] {
        let temp_dir = TempDir::new().unwrap();
        let doc = temp_dir.path().join("project.leo");
        let source = write_source(temp_dir.path(), "a.py", "def f():\nclass C:\nx = 1\n");

        let mut cache = facade(temp_dir.path(), backend);
        cache.open_document(&doc).unwrap();

        let mut first = NodeGraph::new();
        first.create_node(Some("root"), "@file a.py", "");
        assert!(!load(&mut cache, &mut first, "root", &source));

        let mut second = NodeGraph::new();
        second.create_node(Some("root"), "@file a.py", "");
        assert!(load(&mut cache, &mut second, "root", &source));

        assert_eq!(
            SnapshotBuilder::build(&second, "root"),
            SnapshotBuilder::build(&first, "root"),
            "backend {}",
            backend
        );
    }
}

#[test]
fn test_hit_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let doc = temp_dir.path().join("project.leo");
    let source = write_source(temp_dir.path(), "a.py", "one\ntwo\n");

    {
        let mut cache = facade(temp_dir.path(), BackendKind::Sqlite);
        cache.open_document(&doc).unwrap();
        let mut graph = NodeGraph::new();
        graph.create_node(Some("root"), "", "");
        assert!(!load(&mut cache, &mut graph, "root", &source));
    }

    let mut cache = facade(temp_dir.path(), BackendKind::Sqlite);
    cache.open_document(&doc).unwrap();
    let mut graph = NodeGraph::new();
    graph.create_node(Some("root"), "", "");
    assert!(load(&mut cache, &mut graph, "root", &source));
    assert_eq!(graph.children("root").len(), 2);
}

#[test]
fn test_changed_content_misses() {
    let temp_dir = TempDir::new().unwrap();
    let doc = temp_dir.path().join("project.leo");
    let source = write_source(temp_dir.path(), "a.py", "one\n");

    let mut cache = facade(temp_dir.path(), BackendKind::Filesystem);
    cache.open_document(&doc).unwrap();
    let mut graph = NodeGraph::new();
    graph.create_node(Some("root"), "", "");
    assert!(!load(&mut cache, &mut graph, "root", &source));

    std::fs::write(&source, "one\ntwo\n").unwrap();
    let mut graph = NodeGraph::new();
    graph.create_node(Some("root"), "", "");
    assert!(!load(&mut cache, &mut graph, "root", &source));
    assert_eq!(cache.stats().unwrap().snapshot_entries, 2);
}

#[test]
fn test_idempotent_write_single_entry() {
    let temp_dir = TempDir::new().unwrap();
    let doc = temp_dir.path().join("project.leo");
    let source = write_source(temp_dir.path(), "a.py", "one\n");

    let mut cache = facade(temp_dir.path(), BackendKind::Sqlite);
    cache.open_document(&doc).unwrap();
    let mut graph = NodeGraph::new();
    graph.create_node(Some("root"), "", "");
    let outcome = cache.read_file(&mut graph, "root", &source).unwrap();
    parse_into(&mut graph, "root", &outcome.content);

    assert!(cache.write_file(&graph, "root", &outcome.key).unwrap());
    assert!(!cache.write_file(&graph, "root", &outcome.key).unwrap());
    assert_eq!(cache.stats().unwrap().snapshot_entries, 1);
}

#[test]
fn test_documents_get_separate_stores() {
    let temp_dir = TempDir::new().unwrap();
    let source = write_source(temp_dir.path(), "a.py", "one\n");

    let mut cache = facade(temp_dir.path(), BackendKind::Filesystem);
    cache.open_document(&temp_dir.path().join("first.leo")).unwrap();
    let mut graph = NodeGraph::new();
    graph.create_node(Some("root"), "", "");
    assert!(!load(&mut cache, &mut graph, "root", &source));

    cache.open_document(&temp_dir.path().join("second.leo")).unwrap();
    let mut graph = NodeGraph::new();
    graph.create_node(Some("root"), "", "");
    assert!(!load(&mut cache, &mut graph, "root", &source));
}
