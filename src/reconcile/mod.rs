//! Reconciliation
//!
//! Merges a cached snapshot back into the live graph. Nodes are matched by
//! stable id: an id already present is a clone and is only divergence-checked,
//! an unknown id is materialized as a new node. Children missing from the
//! snapshot are unlinked (never deleted) and the rest are put in snapshot
//! order.
//!
//! Reconciliation never fails. Shapes that cannot be applied as-is, such as a
//! child whose id names one of its own ancestors, are materialized as new
//! nodes under a fresh id and logged.

pub mod conflict;

pub use conflict::{ConflictKind, ConflictLog, ConflictRecord};

use crate::tree::{NodeGraph, Snapshot};
use crate::types::NodeId;
use chrono::Utc;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Counts gathered during one `reconcile` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created: usize,
    pub clones: usize,
    pub conflicts: usize,
    pub pruned: usize,
    /// Snapshot entries that could not keep their id.
    pub recovered: usize,
}

/// Body equality that ignores a single trailing newline on one side.
pub fn bodies_equal(old: &str, new: &str) -> bool {
    old == new
        || old.strip_suffix('\n') == Some(new)
        || new.strip_suffix('\n') == Some(old)
}

/// Applies snapshots to a graph, appending to a conflict log.
pub struct ReconciliationEngine<'a> {
    graph: &'a mut NodeGraph,
    conflicts: &'a mut ConflictLog,
}

struct Pass<'f> {
    origin: &'f str,
    root: NodeId,
    report: ReconcileReport,
}

impl<'a> ReconciliationEngine<'a> {
    pub fn new(graph: &'a mut NodeGraph, conflicts: &'a mut ConflictLog) -> Self {
        ReconciliationEngine { graph, conflicts }
    }

    /// Merge `snapshot` into the subtree rooted at `parent`.
    ///
    /// The snapshot's top entry stands in for `parent` itself: its headline and
    /// body overwrite the parent's, and only its children are materialized.
    pub fn reconcile(&mut self, parent: &str, snapshot: &Snapshot, origin_file: &str) -> ReconcileReport {
        let mut pass = Pass {
            origin: origin_file,
            root: parent.to_string(),
            report: ReconcileReport::default(),
        };
        if snapshot.is_empty() {
            debug!("Empty snapshot for {}; nothing to reconcile", origin_file);
            return pass.report;
        }
        if !self.graph.contains(parent) {
            warn!(
                "Cannot reconcile {}: root node {} is not in the graph",
                origin_file, parent
            );
            return pass.report;
        }

        // The cached root may also live elsewhere in the graph under its own id.
        if !snapshot.id.is_empty() && snapshot.id != parent && self.graph.contains(&snapshot.id) {
            pass.report.clones += 1;
            self.check_divergence(&snapshot.id, &snapshot.headline, &snapshot.body, &mut pass);
        }

        if let Some(node) = self.graph.lookup_by_id_mut(parent) {
            node.headline = snapshot.headline.clone();
            node.body = snapshot.body.clone();
            node.origin_files.insert(origin_file.to_string());
        }
        self.populate(parent, &snapshot.children, &mut pass);

        debug!(
            "Reconciled {} into {}: {} created, {} clones, {} conflicts, {} pruned",
            origin_file,
            parent,
            pass.report.created,
            pass.report.clones,
            pass.report.conflicts,
            pass.report.pruned
        );
        pass.report
    }

    /// Materialize `children` under `parent`, then prune and reorder.
    fn populate(&mut self, parent: &str, children: &[Snapshot], pass: &mut Pass<'_>) {
        let mut ordered: Vec<NodeId> = Vec::with_capacity(children.len());
        for child in children {
            ordered.push(self.materialize_child(parent, child, pass));
        }

        let keep: HashSet<&str> = ordered.iter().map(String::as_str).collect();
        let stale: Vec<NodeId> = self
            .graph
            .children(parent)
            .iter()
            .filter(|id| !keep.contains(id.as_str()))
            .cloned()
            .collect();
        for id in &stale {
            self.graph.unlink_child(parent, id);
            pass.report.pruned += 1;
        }

        if let Some(node) = self.graph.lookup_by_id_mut(parent) {
            node.children = ordered;
        }
    }

    fn materialize_child(&mut self, parent: &str, snap: &Snapshot, pass: &mut Pass<'_>) -> NodeId {
        if !snap.id.is_empty() && self.graph.contains(&snap.id) {
            let forms_cycle = snap.id == parent || self.graph.is_descendant(&snap.id, parent);
            if !forms_cycle && self.graph.link_child(parent, &snap.id) {
                pass.report.clones += 1;
                self.check_divergence(&snap.id, &snap.headline, &snap.body, pass);
                self.check_descendants(&snap.children, pass);
                return snap.id.clone();
            }
            warn!(
                "Node {} from {} would become its own ancestor under {}; materializing a copy",
                snap.id, pass.origin, parent
            );
            pass.report.recovered += 1;
            return self.create_child(parent, None, snap, pass);
        }
        let requested = Some(snap.id.as_str()).filter(|id| !id.is_empty());
        self.create_child(parent, requested, snap, pass)
    }

    fn create_child(
        &mut self,
        parent: &str,
        id: Option<&str>,
        snap: &Snapshot,
        pass: &mut Pass<'_>,
    ) -> NodeId {
        let id = self
            .graph
            .create_node(id, snap.headline.clone(), snap.body.clone());
        self.graph.link_child(parent, &id);
        if let Some(node) = self.graph.lookup_by_id_mut(&id) {
            node.origin_files.insert(pass.origin.to_string());
        }
        pass.report.created += 1;
        self.populate(&id, &snap.children, pass);
        id
    }

    /// Divergence-check the snapshot's subtree against existing nodes only.
    fn check_descendants(&mut self, children: &[Snapshot], pass: &mut Pass<'_>) {
        for child in children {
            if child.id.is_empty() || !self.graph.contains(&child.id) {
                debug!(
                    "Skipping unmaterialized clone descendant {:?} from {}",
                    child.id, pass.origin
                );
                continue;
            }
            self.check_divergence(&child.id, &child.headline, &child.body, pass);
            self.check_descendants(&child.children, pass);
        }
    }

    fn check_divergence(&mut self, id: &str, headline: &str, body: &str, pass: &mut Pass<'_>) {
        let Some(node) = self.graph.lookup_by_id_mut(id) else {
            return;
        };
        let same_file = node.owned_only_by(pass.origin);
        let prior_files: Vec<String> = node.origin_files.iter().cloned().collect();
        node.origin_files.insert(pass.origin.to_string());

        if node.headline == headline && bodies_equal(&node.body, body) {
            return;
        }

        let kind = if same_file {
            info!("Node {} changed on re-read of {}", id, pass.origin);
            ConflictKind::SameFile
        } else {
            warn!(
                "Cached content for node {} from {} conflicts with {}",
                id,
                pass.origin,
                prior_files.join(", ")
            );
            ConflictKind::CrossFile
        };

        let record = ConflictRecord {
            tag: kind.tag().to_string(),
            kind,
            file_name: pass.origin.to_string(),
            node_id: id.to_string(),
            old_headline: std::mem::replace(&mut node.headline, headline.to_string()),
            new_headline: headline.to_string(),
            old_body: std::mem::replace(&mut node.body, body.to_string()),
            new_body: body.to_string(),
            root_node: pass.root.clone(),
            prior_files,
            recorded_at: Utc::now(),
        };
        node.dirty = true;
        self.conflicts.push(record);
        pass.report.conflicts += 1;
    }
}
