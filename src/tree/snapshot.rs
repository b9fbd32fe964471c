//! Snapshot building
//!
//! A snapshot is the positional, nested shape of a subtree at the moment it
//! was cached. Clones are not deduplicated: a node listed twice appears as two
//! equal snapshots at different positions.

use crate::tree::graph::NodeGraph;
use crate::types::NodeId;
use serde::{Deserialize, Serialize};

/// Immutable `(headline, body, id, children)` serialization of a subtree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub headline: String,
    pub body: String,
    pub id: NodeId,
    pub children: Vec<Snapshot>,
}

impl Snapshot {
    pub fn new(
        headline: impl Into<String>,
        body: impl Into<String>,
        id: impl Into<NodeId>,
        children: Vec<Snapshot>,
    ) -> Self {
        Snapshot {
            headline: headline.into(),
            body: body.into(),
            id: id.into(),
            children,
        }
    }

    /// An empty snapshot carries no content, id or children.
    pub fn is_empty(&self) -> bool {
        self.headline.is_empty()
            && self.body.is_empty()
            && self.id.is_empty()
            && self.children.is_empty()
    }

    /// Total number of snapshot entries, this one included.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Snapshot::count).sum::<usize>()
    }
}

/// Builds snapshots from the live graph.
pub struct SnapshotBuilder;

impl SnapshotBuilder {
    /// Serialize the subtree rooted at `id`.
    ///
    /// Returns `None` if `id` is not in the graph. Child ids that do not
    /// resolve are skipped.
    pub fn build(graph: &NodeGraph, id: &str) -> Option<Snapshot> {
        let node = graph.lookup_by_id(id)?;
        let children = node
            .children
            .iter()
            .filter_map(|child| Self::build(graph, child))
            .collect();
        Some(Snapshot {
            headline: node.headline.clone(),
            body: node.body.clone(),
            id: node.id.clone(),
            children,
        })
    }
}
