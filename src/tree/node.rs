//! Outline node type

use crate::types::NodeId;
use std::collections::BTreeSet;

/// A unit of outline content.
///
/// Children are stored as id references into the owning `NodeGraph`, so the
/// same node may be listed under several parents (a clone) without being
/// copied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    pub headline: String,
    pub body: String,
    pub children: Vec<NodeId>,
    /// Source files that asserted ownership of this node's content during
    /// the current load session ("temp roots").
    pub origin_files: BTreeSet<String>,
    /// Set when cached content overwrote live content; save logic must
    /// persist the node.
    pub dirty: bool,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, headline: impl Into<String>, body: impl Into<String>) -> Self {
        Node {
            id: id.into(),
            headline: headline.into(),
            body: body.into(),
            children: Vec::new(),
            origin_files: BTreeSet::new(),
            dirty: false,
        }
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// True when no file has claimed the node, or `file` is the only one.
    pub fn owned_only_by(&self, file: &str) -> bool {
        self.origin_files.is_empty()
            || (self.origin_files.len() == 1 && self.origin_files.contains(file))
    }
}
