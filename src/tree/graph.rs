//! Arena-backed node graph
//!
//! Nodes live in a single map keyed by their stable id. Parent/child edges are
//! id references, which lets several parents point at the same node (clones)
//! without ownership ambiguity.

use crate::error::ApiError;
use crate::tree::node::Node;
use crate::types::NodeId;
use std::collections::{HashMap, HashSet};

/// The live outline graph shared by every file loaded in a session.
#[derive(Debug)]
pub struct NodeGraph {
    nodes: HashMap<NodeId, Node>,
    id_prefix: String,
    next_serial: u64,
}

impl Default for NodeGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeGraph {
    pub fn new() -> Self {
        Self::with_id_prefix("outline")
    }

    /// Create a graph whose freshly minted ids start with `prefix`.
    pub fn with_id_prefix(prefix: impl Into<String>) -> Self {
        NodeGraph {
            nodes: HashMap::new(),
            id_prefix: prefix.into(),
            next_serial: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn lookup_by_id(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn lookup_by_id_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Get a node or return `ApiError::NodeNotFound`.
    pub fn get_or_error(&self, id: &str) -> Result<&Node, ApiError> {
        self.lookup_by_id(id)
            .ok_or_else(|| ApiError::NodeNotFound(id.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Mint an id that is not in use in this graph.
    pub fn mint_id(&mut self) -> NodeId {
        let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
        loop {
            self.next_serial += 1;
            let candidate = format!("{}.{}.{}", self.id_prefix, stamp, self.next_serial);
            if !self.nodes.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    /// Create a detached node.
    ///
    /// The requested id is kept when it is non-empty and unused; otherwise a
    /// fresh id is minted. Returns the id actually assigned.
    pub fn create_node(
        &mut self,
        id: Option<&str>,
        headline: impl Into<String>,
        body: impl Into<String>,
    ) -> NodeId {
        let id = match id {
            Some(id) if !id.is_empty() && !self.nodes.contains_key(id) => id.to_string(),
            _ => self.mint_id(),
        };
        self.nodes
            .insert(id.clone(), Node::new(id.clone(), headline, body));
        id
    }

    /// Insert a fully built node, replacing any node with the same id.
    pub fn insert(&mut self, node: Node) {
        self.nodes.insert(node.id.clone(), node);
    }

    pub fn children(&self, id: &str) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// Append `child` under `parent` unless it is already a direct child.
    ///
    /// Refuses links that would make `parent` its own descendant. Returns
    /// whether the child is now listed under the parent.
    pub fn link_child(&mut self, parent: &str, child: &str) -> bool {
        if !self.nodes.contains_key(child) || !self.nodes.contains_key(parent) {
            return false;
        }
        if self.children(parent).iter().any(|c| c == child) {
            return true;
        }
        if parent == child || self.is_descendant(child, parent) {
            return false;
        }
        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.push(child.to_string());
        }
        true
    }

    /// Remove every occurrence of `child` from `parent`'s child list.
    ///
    /// The child stays in the graph.
    pub fn unlink_child(&mut self, parent: &str, child: &str) {
        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.retain(|c| c != child);
        }
    }

    /// Unlink all children of `parent`, returning the ids that were removed.
    pub fn clear_children(&mut self, parent: &str) -> Vec<NodeId> {
        self.nodes
            .get_mut(parent)
            .map(|n| std::mem::take(&mut n.children))
            .unwrap_or_default()
    }

    /// Ids of every node listing `child` among its children.
    pub fn parents_of(&self, child: &str) -> Vec<NodeId> {
        let mut parents: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| n.children.iter().any(|c| c == child))
            .map(|n| n.id.clone())
            .collect();
        parents.sort();
        parents
    }

    /// True if `target` is reachable from `from` through child edges.
    pub fn is_descendant(&self, from: &str, target: &str) -> bool {
        let mut stack: Vec<&str> = self.children(from).iter().map(|c| c.as_str()).collect();
        let mut seen: HashSet<&str> = HashSet::new();
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if seen.insert(id) {
                stack.extend(self.children(id).iter().map(|c| c.as_str()));
            }
        }
        false
    }

    /// Delete a node from the graph and unlink it from every parent.
    ///
    /// Its children are left in the graph; they may be referenced elsewhere.
    pub fn remove(&mut self, id: &str) -> Option<Node> {
        let removed = self.nodes.remove(id)?;
        for node in self.nodes.values_mut() {
            node.children.retain(|c| c != id);
        }
        Some(removed)
    }

    /// Forget which files claimed each node, for a fresh load session.
    pub fn clear_origin_files(&mut self) {
        for node in self.nodes.values_mut() {
            node.origin_files.clear();
        }
    }

    /// Ids of nodes marked dirty, sorted.
    pub fn dirty_nodes(&self) -> Vec<NodeId> {
        let mut dirty: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| n.dirty)
            .map(|n| n.id.clone())
            .collect();
        dirty.sort();
        dirty
    }
}
