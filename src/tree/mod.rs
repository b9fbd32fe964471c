//! Outline tree: nodes, the shared graph that holds them, and snapshots of
//! subtrees used as cache values.

pub mod graph;
pub mod node;
pub mod snapshot;

pub use graph::NodeGraph;
pub use node::Node;
pub use snapshot::{Snapshot, SnapshotBuilder};
