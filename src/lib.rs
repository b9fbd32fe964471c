//! Outline Cache: content-addressed caching of parsed outline trees
//!
//! Skips re-parsing an external file by storing the tree snapshot produced by
//! the last full parse under a key derived from the file's bytes, then merging
//! that snapshot back into a live, shared node graph on the next load. Nodes
//! may be referenced (cloned) from several files; disagreements between files
//! are recorded as conflicts rather than resolved.

pub mod codec;
pub mod config;
pub mod error;
pub mod facade;
pub mod fingerprint;
pub mod logging;
pub mod reconcile;
pub mod store;
pub mod tree;
pub mod types;

pub use codec::CacheCodec;
pub use config::CacheConfig;
pub use error::{ApiError, CodecError, StorageError};
pub use facade::{CacheFacade, CacheStats, ReadOutcome};
pub use fingerprint::{BranchSource, FingerprintComputer, FixedBranch, GitBranch};
pub use reconcile::{ConflictKind, ConflictLog, ConflictRecord, ReconcileReport, ReconciliationEngine};
pub use store::{BackendKind, KeyValueStore};
pub use tree::{Node, NodeGraph, Snapshot, SnapshotBuilder};
pub use types::{CacheKey, NodeId};
