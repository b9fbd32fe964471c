//! Conflict records
//!
//! A record is written whenever a cached snapshot disagrees with the live
//! content of the same node. Records accumulate for the whole session and are
//! only dropped by an explicit reset; the cache never resolves them.

use crate::types::NodeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a divergence was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictKind {
    /// The node was only claimed by the file being read (a re-read).
    SameFile,
    /// Another file already asserted different content for the node.
    CrossFile,
}

impl ConflictKind {
    pub fn tag(&self) -> &'static str {
        match self {
            ConflictKind::SameFile => "changed",
            ConflictKind::CrossFile => "recovered",
        }
    }
}

/// Old and new content of a node whose cached snapshot diverged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub tag: String,
    pub kind: ConflictKind,
    /// File whose snapshot was being reconciled.
    pub file_name: String,
    pub node_id: NodeId,
    pub old_headline: String,
    pub new_headline: String,
    pub old_body: String,
    pub new_body: String,
    /// Root node of the reconciliation that found the divergence.
    pub root_node: NodeId,
    /// Files that had claimed the node before this one.
    pub prior_files: Vec<String>,
    pub recorded_at: DateTime<Utc>,
}

impl ConflictRecord {
    /// Every file involved, prior claimants first.
    pub fn files(&self) -> Vec<&str> {
        let mut files: Vec<&str> = self.prior_files.iter().map(String::as_str).collect();
        if !files.contains(&self.file_name.as_str()) {
            files.push(&self.file_name);
        }
        files
    }

    pub fn involves(&self, file: &str) -> bool {
        self.file_name == file || self.prior_files.iter().any(|f| f == file)
    }
}

/// Session-wide list of conflict records.
#[derive(Debug, Clone, Default)]
pub struct ConflictLog {
    records: Vec<ConflictRecord>,
}

impl ConflictLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ConflictRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[ConflictRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn for_node<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a ConflictRecord> + 'a {
        self.records.iter().filter(move |r| r.node_id == node_id)
    }

    pub fn cross_file(&self) -> impl Iterator<Item = &ConflictRecord> {
        self.records
            .iter()
            .filter(|r| r.kind == ConflictKind::CrossFile)
    }

    /// Records as a JSON array, for presenting to the user.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.records)
    }

    /// Drop every record; only done on session reset.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}
