//! Cache key computation
//!
//! A key is a digest over the repository branch, the normalized file path and
//! the raw file bytes. Read and write paths must both go through
//! [`FingerprintComputer::compute_key`] or cache hits silently fail.

use crate::types::{CacheKey, SNAPSHOT_KEY_PREFIX};
use std::path::{Path, PathBuf};
use std::process::Command;
use unicode_normalization::UnicodeNormalization;

/// Supplies the repository branch name that scopes cache keys.
pub trait BranchSource: Send + Sync {
    /// Current branch name, or an empty string when there is none.
    fn current_branch_name(&self) -> String;
}

/// Branch source asking git for the abbreviated HEAD name.
#[derive(Debug, Clone)]
pub struct GitBranch {
    repo_dir: PathBuf,
}

impl GitBranch {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        GitBranch {
            repo_dir: repo_dir.into(),
        }
    }

    /// Branch source for the directory containing `document`.
    pub fn for_document(document: &Path) -> Self {
        let dir = document
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Self::new(dir)
    }
}

impl BranchSource for GitBranch {
    fn current_branch_name(&self) -> String {
        let output = match Command::new("git")
            .args(["rev-parse", "--abbrev-ref", "HEAD"])
            .current_dir(&self.repo_dir)
            .output()
        {
            Ok(output) => output,
            Err(e) => {
                tracing::debug!("git unavailable for branch lookup: {}", e);
                return String::new();
            }
        };
        if !output.status.success() {
            return String::new();
        }
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }
}

/// Branch source returning a constant name.
#[derive(Debug, Clone, Default)]
pub struct FixedBranch(pub String);

impl FixedBranch {
    pub fn new(name: impl Into<String>) -> Self {
        FixedBranch(name.into())
    }
}

impl BranchSource for FixedBranch {
    fn current_branch_name(&self) -> String {
        self.0.clone()
    }
}

/// Derives snapshot cache keys.
pub struct FingerprintComputer<'a> {
    branch: &'a dyn BranchSource,
}

impl<'a> FingerprintComputer<'a> {
    pub fn new(branch: &'a dyn BranchSource) -> Self {
        FingerprintComputer { branch }
    }

    /// Compute the key for `content` read from `path`.
    pub fn compute_key(&self, path: &Path, content: &[u8]) -> CacheKey {
        let branch = self.branch.current_branch_name();
        compute_key_with_branch(&branch, path, content)
    }
}

/// Lower-cased, NFC-normalized form of a path used in key derivation.
pub fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().nfc().collect::<String>().to_lowercase()
}

/// Key derivation with an explicit branch name.
pub fn compute_key_with_branch(branch: &str, path: &Path, content: &[u8]) -> CacheKey {
    let mut hasher = blake3::Hasher::new();
    // NUL never occurs in branch names or paths, so the fields cannot bleed
    // into each other.
    hasher.update(branch.as_bytes());
    hasher.update(&[0]);
    hasher.update(normalize_path(path).as_bytes());
    hasher.update(&[0]);
    hasher.update(content);
    CacheKey::new(format!(
        "{}{}",
        SNAPSHOT_KEY_PREFIX,
        hasher.finalize().to_hex()
    ))
}
