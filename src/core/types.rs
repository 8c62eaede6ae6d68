//! core::types
//!
//! Value types shared by the update and publish workflows.
//!
//! # Types
//!
//! - [`RepoReference`] - A mutation target: owner, repository and branch
//! - [`FileSnapshot`] - File bytes plus the revision marker observed at read time
//! - [`TreeEntry`] - One path in a tree object under construction
//! - [`Files`] - Path to content mapping for multi-file publishes
//! - [`PullRequest`] - A pull request as reported by the remote
//!
//! None of these carry shared mutable state. The remote repository owns the
//! durable state; these are request and response values only.
//!
//! # Examples
//!
//! ```
//! use repobump::core::types::RepoReference;
//!
//! let target = RepoReference::parse("gitops-tools/pkg", "main").unwrap();
//! assert_eq!(target.to_string(), "gitops-tools/pkg:main");
//! assert_eq!(target.full_name(), "gitops-tools/pkg");
//!
//! assert!(RepoReference::parse("no-slash", "main").is_err());
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid repository name '{0}': expected 'owner/repo'")]
    InvalidRepository(String),

    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),
}

/// Files to publish, keyed by path within the repository.
///
/// A `BTreeMap` keeps tree entries in a stable order.
pub type Files = BTreeMap<String, Vec<u8>>;

/// Identifies a repository and branch to mutate.
///
/// Displays as `owner/repo:branch`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoReference {
    /// Repository owner (user or organization)
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Branch name
    pub branch: String,
}

impl RepoReference {
    /// Create a reference from its parts.
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            branch: branch.into(),
        }
    }

    /// Parse an `owner/repo` full name and pair it with a branch.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidRepository` unless the name is exactly two
    /// non-empty segments, and `TypeError::InvalidBranchName` for an empty branch.
    pub fn parse(full_name: &str, branch: impl Into<String>) -> Result<Self, TypeError> {
        let (owner, repo) = split_full_name(full_name)?;
        let branch = branch.into();
        if branch.is_empty() {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot be empty".into(),
            ));
        }
        Ok(Self::new(owner, repo, branch))
    }

    /// The `owner/repo` full name.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// The same repository on a different branch.
    pub fn with_branch(&self, branch: impl Into<String>) -> Self {
        Self {
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            branch: branch.into(),
        }
    }
}

impl fmt::Display for RepoReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.owner, self.repo, self.branch)
    }
}

/// Split an `owner/repo` full name into its two segments.
///
/// # Errors
///
/// Returns `TypeError::InvalidRepository` if either segment is empty or
/// there are not exactly two segments.
pub fn split_full_name(full_name: &str) -> Result<(&str, &str), TypeError> {
    match full_name.split_once('/') {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
            Ok((owner, repo))
        }
        _ => Err(TypeError::InvalidRepository(full_name.to_string())),
    }
}

/// File content captured at read time.
///
/// `revision` is the optimistic-concurrency token for the subsequent write
/// and must be passed to it unchanged.
#[derive(Clone, PartialEq, Eq)]
pub struct FileSnapshot {
    /// Raw file bytes
    pub data: Vec<u8>,
    /// Content revision marker (blob SHA on GitHub)
    pub revision: String,
}

impl fmt::Debug for FileSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSnapshot")
            .field("len", &self.data.len())
            .field("revision", &self.revision)
            .finish()
    }
}

/// File mode of a tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileMode {
    /// Regular, non-executable file
    #[default]
    Regular,
    /// Executable file
    Executable,
}

impl FileMode {
    /// Git's octal representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileMode::Regular => "100644",
            FileMode::Executable => "100755",
        }
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of object a tree entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjectKind {
    #[default]
    Blob,
    Tree,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Blob => write!(f, "blob"),
            ObjectKind::Tree => write!(f, "tree"),
        }
    }
}

/// One entry of a tree object being assembled.
///
/// Created per file during a publish and dropped once the tree exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Path relative to the repository root
    pub path: String,
    /// Revision marker of the referenced object
    pub revision: String,
    /// File mode
    pub mode: FileMode,
    /// Object kind
    pub kind: ObjectKind,
}

impl TreeEntry {
    /// A regular-file blob entry.
    pub fn blob(path: impl Into<String>, revision: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            revision: revision.into(),
            mode: FileMode::Regular,
            kind: ObjectKind::Blob,
        }
    }
}

/// A pull request as reported by the remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    /// Assigned number
    pub number: u64,
    /// Canonical web link
    pub url: String,
    /// Head branch (the branch with changes)
    pub head: String,
    /// Base branch (the branch to merge into)
    pub base: String,
    /// Title
    pub title: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    mod repo_reference {
        use super::*;

        #[test]
        fn display_format() {
            let r = RepoReference::new("gitops-tools", "pkg", "testing");
            assert_eq!(r.to_string(), "gitops-tools/pkg:testing");
        }

        #[test]
        fn parse_valid() {
            let r = RepoReference::parse("my-org/my-repo", "main").unwrap();
            assert_eq!(r.owner, "my-org");
            assert_eq!(r.repo, "my-repo");
            assert_eq!(r.branch, "main");
        }

        #[test]
        fn parse_rejects_malformed_names() {
            for bad in ["", "owner", "/repo", "owner/", "a/b/c"] {
                assert_eq!(
                    RepoReference::parse(bad, "main"),
                    Err(TypeError::InvalidRepository(bad.to_string())),
                    "{bad:?} should be rejected"
                );
            }
        }

        #[test]
        fn parse_rejects_empty_branch() {
            assert!(matches!(
                RepoReference::parse("owner/repo", ""),
                Err(TypeError::InvalidBranchName(_))
            ));
        }

        #[test]
        fn with_branch_keeps_repository() {
            let r = RepoReference::new("o", "r", "main").with_branch("bump-x1");
            assert_eq!(r.to_string(), "o/r:bump-x1");
        }
    }

    #[test]
    fn tree_entry_blob_defaults() {
        let entry = TreeEntry::blob("a/b.yaml", "abc123");
        assert_eq!(entry.mode.as_str(), "100644");
        assert_eq!(entry.kind.to_string(), "blob");
    }

    #[test]
    fn snapshot_debug_omits_content() {
        let snapshot = FileSnapshot {
            data: b"password: hunter2".to_vec(),
            revision: "r1".into(),
        };
        let debug = format!("{:?}", snapshot);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("r1"));
    }
}
