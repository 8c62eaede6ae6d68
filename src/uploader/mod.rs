//! uploader
//!
//! Multi-file atomic publish built from Git objects.
//!
//! # Design
//!
//! A publish assembles one commit directly from the object graph:
//!
//! 1. Resolve the head of the source branch; it becomes the parent.
//! 2. With a branch template, reserve a new branch at the parent.
//! 3. Store every file as a blob.
//! 4. Build one tree over the parent's tree, so paths not in the file set
//!    are kept.
//! 5. Create one commit with exactly one parent.
//! 6. Move the destination ref to the commit, without force.
//!
//! The ref move is the only visible step. If anything before it fails, the
//! destination still points at the parent; if it fails, the new objects are
//! left unreferenced. Neither case is cleaned up.
//!
//! # Example
//!
//! ```ignore
//! use repobump::core::types::{Files, RepoReference};
//! use repobump::uploader::{PublishInput, Uploader};
//!
//! let mut files = Files::new();
//! files.insert("apps/a.yaml".into(), b"image: a:v2\n".to_vec());
//! files.insert("apps/b.yaml".into(), b"image: b:v2\n".to_vec());
//!
//! let input = PublishInput::new(RepoReference::new("org", "repo", "main"), "Bump apps");
//! if let Some(outcome) = Uploader::new(remote).publish_files(&input, files).await? {
//!     println!("{} at {}", outcome.branch, outcome.commit);
//! }
//! ```

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::core::errors::{ErrorKind, Step};
use crate::core::naming::{NameGenerator, RandomNameGenerator};
use crate::core::types::{Files, RepoReference, TreeEntry};
use crate::forge::{CreateCommitRequest, ForgeError, RemoteRepository};

/// Where and how to publish a file set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishInput {
    /// Repository and the branch whose head becomes the parent
    pub source: RepoReference,
    /// Prefix for a generated destination branch; `None` publishes onto
    /// `source.branch`
    pub branch_generate_name: Option<String>,
    /// Commit message
    pub message: String,
}

impl PublishInput {
    /// Publish directly onto `source.branch`.
    pub fn new(source: RepoReference, message: impl Into<String>) -> Self {
        Self {
            source,
            branch_generate_name: None,
            message: message.into(),
        }
    }

    /// Publish onto a new branch named from `prefix`. An empty prefix means
    /// no new branch.
    pub fn branch_generate_name(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.branch_generate_name = (!prefix.is_empty()).then_some(prefix);
        self
    }
}

/// Result of a publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    /// Branch now pointing at `commit`
    pub branch: RepoReference,
    /// The new commit
    pub commit: String,
}

/// Errors from the publish workflow.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to get head of {source_ref}: {source}")]
    BranchHead {
        source_ref: RepoReference,
        source: ForgeError,
    },

    /// Nothing was created.
    #[error("failed to create ref {branch} at {parent}: {source}")]
    RefCreate {
        branch: RepoReference,
        parent: String,
        source: ForgeError,
    },

    #[error("failed to create blob for {path} in {branch}: {source}")]
    BlobCreate {
        path: String,
        branch: RepoReference,
        source: ForgeError,
    },

    #[error("failed to create tree on {parent} in {branch}: {source}")]
    TreeCreate {
        branch: RepoReference,
        parent: String,
        source: ForgeError,
    },

    #[error("failed to create commit in {branch}: {source}")]
    CommitCreate {
        branch: RepoReference,
        source: ForgeError,
    },

    /// `commit` exists but nothing references it.
    #[error("failed to move {branch} to {commit}: {source}")]
    RefUpdate {
        branch: RepoReference,
        commit: String,
        source: ForgeError,
    },
}

impl PublishError {
    /// The step that failed.
    pub fn step(&self) -> Step {
        match self {
            PublishError::BranchHead { .. } => Step::BranchHead,
            PublishError::RefCreate { .. } => Step::RefCreate,
            PublishError::BlobCreate { .. } => Step::BlobCreate,
            PublishError::TreeCreate { .. } => Step::TreeCreate,
            PublishError::CommitCreate { .. } => Step::CommitCreate,
            PublishError::RefUpdate { .. } => Step::RefUpdate,
        }
    }

    /// Classify the failure.
    pub fn kind(&self) -> ErrorKind {
        self.forge_error().kind()
    }

    /// The underlying remote error.
    pub fn forge_error(&self) -> &ForgeError {
        match self {
            PublishError::BranchHead { source, .. }
            | PublishError::RefCreate { source, .. }
            | PublishError::BlobCreate { source, .. }
            | PublishError::TreeCreate { source, .. }
            | PublishError::CommitCreate { source, .. }
            | PublishError::RefUpdate { source, .. } => source,
        }
    }
}

/// Publishes file sets as single commits.
pub struct Uploader {
    remote: Arc<dyn RemoteRepository>,
    names: Arc<dyn NameGenerator>,
}

impl std::fmt::Debug for Uploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Uploader")
            .field("remote", &self.remote.name())
            .finish_non_exhaustive()
    }
}

impl Uploader {
    /// Create an uploader with an OS-seeded random branch name generator.
    pub fn new(remote: Arc<dyn RemoteRepository>) -> Self {
        Self {
            remote,
            names: Arc::new(RandomNameGenerator::new()),
        }
    }

    /// Replace the branch name generator.
    pub fn with_name_generator(mut self, names: Arc<dyn NameGenerator>) -> Self {
        self.names = names;
        self
    }

    /// Publish `files` as one commit on top of the source branch head.
    ///
    /// Returns `None` without any remote call when `files` is empty.
    ///
    /// # Errors
    ///
    /// Returns the first failing step. Objects created before the failure
    /// are left in place.
    #[instrument(skip(self, input, files), fields(repo = %input.source, files = files.len()))]
    pub async fn publish_files(
        &self,
        input: &PublishInput,
        files: Files,
    ) -> Result<Option<PublishOutcome>, PublishError> {
        if files.is_empty() {
            debug!("no files to write");
            return Ok(None);
        }

        let source = &input.source;
        let repo = source.full_name();

        let parent = self
            .remote
            .get_branch_head(&repo, &source.branch)
            .await
            .map_err(|e| PublishError::BranchHead {
                source_ref: source.clone(),
                source: e,
            })?;
        debug!(sha = %parent, "got commit");

        let destination = self.reserve_destination(input, &repo, &parent).await?;

        let mut entries = Vec::with_capacity(files.len());
        for (path, body) in &files {
            let sha = self
                .remote
                .create_blob(&repo, body)
                .await
                .map_err(|source| {
                    warn!(path = %path, error = %source, "failed to create blob");
                    PublishError::BlobCreate {
                        path: path.clone(),
                        branch: destination.clone(),
                        source,
                    }
                })?;
            entries.push(TreeEntry::blob(path.as_str(), sha));
        }

        let tree = self
            .remote
            .create_tree(&repo, &parent, &entries)
            .await
            .map_err(|source| PublishError::TreeCreate {
                branch: destination.clone(),
                parent: parent.clone(),
                source,
            })?;
        debug!(tree = %tree, entries = entries.len(), "tree created");

        let commit = self
            .remote
            .create_commit(
                &repo,
                CreateCommitRequest {
                    message: input.message.clone(),
                    tree,
                    parent: parent.clone(),
                },
            )
            .await
            .map_err(|source| PublishError::CommitCreate {
                branch: destination.clone(),
                source,
            })?;
        debug!(commit = %commit, "commit created");

        self.remote
            .update_ref(&repo, &destination.branch, &commit, false)
            .await
            .map_err(|source| {
                warn!(
                    commit = %commit,
                    error = %source,
                    "failed to move ref, commit left unreferenced"
                );
                PublishError::RefUpdate {
                    branch: destination.clone(),
                    commit: commit.clone(),
                    source,
                }
            })?;
        info!(branch = %destination, commit = %commit, "published files");

        Ok(Some(PublishOutcome {
            branch: destination,
            commit,
        }))
    }

    /// Resolve the destination, creating it at `parent` if a template is set.
    async fn reserve_destination(
        &self,
        input: &PublishInput,
        repo: &str,
        parent: &str,
    ) -> Result<RepoReference, PublishError> {
        let Some(prefix) = input
            .branch_generate_name
            .as_deref()
            .filter(|p| !p.is_empty())
        else {
            return Ok(input.source.clone());
        };

        let destination = input.source.with_branch(self.names.prefixed_name(prefix));
        self.remote
            .create_branch(repo, &destination.branch, parent)
            .await
            .map_err(|source| PublishError::RefCreate {
                branch: destination.clone(),
                parent: parent.to_string(),
                source,
            })?;
        info!(branch = %destination, "created ref");
        Ok(destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::mock::{FailOn, MockRepository, OpKind};

    const REPO: &str = "org/repo";

    fn remote() -> MockRepository {
        let remote = MockRepository::new();
        remote.add_file(REPO, "main", "keep.yaml", b"keep: true\n");
        remote.add_file(REPO, "main", "a.yaml", b"a: 1\n");
        remote
    }

    fn uploader(remote: &MockRepository) -> Uploader {
        Uploader::new(Arc::new(remote.clone()))
            .with_name_generator(Arc::new(|prefix: &str| format!("{}x1", prefix)))
    }

    fn input() -> PublishInput {
        PublishInput::new(RepoReference::new("org", "repo", "main"), "publish")
    }

    fn files() -> Files {
        let mut files = Files::new();
        files.insert("a.yaml".into(), b"a: 2\n".to_vec());
        files.insert("b/c.yaml".into(), b"c: 1\n".to_vec());
        files
    }

    #[tokio::test]
    async fn empty_file_set_makes_no_calls() {
        let remote = remote();

        let outcome = uploader(&remote)
            .publish_files(&input(), Files::new())
            .await
            .unwrap();

        assert!(outcome.is_none());
        assert!(remote.operations().is_empty());
    }

    #[tokio::test]
    async fn publish_onto_source_branch() {
        let remote = remote();
        let parent = remote.branch_head(REPO, "main").unwrap();

        let outcome = uploader(&remote)
            .publish_files(&input(), files())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome.branch.to_string(), "org/repo:main");
        assert_eq!(remote.branch_head(REPO, "main"), Some(outcome.commit.clone()));
        assert_eq!(remote.commit_parent(REPO, &outcome.commit), Some(parent));
        assert_eq!(remote.count(OpKind::CreateBranch), 0);
        assert_eq!(
            remote.paths(REPO, "main"),
            vec!["a.yaml", "b/c.yaml", "keep.yaml"]
        );
    }

    #[tokio::test]
    async fn publish_onto_generated_branch() {
        let remote = remote();
        let parent = remote.branch_head(REPO, "main").unwrap();

        let outcome = uploader(&remote)
            .publish_files(&input().branch_generate_name("sync-"), files())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome.branch.branch, "sync-x1");
        assert_eq!(remote.branch_head(REPO, "main"), Some(parent));
        assert_eq!(
            remote.file_contents(REPO, "sync-x1", "a.yaml").unwrap(),
            b"a: 2\n"
        );
    }

    #[tokio::test]
    async fn blob_failure_leaves_reserved_branch_at_parent() {
        let remote = remote().fail_on(FailOn::CreateBlob(ForgeError::NetworkError(
            "connection reset".into(),
        )));
        let parent = remote.branch_head(REPO, "main").unwrap();

        let err = uploader(&remote)
            .publish_files(&input().branch_generate_name("sync-"), files())
            .await
            .unwrap_err();

        assert_eq!(err.step(), Step::BlobCreate);
        assert_eq!(err.kind(), ErrorKind::RemoteFailure);
        assert!(matches!(err, PublishError::BlobCreate { ref path, .. } if path == "a.yaml"));
        assert_eq!(remote.branch_head(REPO, "sync-x1"), Some(parent));
        assert_eq!(remote.count(OpKind::CreateTree), 0);
    }

    #[tokio::test]
    async fn ref_update_failure_reports_orphaned_commit() {
        let remote = remote().fail_on(FailOn::UpdateRef(ForgeError::ApiError {
            status: 500,
            message: "boom".into(),
        }));
        let parent = remote.branch_head(REPO, "main").unwrap();

        let err = uploader(&remote)
            .publish_files(&input(), files())
            .await
            .unwrap_err();

        assert_eq!(err.step(), Step::RefUpdate);
        let PublishError::RefUpdate { commit, .. } = &err else {
            panic!("expected RefUpdate, got {err:?}");
        };
        assert_eq!(remote.commit_parent(REPO, commit), Some(parent.clone()));
        assert_eq!(remote.branch_head(REPO, "main"), Some(parent));
    }

    #[tokio::test]
    async fn ref_create_collision() {
        let remote = remote();
        let head = remote.branch_head(REPO, "main").unwrap();
        remote.create_branch(REPO, "sync-x1", &head).await.unwrap();

        let err = uploader(&remote)
            .publish_files(&input().branch_generate_name("sync-"), files())
            .await
            .unwrap_err();

        assert_eq!(err.step(), Step::RefCreate);
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(remote.count(OpKind::CreateBlob), 0);
    }

    #[test]
    fn error_messages_name_the_ref() {
        let err = PublishError::BlobCreate {
            path: "a.yaml".into(),
            branch: RepoReference::new("org", "repo", "main"),
            source: ForgeError::RateLimited,
        };
        assert_eq!(
            err.to_string(),
            "failed to create blob for a.yaml in org/repo:main: rate limited"
        );
    }
}
