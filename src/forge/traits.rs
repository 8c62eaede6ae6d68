//! forge::traits
//!
//! The remote repository contract consumed by the update and publish
//! workflows.
//!
//! # Design
//!
//! The `RemoteRepository` trait is async because every operation is a
//! network call against a hosting API; nothing here touches a local clone.
//! Every method takes the repository full name (`owner/repo`).
//!
//! Cancellation is by drop: abandoning the returned future aborts the call
//! in flight. Nothing already applied on the remote is undone.
//!
//! # Example
//!
//! ```ignore
//! use repobump::forge::{RemoteRepository, ForgeError};
//!
//! async fn head_of_main(remote: &dyn RemoteRepository) -> Result<String, ForgeError> {
//!     remote.get_branch_head("my-org/my-repo", "main").await
//! }
//! ```

use async_trait::async_trait;
use thiserror::Error;

use crate::core::errors::ErrorKind;
use crate::core::types::{FileSnapshot, PullRequest, TreeEntry};

/// Errors from remote repository operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForgeError {
    /// The file, branch, or repository does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The expected revision no longer matches the remote.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A ref with that name already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Authentication is required but not available.
    #[error("authentication required")]
    AuthRequired,

    /// Authentication failed (invalid token, expired, insufficient permissions).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// Rate limit exceeded.
    #[error("rate limited")]
    RateLimited,

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Network or connection error.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The request deadline elapsed.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The repository name is not of the form `owner/repo`.
    #[error("invalid repository: {0}")]
    InvalidRepository(String),
}

impl ForgeError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ForgeError::NotFound(_) => ErrorKind::NotFound,
            ForgeError::Conflict(_) => ErrorKind::Conflict,
            ForgeError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            _ => ErrorKind::RemoteFailure,
        }
    }
}

/// Request to replace a file's content on a branch.
#[derive(Clone)]
pub struct UpdateFileRequest {
    /// Branch to commit on
    pub branch: String,
    /// Path of the file within the repository
    pub path: String,
    /// Commit message
    pub message: String,
    /// Revision marker observed when the file was read
    pub expected_revision: String,
    /// Replacement content
    pub content: Vec<u8>,
}

impl std::fmt::Debug for UpdateFileRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateFileRequest")
            .field("branch", &self.branch)
            .field("path", &self.path)
            .field("message", &self.message)
            .field("expected_revision", &self.expected_revision)
            .field("content_len", &self.content.len())
            .finish()
    }
}

/// Request to create a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePrRequest {
    /// Head branch name (the branch with changes)
    pub head: String,
    /// Base branch name (the branch to merge into)
    pub base: String,
    /// PR title
    pub title: String,
    /// PR body/description
    pub body: String,
}

/// Request to create a commit object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCommitRequest {
    /// Commit message
    pub message: String,
    /// Tree the commit snapshots
    pub tree: String,
    /// The single parent commit
    pub parent: String,
}

/// The remote repository operations the workflows are built from.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow use across async tasks.
///
/// # Error Handling
///
/// All methods return `Result<T, ForgeError>`. The workflows care about:
/// - `NotFound`: file or branch absent
/// - `Conflict`: stale revision on write, or a non-fast-forward ref move
/// - `AlreadyExists`: branch name collision
///
/// Everything else is a remote failure.
#[async_trait]
pub trait RemoteRepository: Send + Sync {
    /// Get the implementation name (e.g., "github", "mock").
    fn name(&self) -> &'static str;

    /// Read a file and the revision marker of its current content.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the branch or file does not exist
    async fn get_file(
        &self,
        repo: &str,
        branch: &str,
        path: &str,
    ) -> Result<FileSnapshot, ForgeError>;

    /// Get the commit a branch currently points at.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the branch does not exist
    async fn get_branch_head(&self, repo: &str, branch: &str) -> Result<String, ForgeError>;

    /// Create a branch pointing at `from_revision`.
    ///
    /// # Errors
    ///
    /// - `AlreadyExists` if a branch with that name exists
    async fn create_branch(
        &self,
        repo: &str,
        name: &str,
        from_revision: &str,
    ) -> Result<(), ForgeError>;

    /// Replace a file's content, committing on `request.branch`.
    ///
    /// The write only succeeds if the file's current revision equals
    /// `request.expected_revision`.
    ///
    /// # Errors
    ///
    /// - `Conflict` if the file changed since it was read
    async fn update_file(&self, repo: &str, request: UpdateFileRequest) -> Result<(), ForgeError>;

    /// Open a pull request.
    async fn create_pull_request(
        &self,
        repo: &str,
        request: CreatePrRequest,
    ) -> Result<PullRequest, ForgeError>;

    /// Store raw bytes as a blob object and return its revision marker.
    async fn create_blob(&self, repo: &str, content: &[u8]) -> Result<String, ForgeError>;

    /// Create a tree from `entries` layered over `base`.
    ///
    /// `base` may be a tree or a commit; a commit stands for its tree. Paths
    /// not named in `entries` keep their content from `base`.
    async fn create_tree(
        &self,
        repo: &str,
        base: &str,
        entries: &[TreeEntry],
    ) -> Result<String, ForgeError>;

    /// Create a commit object. Nothing references it until a ref is moved.
    async fn create_commit(
        &self,
        repo: &str,
        request: CreateCommitRequest,
    ) -> Result<String, ForgeError>;

    /// Move a branch to `revision`.
    ///
    /// Without `force`, the move must be a fast-forward.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the branch does not exist
    /// - `Conflict` if `force` is false and the move is not a fast-forward
    async fn update_ref(
        &self,
        repo: &str,
        branch: &str,
        revision: &str,
        force: bool,
    ) -> Result<(), ForgeError>;
}
