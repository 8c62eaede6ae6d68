//! updater
//!
//! Single-file update workflow: read, transform, branch, write, propose.
//!
//! # Design
//!
//! The steps run strictly in order because each one feeds the next: the
//! revision marker captured by the read is the precondition of the write,
//! and the branch created before the write is the head of the pull request.
//!
//! - With no branch template, the write lands directly on the branch that
//!   was read and no pull request is opened.
//! - With a template, a new branch is created at the current head of the
//!   target branch, the write lands there, and a pull request proposes it
//!   back onto the target branch.
//!
//! A revision mismatch on the write surfaces as a `Conflict` and nothing is
//! retried. Nothing is rolled back either: a branch created before a failed
//! write, or a commit published before a failed pull request, stays on the
//! remote.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use repobump::updater::{CommitInput, Updater};
//! use repobump::updater::transform::update_yaml;
//!
//! let updater = Updater::new(remote);
//! let input = CommitInput::new("my-org/my-repo", "main", "deploy/values.yaml", "Bump image")
//!     .branch_generate_name("update-image-");
//! let outcome = updater.apply_update_to_file(&input, &update_yaml("image.tag", "v2")).await?;
//! println!("published to {}", outcome.branch);
//! ```

pub mod transform;

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::core::errors::{ErrorKind, Step};
use crate::core::naming::{NameGenerator, RandomNameGenerator};
use crate::core::types::PullRequest;
use crate::forge::{CreatePrRequest, ForgeError, RemoteRepository, UpdateFileRequest};
use transform::{replace_contents, ContentUpdater, TransformError};

/// Configures the commit and the pull request of an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInput {
    /// Repository full name, e.g. `my-org/my-repo`
    pub repo: String,
    /// Branch to read from, and the base of any pull request
    pub branch: String,
    /// Path of the file within the repository
    pub filename: String,
    /// Prefix for a generated branch, e.g. `update-image-`. `None` writes
    /// directly to `branch`.
    pub branch_generate_name: Option<String>,
    /// Commit message for the write
    pub commit_message: String,
    /// Pull request title; the commit message when empty
    pub pull_request_title: String,
    /// Pull request body
    pub pull_request_body: String,
}

impl CommitInput {
    /// Input that writes directly to `branch`.
    pub fn new(
        repo: impl Into<String>,
        branch: impl Into<String>,
        filename: impl Into<String>,
        commit_message: impl Into<String>,
    ) -> Self {
        Self {
            repo: repo.into(),
            branch: branch.into(),
            filename: filename.into(),
            branch_generate_name: None,
            commit_message: commit_message.into(),
            pull_request_title: String::new(),
            pull_request_body: String::new(),
        }
    }

    /// Publish on a new branch named from `prefix`. An empty prefix means
    /// no new branch.
    pub fn branch_generate_name(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.branch_generate_name = (!prefix.is_empty()).then_some(prefix);
        self
    }

    /// Set the pull request title and body.
    pub fn pull_request(mut self, title: impl Into<String>, body: impl Into<String>) -> Self {
        self.pull_request_title = title.into();
        self.pull_request_body = body.into();
        self
    }

    fn template(&self) -> Option<&str> {
        self.branch_generate_name
            .as_deref()
            .filter(|prefix| !prefix.is_empty())
    }

    fn title(&self) -> &str {
        if self.pull_request_title.is_empty() {
            &self.commit_message
        } else {
            &self.pull_request_title
        }
    }
}

/// Configures a pull request opened with [`Updater::create_pull_request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestInput {
    /// Repository full name
    pub repo: String,
    /// Base branch, e.g. `main`
    pub source_branch: String,
    /// Head branch carrying the change
    pub new_branch: String,
    pub title: String,
    pub body: String,
}

/// Result of a successful update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Branch the change was published to
    pub branch: String,
    /// Pull request, when a new branch was created
    pub pull_request: Option<PullRequest>,
}

/// Errors from the update workflow. Each variant names the failed step.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("failed to read {path}: {source}")]
    Read { path: String, source: ForgeError },

    #[error("failed to transform {path}: {source}")]
    Transform {
        path: String,
        source: TransformError,
    },

    #[error("failed to get branch head: {0}")]
    BranchHead(#[source] ForgeError),

    #[error("failed to create branch {branch}: {source}")]
    BranchCreate { branch: String, source: ForgeError },

    #[error("failed to update file: {source}")]
    Write { branch: String, source: ForgeError },

    /// The change is published on `branch` but no pull request was opened.
    #[error("failed to create a pull request: {source}")]
    PullRequest { branch: String, source: ForgeError },
}

impl UpdateError {
    /// The step that failed.
    pub fn step(&self) -> Step {
        match self {
            UpdateError::Read { .. } => Step::Read,
            UpdateError::Transform { .. } => Step::Transform,
            UpdateError::BranchHead(_) => Step::BranchHead,
            UpdateError::BranchCreate { .. } => Step::BranchCreate,
            UpdateError::Write { .. } => Step::Write,
            UpdateError::PullRequest { .. } => Step::Propose,
        }
    }

    /// Classify the failure.
    pub fn kind(&self) -> ErrorKind {
        match self.forge_error() {
            Some(e) => e.kind(),
            None => ErrorKind::TransformFailure,
        }
    }

    /// The underlying remote error, unless the transform failed.
    pub fn forge_error(&self) -> Option<&ForgeError> {
        match self {
            UpdateError::Read { source, .. }
            | UpdateError::BranchCreate { source, .. }
            | UpdateError::Write { source, .. }
            | UpdateError::PullRequest { source, .. } => Some(source),
            UpdateError::BranchHead(source) => Some(source),
            UpdateError::Transform { .. } => None,
        }
    }

    /// Whether the write lost an optimistic-concurrency race.
    pub fn is_conflict(&self) -> bool {
        matches!(self, UpdateError::Write { source: ForgeError::Conflict(_), .. })
    }

    /// Branch the change was published to, if the write succeeded.
    pub fn published_branch(&self) -> Option<&str> {
        match self {
            UpdateError::PullRequest { branch, .. } => Some(branch.as_str()),
            _ => None,
        }
    }
}

/// Updates a file in a remote repository, optionally via a pull request.
///
/// Stateless beyond its collaborators; one `Updater` may serve concurrent
/// updates.
pub struct Updater {
    remote: Arc<dyn RemoteRepository>,
    names: Arc<dyn NameGenerator>,
}

impl std::fmt::Debug for Updater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Updater")
            .field("remote", &self.remote.name())
            .finish_non_exhaustive()
    }
}

impl Updater {
    /// Create an updater with an OS-seeded random branch name generator.
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

    /// Fetch the file, transform it, and publish the result.
    ///
    /// Returns the branch the change was published to and, when a new branch
    /// was created, the pull request proposing it.
    ///
    /// # Errors
    ///
    /// Returns the first failing step. A transform failure happens before
    /// any remote mutation.
    #[instrument(skip(self, input, updater), fields(repo = %input.repo, file = %input.filename))]
    pub async fn apply_update_to_file(
        &self,
        input: &CommitInput,
        updater: &dyn ContentUpdater,
    ) -> Result<UpdateOutcome, UpdateError> {
        let current = self
            .remote
            .get_file(&input.repo, &input.branch, &input.filename)
            .await
            .map_err(|source| {
                warn!(branch = %input.branch, error = %source, "failed to get file from repo");
                UpdateError::Read {
                    path: input.filename.clone(),
                    source,
                }
            })?;
        debug!(revision = %current.revision, "got existing file");

        let updated = updater
            .update(&current.data)
            .map_err(|source| UpdateError::Transform {
                path: input.filename.clone(),
                source,
            })?;

        let branch = self.create_branch_if_necessary(input).await?;

        self.remote
            .update_file(
                &input.repo,
                UpdateFileRequest {
                    branch: branch.clone(),
                    path: input.filename.clone(),
                    message: input.commit_message.clone(),
                    expected_revision: current.revision,
                    content: updated,
                },
            )
            .await
            .map_err(|source| {
                warn!(branch = %branch, error = %source, "failed to update file");
                UpdateError::Write {
                    branch: branch.clone(),
                    source,
                }
            })?;
        info!(branch = %branch, "updated file");

        if branch == input.branch {
            return Ok(UpdateOutcome {
                branch,
                pull_request: None,
            });
        }

        let pr = self
            .create_pull_request(&PullRequestInput {
                repo: input.repo.clone(),
                source_branch: input.branch.clone(),
                new_branch: branch.clone(),
                title: input.title().to_string(),
                body: input.pull_request_body.clone(),
            })
            .await?;

        Ok(UpdateOutcome {
            branch,
            pull_request: Some(pr),
        })
    }

    /// Replace the whole file with `body`.
    pub async fn update_file(
        &self,
        input: &CommitInput,
        body: impl Into<Vec<u8>>,
    ) -> Result<UpdateOutcome, UpdateError> {
        self.apply_update_to_file(input, &replace_contents(body))
            .await
    }

    /// Set one dotted key path in a YAML file.
    pub async fn update_yaml(
        &self,
        input: &CommitInput,
        key: &str,
        value: impl Into<serde_yaml::Value>,
    ) -> Result<UpdateOutcome, UpdateError> {
        self.apply_update_to_file(input, &transform::update_yaml(key, value))
            .await
    }

    /// Open a pull request from `new_branch` onto `source_branch`.
    ///
    /// # Errors
    ///
    /// Returns `UpdateError::PullRequest` carrying `new_branch`.
    pub async fn create_pull_request(
        &self,
        input: &PullRequestInput,
    ) -> Result<PullRequest, UpdateError> {
        let pr = self
            .remote
            .create_pull_request(
                &input.repo,
                CreatePrRequest {
                    head: input.new_branch.clone(),
                    base: input.source_branch.clone(),
                    title: input.title.clone(),
                    body: input.body.clone(),
                },
            )
            .await
            .map_err(|source| {
                warn!(branch = %input.new_branch, error = %source, "failed to create pull request");
                UpdateError::PullRequest {
                    branch: input.new_branch.clone(),
                    source,
                }
            })?;
        info!(number = pr.number, url = %pr.url, "created pull request");
        Ok(pr)
    }

    /// Resolve the branch to write to, creating it if a template is set.
    async fn create_branch_if_necessary(&self, input: &CommitInput) -> Result<String, UpdateError> {
        let Some(prefix) = input.template() else {
            debug!(branch = %input.branch, "no branch template, reusing source branch");
            return Ok(input.branch.clone());
        };

        let head = self
            .remote
            .get_branch_head(&input.repo, &input.branch)
            .await
            .map_err(UpdateError::BranchHead)?;

        let name = self.names.prefixed_name(prefix);
        self.remote
            .create_branch(&input.repo, &name, &head)
            .await
            .map_err(|source| UpdateError::BranchCreate {
                branch: name.clone(),
                source,
            })?;
        info!(branch = %name, from = %head, "created branch");
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::mock::{FailOn, MockOperation, MockRepository, OpKind};

    const REPO: &str = "org/repo";

    fn remote() -> MockRepository {
        let remote = MockRepository::new();
        remote.add_file(REPO, "main", "values.yaml", b"image: old\n");
        remote
    }

    fn updater(remote: &MockRepository) -> Updater {
        Updater::new(Arc::new(remote.clone()))
            .with_name_generator(Arc::new(|prefix: &str| format!("{}x1", prefix)))
    }

    fn input() -> CommitInput {
        CommitInput::new(REPO, "main", "values.yaml", "bump image")
    }

    mod commit_input {
        use super::*;

        #[test]
        fn empty_prefix_means_no_template() {
            assert_eq!(input().branch_generate_name("").template(), None);
            assert_eq!(input().branch_generate_name("bump-").template(), Some("bump-"));
        }

        #[test]
        fn title_falls_back_to_commit_message() {
            assert_eq!(input().title(), "bump image");
            assert_eq!(input().pull_request("Bump", "").title(), "Bump");
        }
    }

    mod errors {
        use super::*;

        #[test]
        fn step_and_kind() {
            let err = UpdateError::Write {
                branch: "main".into(),
                source: ForgeError::Conflict("stale".into()),
            };
            assert_eq!(err.step(), Step::Write);
            assert_eq!(err.kind(), ErrorKind::Conflict);
            assert!(err.is_conflict());

            let err = UpdateError::Transform {
                path: "a".into(),
                source: TransformError::Rejected("no".into()),
            };
            assert_eq!(err.step(), Step::Transform);
            assert_eq!(err.kind(), ErrorKind::TransformFailure);
            assert!(!err.is_conflict());
        }

        #[test]
        fn messages() {
            let err = UpdateError::BranchCreate {
                branch: "bump-x1".into(),
                source: ForgeError::AlreadyExists("branch bump-x1".into()),
            };
            assert_eq!(
                err.to_string(),
                "failed to create branch bump-x1: already exists: branch bump-x1"
            );
            assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        }
    }

    #[tokio::test]
    async fn direct_update_without_template() {
        let remote = remote();

        let outcome = updater(&remote)
            .update_file(&input(), "image: new\n")
            .await
            .unwrap();

        assert_eq!(outcome.branch, "main");
        assert!(outcome.pull_request.is_none());
        assert_eq!(remote.count(OpKind::GetBranchHead), 0);
        assert_eq!(remote.count(OpKind::CreateBranch), 0);
        assert!(remote.pull_requests().is_empty());
        assert_eq!(
            remote.file_contents(REPO, "main", "values.yaml").unwrap(),
            b"image: new\n"
        );
    }

    #[tokio::test]
    async fn templated_update_branches_and_proposes() {
        let remote = remote();
        let head = remote.branch_head(REPO, "main").unwrap();

        let outcome = updater(&remote)
            .update_file(&input().branch_generate_name("bump-"), "image: new\n")
            .await
            .unwrap();

        assert_eq!(outcome.branch, "bump-x1");
        let pr = outcome.pull_request.unwrap();
        assert_eq!(pr.head, "bump-x1");
        assert_eq!(pr.base, "main");
        assert_eq!(pr.title, "bump image");
        assert_eq!(
            remote.operations()[2],
            MockOperation::CreateBranch {
                repo: REPO.into(),
                name: "bump-x1".into(),
                from_revision: head.clone(),
            }
        );
        // Target branch untouched.
        assert_eq!(remote.branch_head(REPO, "main"), Some(head));
    }

    #[tokio::test]
    async fn update_yaml_sets_key() {
        let remote = MockRepository::new();
        remote.add_file(REPO, "main", "values.yaml", b"input:\n  value: test\n");

        updater(&remote)
            .update_yaml(&input(), "input.value", "new")
            .await
            .unwrap();

        assert_eq!(
            remote.file_contents(REPO, "main", "values.yaml").unwrap(),
            b"input:\n  value: new\n"
        );
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let remote = remote();
        let mut input = input();
        input.filename = "absent.yaml".into();

        let err = updater(&remote)
            .update_file(&input, "x")
            .await
            .unwrap_err();

        assert_eq!(err.step(), Step::Read);
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(remote.operations().len(), 1);
    }

    #[tokio::test]
    async fn branch_head_failure_stops_before_create() {
        let remote = remote().fail_on(FailOn::GetBranchHead(ForgeError::RateLimited));

        let err = updater(&remote)
            .update_file(&input().branch_generate_name("bump-"), "x")
            .await
            .unwrap_err();

        assert_eq!(err.step(), Step::BranchHead);
        assert_eq!(remote.count(OpKind::CreateBranch), 0);
        assert_eq!(remote.count(OpKind::UpdateFile), 0);
    }

    #[tokio::test]
    async fn branch_collision_is_fatal() {
        let remote = remote();
        let head = remote.branch_head(REPO, "main").unwrap();
        remote.create_branch(REPO, "bump-x1", &head).await.unwrap();
        remote.clear_operations();

        let err = updater(&remote)
            .update_file(&input().branch_generate_name("bump-"), "x")
            .await
            .unwrap_err();

        assert_eq!(err.step(), Step::BranchCreate);
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(remote.count(OpKind::UpdateFile), 0);
        assert_eq!(remote.count(OpKind::CreatePullRequest), 0);
    }

    #[tokio::test]
    async fn pull_request_failure_keeps_published_branch() {
        let remote = remote().fail_on(FailOn::CreatePullRequest(ForgeError::ApiError {
            status: 422,
            message: "Validation Failed".into(),
        }));

        let err = updater(&remote)
            .update_file(&input().branch_generate_name("bump-"), "image: new\n")
            .await
            .unwrap_err();

        assert_eq!(err.step(), Step::Propose);
        assert_eq!(err.published_branch(), Some("bump-x1"));
        assert_eq!(
            remote.file_contents(REPO, "bump-x1", "values.yaml").unwrap(),
            b"image: new\n"
        );
    }
}
