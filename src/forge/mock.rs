//! forge::mock
//!
//! Mock remote repository for deterministic testing.
//!
//! # Design
//!
//! The mock keeps a small, content-addressed object graph per repository:
//! blobs, flat path→blob trees, single-parent commits, and branch refs.
//! Revision markers therefore behave like real ones. A stale marker on
//! `update_file` is a `Conflict`, a non-fast-forward `update_ref` without
//! `force` is a `Conflict`, and creating an existing branch is
//! `AlreadyExists`.
//!
//! Every call is recorded. Any operation can be configured to fail
//! ([`FailOn`]) or to never complete ([`MockRepository::stall_on`]), which
//! lets tests drive cancellation with `tokio::time::timeout`.
//!
//! # Example
//!
//! ```
//! use repobump::forge::mock::MockRepository;
//! use repobump::forge::RemoteRepository;
//!
//! # tokio_test_block_on(async {
//! let remote = MockRepository::new();
//! remote.add_file("org/repo", "main", "config.yaml", b"image: old\n");
//!
//! let snapshot = remote.get_file("org/repo", "main", "config.yaml").await.unwrap();
//! assert_eq!(snapshot.data, b"image: old\n");
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::traits::{
    CreateCommitRequest, CreatePrRequest, ForgeError, RemoteRepository, UpdateFileRequest,
};
use crate::core::types::{FileSnapshot, ObjectKind, PullRequest, TreeEntry};

/// Mock remote repository for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockRepository {
    /// Internal state shared across clones.
    inner: Arc<Mutex<MockInner>>,
}

/// Internal mutable state.
#[derive(Debug, Default)]
struct MockInner {
    /// Object graphs by repository full name.
    repos: HashMap<String, RepoState>,
    /// Opened pull requests, in creation order.
    pull_requests: Vec<PullRequest>,
    /// Operation to fail on (for testing error paths).
    fail_on: Option<FailOn>,
    /// Operation that never completes.
    stall_on: Option<OpKind>,
    /// Recorded operations for verification.
    operations: Vec<MockOperation>,
    /// Monotonic counter standing in for commit timestamps.
    clock: u64,
}

/// Object graph of one repository.
#[derive(Debug, Default)]
struct RepoState {
    blobs: HashMap<String, Vec<u8>>,
    trees: HashMap<String, BTreeMap<String, String>>,
    commits: HashMap<String, MockCommit>,
    branches: HashMap<String, String>,
}

#[derive(Debug, Clone)]
struct MockCommit {
    tree: String,
    parent: Option<String>,
}

impl RepoState {
    fn store_blob(&mut self, content: &[u8]) -> String {
        let id = object_id(&[b"blob", content]);
        self.blobs.insert(id.clone(), content.to_vec());
        id
    }

    fn store_tree(&mut self, entries: BTreeMap<String, String>) -> String {
        let mut serialized = Vec::new();
        for (path, blob) in &entries {
            serialized.extend_from_slice(path.as_bytes());
            serialized.push(0);
            serialized.extend_from_slice(blob.as_bytes());
            serialized.push(b'\n');
        }
        let id = object_id(&[b"tree", &serialized]);
        self.trees.insert(id.clone(), entries);
        id
    }

    fn store_commit(
        &mut self,
        tree: &str,
        parent: Option<&str>,
        message: &str,
        clock: u64,
    ) -> String {
        let id = object_id(&[
            b"commit",
            tree.as_bytes(),
            parent.unwrap_or("").as_bytes(),
            message.as_bytes(),
            &clock.to_be_bytes(),
        ]);
        self.commits.insert(
            id.clone(),
            MockCommit {
                tree: tree.to_string(),
                parent: parent.map(str::to_string),
            },
        );
        id
    }

    /// Tree entries of the commit a branch points at.
    fn branch_tree(&self, branch: &str) -> Option<&BTreeMap<String, String>> {
        let head = self.branches.get(branch)?;
        let commit = self.commits.get(head)?;
        self.trees.get(&commit.tree)
    }

    /// Resolve a tree or commit id to tree entries.
    fn resolve_tree(&self, id: &str) -> Option<&BTreeMap<String, String>> {
        match self.commits.get(id) {
            Some(commit) => self.trees.get(&commit.tree),
            None => self.trees.get(id),
        }
    }

    /// Whether `ancestor` is reachable from `descendant` through parents.
    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> bool {
        let mut current = Some(descendant.to_string());
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.commits.get(&id).and_then(|c| c.parent.clone());
        }
        false
    }
}

/// Content-addressed identifier, 40 hex chars like a Git SHA-1.
fn object_id(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part);
    }
    let mut id = hex::encode(hasher.finalize());
    id.truncate(40);
    id
}

/// The operations of the [`RemoteRepository`] contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    GetFile,
    GetBranchHead,
    CreateBranch,
    UpdateFile,
    CreatePullRequest,
    CreateBlob,
    CreateTree,
    CreateCommit,
    UpdateRef,
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    /// Fail get_file with the given error.
    GetFile(ForgeError),
    /// Fail get_branch_head with the given error.
    GetBranchHead(ForgeError),
    /// Fail create_branch with the given error.
    CreateBranch(ForgeError),
    /// Fail update_file with the given error.
    UpdateFile(ForgeError),
    /// Fail create_pull_request with the given error.
    CreatePullRequest(ForgeError),
    /// Fail create_blob with the given error.
    CreateBlob(ForgeError),
    /// Fail create_tree with the given error.
    CreateTree(ForgeError),
    /// Fail create_commit with the given error.
    CreateCommit(ForgeError),
    /// Fail update_ref with the given error.
    UpdateRef(ForgeError),
}

impl FailOn {
    fn split(&self) -> (OpKind, &ForgeError) {
        match self {
            FailOn::GetFile(e) => (OpKind::GetFile, e),
            FailOn::GetBranchHead(e) => (OpKind::GetBranchHead, e),
            FailOn::CreateBranch(e) => (OpKind::CreateBranch, e),
            FailOn::UpdateFile(e) => (OpKind::UpdateFile, e),
            FailOn::CreatePullRequest(e) => (OpKind::CreatePullRequest, e),
            FailOn::CreateBlob(e) => (OpKind::CreateBlob, e),
            FailOn::CreateTree(e) => (OpKind::CreateTree, e),
            FailOn::CreateCommit(e) => (OpKind::CreateCommit, e),
            FailOn::UpdateRef(e) => (OpKind::UpdateRef, e),
        }
    }
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    GetFile {
        repo: String,
        branch: String,
        path: String,
    },
    GetBranchHead {
        repo: String,
        branch: String,
    },
    CreateBranch {
        repo: String,
        name: String,
        from_revision: String,
    },
    UpdateFile {
        repo: String,
        branch: String,
        path: String,
        message: String,
        expected_revision: String,
        content: Vec<u8>,
    },
    CreatePullRequest {
        repo: String,
        head: String,
        base: String,
        title: String,
        body: String,
    },
    CreateBlob {
        repo: String,
        content: Vec<u8>,
    },
    CreateTree {
        repo: String,
        base: String,
        entries: Vec<TreeEntry>,
    },
    CreateCommit {
        repo: String,
        message: String,
        tree: String,
        parent: String,
    },
    UpdateRef {
        repo: String,
        branch: String,
        revision: String,
        force: bool,
    },
}

impl MockOperation {
    /// Which contract operation this records.
    pub fn kind(&self) -> OpKind {
        match self {
            MockOperation::GetFile { .. } => OpKind::GetFile,
            MockOperation::GetBranchHead { .. } => OpKind::GetBranchHead,
            MockOperation::CreateBranch { .. } => OpKind::CreateBranch,
            MockOperation::UpdateFile { .. } => OpKind::UpdateFile,
            MockOperation::CreatePullRequest { .. } => OpKind::CreatePullRequest,
            MockOperation::CreateBlob { .. } => OpKind::CreateBlob,
            MockOperation::CreateTree { .. } => OpKind::CreateTree,
            MockOperation::CreateCommit { .. } => OpKind::CreateCommit,
            MockOperation::UpdateRef { .. } => OpKind::UpdateRef,
        }
    }
}

impl MockRepository {
    /// Create a new empty mock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the mock to fail on a specific operation.
    ///
    /// # Example
    ///
    /// ```
    /// use repobump::forge::mock::{MockRepository, FailOn};
    /// use repobump::forge::ForgeError;
    ///
    /// let remote = MockRepository::new()
    ///     .fail_on(FailOn::CreateBranch(ForgeError::RateLimited));
    /// ```
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.lock().fail_on = Some(fail_on);
        self
    }

    /// Clear the failure configuration.
    pub fn clear_fail_on(&self) {
        self.lock().fail_on = None;
    }

    /// Configure an operation to never complete.
    pub fn stall_on(self, op: OpKind) -> Self {
        self.lock().stall_on = Some(op);
        self
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.lock().operations.clone()
    }

    /// Count recorded operations of one kind.
    pub fn count(&self, op: OpKind) -> usize {
        self.lock()
            .operations
            .iter()
            .filter(|o| o.kind() == op)
            .count()
    }

    /// Clear recorded operations.
    pub fn clear_operations(&self) {
        self.lock().operations.clear();
    }

    /// Commit `content` at `path` on `branch`, creating the repository and
    /// branch if needed. Not recorded as an operation.
    pub fn add_file(&self, repo: &str, branch: &str, path: &str, content: &[u8]) {
        let mut inner = self.lock();
        inner.clock += 1;
        let clock = inner.clock;
        let state = inner.repos.entry(repo.to_string()).or_default();

        let parent = state.branches.get(branch).cloned();
        let mut entries = state.branch_tree(branch).cloned().unwrap_or_default();
        let blob = state.store_blob(content);
        entries.insert(path.to_string(), blob);
        let tree = state.store_tree(entries);
        let commit = state.store_commit(&tree, parent.as_deref(), &format!("add {}", path), clock);
        state.branches.insert(branch.to_string(), commit);
    }

    /// Content of `path` on `branch`, if present.
    pub fn file_contents(&self, repo: &str, branch: &str, path: &str) -> Option<Vec<u8>> {
        let inner = self.lock();
        let state = inner.repos.get(repo)?;
        let blob = state.branch_tree(branch)?.get(path)?;
        state.blobs.get(blob).cloned()
    }

    /// All paths on `branch`, sorted.
    pub fn paths(&self, repo: &str, branch: &str) -> Vec<String> {
        let inner = self.lock();
        inner
            .repos
            .get(repo)
            .and_then(|s| s.branch_tree(branch))
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Commit `branch` points at, if it exists.
    pub fn branch_head(&self, repo: &str, branch: &str) -> Option<String> {
        let inner = self.lock();
        inner.repos.get(repo)?.branches.get(branch).cloned()
    }

    /// Branch names in `repo`, sorted.
    pub fn branches(&self, repo: &str) -> Vec<String> {
        let inner = self.lock();
        let mut names: Vec<String> = inner
            .repos
            .get(repo)
            .map(|s| s.branches.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Parent of a commit; `None` for unknown or root commits.
    pub fn commit_parent(&self, repo: &str, commit: &str) -> Option<String> {
        let inner = self.lock();
        inner.repos.get(repo)?.commits.get(commit)?.parent.clone()
    }

    /// Number of commit objects in `repo`, referenced or not.
    pub fn commit_count(&self, repo: &str) -> usize {
        let inner = self.lock();
        inner.repos.get(repo).map(|s| s.commits.len()).unwrap_or(0)
    }

    /// Pull requests opened so far, in order.
    pub fn pull_requests(&self) -> Vec<PullRequest> {
        self.lock().pull_requests.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockInner> {
        // A panicking test thread must not wedge the others.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record an operation.
    fn record(&self, op: MockOperation) {
        self.lock().operations.push(op);
    }

    /// Check if we should fail and return the error if so.
    fn check_fail(&self, op: OpKind) -> Result<(), ForgeError> {
        let inner = self.lock();
        match inner.fail_on.as_ref().map(FailOn::split) {
            Some((kind, e)) if kind == op => Err(e.clone()),
            _ => Ok(()),
        }
    }

    /// Record, then stall or fail as configured.
    async fn enter(&self, op: MockOperation) -> Result<(), ForgeError> {
        let kind = op.kind();
        self.record(op);
        let stall = self.lock().stall_on == Some(kind);
        if stall {
            std::future::pending::<()>().await;
        }
        self.check_fail(kind)
    }
}

fn repo_not_found(repo: &str) -> ForgeError {
    ForgeError::NotFound(format!("repository {}", repo))
}

fn unprocessable(message: impl Into<String>) -> ForgeError {
    ForgeError::ApiError {
        status: 422,
        message: message.into(),
    }
}

#[async_trait]
impl RemoteRepository for MockRepository {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn get_file(
        &self,
        repo: &str,
        branch: &str,
        path: &str,
    ) -> Result<FileSnapshot, ForgeError> {
        self.enter(MockOperation::GetFile {
            repo: repo.to_string(),
            branch: branch.to_string(),
            path: path.to_string(),
        })
        .await?;

        let inner = self.lock();
        let state = inner.repos.get(repo).ok_or_else(|| repo_not_found(repo))?;
        let tree = state
            .branch_tree(branch)
            .ok_or_else(|| ForgeError::NotFound(format!("branch {}", branch)))?;
        let blob = tree
            .get(path)
            .ok_or_else(|| ForgeError::NotFound(format!("{} on {}", path, branch)))?;

        Ok(FileSnapshot {
            data: state.blobs.get(blob).cloned().unwrap_or_default(),
            revision: blob.clone(),
        })
    }

    async fn get_branch_head(&self, repo: &str, branch: &str) -> Result<String, ForgeError> {
        self.enter(MockOperation::GetBranchHead {
            repo: repo.to_string(),
            branch: branch.to_string(),
        })
        .await?;

        let inner = self.lock();
        let state = inner.repos.get(repo).ok_or_else(|| repo_not_found(repo))?;
        state
            .branches
            .get(branch)
            .cloned()
            .ok_or_else(|| ForgeError::NotFound(format!("branch {}", branch)))
    }

    async fn create_branch(
        &self,
        repo: &str,
        name: &str,
        from_revision: &str,
    ) -> Result<(), ForgeError> {
        self.enter(MockOperation::CreateBranch {
            repo: repo.to_string(),
            name: name.to_string(),
            from_revision: from_revision.to_string(),
        })
        .await?;

        let mut inner = self.lock();
        let state = inner
            .repos
            .get_mut(repo)
            .ok_or_else(|| repo_not_found(repo))?;
        if state.branches.contains_key(name) {
            return Err(ForgeError::AlreadyExists(format!("branch {}", name)));
        }
        if !state.commits.contains_key(from_revision) {
            return Err(unprocessable("Object does not exist"));
        }
        state
            .branches
            .insert(name.to_string(), from_revision.to_string());
        Ok(())
    }

    async fn update_file(&self, repo: &str, request: UpdateFileRequest) -> Result<(), ForgeError> {
        self.enter(MockOperation::UpdateFile {
            repo: repo.to_string(),
            branch: request.branch.clone(),
            path: request.path.clone(),
            message: request.message.clone(),
            expected_revision: request.expected_revision.clone(),
            content: request.content.clone(),
        })
        .await?;

        let mut inner = self.lock();
        inner.clock += 1;
        let clock = inner.clock;
        let state = inner
            .repos
            .get_mut(repo)
            .ok_or_else(|| repo_not_found(repo))?;
        let head = state
            .branches
            .get(&request.branch)
            .cloned()
            .ok_or_else(|| ForgeError::NotFound(format!("branch {}", request.branch)))?;
        let mut entries = state
            .branch_tree(&request.branch)
            .cloned()
            .unwrap_or_default();

        match entries.get(&request.path) {
            Some(current) if *current == request.expected_revision => {}
            Some(current) => {
                return Err(ForgeError::Conflict(format!(
                    "{} is at {} but expected {}",
                    request.path, current, request.expected_revision
                )))
            }
            None => {
                return Err(ForgeError::Conflict(format!(
                    "{} does not exist on {}",
                    request.path, request.branch
                )))
            }
        }

        let blob = state.store_blob(&request.content);
        entries.insert(request.path.clone(), blob);
        let tree = state.store_tree(entries);
        let commit = state.store_commit(&tree, Some(&head), &request.message, clock);
        state.branches.insert(request.branch, commit);
        Ok(())
    }

    async fn create_pull_request(
        &self,
        repo: &str,
        request: CreatePrRequest,
    ) -> Result<PullRequest, ForgeError> {
        self.enter(MockOperation::CreatePullRequest {
            repo: repo.to_string(),
            head: request.head.clone(),
            base: request.base.clone(),
            title: request.title.clone(),
            body: request.body.clone(),
        })
        .await?;

        let mut inner = self.lock();
        let state = inner.repos.get(repo).ok_or_else(|| repo_not_found(repo))?;
        let known = |branch: &String| state.branches.contains_key(branch);
        if !known(&request.head) || !known(&request.base) {
            return Err(unprocessable("Validation Failed"));
        }

        let number = inner.pull_requests.len() as u64 + 1;
        let pr = PullRequest {
            number,
            url: format!("https://github.com/{}/pull/{}", repo, number),
            head: request.head,
            base: request.base,
            title: request.title,
        };
        inner.pull_requests.push(pr.clone());
        Ok(pr)
    }

    async fn create_blob(&self, repo: &str, content: &[u8]) -> Result<String, ForgeError> {
        self.enter(MockOperation::CreateBlob {
            repo: repo.to_string(),
            content: content.to_vec(),
        })
        .await?;

        let mut inner = self.lock();
        let state = inner
            .repos
            .get_mut(repo)
            .ok_or_else(|| repo_not_found(repo))?;
        Ok(state.store_blob(content))
    }

    async fn create_tree(
        &self,
        repo: &str,
        base: &str,
        entries: &[TreeEntry],
    ) -> Result<String, ForgeError> {
        self.enter(MockOperation::CreateTree {
            repo: repo.to_string(),
            base: base.to_string(),
            entries: entries.to_vec(),
        })
        .await?;

        let mut inner = self.lock();
        let state = inner
            .repos
            .get_mut(repo)
            .ok_or_else(|| repo_not_found(repo))?;
        let mut tree = state
            .resolve_tree(base)
            .cloned()
            .ok_or_else(|| unprocessable("base_tree is not a valid tree oid"))?;

        for entry in entries {
            if entry.kind != ObjectKind::Blob || !state.blobs.contains_key(&entry.revision) {
                return Err(unprocessable(format!(
                    "tree.sha {} is not a valid blob",
                    entry.revision
                )));
            }
            tree.insert(entry.path.clone(), entry.revision.clone());
        }
        Ok(state.store_tree(tree))
    }

    async fn create_commit(
        &self,
        repo: &str,
        request: CreateCommitRequest,
    ) -> Result<String, ForgeError> {
        self.enter(MockOperation::CreateCommit {
            repo: repo.to_string(),
            message: request.message.clone(),
            tree: request.tree.clone(),
            parent: request.parent.clone(),
        })
        .await?;

        let mut inner = self.lock();
        inner.clock += 1;
        let clock = inner.clock;
        let state = inner
            .repos
            .get_mut(repo)
            .ok_or_else(|| repo_not_found(repo))?;
        if !state.trees.contains_key(&request.tree) {
            return Err(unprocessable("Tree SHA does not exist"));
        }
        if !state.commits.contains_key(&request.parent) {
            return Err(unprocessable("Parent SHA does not exist"));
        }
        Ok(state.store_commit(&request.tree, Some(&request.parent), &request.message, clock))
    }

    async fn update_ref(
        &self,
        repo: &str,
        branch: &str,
        revision: &str,
        force: bool,
    ) -> Result<(), ForgeError> {
        self.enter(MockOperation::UpdateRef {
            repo: repo.to_string(),
            branch: branch.to_string(),
            revision: revision.to_string(),
            force,
        })
        .await?;

        let mut inner = self.lock();
        let state = inner
            .repos
            .get_mut(repo)
            .ok_or_else(|| repo_not_found(repo))?;
        let current = state
            .branches
            .get(branch)
            .cloned()
            .ok_or_else(|| ForgeError::NotFound(format!("branch {}", branch)))?;
        if !state.commits.contains_key(revision) {
            return Err(unprocessable("Object does not exist"));
        }
        if !force && !state.is_ancestor(&current, revision) {
            return Err(ForgeError::Conflict("Update is not a fast forward".into()));
        }
        state
            .branches
            .insert(branch.to_string(), revision.to_string());
        Ok(())
    }
}
