//! Shared helpers for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;

use repobump::core::types::{FileSnapshot, PullRequest, TreeEntry};
use repobump::forge::mock::MockRepository;
use repobump::forge::{
    CreateCommitRequest, CreatePrRequest, ForgeError, RemoteRepository, UpdateFileRequest,
};

/// Yields to the scheduler before every call so concurrent workflows
/// interleave step by step.
pub struct Interleaved(pub MockRepository);

#[async_trait]
impl RemoteRepository for Interleaved {
    fn name(&self) -> &'static str {
        "interleaved"
    }

    async fn get_file(
        &self,
        repo: &str,
        branch: &str,
        path: &str,
    ) -> Result<FileSnapshot, ForgeError> {
        tokio::task::yield_now().await;
        self.0.get_file(repo, branch, path).await
    }

    async fn get_branch_head(&self, repo: &str, branch: &str) -> Result<String, ForgeError> {
        tokio::task::yield_now().await;
        self.0.get_branch_head(repo, branch).await
    }

    async fn create_branch(&self, repo: &str, name: &str, from: &str) -> Result<(), ForgeError> {
        tokio::task::yield_now().await;
        self.0.create_branch(repo, name, from).await
    }

    async fn update_file(&self, repo: &str, request: UpdateFileRequest) -> Result<(), ForgeError> {
        tokio::task::yield_now().await;
        self.0.update_file(repo, request).await
    }

    async fn create_pull_request(
        &self,
        repo: &str,
        request: CreatePrRequest,
    ) -> Result<PullRequest, ForgeError> {
        tokio::task::yield_now().await;
        self.0.create_pull_request(repo, request).await
    }

    async fn create_blob(&self, repo: &str, content: &[u8]) -> Result<String, ForgeError> {
        tokio::task::yield_now().await;
        self.0.create_blob(repo, content).await
    }

    async fn create_tree(
        &self,
        repo: &str,
        base: &str,
        entries: &[TreeEntry],
    ) -> Result<String, ForgeError> {
        tokio::task::yield_now().await;
        self.0.create_tree(repo, base, entries).await
    }

    async fn create_commit(
        &self,
        repo: &str,
        request: CreateCommitRequest,
    ) -> Result<String, ForgeError> {
        tokio::task::yield_now().await;
        self.0.create_commit(repo, request).await
    }

    async fn update_ref(
        &self,
        repo: &str,
        branch: &str,
        revision: &str,
        force: bool,
    ) -> Result<(), ForgeError> {
        tokio::task::yield_now().await;
        self.0.update_ref(repo, branch, revision, force).await
    }
}
