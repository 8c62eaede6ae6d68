//! forge::github
//!
//! GitHub implementation of [`RemoteRepository`] over the REST API.
//!
//! # Design
//!
//! Single-file writes go through the contents API, whose `sha` field is the
//! revision marker: GitHub rejects a `PUT` whose `sha` is stale with `409`.
//! Multi-file publishes go through the Git data API (blobs, trees, commits,
//! refs).
//!
//! Every request carries the client-wide timeout. A request that exceeds it
//! fails with `ForgeError::Timeout`; whatever GitHub already applied stays
//! applied.
//!
//! # Rate Limiting
//!
//! `429` and rate-limit `403`s map to `ForgeError::RateLimited`. Retrying is
//! the caller's responsibility.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use repobump::forge::github::GitHubClient;
//! use repobump::forge::RemoteRepository;
//!
//! let client = GitHubClient::new(token, "https://api.github.com", Duration::from_secs(30))?;
//! let head = client.get_branch_head("octocat/hello-world", "main").await?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::{
    CreateCommitRequest, CreatePrRequest, ForgeError, RemoteRepository, UpdateFileRequest,
};
use crate::core::types::{split_full_name, FileSnapshot, ObjectKind, PullRequest, TreeEntry};

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = concat!("repobump/", env!("CARGO_PKG_VERSION"));

/// GitHub client for one token and API base.
///
/// Not bound to a repository; every call names its `owner/repo`.
pub struct GitHubClient {
    /// HTTP client carrying the per-request timeout
    client: Client,
    /// Personal access token or app token
    token: String,
    /// API base URL (configurable for GitHub Enterprise)
    api_base: String,
    /// `api_base` parsed, for building percent-encoded request URLs
    base_url: Url,
}

// Custom Debug to avoid exposing the token
impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("token", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl GitHubClient {
    /// Create a client.
    ///
    /// # Arguments
    ///
    /// * `token` - Access token sent as a bearer token
    /// * `api_base` - API base URL, e.g. `https://github.example.com/api/v3`
    /// * `timeout` - Deadline applied to every request
    ///
    /// # Errors
    ///
    /// - `AuthRequired` if `token` is blank
    /// - `NetworkError` if `api_base` is not an http(s) URL or the HTTP
    ///   client cannot be built
    pub fn new(
        token: impl Into<String>,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ForgeError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(ForgeError::AuthRequired);
        }

        let api_base = api_base.into().trim_end_matches('/').to_string();
        let base_url = Url::parse(&api_base)
            .ok()
            .filter(|url| matches!(url.scheme(), "http" | "https"))
            .ok_or_else(|| ForgeError::NetworkError(format!("invalid API base '{}'", api_base)))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ForgeError::NetworkError(e.to_string()))?;
        Ok(Self {
            client,
            token,
            api_base,
            base_url,
        })
    }

    /// The API base URL.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Build common headers for API requests.
    fn headers(&self) -> Result<HeaderMap, ForgeError> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|_| ForgeError::AuthFailed("token is not a valid header value".into()))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        Ok(headers)
    }

    /// Build URL for a repository endpoint.
    ///
    /// Each segment is percent-encoded on its own, so `#`, `?` and `%` in a
    /// file path or branch name stay part of the path.
    fn repo_url<'a>(
        &self,
        repo: &str,
        segments: impl IntoIterator<Item = &'a str>,
    ) -> Result<Url, ForgeError> {
        let (owner, name) =
            split_full_name(repo).map_err(|_| ForgeError::InvalidRepository(repo.to_string()))?;
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ForgeError::NetworkError(format!("invalid API base '{}'", self.api_base)))?
            .pop_if_empty()
            .extend(["repos", owner, name])
            .extend(segments);
        Ok(url)
    }

    /// Attach headers and send, mapping transport failures.
    async fn send(&self, request: RequestBuilder) -> Result<Response, ForgeError> {
        request
            .headers(self.headers()?)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ForgeError::Timeout(e.to_string())
                } else {
                    ForgeError::NetworkError(e.to_string())
                }
            })
    }

    /// Handle API response, mapping errors appropriately.
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: Response,
    ) -> Result<T, ForgeError> {
        let status = response.status();

        if status.is_success() {
            response.json().await.map_err(|e| ForgeError::ApiError {
                status: status.as_u16(),
                message: format!("Failed to parse response: {}", e),
            })
        } else {
            self.handle_error_response(response, status).await
        }
    }

    /// Handle a response whose body is not needed.
    async fn handle_empty_response(&self, response: Response) -> Result<(), ForgeError> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            self.handle_error_response(response, status).await
        }
    }

    /// Handle an error response from the API.
    async fn handle_error_response<T>(
        &self,
        response: Response,
        status: StatusCode,
    ) -> Result<T, ForgeError> {
        let message = match response.json::<GitHubErrorResponse>().await {
            Ok(err) => err.message,
            Err(_) => "Unknown error".to_string(),
        };

        Err(match status {
            StatusCode::UNAUTHORIZED => ForgeError::AuthFailed("Invalid or expired token".into()),
            StatusCode::FORBIDDEN if message.to_lowercase().contains("rate limit") => {
                ForgeError::RateLimited
            }
            StatusCode::FORBIDDEN => {
                ForgeError::AuthFailed(format!("Permission denied: {}", message))
            }
            StatusCode::NOT_FOUND => ForgeError::NotFound(message),
            StatusCode::CONFLICT => ForgeError::Conflict(message),
            StatusCode::UNPROCESSABLE_ENTITY => classify_unprocessable(message),
            StatusCode::TOO_MANY_REQUESTS => ForgeError::RateLimited,
            _ if status.is_server_error() => ForgeError::ApiError {
                status: status.as_u16(),
                message: format!("GitHub server error: {}", message),
            },
            _ => ForgeError::ApiError {
                status: status.as_u16(),
                message,
            },
        })
    }
}

/// GitHub reports several distinct conditions as `422`.
fn classify_unprocessable(message: String) -> ForgeError {
    let lower = message.to_lowercase();
    if lower.contains("already exists") {
        ForgeError::AlreadyExists(message)
    } else if lower.contains("does not match") || lower.contains("not a fast forward") {
        ForgeError::Conflict(message)
    } else {
        ForgeError::ApiError {
            status: 422,
            message,
        }
    }
}

/// `prefix` followed by the `/`-separated parts of `rest`.
fn segments<'a>(prefix: &[&'a str], rest: &'a str) -> Vec<&'a str> {
    prefix.iter().copied().chain(rest.split('/')).collect()
}

fn object_type(kind: ObjectKind) -> &'static str {
    match kind {
        ObjectKind::Blob => "blob",
        ObjectKind::Tree => "tree",
    }
}

#[async_trait]
impl RemoteRepository for GitHubClient {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn get_file(
        &self,
        repo: &str,
        branch: &str,
        path: &str,
    ) -> Result<FileSnapshot, ForgeError> {
        let url = self.repo_url(repo, segments(&["contents"], path))?;
        debug!(%url, branch, "get file");

        let response = self
            .send(self.client.get(url).query(&[("ref", branch)]))
            .await?;
        let contents: GitHubContents = self.handle_response(response).await?;

        if contents.kind != "file" {
            return Err(ForgeError::ApiError {
                status: 200,
                message: format!("{} is a {}, not a file", path, contents.kind),
            });
        }
        if contents.encoding != "base64" {
            return Err(ForgeError::ApiError {
                status: 200,
                message: format!(
                    "{} has unsupported content encoding '{}'",
                    path, contents.encoding
                ),
            });
        }

        // The API wraps base64 at 60 columns.
        let packed: String = contents
            .content
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        let data = BASE64.decode(packed).map_err(|e| ForgeError::ApiError {
            status: 200,
            message: format!("Failed to decode content of {}: {}", path, e),
        })?;

        Ok(FileSnapshot {
            data,
            revision: contents.sha,
        })
    }

    async fn get_branch_head(&self, repo: &str, branch: &str) -> Result<String, ForgeError> {
        let url = self.repo_url(repo, segments(&["git", "ref", "heads"], branch))?;

        let response = self.send(self.client.get(url)).await?;
        let git_ref: GitHubRef = self.handle_response(response).await?;
        Ok(git_ref.object.sha)
    }

    async fn create_branch(
        &self,
        repo: &str,
        name: &str,
        from_revision: &str,
    ) -> Result<(), ForgeError> {
        let url = self.repo_url(repo, ["git", "refs"])?;
        let ref_name = format!("refs/heads/{}", name);
        let body = CreateRefBody {
            ref_name: &ref_name,
            sha: from_revision,
        };

        let response = self.send(self.client.post(url).json(&body)).await?;
        self.handle_empty_response(response).await
    }

    async fn update_file(&self, repo: &str, request: UpdateFileRequest) -> Result<(), ForgeError> {
        let url = self.repo_url(repo, segments(&["contents"], &request.path))?;
        let content = BASE64.encode(&request.content);
        let body = UpdateContentsBody {
            message: &request.message,
            content: &content,
            sha: &request.expected_revision,
            branch: &request.branch,
        };

        let response = self.send(self.client.put(url).json(&body)).await?;
        self.handle_empty_response(response).await
    }

    async fn create_pull_request(
        &self,
        repo: &str,
        request: CreatePrRequest,
    ) -> Result<PullRequest, ForgeError> {
        let url = self.repo_url(repo, ["pulls"])?;
        let body = CreatePrBody {
            head: &request.head,
            base: &request.base,
            title: &request.title,
            body: &request.body,
        };

        let response = self.send(self.client.post(url).json(&body)).await?;
        let pr: GitHubPullRequest = self.handle_response(response).await?;
        Ok(pr.into())
    }

    async fn create_blob(&self, repo: &str, content: &[u8]) -> Result<String, ForgeError> {
        let url = self.repo_url(repo, ["git", "blobs"])?;
        let encoded = BASE64.encode(content);
        let body = CreateBlobBody {
            content: &encoded,
            encoding: "base64",
        };

        let response = self.send(self.client.post(url).json(&body)).await?;
        let created: GitHubObject = self.handle_response(response).await?;
        Ok(created.sha)
    }

    async fn create_tree(
        &self,
        repo: &str,
        base: &str,
        entries: &[TreeEntry],
    ) -> Result<String, ForgeError> {
        let url = self.repo_url(repo, ["git", "trees"])?;
        let body = CreateTreeBody {
            base_tree: base,
            tree: entries
                .iter()
                .map(|entry| TreeEntryBody {
                    path: &entry.path,
                    mode: entry.mode.as_str(),
                    kind: object_type(entry.kind),
                    sha: &entry.revision,
                })
                .collect(),
        };

        let response = self.send(self.client.post(url).json(&body)).await?;
        let created: GitHubObject = self.handle_response(response).await?;
        Ok(created.sha)
    }

    async fn create_commit(
        &self,
        repo: &str,
        request: CreateCommitRequest,
    ) -> Result<String, ForgeError> {
        let url = self.repo_url(repo, ["git", "commits"])?;
        let body = CreateCommitBody {
            message: &request.message,
            tree: &request.tree,
            parents: [&request.parent],
        };

        let response = self.send(self.client.post(url).json(&body)).await?;
        let created: GitHubObject = self.handle_response(response).await?;
        Ok(created.sha)
    }

    async fn update_ref(
        &self,
        repo: &str,
        branch: &str,
        revision: &str,
        force: bool,
    ) -> Result<(), ForgeError> {
        let url = self.repo_url(repo, segments(&["git", "refs", "heads"], branch))?;
        let body = UpdateRefBody {
            sha: revision,
            force,
        };

        let response = self.send(self.client.patch(url).json(&body)).await?;
        self.handle_empty_response(response).await
    }
}

// --------------------------------------------------------------------------
// API Request/Response Types
// --------------------------------------------------------------------------

/// Request body for creating a ref.
#[derive(Serialize)]
struct CreateRefBody<'a> {
    #[serde(rename = "ref")]
    ref_name: &'a str,
    sha: &'a str,
}

/// Request body for writing a file through the contents API.
#[derive(Serialize)]
struct UpdateContentsBody<'a> {
    message: &'a str,
    content: &'a str,
    sha: &'a str,
    branch: &'a str,
}

/// Request body for creating a PR.
#[derive(Serialize)]
struct CreatePrBody<'a> {
    head: &'a str,
    base: &'a str,
    title: &'a str,
    body: &'a str,
}

/// Request body for creating a blob.
#[derive(Serialize)]
struct CreateBlobBody<'a> {
    content: &'a str,
    encoding: &'a str,
}

/// Request body for creating a tree.
#[derive(Serialize)]
struct CreateTreeBody<'a> {
    base_tree: &'a str,
    tree: Vec<TreeEntryBody<'a>>,
}

#[derive(Serialize)]
struct TreeEntryBody<'a> {
    path: &'a str,
    mode: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    sha: &'a str,
}

/// Request body for creating a commit.
#[derive(Serialize)]
struct CreateCommitBody<'a> {
    message: &'a str,
    tree: &'a str,
    parents: [&'a str; 1],
}

/// Request body for moving a ref.
#[derive(Serialize)]
struct UpdateRefBody<'a> {
    sha: &'a str,
    force: bool,
}

/// GitHub error response format.
#[derive(Deserialize)]
struct GitHubErrorResponse {
    message: String,
}

/// Contents API response for a single file.
#[derive(Deserialize)]
struct GitHubContents {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    encoding: String,
    #[serde(default)]
    content: String,
    sha: String,
}

/// Any response carrying the SHA of a created object.
#[derive(Deserialize)]
struct GitHubObject {
    sha: String,
}

/// Git ref response format.
#[derive(Deserialize)]
struct GitHubRef {
    object: GitHubObject,
}

/// GitHub PR response format.
#[derive(Deserialize)]
struct GitHubPullRequest {
    number: u64,
    html_url: String,
    head: GitHubBranchRef,
    base: GitHubBranchRef,
    title: String,
}

/// GitHub ref (head/base) format.
#[derive(Deserialize)]
struct GitHubBranchRef {
    #[serde(rename = "ref")]
    ref_name: String,
}

impl From<GitHubPullRequest> for PullRequest {
    fn from(pr: GitHubPullRequest) -> Self {
        PullRequest {
            number: pr.number,
            url: pr.html_url,
            head: pr.head.ref_name,
            base: pr.base.ref_name,
            title: pr.title,
        }
    }
}
