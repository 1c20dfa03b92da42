//! forge::github
//!
//! GitHub object store using the REST git data API.
//!
//! # Design
//!
//! This module implements the `ObjectStore` trait for GitHub:
//! - `git/ref`, `git/refs` for reading and moving branch heads
//! - `git/commits`, `git/trees`, `git/blobs` for object creation
//! - `contents` for the path existence check
//!
//! Blob content is always uploaded base64-encoded so binary files survive.
//!
//! # Error Mapping
//!
//! HTTP failures are classified once, here, into [`ForgeError`]:
//! - 401 → `AuthFailed`
//! - 403 → `RateLimited` when the rate-limit budget is exhausted, else `AuthFailed`
//! - 404 → `NotFound`
//! - 409, and 422 "not a fast forward" on ref updates → `Conflict`
//! - 429 → `RateLimited`
//!
//! # Rate Limiting
//!
//! No automatic retry. Callers that want retries build a fresh batch.
//!
//! # Example
//!
//! ```ignore
//! use ghbatch::forge::github::{parse_github_url, GitHubObjectStore};
//!
//! let repo = parse_github_url("git@github.com:octocat/hello-world.git").unwrap();
//! let store = GitHubObjectStore::new(token);
//! let head = store.get_ref(&repo, &BranchName::new("main")?).await?;
//! ```

use async_trait::async_trait;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};

use super::traits::{CreateCommitRequest, ForgeError, ObjectStore, TreeEntry};
use crate::core::config::{Config, DEFAULT_API_BASE, USER_AGENT_VALUE};
use crate::core::types::{Author, BranchName, Oid, RepoId};

/// GitHub object store.
pub struct GitHubObjectStore {
    /// HTTP client for making requests
    client: Client,
    /// Bearer token
    token: String,
    /// API base URL (configurable for GitHub Enterprise)
    api_base: String,
    /// User-Agent header value
    user_agent: String,
}

// Custom Debug to avoid exposing the token
impl std::fmt::Debug for GitHubObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubObjectStore")
            .field("has_token", &!self.token.is_empty())
            .field("api_base", &self.api_base)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl GitHubObjectStore {
    /// Create a store against `api.github.com`.
    ///
    /// # Arguments
    ///
    /// * `token` - Personal access token or GitHub App token
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_api_base(token, DEFAULT_API_BASE)
    }

    /// Create a store against a custom API base URL.
    ///
    /// Use this for GitHub Enterprise installations
    /// (e.g., `https://github.example.com/api/v3`).
    pub fn with_api_base(token: impl Into<String>, api_base: impl Into<String>) -> Self {
        let api_base: String = api_base.into();
        Self {
            client: Client::new(),
            token: token.into(),
            api_base: api_base.trim_end_matches('/').to_string(),
            user_agent: USER_AGENT_VALUE.to_string(),
        }
    }

    /// Create a store using the API base and User-Agent from configuration.
    pub fn from_config(config: &Config, token: impl Into<String>) -> Self {
        let mut store = Self::with_api_base(token, config.api_base());
        store.user_agent = config.user_agent().to_string();
        store
    }

    /// Create a store for a GitHub remote URL, returning the parsed repository.
    ///
    /// Returns `None` if the URL is not a recognized GitHub remote.
    ///
    /// # Example
    ///
    /// ```
    /// use ghbatch::forge::GitHubObjectStore;
    ///
    /// let (store, repo) =
    ///     GitHubObjectStore::from_remote_url("git@github.com:owner/repo.git", "token").unwrap();
    /// assert_eq!(repo.to_string(), "owner/repo");
    /// assert_eq!(store.api_base(), "https://api.github.com");
    ///
    /// assert!(GitHubObjectStore::from_remote_url("https://gitlab.com/a/b", "token").is_none());
    /// ```
    pub fn from_remote_url(url: &str, token: impl Into<String>) -> Option<(Self, RepoId)> {
        let repo = parse_github_url(url)?;
        Some((Self::new(token), repo))
    }

    /// Get the API base URL.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Build common headers for API requests.
    fn headers(&self) -> Result<HeaderMap, ForgeError> {
        if self.token.is_empty() {
            return Err(ForgeError::AuthRequired);
        }

        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.token)).map_err(|_| {
            ForgeError::AuthFailed("token contains invalid header characters".into())
        })?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        let agent = HeaderValue::from_str(&self.user_agent)
            .unwrap_or_else(|_| HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(USER_AGENT, agent);
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        Ok(headers)
    }

    /// Build URL for a repository endpoint.
    fn repo_url(&self, repo: &RepoId, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_base, repo.owner, repo.repo, path
        )
    }

    /// Build the `contents/<path>` URL with each path segment escaped.
    fn contents_url(&self, repo: &RepoId, path: &str) -> Result<Url, ForgeError> {
        let mut url = Url::parse(&self.repo_url(repo, "contents"))
            .map_err(|e| ForgeError::NetworkError(format!("invalid API URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ForgeError::NetworkError("API base cannot carry a path".into()))?
            .extend(path.split('/'));
        Ok(url)
    }

    /// Attach headers and send, mapping transport failures.
    async fn send(&self, request: RequestBuilder) -> Result<Response, ForgeError> {
        request
            .headers(self.headers()?)
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))
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
            Err(error_from_response(response).await)
        }
    }
}

/// Classify an unsuccessful response.
async fn error_from_response(response: Response) -> ForgeError {
    let status = response.status();

    // Extract headers before consuming the body.
    let headers = response.headers();
    let rate_limit_exhausted = headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "0");
    let required_permissions = headers
        .get("X-Accepted-GitHub-Permissions")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let message = match response.json::<GitHubErrorResponse>().await {
        Ok(err) => err.message,
        Err(_) => "Unknown error".to_string(),
    };

    match status {
        StatusCode::UNAUTHORIZED => ForgeError::AuthFailed("Invalid or expired token".into()),
        StatusCode::FORBIDDEN if rate_limit_exhausted => ForgeError::RateLimited,
        StatusCode::FORBIDDEN => {
            let mut err_msg = format!("Permission denied: {}", message);
            if let Some(perms) = required_permissions.filter(|p| !p.is_empty()) {
                err_msg.push_str(&format!(" [required: {}]", perms));
            }
            ForgeError::AuthFailed(err_msg)
        }
        StatusCode::NOT_FOUND => ForgeError::NotFound(message),
        StatusCode::CONFLICT => ForgeError::Conflict(message),
        StatusCode::TOO_MANY_REQUESTS => ForgeError::RateLimited,
        _ if status.is_server_error() => ForgeError::ApiError {
            status: status.as_u16(),
            message: format!("GitHub server error: {}", message),
        },
        _ => ForgeError::ApiError {
            status: status.as_u16(),
            message,
        },
    }
}

/// Reclassify a 422 from a ref update that GitHub rejected as non-fast-forward.
fn classify_ref_update_error(err: ForgeError) -> ForgeError {
    match err {
        ForgeError::ApiError { status: 422, message }
            if message.to_ascii_lowercase().contains("fast forward") =>
        {
            ForgeError::Conflict(message)
        }
        other => other,
    }
}

#[async_trait]
impl ObjectStore for GitHubObjectStore {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn get_ref(&self, repo: &RepoId, branch: &BranchName) -> Result<Oid, ForgeError> {
        let url = self.repo_url(repo, &format!("git/ref/heads/{}", branch));
        tracing::debug!(%repo, %branch, "GET ref");

        let response = self.send(self.client.get(&url)).await?;
        let git_ref: GitHubRef = self.handle_response(response).await?;
        Ok(git_ref.object.sha)
    }

    async fn get_commit(&self, repo: &RepoId, commit: &Oid) -> Result<Oid, ForgeError> {
        let url = self.repo_url(repo, &format!("git/commits/{}", commit));
        tracing::debug!(%repo, commit = commit.short(7), "GET commit");

        let response = self.send(self.client.get(&url)).await?;
        let commit: GitHubCommit = self.handle_response(response).await?;
        Ok(commit.tree.sha)
    }

    async fn create_blob(&self, repo: &RepoId, content: &[u8]) -> Result<Oid, ForgeError> {
        let url = self.repo_url(repo, "git/blobs");
        tracing::debug!(%repo, bytes = content.len(), "POST blob");

        let body = CreateBlobBody {
            content: base64::engine::general_purpose::STANDARD.encode(content),
            encoding: "base64",
        };
        let response = self.send(self.client.post(&url).json(&body)).await?;
        let created: GitHubSha = self.handle_response(response).await?;
        Ok(created.sha)
    }

    async fn create_tree(
        &self,
        repo: &RepoId,
        base_tree: &Oid,
        entries: &[TreeEntry],
    ) -> Result<Oid, ForgeError> {
        let url = self.repo_url(repo, "git/trees");
        tracing::debug!(%repo, entries = entries.len(), "POST tree");

        let body = CreateTreeBody {
            base_tree: base_tree.as_str(),
            tree: entries
                .iter()
                .map(|entry| GitHubTreeEntry {
                    path: &entry.path,
                    mode: entry.mode,
                    // Removals stay blob-typed even when the path is a directory
                    kind: "blob",
                    sha: entry.sha.as_ref().map(Oid::as_str),
                })
                .collect(),
        };
        let response = self.send(self.client.post(&url).json(&body)).await?;
        let created: GitHubSha = self.handle_response(response).await?;
        Ok(created.sha)
    }

    async fn create_commit(
        &self,
        repo: &RepoId,
        request: CreateCommitRequest,
    ) -> Result<Oid, ForgeError> {
        let url = self.repo_url(repo, "git/commits");
        tracing::debug!(%repo, tree = request.tree.short(7), "POST commit");

        let body = CreateCommitBody {
            message: &request.message,
            tree: request.tree.as_str(),
            parents: request.parents.iter().map(Oid::as_str).collect(),
            author: request.author.as_ref(),
        };
        let response = self.send(self.client.post(&url).json(&body)).await?;
        let created: GitHubSha = self.handle_response(response).await?;
        Ok(created.sha)
    }

    async fn update_ref(
        &self,
        repo: &RepoId,
        branch: &BranchName,
        commit: &Oid,
        force: bool,
    ) -> Result<(), ForgeError> {
        let url = self.repo_url(repo, &format!("git/refs/heads/{}", branch));
        tracing::debug!(%repo, %branch, commit = commit.short(7), force, "PATCH ref");

        let body = UpdateRefBody {
            sha: commit.as_str(),
            force,
        };
        let response = self.send(self.client.patch(&url).json(&body)).await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(classify_ref_update_error(
                error_from_response(response).await,
            ))
        }
    }

    async fn exists(
        &self,
        repo: &RepoId,
        path: &str,
        branch: &BranchName,
    ) -> Result<bool, ForgeError> {
        let url = self.contents_url(repo, path)?;
        tracing::debug!(%repo, %branch, path, "GET contents");

        let response = self
            .send(self.client.get(url).query(&[("ref", branch.as_str())]))
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(true);
        }
        match error_from_response(response).await {
            ForgeError::NotFound(_) => Ok(false),
            other => Err(other),
        }
    }
}

// --------------------------------------------------------------------------
// API Request/Response Types
// --------------------------------------------------------------------------

/// Request body for creating a blob.
#[derive(Serialize)]
struct CreateBlobBody {
    content: String,
    encoding: &'static str,
}

/// Request body for creating a tree.
#[derive(Serialize)]
struct CreateTreeBody<'a> {
    base_tree: &'a str,
    tree: Vec<GitHubTreeEntry<'a>>,
}

/// Tree entry format. A null `sha` deletes the path.
#[derive(Serialize)]
struct GitHubTreeEntry<'a> {
    path: &'a str,
    mode: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    sha: Option<&'a str>,
}

/// Request body for creating a commit.
#[derive(Serialize)]
struct CreateCommitBody<'a> {
    message: &'a str,
    tree: &'a str,
    parents: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    author: Option<&'a Author>,
}

/// Request body for updating a ref.
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

/// Any response carrying a top-level `sha`.
#[derive(Deserialize)]
struct GitHubSha {
    sha: Oid,
}

/// `git/ref` response format.
#[derive(Deserialize)]
struct GitHubRef {
    object: GitHubSha,
}

/// `git/commits/<sha>` response format.
#[derive(Deserialize)]
struct GitHubCommit {
    tree: GitHubSha,
}

// --------------------------------------------------------------------------
// URL Parsing
// --------------------------------------------------------------------------

/// Parse a GitHub remote URL to extract owner and repo.
///
/// Supports both SSH and HTTPS formats:
/// - `git@github.com:owner/repo.git`
/// - `https://github.com/owner/repo.git`
/// - `https://github.com/owner/repo`
///
/// # Example
///
/// ```
/// use ghbatch::forge::github::parse_github_url;
///
/// let repo = parse_github_url("git@github.com:octocat/hello-world.git").unwrap();
/// assert_eq!(repo.owner, "octocat");
/// assert_eq!(repo.repo, "hello-world");
/// ```
pub fn parse_github_url(url: &str) -> Option<RepoId> {
    let rest = url
        .strip_prefix("git@github.com:")
        .or_else(|| url.strip_prefix("https://github.com/"))
        .or_else(|| url.strip_prefix("http://github.com/"))?;
    let rest = rest.strip_suffix(".git").unwrap_or(rest);

    let (owner, repo) = rest.split_once('/')?;
    if owner.is_empty() || repo.is_empty() {
        return None;
    }
    Some(RepoId::new(owner, repo))
}
