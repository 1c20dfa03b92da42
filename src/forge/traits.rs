//! forge::traits
//!
//! The object-store capability consumed by the commit engine.
//!
//! # Design
//!
//! The `ObjectStore` trait is async because every operation is a remote
//! call. It exposes exactly the seven operations the commit protocol needs:
//! reading a ref and a commit, creating blobs, trees, and commits, moving a
//! ref, and checking whether a path exists on a branch.
//!
//! Creating objects has no visible effect on any branch. Only
//! [`ObjectStore::update_ref`] mutates visible state, and a non-force update
//! must fail with [`ForgeError::Conflict`] when the branch has moved.
//!
//! # Example
//!
//! ```ignore
//! use ghbatch::forge::{ObjectStore, TreeEntry, CreateCommitRequest};
//!
//! async fn touch(store: &dyn ObjectStore, repo: &RepoId, branch: &BranchName) -> Result<(), ForgeError> {
//!     let head = store.get_ref(repo, branch).await?;
//!     let base_tree = store.get_commit(repo, &head).await?;
//!     let blob = store.create_blob(repo, b"hello\n").await?;
//!     let tree = store
//!         .create_tree(repo, &base_tree, &[TreeEntry::upsert("hello.txt", blob)])
//!         .await?;
//!     let commit = store
//!         .create_commit(repo, CreateCommitRequest {
//!             tree,
//!             parents: vec![head],
//!             message: "Add hello".to_string(),
//!             author: None,
//!         })
//!         .await?;
//!     store.update_ref(repo, branch, &commit, false).await
//! }
//! ```

use async_trait::async_trait;
use thiserror::Error;

use crate::core::types::{Author, BranchName, Oid, RepoId};

/// File mode for regular (non-executable) blobs.
pub const MODE_FILE: &str = "100644";

/// Errors from object-store operations.
///
/// Transports translate their native failures into this classification once,
/// at the boundary. The commit engine treats it as an opaque cause.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ForgeError {
    /// Authentication is required but not available.
    #[error("authentication required")]
    AuthRequired,

    /// Authentication failed (invalid token, expired, insufficient permissions).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A non-force ref update lost a race with another writer.
    #[error("conflict: {0}")]
    Conflict(String),

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
}

impl ForgeError {
    /// Whether this error reports a lost ref-update race.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ForgeError::Conflict(_))
    }

    /// Whether this error reports a missing resource.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ForgeError::NotFound(_))
    }
}

/// One entry of a tree mutation relative to a base tree.
///
/// `sha: Some(_)` adds or replaces the file at `path`; `sha: None` removes it.
/// Paths not mentioned inherit from the base tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Repository-relative, normalized path
    pub path: String,
    /// Git file mode
    pub mode: &'static str,
    /// Blob id, or `None` to remove the path
    pub sha: Option<Oid>,
}

impl TreeEntry {
    /// An entry that adds or replaces `path` with the given blob.
    pub fn upsert(path: impl Into<String>, blob: Oid) -> Self {
        Self {
            path: path.into(),
            mode: MODE_FILE,
            sha: Some(blob),
        }
    }

    /// An entry that removes `path` from the base tree.
    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: MODE_FILE,
            sha: None,
        }
    }

    /// Whether this entry removes its path.
    pub fn is_removal(&self) -> bool {
        self.sha.is_none()
    }
}

/// Request to create a commit object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCommitRequest {
    /// Tree the commit snapshots
    pub tree: Oid,
    /// Parent commits (the batch engine always passes exactly one)
    pub parents: Vec<Oid>,
    /// Commit message
    pub message: String,
    /// Author override; the store's default identity is used when `None`
    pub author: Option<Author>,
}

/// The object-store capability for building commits remotely.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`: independent batches may share one
/// store and commit concurrently.
///
/// # Error Handling
///
/// All methods return `Result<T, ForgeError>`. Implementations do not retry;
/// rate limiting and transient failures surface to the caller.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Get the store name (e.g., "github").
    fn name(&self) -> &'static str;

    /// Resolve the commit a branch currently points at.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the branch doesn't exist
    async fn get_ref(&self, repo: &RepoId, branch: &BranchName) -> Result<Oid, ForgeError>;

    /// Resolve the tree of a commit.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the commit doesn't exist
    async fn get_commit(&self, repo: &RepoId, commit: &Oid) -> Result<Oid, ForgeError>;

    /// Store raw file content and return its blob id.
    async fn create_blob(&self, repo: &RepoId, content: &[u8]) -> Result<Oid, ForgeError>;

    /// Create a tree from `base_tree` with `entries` applied on top.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the base tree or a referenced blob doesn't exist
    async fn create_tree(
        &self,
        repo: &RepoId,
        base_tree: &Oid,
        entries: &[TreeEntry],
    ) -> Result<Oid, ForgeError>;

    /// Create a commit object. Does not move any ref.
    async fn create_commit(
        &self,
        repo: &RepoId,
        request: CreateCommitRequest,
    ) -> Result<Oid, ForgeError>;

    /// Point `branch` at `commit`.
    ///
    /// With `force == false` the update must be a fast-forward of the
    /// branch's current head.
    ///
    /// # Errors
    ///
    /// - `Conflict` if the branch moved and the update is not a fast-forward
    /// - `NotFound` if the branch or commit doesn't exist
    async fn update_ref(
        &self,
        repo: &RepoId,
        branch: &BranchName,
        commit: &Oid,
        force: bool,
    ) -> Result<(), ForgeError>;

    /// Check whether a file or directory exists at `path` on `branch`.
    ///
    /// A missing path is `Ok(false)`, never `Err(NotFound)`.
    async fn exists(
        &self,
        repo: &RepoId,
        path: &str,
        branch: &BranchName,
    ) -> Result<bool, ForgeError>;
}
