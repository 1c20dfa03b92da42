//! batch
//!
//! Atomic multi-file commits built from git objects.
//!
//! # Overview
//!
//! A [`Batch`] queues file writes and deletes against one branch and applies
//! them as a single commit:
//!
//! 1. read the branch head and its tree
//! 2. upload a blob per write, check existence per delete
//! 3. create one tree on top of the base tree
//! 4. create one commit whose only parent is the head read in step 1
//! 5. move the branch with a non-force ref update
//!
//! Objects created in steps 2-4 are invisible until step 5 references them,
//! so the branch either moves to the complete new snapshot or not at all.
//! When another writer moved the branch in the meantime, step 5 fails with a
//! conflict and the batch's objects are simply left unreferenced.
//!
//! # Lifecycle
//!
//! A batch is single-use. The first call to [`Batch::commit`] consumes it,
//! whether that call succeeds, fails, or finds nothing to do. Afterwards every
//! mutation and any further commit fails with [`BatchError::AlreadyCommitted`].
//! To retry, build a fresh batch; it will read a fresh head.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ghbatch::batch::{Batch, BatchOptions};
//! use ghbatch::core::types::{BranchName, RepoId};
//! use ghbatch::forge::mock::MockObjectStore;
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio_test::block_on(async {
//! let store = MockObjectStore::new().with_branch("main", &[("old.txt", "bye")]);
//! let cancel = CancellationToken::new();
//!
//! let batch = Batch::new(
//!     Arc::new(store.clone()),
//!     RepoId::new("owner", "repo"),
//!     BranchName::new("main").unwrap(),
//!     BatchOptions::default().with_message("Update docs"),
//!     &cancel,
//! )
//! .unwrap();
//!
//! batch.write("docs/guide.md", "# Guide\n").await.unwrap();
//! batch.delete("old.txt").await.unwrap();
//!
//! let commit = batch.commit(&cancel).await.unwrap();
//! assert_eq!(store.head_of("main"), commit);
//! assert!(store.file_at("main", "old.txt").is_none());
//! # });
//! ```

mod commit;
mod resolve;

pub use resolve::{collapse_operations, resolve_entries};

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::core::config::Config;
use crate::core::paths::{self, PathError};
use crate::core::types::{Author, BranchName, RepoId};
use crate::forge::{ForgeError, ObjectStore};

/// Commit message used when none is configured.
pub const DEFAULT_MESSAGE: &str = "Batch update via ghbatch";

/// Errors from batch operations.
#[derive(Debug, Error)]
pub enum BatchError {
    /// The path was rejected by validation.
    #[error(transparent)]
    Path(#[from] PathError),

    /// The path was empty (or normalized to the repository root).
    #[error("path cannot be empty")]
    EmptyPath,

    /// The batch was already committed (or a commit was attempted).
    #[error("batch already committed")]
    AlreadyCommitted,

    /// The cancellation token fired before any remote call.
    #[error("operation cancelled")]
    Cancelled,

    /// A step of the commit protocol failed.
    #[error("{step}: {source}")]
    Step {
        /// Where in the protocol the commit aborted
        step: CommitStep,
        /// Underlying object-store failure
        source: ForgeError,
    },
}

impl BatchError {
    /// The protocol step that failed, if this is a step failure.
    pub fn step(&self) -> Option<CommitStep> {
        match self {
            BatchError::Step { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// Whether the commit lost a ref-update race to another writer.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            BatchError::Step {
                step: CommitStep::UpdateRef,
                source,
            } if source.is_conflict()
        )
    }
}

/// Steps of the commit protocol, used to tag failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStep {
    /// Reading the branch head
    GetRef,
    /// Reading the head commit's tree
    GetCommit,
    /// Uploading file content
    CreateBlob,
    /// Checking whether a deleted path exists
    CheckFileExists,
    /// Building the new tree
    CreateTree,
    /// Building the new commit
    CreateCommit,
    /// Moving the branch
    UpdateRef,
}

impl CommitStep {
    /// Human-readable step tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitStep::GetRef => "get ref",
            CommitStep::GetCommit => "get commit",
            CommitStep::CreateBlob => "create blob",
            CommitStep::CheckFileExists => "check file exists",
            CommitStep::CreateTree => "create tree",
            CommitStep::CreateCommit => "create commit",
            CommitStep::UpdateRef => "update ref",
        }
    }
}

impl std::fmt::Display for CommitStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a queued operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Write,
    Delete,
}

/// A queued file operation. Paths are always normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOperation {
    /// Add or replace a file.
    Write { path: String, content: Vec<u8> },
    /// Remove a file if it exists.
    Delete { path: String },
}

impl BatchOperation {
    /// The operation's normalized path.
    pub fn path(&self) -> &str {
        match self {
            BatchOperation::Write { path, .. } | BatchOperation::Delete { path } => path,
        }
    }

    /// The operation's kind.
    pub fn kind(&self) -> OperationKind {
        match self {
            BatchOperation::Write { .. } => OperationKind::Write,
            BatchOperation::Delete { .. } => OperationKind::Delete,
        }
    }
}

/// Options applied when a batch is created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOptions {
    /// Commit message; [`DEFAULT_MESSAGE`] when `None` or empty
    pub message: Option<String>,
    /// Author override; the authenticated identity when `None`
    pub author: Option<Author>,
}

impl BatchOptions {
    /// Set the commit message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Set the author override.
    pub fn with_author(mut self, author: Author) -> Self {
        self.author = Some(author);
        self
    }

    /// Options carrying the configured message and author defaults.
    pub fn from_config(config: &Config) -> Self {
        Self {
            message: config.commit_message().map(str::to_string),
            author: config.author(),
        }
    }
}

/// Mutable state guarded by the batch lock.
#[derive(Debug, Default)]
struct BatchState {
    operations: Vec<BatchOperation>,
    committed: bool,
}

/// A single-use queue of file operations applied as one commit.
///
/// All methods take `&self`; the batch can be shared across tasks
/// (e.g., behind an `Arc`). One lock guards both the queue and the committed
/// flag, and [`commit`](Batch::commit) holds it for the whole remote sequence.
pub struct Batch {
    store: Arc<dyn ObjectStore>,
    repo: RepoId,
    branch: BranchName,
    message: String,
    author: Option<Author>,
    state: Mutex<BatchState>,
}

impl std::fmt::Debug for Batch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batch")
            .field("store", &self.store.name())
            .field("repo", &self.repo)
            .field("branch", &self.branch)
            .field("message", &self.message)
            .field("author", &self.author)
            .finish_non_exhaustive()
    }
}

impl Batch {
    /// Create an empty batch targeting `branch` of `repo`.
    ///
    /// No remote call is made.
    ///
    /// # Errors
    ///
    /// Returns `BatchError::Cancelled` if `cancel` has already fired.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        repo: RepoId,
        branch: BranchName,
        options: BatchOptions,
        cancel: &CancellationToken,
    ) -> Result<Self, BatchError> {
        if cancel.is_cancelled() {
            return Err(BatchError::Cancelled);
        }

        let message = options
            .message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MESSAGE.to_string());

        Ok(Self {
            store,
            repo,
            branch,
            message,
            author: options.author,
            state: Mutex::new(BatchState::default()),
        })
    }

    /// Queue a write of `content` to `path`.
    ///
    /// # Errors
    ///
    /// - `Path` if the path fails validation (queue unchanged)
    /// - `EmptyPath` if the path normalizes to the repository root
    /// - `AlreadyCommitted` if the batch was consumed
    pub async fn write(
        &self,
        path: &str,
        content: impl Into<Vec<u8>>,
    ) -> Result<(), BatchError> {
        let path = target_path(path)?;
        self.push(BatchOperation::Write {
            path,
            content: content.into(),
        })
        .await
    }

    /// Queue removal of `path`.
    ///
    /// Deleting a path that does not exist on the branch is a no-op at
    /// commit time.
    ///
    /// # Errors
    ///
    /// Same as [`write`](Batch::write).
    pub async fn delete(&self, path: &str) -> Result<(), BatchError> {
        let path = target_path(path)?;
        self.push(BatchOperation::Delete { path }).await
    }

    async fn push(&self, operation: BatchOperation) -> Result<(), BatchError> {
        let mut state = self.state.lock().await;
        if state.committed {
            return Err(BatchError::AlreadyCommitted);
        }
        tracing::trace!(
            kind = ?operation.kind(),
            path = operation.path(),
            "queued operation"
        );
        state.operations.push(operation);
        Ok(())
    }

    /// A copy of the queued operations, in queue order.
    pub async fn operations(&self) -> Vec<BatchOperation> {
        self.state.lock().await.operations.clone()
    }

    /// Number of queued operations.
    pub async fn len(&self) -> usize {
        self.state.lock().await.operations.len()
    }

    /// Whether no operations are queued.
    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.operations.is_empty()
    }

    /// Whether the batch has been consumed by a commit attempt.
    pub async fn is_committed(&self) -> bool {
        self.state.lock().await.committed
    }

    /// Target repository.
    pub fn repo(&self) -> &RepoId {
        &self.repo
    }

    /// Target branch.
    pub fn branch(&self) -> &BranchName {
        &self.branch
    }

    /// Commit message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Author override, if any.
    pub fn author(&self) -> Option<&Author> {
        self.author.as_ref()
    }
}

/// Clean a Write/Delete target, rejecting the repository root.
fn target_path(path: &str) -> Result<String, BatchError> {
    let cleaned = paths::clean(path)?;
    if cleaned.is_empty() {
        return Err(BatchError::EmptyPath);
    }
    Ok(cleaned)
}
