//! batch::commit
//!
//! The commit protocol: read head, build objects, move the ref once.

use tokio_util::sync::CancellationToken;

use super::resolve::resolve_entries;
use super::{Batch, BatchError, BatchOperation, CommitStep};
use crate::core::types::Oid;
use crate::forge::{CreateCommitRequest, ForgeError};

fn at(step: CommitStep) -> impl FnOnce(ForgeError) -> BatchError {
    move |source| BatchError::Step { step, source }
}

impl Batch {
    /// Apply every queued operation as a single commit.
    ///
    /// Returns the new commit id, or `Ok(None)` when nothing needed to
    /// change: either the queue was empty (no remote calls are made) or
    /// every operation was a delete of a missing path (the head is read but
    /// nothing is created).
    ///
    /// The batch is consumed by this call whatever the outcome. The lock is
    /// held for the whole sequence, so concurrent `write`/`delete` calls wait
    /// and then fail with `AlreadyCommitted`.
    ///
    /// # Errors
    ///
    /// - `AlreadyCommitted` if a commit was already attempted
    /// - `Cancelled` if `cancel` fired before the first remote call
    /// - `Step` tagged with the failing protocol step; a branch that moved
    ///   since the head was read fails at `UpdateRef` with a conflict
    ///   (see [`BatchError::is_conflict`])
    pub async fn commit(&self, cancel: &CancellationToken) -> Result<Option<Oid>, BatchError> {
        let mut state = self.state.lock().await;
        if state.committed {
            return Err(BatchError::AlreadyCommitted);
        }
        state.committed = true;

        if cancel.is_cancelled() {
            return Err(BatchError::Cancelled);
        }

        if state.operations.is_empty() {
            tracing::info!(repo = %self.repo, branch = %self.branch, "empty batch, nothing to commit");
            return Ok(None);
        }

        let result = self.apply(&state.operations).await;
        match &result {
            Ok(Some(commit)) => tracing::info!(
                repo = %self.repo,
                branch = %self.branch,
                commit = %commit.short(7),
                "committed batch"
            ),
            Ok(None) => tracing::info!(
                repo = %self.repo,
                branch = %self.branch,
                "no effective changes, branch unchanged"
            ),
            Err(err) if err.is_conflict() => tracing::warn!(
                repo = %self.repo,
                branch = %self.branch,
                "branch moved during commit: {}",
                err
            ),
            Err(err) => tracing::debug!(error = %err, "batch commit failed"),
        }
        result
    }

    async fn apply(&self, operations: &[BatchOperation]) -> Result<Option<Oid>, BatchError> {
        let store = self.store.as_ref();
        tracing::debug!(
            repo = %self.repo,
            branch = %self.branch,
            operations = operations.len(),
            store = store.name(),
            "committing batch"
        );

        let head = store
            .get_ref(&self.repo, &self.branch)
            .await
            .map_err(at(CommitStep::GetRef))?;
        let base_tree = store
            .get_commit(&self.repo, &head)
            .await
            .map_err(at(CommitStep::GetCommit))?;
        tracing::debug!(head = %head.short(7), base_tree = %base_tree.short(7), "read branch head");

        let entries = resolve_entries(store, &self.repo, &self.branch, operations).await?;
        if entries.is_empty() {
            return Ok(None);
        }

        let tree = store
            .create_tree(&self.repo, &base_tree, &entries)
            .await
            .map_err(at(CommitStep::CreateTree))?;
        tracing::debug!(tree = %tree.short(7), entries = entries.len(), "created tree");

        let commit = store
            .create_commit(
                &self.repo,
                CreateCommitRequest {
                    tree,
                    parents: vec![head],
                    message: self.message.clone(),
                    author: self.author.clone(),
                },
            )
            .await
            .map_err(at(CommitStep::CreateCommit))?;
        tracing::debug!(commit = %commit.short(7), "created commit, moving branch");

        store
            .update_ref(&self.repo, &self.branch, &commit, false)
            .await
            .map_err(at(CommitStep::UpdateRef))?;

        Ok(Some(commit))
    }
}
