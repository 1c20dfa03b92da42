//! batch::resolve
//!
//! Turns queued operations into tree entries.
//!
//! A path may be queued more than once. Only its last operation counts, and
//! superseded operations are dropped before any remote call, so an
//! overwritten write never uploads a blob. Entries come out in the order of
//! each path's final occurrence in the queue.

use std::collections::HashMap;

use super::{BatchError, BatchOperation, CommitStep};
use crate::core::types::{BranchName, RepoId};
use crate::forge::{ObjectStore, TreeEntry};

/// Drop every operation superseded by a later one on the same path.
///
/// # Example
///
/// ```
/// use ghbatch::batch::{collapse_operations, BatchOperation};
///
/// let ops = vec![
///     BatchOperation::Write { path: "a".into(), content: b"1".to_vec() },
///     BatchOperation::Write { path: "b".into(), content: b"2".to_vec() },
///     BatchOperation::Delete { path: "a".into() },
/// ];
/// let paths: Vec<&str> = collapse_operations(&ops).iter().map(|op| op.path()).collect();
/// assert_eq!(paths, vec!["b", "a"]);
/// ```
pub fn collapse_operations(operations: &[BatchOperation]) -> Vec<&BatchOperation> {
    let mut last: HashMap<&str, usize> = HashMap::with_capacity(operations.len());
    for (index, op) in operations.iter().enumerate() {
        last.insert(op.path(), index);
    }

    operations
        .iter()
        .enumerate()
        .filter(|(index, op)| last.get(op.path()) == Some(index))
        .map(|(_, op)| op)
        .collect()
}

/// Resolve operations into tree entries against `branch`.
///
/// Writes upload their content and become upserts. Deletes become removals
/// only when the path exists on the branch; a missing path contributes no
/// entry. Calls are issued sequentially and the first failure aborts.
///
/// # Errors
///
/// `BatchError::Step` tagged `CreateBlob` or `CheckFileExists`.
pub async fn resolve_entries(
    store: &dyn ObjectStore,
    repo: &RepoId,
    branch: &BranchName,
    operations: &[BatchOperation],
) -> Result<Vec<TreeEntry>, BatchError> {
    let operations = collapse_operations(operations);
    let mut entries = Vec::with_capacity(operations.len());

    for op in operations {
        match op {
            BatchOperation::Write { path, content } => {
                let blob = store
                    .create_blob(repo, content)
                    .await
                    .map_err(|source| BatchError::Step {
                        step: CommitStep::CreateBlob,
                        source,
                    })?;
                tracing::debug!(path = %path, blob = %blob.short(7), "uploaded blob");
                entries.push(TreeEntry::upsert(path.clone(), blob));
            }
            BatchOperation::Delete { path } => {
                let exists = store
                    .exists(repo, path, branch)
                    .await
                    .map_err(|source| BatchError::Step {
                        step: CommitStep::CheckFileExists,
                        source,
                    })?;
                if exists {
                    entries.push(TreeEntry::remove(path.clone()));
                } else {
                    tracing::debug!(path = %path, "skipping delete of missing path");
                }
            }
        }
    }

    Ok(entries)
}
