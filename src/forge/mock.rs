//! forge::mock
//!
//! In-memory object store for deterministic testing.
//!
//! # Design
//!
//! The mock keeps a single repository's object graph in memory:
//! - blobs, trees, and commits are content-addressed with SHA-256
//! - trees are flat `path → blob` maps; an upsert clears whatever file or
//!   directory collides with its path, as git trees require
//! - branches are a name → commit map
//!
//! A non-force `update_ref` succeeds only if the branch's current head is the
//! new commit or one of its ancestors, which is how GitHub decides whether a
//! ref update is a fast-forward. Any operation can be made to fail via
//! [`FailOn`], and every call is recorded as a [`MockOperation`].
//!
//! The `RepoId` passed to each call is recorded but otherwise ignored.
//!
//! # Example
//!
//! ```
//! use ghbatch::core::types::{BranchName, RepoId};
//! use ghbatch::forge::mock::MockObjectStore;
//! use ghbatch::forge::ObjectStore;
//!
//! # tokio_test::block_on(async {
//! let store = MockObjectStore::new().with_branch("main", &[("README.md", "hello")]);
//! let repo = RepoId::new("owner", "repo");
//! let main = BranchName::new("main").unwrap();
//!
//! assert!(store.exists(&repo, "README.md", &main).await.unwrap());
//! assert!(!store.exists(&repo, "missing.txt", &main).await.unwrap());
//! assert_eq!(store.file_at("main", "README.md").unwrap(), b"hello");
//! # });
//! ```

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use super::traits::{CreateCommitRequest, ForgeError, ObjectStore, TreeEntry};
use crate::core::types::{Author, BranchName, Oid, RepoId};

/// Mock object store for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping. Clones share state.
#[derive(Debug, Clone)]
pub struct MockObjectStore {
    inner: Arc<Mutex<MockStoreInner>>,
}

#[derive(Debug, Default)]
struct MockStoreInner {
    blobs: HashMap<Oid, Vec<u8>>,
    trees: HashMap<Oid, BTreeMap<String, Oid>>,
    commits: HashMap<Oid, MockCommit>,
    refs: HashMap<String, Oid>,
    fail_on: Vec<FailOn>,
    operations: Vec<MockOperation>,
}

/// A stored commit object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCommit {
    /// Tree snapshot
    pub tree: Oid,
    /// Parent commits
    pub parents: Vec<Oid>,
    /// Commit message
    pub message: String,
    /// Author override, if one was supplied
    pub author: Option<Author>,
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    /// Fail get_ref with the given error.
    GetRef(ForgeError),
    /// Fail get_commit with the given error.
    GetCommit(ForgeError),
    /// Fail create_blob with the given error.
    CreateBlob(ForgeError),
    /// Fail create_tree with the given error.
    CreateTree(ForgeError),
    /// Fail create_commit with the given error.
    CreateCommit(ForgeError),
    /// Fail update_ref with the given error.
    UpdateRef(ForgeError),
    /// Fail exists with the given error.
    Exists(ForgeError),
}

impl FailOn {
    fn matches(&self, op: &MockOperation) -> Option<ForgeError> {
        match (self, op) {
            (FailOn::GetRef(e), MockOperation::GetRef { .. })
            | (FailOn::GetCommit(e), MockOperation::GetCommit { .. })
            | (FailOn::CreateBlob(e), MockOperation::CreateBlob { .. })
            | (FailOn::CreateTree(e), MockOperation::CreateTree { .. })
            | (FailOn::CreateCommit(e), MockOperation::CreateCommit { .. })
            | (FailOn::UpdateRef(e), MockOperation::UpdateRef { .. })
            | (FailOn::Exists(e), MockOperation::Exists { .. }) => Some(e.clone()),
            _ => None,
        }
    }
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    GetRef {
        repo: RepoId,
        branch: String,
    },
    GetCommit {
        commit: Oid,
    },
    CreateBlob {
        size: usize,
    },
    CreateTree {
        base_tree: Oid,
        entries: Vec<TreeEntry>,
    },
    CreateCommit {
        tree: Oid,
        parents: Vec<Oid>,
        message: String,
    },
    UpdateRef {
        branch: String,
        commit: Oid,
        force: bool,
    },
    Exists {
        path: String,
        branch: String,
    },
}

/// Hash a sequence of byte chunks into a content address.
fn content_id(kind: &str, parts: &[&[u8]]) -> Oid {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    for part in parts {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part);
    }
    Oid::new(hex::encode(hasher.finalize())).expect("sha256 hex digest is a valid oid")
}

fn tree_id(tree: &BTreeMap<String, Oid>) -> Oid {
    let parts: Vec<&[u8]> = tree
        .iter()
        .flat_map(|(path, blob)| [path.as_bytes(), blob.as_str().as_bytes()])
        .collect();
    content_id("tree", &parts)
}

fn commit_id(commit: &MockCommit) -> Oid {
    let mut parts: Vec<&[u8]> = vec![commit.tree.as_str().as_bytes()];
    parts.extend(commit.parents.iter().map(|p| p.as_str().as_bytes()));
    parts.push(commit.message.as_bytes());
    if let Some(author) = &commit.author {
        parts.push(author.name.as_bytes());
        parts.push(author.email.as_bytes());
    }
    content_id("commit", &parts)
}

impl MockStoreInner {
    fn insert_blob(&mut self, content: &[u8]) -> Oid {
        let id = content_id("blob", &[content]);
        self.blobs.entry(id.clone()).or_insert_with(|| content.to_vec());
        id
    }

    fn insert_tree(&mut self, tree: BTreeMap<String, Oid>) -> Oid {
        let id = tree_id(&tree);
        self.trees.entry(id.clone()).or_insert(tree);
        id
    }

    fn insert_commit(&mut self, commit: MockCommit) -> Oid {
        let id = commit_id(&commit);
        self.commits.entry(id.clone()).or_insert(commit);
        id
    }

    fn head_tree(&self, branch: &str) -> Option<&BTreeMap<String, Oid>> {
        let head = self.refs.get(branch)?;
        let commit = self.commits.get(head)?;
        self.trees.get(&commit.tree)
    }

    /// Whether `ancestor` is `commit` or reachable through its parents.
    fn is_ancestor(&self, ancestor: &Oid, commit: &Oid) -> bool {
        let mut pending = vec![commit.clone()];
        while let Some(current) = pending.pop() {
            if &current == ancestor {
                return true;
            }
            if let Some(c) = self.commits.get(&current) {
                pending.extend(c.parents.iter().cloned());
            }
        }
        false
    }
}

impl MockObjectStore {
    /// Create an empty mock store with no branches.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockStoreInner::default())),
        }
    }

    /// Seed a branch whose head is a root commit containing `files`.
    ///
    /// # Example
    ///
    /// ```
    /// use ghbatch::forge::mock::MockObjectStore;
    ///
    /// let store = MockObjectStore::new()
    ///     .with_branch("main", &[("a.txt", "A"), ("dir/b.txt", "B")]);
    /// assert!(store.head_of("main").is_some());
    /// ```
    pub fn with_branch(self, branch: &str, files: &[(&str, &str)]) -> Self {
        {
            let mut inner = self.lock();
            let mut tree = BTreeMap::new();
            for (path, content) in files {
                let blob = inner.insert_blob(content.as_bytes());
                tree.insert((*path).to_string(), blob);
            }
            let tree = inner.insert_tree(tree);
            let head = inner.insert_commit(MockCommit {
                tree,
                parents: Vec::new(),
                message: format!("Initial commit on {}", branch),
                author: None,
            });
            inner.refs.insert(branch.to_string(), head);
        }
        self
    }

    /// Configure the mock to fail on a specific operation.
    ///
    /// Multiple failures may be configured; each applies to every call of
    /// its operation until cleared.
    ///
    /// # Example
    ///
    /// ```
    /// use ghbatch::forge::mock::{MockObjectStore, FailOn};
    /// use ghbatch::forge::ForgeError;
    ///
    /// let store = MockObjectStore::new()
    ///     .fail_on(FailOn::CreateTree(ForgeError::RateLimited));
    /// ```
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.lock().fail_on.push(fail_on);
        self
    }

    /// Clear the failure configuration.
    pub fn clear_fail_on(&self) {
        self.lock().fail_on.clear();
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.lock().operations.clone()
    }

    /// Clear recorded operations.
    pub fn clear_operations(&self) {
        self.lock().operations.clear();
    }

    /// Current head of a branch (for test verification).
    pub fn head_of(&self, branch: &str) -> Option<Oid> {
        self.lock().refs.get(branch).cloned()
    }

    /// Look up a stored commit (for test verification).
    pub fn commit_info(&self, commit: &Oid) -> Option<MockCommit> {
        self.lock().commits.get(commit).cloned()
    }

    /// Content of a file at a branch head (for test verification).
    pub fn file_at(&self, branch: &str, path: &str) -> Option<Vec<u8>> {
        let inner = self.lock();
        let blob = inner.head_tree(branch)?.get(path)?;
        inner.blobs.get(blob).cloned()
    }

    /// All file paths at a branch head, sorted (for test verification).
    pub fn paths_at(&self, branch: &str) -> Vec<String> {
        self.lock()
            .head_tree(branch)
            .map(|tree| tree.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of stored commit objects, reachable or not.
    pub fn commit_count(&self) -> usize {
        self.lock().commits.len()
    }

    /// Move a branch directly, bypassing fast-forward checks.
    ///
    /// Simulates a writer that does not go through this store.
    pub fn set_head(&self, branch: &str, commit: Oid) {
        self.lock().refs.insert(branch.to_string(), commit);
    }

    fn lock(&self) -> MutexGuard<'_, MockStoreInner> {
        // Poisoning only follows a panicking test; keep the state readable.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record an operation and return the configured failure for it, if any.
    fn record(&self, op: MockOperation) -> Result<(), ForgeError> {
        let mut inner = self.lock();
        let failure = inner.fail_on.iter().find_map(|f| f.matches(&op));
        inner.operations.push(op);
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Default for MockObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn get_ref(&self, repo: &RepoId, branch: &BranchName) -> Result<Oid, ForgeError> {
        self.record(MockOperation::GetRef {
            repo: repo.clone(),
            branch: branch.to_string(),
        })?;

        self.lock()
            .refs
            .get(branch.as_str())
            .cloned()
            .ok_or_else(|| ForgeError::NotFound(format!("branch {}", branch)))
    }

    async fn get_commit(&self, _repo: &RepoId, commit: &Oid) -> Result<Oid, ForgeError> {
        self.record(MockOperation::GetCommit {
            commit: commit.clone(),
        })?;

        self.lock()
            .commits
            .get(commit)
            .map(|c| c.tree.clone())
            .ok_or_else(|| ForgeError::NotFound(format!("commit {}", commit)))
    }

    async fn create_blob(&self, _repo: &RepoId, content: &[u8]) -> Result<Oid, ForgeError> {
        self.record(MockOperation::CreateBlob {
            size: content.len(),
        })?;

        Ok(self.lock().insert_blob(content))
    }

    async fn create_tree(
        &self,
        _repo: &RepoId,
        base_tree: &Oid,
        entries: &[TreeEntry],
    ) -> Result<Oid, ForgeError> {
        self.record(MockOperation::CreateTree {
            base_tree: base_tree.clone(),
            entries: entries.to_vec(),
        })?;

        let mut inner = self.lock();
        let mut tree = inner
            .trees
            .get(base_tree)
            .cloned()
            .ok_or_else(|| ForgeError::NotFound(format!("tree {}", base_tree)))?;

        for entry in entries {
            match &entry.sha {
                Some(blob) => {
                    if !inner.blobs.contains_key(blob) {
                        return Err(ForgeError::ApiError {
                            status: 422,
                            message: format!("blob {} does not exist", blob),
                        });
                    }
                    // A file replaces any directory at its path and any file
                    // at one of its ancestors
                    let prefix = format!("{}/", entry.path);
                    tree.retain(|path, _| !path.starts_with(&prefix));
                    for (i, _) in entry.path.match_indices('/') {
                        tree.remove(&entry.path[..i]);
                    }
                    tree.insert(entry.path.clone(), blob.clone());
                }
                None => {
                    // Removing a directory removes everything beneath it
                    let prefix = format!("{}/", entry.path);
                    tree.retain(|path, _| path != &entry.path && !path.starts_with(&prefix));
                }
            }
        }

        Ok(inner.insert_tree(tree))
    }

    async fn create_commit(
        &self,
        _repo: &RepoId,
        request: CreateCommitRequest,
    ) -> Result<Oid, ForgeError> {
        self.record(MockOperation::CreateCommit {
            tree: request.tree.clone(),
            parents: request.parents.clone(),
            message: request.message.clone(),
        })?;

        let mut inner = self.lock();
        if !inner.trees.contains_key(&request.tree) {
            return Err(ForgeError::ApiError {
                status: 422,
                message: format!("tree {} does not exist", request.tree),
            });
        }
        if let Some(missing) = request
            .parents
            .iter()
            .find(|p| !inner.commits.contains_key(*p))
        {
            return Err(ForgeError::ApiError {
                status: 422,
                message: format!("parent {} does not exist", missing),
            });
        }

        Ok(inner.insert_commit(MockCommit {
            tree: request.tree,
            parents: request.parents,
            message: request.message,
            author: request.author,
        }))
    }

    async fn update_ref(
        &self,
        _repo: &RepoId,
        branch: &BranchName,
        commit: &Oid,
        force: bool,
    ) -> Result<(), ForgeError> {
        self.record(MockOperation::UpdateRef {
            branch: branch.to_string(),
            commit: commit.clone(),
            force,
        })?;

        let mut inner = self.lock();
        if !inner.commits.contains_key(commit) {
            return Err(ForgeError::ApiError {
                status: 422,
                message: format!("commit {} does not exist", commit),
            });
        }
        let current = inner
            .refs
            .get(branch.as_str())
            .cloned()
            .ok_or_else(|| ForgeError::NotFound(format!("branch {}", branch)))?;

        if !force && !inner.is_ancestor(&current, commit) {
            return Err(ForgeError::Conflict(
                "Update is not a fast forward".to_string(),
            ));
        }

        inner.refs.insert(branch.to_string(), commit.clone());
        Ok(())
    }

    async fn exists(
        &self,
        _repo: &RepoId,
        path: &str,
        branch: &BranchName,
    ) -> Result<bool, ForgeError> {
        self.record(MockOperation::Exists {
            path: path.to_string(),
            branch: branch.to_string(),
        })?;

        let inner = self.lock();
        let tree = inner
            .head_tree(branch.as_str())
            .ok_or_else(|| ForgeError::NotFound(format!("branch {}", branch)))?;

        let prefix = format!("{}/", path);
        Ok(tree
            .keys()
            .any(|p| p == path || p.starts_with(&prefix)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> RepoId {
        RepoId::new("owner", "repo")
    }

    fn main_branch() -> BranchName {
        BranchName::new("main").unwrap()
    }

    async fn commit_file(store: &MockObjectStore, path: &str, content: &str) -> Oid {
        let head = store.get_ref(&repo(), &main_branch()).await.unwrap();
        let base = store.get_commit(&repo(), &head).await.unwrap();
        let blob = store.create_blob(&repo(), content.as_bytes()).await.unwrap();
        let tree = store
            .create_tree(&repo(), &base, &[TreeEntry::upsert(path, blob)])
            .await
            .unwrap();
        store
            .create_commit(
                &repo(),
                CreateCommitRequest {
                    tree,
                    parents: vec![head],
                    message: format!("Write {}", path),
                    author: None,
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn blobs_are_content_addressed() {
        let store = MockObjectStore::new();
        let a = store.create_blob(&repo(), b"same").await.unwrap();
        let b = store.create_blob(&repo(), b"same").await.unwrap();
        let c = store.create_blob(&repo(), b"other").await.unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), 64);
    }

    #[tokio::test]
    async fn get_ref_missing_branch() {
        let store = MockObjectStore::new();
        let result = store.get_ref(&repo(), &main_branch()).await;
        assert!(matches!(result, Err(ForgeError::NotFound(_))));
    }

    #[tokio::test]
    async fn create_tree_applies_upserts_and_removals() {
        let store = MockObjectStore::new().with_branch("main", &[("a", "1"), ("dir/b", "2")]);
        let head = store.get_ref(&repo(), &main_branch()).await.unwrap();
        let base = store.get_commit(&repo(), &head).await.unwrap();
        let blob = store.create_blob(&repo(), b"3").await.unwrap();

        let tree = store
            .create_tree(
                &repo(),
                &base,
                &[TreeEntry::upsert("c", blob), TreeEntry::remove("dir")],
            )
            .await
            .unwrap();
        let commit = store
            .create_commit(
                &repo(),
                CreateCommitRequest {
                    tree,
                    parents: vec![head],
                    message: "change".into(),
                    author: None,
                },
            )
            .await
            .unwrap();
        store
            .update_ref(&repo(), &main_branch(), &commit, false)
            .await
            .unwrap();

        assert_eq!(store.paths_at("main"), vec!["a".to_string(), "c".to_string()]);
    }

    async fn upsert_onto(seed: &[(&str, &str)], path: &str) -> Vec<String> {
        let store = MockObjectStore::new().with_branch("main", seed);
        let head = store.get_ref(&repo(), &main_branch()).await.unwrap();
        let base = store.get_commit(&repo(), &head).await.unwrap();
        let blob = store.create_blob(&repo(), b"new").await.unwrap();
        let tree = store
            .create_tree(&repo(), &base, &[TreeEntry::upsert(path, blob)])
            .await
            .unwrap();
        let commit = store
            .create_commit(
                &repo(),
                CreateCommitRequest {
                    tree,
                    parents: vec![head],
                    message: "upsert".into(),
                    author: None,
                },
            )
            .await
            .unwrap();
        store
            .update_ref(&repo(), &main_branch(), &commit, false)
            .await
            .unwrap();
        store.paths_at("main")
    }

    #[tokio::test]
    async fn file_upsert_replaces_directory() {
        let paths = upsert_onto(&[("a/x.txt", "x"), ("a/y/z.txt", "z"), ("ab", "b")], "a").await;
        assert_eq!(paths, vec!["a".to_string(), "ab".to_string()]);
    }

    #[tokio::test]
    async fn nested_upsert_replaces_ancestor_files() {
        let paths = upsert_onto(&[("a", "file"), ("a.txt", "t")], "a/b/c.txt").await;
        assert_eq!(paths, vec!["a.txt".to_string(), "a/b/c.txt".to_string()]);

        let paths = upsert_onto(&[("a/b", "file")], "a/b/c.txt").await;
        assert_eq!(paths, vec!["a/b/c.txt".to_string()]);
    }

    #[tokio::test]
    async fn create_tree_rejects_unknown_blob() {
        let store = MockObjectStore::new().with_branch("main", &[]);
        let head = store.get_ref(&repo(), &main_branch()).await.unwrap();
        let base = store.get_commit(&repo(), &head).await.unwrap();
        let bogus = Oid::new("f".repeat(64)).unwrap();

        let result = store
            .create_tree(&repo(), &base, &[TreeEntry::upsert("x", bogus)])
            .await;
        assert!(matches!(result, Err(ForgeError::ApiError { status: 422, .. })));
    }

    #[tokio::test]
    async fn fast_forward_update_succeeds() {
        let store = MockObjectStore::new().with_branch("main", &[]);
        let commit = commit_file(&store, "a.txt", "A").await;

        store
            .update_ref(&repo(), &main_branch(), &commit, false)
            .await
            .unwrap();
        assert_eq!(store.head_of("main"), Some(commit));
        assert_eq!(store.file_at("main", "a.txt").unwrap(), b"A");
    }

    #[tokio::test]
    async fn non_fast_forward_update_conflicts() {
        let store = MockObjectStore::new().with_branch("main", &[]);
        let first = commit_file(&store, "a.txt", "A").await;
        let second = commit_file(&store, "b.txt", "B").await;

        store
            .update_ref(&repo(), &main_branch(), &first, false)
            .await
            .unwrap();
        let result = store.update_ref(&repo(), &main_branch(), &second, false).await;
        assert!(matches!(result, Err(ForgeError::Conflict(_))));
        assert_eq!(store.head_of("main"), Some(first));
    }

    #[tokio::test]
    async fn force_update_overwrites() {
        let store = MockObjectStore::new().with_branch("main", &[]);
        let first = commit_file(&store, "a.txt", "A").await;
        let second = commit_file(&store, "b.txt", "B").await;

        store
            .update_ref(&repo(), &main_branch(), &first, false)
            .await
            .unwrap();
        store
            .update_ref(&repo(), &main_branch(), &second, true)
            .await
            .unwrap();
        assert_eq!(store.head_of("main"), Some(second));
    }

    #[tokio::test]
    async fn exists_matches_files_and_directories() {
        let store = MockObjectStore::new().with_branch("main", &[("dir/file.txt", "x")]);
        assert!(store.exists(&repo(), "dir/file.txt", &main_branch()).await.unwrap());
        assert!(store.exists(&repo(), "dir", &main_branch()).await.unwrap());
        assert!(!store.exists(&repo(), "di", &main_branch()).await.unwrap());
        assert!(!store.exists(&repo(), "other", &main_branch()).await.unwrap());
    }

    #[tokio::test]
    async fn fail_on_injects_error_and_records() {
        let store = MockObjectStore::new()
            .with_branch("main", &[])
            .fail_on(FailOn::GetRef(ForgeError::RateLimited));

        let result = store.get_ref(&repo(), &main_branch()).await;
        assert_eq!(result, Err(ForgeError::RateLimited));
        assert_eq!(store.operations().len(), 1);

        store.clear_fail_on();
        assert!(store.get_ref(&repo(), &main_branch()).await.is_ok());
    }

    #[tokio::test]
    async fn operations_recorded_in_order() {
        let store = MockObjectStore::new().with_branch("main", &[]);
        let head = store.get_ref(&repo(), &main_branch()).await.unwrap();
        store.get_commit(&repo(), &head).await.unwrap();

        let ops = store.operations();
        assert_eq!(ops.len(), 2);
        assert!(matches!(ops[0], MockOperation::GetRef { .. }));
        assert!(matches!(ops[1], MockOperation::GetCommit { .. }));

        store.clear_operations();
        assert!(store.operations().is_empty());
    }

    #[test]
    fn store_name() {
        assert_eq!(MockObjectStore::new().name(), "mock");
    }
}
