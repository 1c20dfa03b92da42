//! ghbatch - Atomic multi-file commits over the GitHub git data API
//!
//! ghbatch queues file writes and deletes and applies them to a branch as a
//! single commit, built remotely from blobs, a tree, and a commit object. The
//! branch moves with one non-force ref update, so readers never observe a
//! partially applied batch.
//!
//! # Architecture
//!
//! - [`batch`] - Operation queue and commit protocol
//! - [`forge`] - Object-store abstraction with GitHub and in-memory backends
//! - [`core`] - Domain types, path rules, and configuration
//!
//! # Correctness Invariants
//!
//! 1. A successful commit has exactly one parent: the head read at its start
//! 2. The branch is only moved by a non-force (fast-forward) ref update
//! 3. A batch is used for at most one commit attempt
//! 4. No queued path contains a traversal segment
//!
//! # Logging
//!
//! The library emits [`tracing`] events and installs no subscriber.

pub mod batch;
pub mod core;
pub mod forge;

pub use batch::{Batch, BatchError, BatchOperation, BatchOptions, CommitStep};
pub use forge::{ForgeError, GitHubObjectStore, ObjectStore};
