//! forge
//!
//! Abstraction over the hosting service's git object store.
//!
//! # Architecture
//!
//! The `ObjectStore` trait is the only surface the commit engine talks to.
//! Transports translate their native failures into [`ForgeError`] once, so
//! the engine never sees HTTP status codes.
//!
//! # Modules
//!
//! - `traits`: Core `ObjectStore` trait, `TreeEntry`, and request types
//! - [`github`]: GitHub implementation using the REST git data API
//! - [`mock`]: In-memory implementation for deterministic testing
//!
//! # Example
//!
//! ```ignore
//! use ghbatch::forge::{parse_github_url, GitHubObjectStore, ObjectStore};
//!
//! let repo = parse_github_url("git@github.com:owner/repo.git").unwrap();
//! let store = GitHubObjectStore::new(token);
//! let head = store.get_ref(&repo, &BranchName::new("main")?).await?;
//! println!("{} is at {}", repo, head.short(7));
//! ```

pub mod github;
pub mod mock;
mod traits;

pub use github::{parse_github_url, GitHubObjectStore};
pub use traits::*;
