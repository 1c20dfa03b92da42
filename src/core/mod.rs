//! core
//!
//! Domain types, path rules, and configuration.
//!
//! # Modules
//!
//! - [`types`] - Strong types: BranchName, Oid, RepoId, Author
//! - [`paths`] - Validation and normalization of repository-relative paths
//! - [`config`] - Configuration schema and loading

pub mod config;
pub mod paths;
pub mod types;
