//! core::config
//!
//! Configuration schema and loading.
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Config file
//! 3. Explicit arguments passed by the caller (not handled here)
//!
//! # Config Locations
//!
//! Searched in order, first existing file wins:
//! 1. `$GHBATCH_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/ghbatch/config.toml`
//! 3. `~/.ghbatch/config.toml`
//!
//! Missing files are not an error; defaults are used.
//!
//! # Example
//!
//! ```no_run
//! use ghbatch::core::config::Config;
//!
//! let config = Config::load().unwrap();
//! println!("API base: {}", config.api_base());
//! if let Some(author) = config.author() {
//!     println!("Committing as {} <{}>", author.name, author.email);
//! }
//! ```

pub mod schema;

pub use schema::{CommitSection, FileConfig, GitHubSection};

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::types::Author;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "GHBATCH_CONFIG";

/// Default GitHub API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// User-Agent header value for API requests.
pub const USER_AGENT_VALUE: &str = "ghbatch";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Loaded configuration with defaults applied through accessors.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Parsed file contents
    pub file: FileConfig,
    /// Path the configuration was loaded from (if any)
    path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read, parsed,
    /// or validated.
    pub fn load() -> Result<Self, ConfigError> {
        let candidates = candidate_paths(
            std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from),
            std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
            dirs::home_dir(),
        );

        for path in candidates {
            if path.exists() {
                return Self::load_from(&path);
            }
        }

        tracing::debug!("no config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let file: FileConfig = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        file.validate()?;

        tracing::debug!(path = %path.display(), "loaded config");
        Ok(Self {
            file,
            path: Some(path.to_path_buf()),
        })
    }

    // =========================================================================
    // Accessor methods with defaults
    // =========================================================================

    /// Get the GitHub API base URL.
    ///
    /// Defaults to `https://api.github.com`.
    pub fn api_base(&self) -> &str {
        self.file
            .github
            .as_ref()
            .and_then(|g| g.api_base.as_deref())
            .unwrap_or(DEFAULT_API_BASE)
    }

    /// Get the User-Agent header value.
    ///
    /// Defaults to `ghbatch`.
    pub fn user_agent(&self) -> &str {
        self.file
            .github
            .as_ref()
            .and_then(|g| g.user_agent.as_deref())
            .unwrap_or(USER_AGENT_VALUE)
    }

    /// Get the configured default commit message, if any.
    pub fn commit_message(&self) -> Option<&str> {
        self.file.commit.as_ref().and_then(|c| c.message.as_deref())
    }

    /// Get the configured author override, if any.
    pub fn author(&self) -> Option<Author> {
        let commit = self.file.commit.as_ref()?;
        match (&commit.author_name, &commit.author_email) {
            (Some(name), Some(email)) => Some(Author::new(name, email)),
            _ => None,
        }
    }

    /// Get the path the configuration was loaded from.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Candidate config file locations in search order.
fn candidate_paths(
    explicit: Option<PathBuf>,
    xdg_config_home: Option<PathBuf>,
    home: Option<PathBuf>,
) -> Vec<PathBuf> {
    let mut paths = Vec::with_capacity(3);
    if let Some(path) = explicit {
        paths.push(path);
    }
    if let Some(xdg) = xdg_config_home {
        paths.push(xdg.join("ghbatch/config.toml"));
    }
    if let Some(home) = home {
        paths.push(home.join(".ghbatch/config.toml"));
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_without_file() {
        let config = Config::default();
        assert_eq!(config.api_base(), "https://api.github.com");
        assert_eq!(config.user_agent(), "ghbatch");
        assert!(config.commit_message().is_none());
        assert!(config.author().is_none());
        assert!(config.loaded_from().is_none());
    }

    #[test]
    fn load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            r#"
            [github]
            api_base = "https://github.example.com/api/v3"

            [commit]
            message = "Nightly sync"
            author_name = "Sync Bot"
            author_email = "sync@example.com"
            "#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.api_base(), "https://github.example.com/api/v3");
        assert_eq!(config.user_agent(), "ghbatch");
        assert_eq!(config.commit_message(), Some("Nightly sync"));
        assert_eq!(
            config.author(),
            Some(Author::new("Sync Bot", "sync@example.com"))
        );
        assert_eq!(config.loaded_from(), Some(path.as_path()));
    }

    #[test]
    fn load_from_missing_file_errors() {
        let temp = TempDir::new().unwrap();
        let result = Config::load_from(&temp.path().join("nope.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn load_from_invalid_toml_errors() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "[github\napi_base = ").unwrap();

        let result = Config::load_from(&path);
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn load_from_runs_validation() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "[github]\napi_base = \"api.github.com\"").unwrap();

        let result = Config::load_from(&path);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn candidate_paths_order() {
        let paths = candidate_paths(
            Some(PathBuf::from("/explicit.toml")),
            Some(PathBuf::from("/xdg")),
            Some(PathBuf::from("/home/me")),
        );
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/explicit.toml"),
                PathBuf::from("/xdg/ghbatch/config.toml"),
                PathBuf::from("/home/me/.ghbatch/config.toml"),
            ]
        );
    }

    #[test]
    fn candidate_paths_skip_missing_sources() {
        let paths = candidate_paths(None, None, Some(PathBuf::from("/home/me")));
        assert_eq!(paths, vec![PathBuf::from("/home/me/.ghbatch/config.toml")]);
    }
}
