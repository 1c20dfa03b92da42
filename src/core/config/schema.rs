//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Validation
//!
//! Config values are validated after parsing: the API base must be an HTTP(S)
//! URL, author name and email come as a pair, and a configured commit message
//! cannot be blank.

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Top-level configuration file.
///
/// # Example
///
/// ```toml
/// [github]
/// api_base = "https://github.example.com/api/v3"
/// user_agent = "release-bot"
///
/// [commit]
/// message = "Sync generated files"
/// author_name = "Release Bot"
/// author_email = "bot@example.com"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// GitHub transport settings
    pub github: Option<GitHubSection>,

    /// Commit defaults applied to new batches
    pub commit: Option<CommitSection>,
}

impl FileConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(github) = &self.github {
            github.validate()?;
        }
        if let Some(commit) = &self.commit {
            commit.validate()?;
        }
        Ok(())
    }
}

/// GitHub transport settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GitHubSection {
    /// API base URL (GitHub Enterprise installs use `https://<host>/api/v3`)
    pub api_base: Option<String>,

    /// User-Agent header sent with every request
    pub user_agent: Option<String>,
}

impl GitHubSection {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(base) = &self.api_base {
            if !(base.starts_with("https://") || base.starts_with("http://")) {
                return Err(ConfigError::InvalidValue(format!(
                    "github.api_base must be an http(s) URL, got '{}'",
                    base
                )));
            }
        }
        if let Some(agent) = &self.user_agent {
            if agent.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "github.user_agent cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Commit defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CommitSection {
    /// Default commit message for batches created without one
    pub message: Option<String>,

    /// Author name override
    pub author_name: Option<String>,

    /// Author email override
    pub author_email: Option<String>,
}

impl CommitSection {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(message) = &self.message {
            if message.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "commit.message cannot be empty".to_string(),
                ));
            }
        }
        match (&self.author_name, &self.author_email) {
            (Some(_), None) | (None, Some(_)) => Err(ConfigError::InvalidValue(
                "commit.author_name and commit.author_email must be set together".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let toml = r#"
            [github]
            api_base = "https://github.example.com/api/v3"
            user_agent = "release-bot"

            [commit]
            message = "Sync generated files"
            author_name = "Release Bot"
            author_email = "bot@example.com"
        "#;

        let config: FileConfig = toml::from_str(toml).unwrap();
        config.validate().unwrap();

        let github = config.github.unwrap();
        assert_eq!(
            github.api_base.as_deref(),
            Some("https://github.example.com/api/v3")
        );
        let commit = config.commit.unwrap();
        assert_eq!(commit.author_name.as_deref(), Some("Release Bot"));
    }

    #[test]
    fn empty_config_is_default() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert_eq!(config, FileConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_fields_rejected() {
        let result: Result<FileConfig, _> = toml::from_str("trunk = \"main\"");
        assert!(result.is_err());

        let result: Result<FileConfig, _> = toml::from_str("[github]\ntoken = \"x\"");
        assert!(result.is_err());
    }

    #[test]
    fn api_base_must_be_http() {
        let config = FileConfig {
            github: Some(GitHubSection {
                api_base: Some("ftp://example.com".into()),
                user_agent: None,
            }),
            commit: None,
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn author_requires_both_fields() {
        let config = FileConfig {
            github: None,
            commit: Some(CommitSection {
                message: None,
                author_name: Some("Bot".into()),
                author_email: None,
            }),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn blank_message_rejected() {
        let config = FileConfig {
            github: None,
            commit: Some(CommitSection {
                message: Some("   ".into()),
                ..Default::default()
            }),
        };
        assert!(config.validate().is_err());
    }
}
