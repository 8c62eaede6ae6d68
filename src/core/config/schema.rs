//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Example
//!
//! ```toml
//! [github]
//! api_base = "https://github.example.com/api/v3"
//! token_env = "GHE_TOKEN"
//! timeout_secs = 20
//!
//! [branch]
//! default_prefix = "update-image-"
//! max_length = 60
//! suffix_len = 6
//! ```
//!
//! # Validation
//!
//! Values are validated after parsing; unknown keys are rejected at parse time.

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::naming::{BRANCH_MAX_LENGTH, DEFAULT_SUFFIX_LEN};

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// GitHub API settings
    pub github: Option<GitHubConfig>,

    /// Branch naming settings
    pub branch: Option<BranchConfig>,
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
        if let Some(branch) = &self.branch {
            branch.validate()?;
        }
        Ok(())
    }
}

/// GitHub API settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GitHubConfig {
    /// API base URL (GitHub Enterprise installs use `https://host/api/v3`)
    pub api_base: Option<String>,

    /// Environment variable holding the access token
    pub token_env: Option<String>,

    /// Per-request deadline in seconds
    pub timeout_secs: Option<u64>,
}

impl GitHubConfig {
    /// Validate the GitHub settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(api_base) = &self.api_base {
            if !(api_base.starts_with("https://") || api_base.starts_with("http://")) {
                return Err(ConfigError::InvalidValue(format!(
                    "github.api_base must be an http(s) URL, got '{}'",
                    api_base
                )));
            }
        }
        if let Some(token_env) = &self.token_env {
            if token_env.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "github.token_env cannot be empty".to_string(),
                ));
            }
        }
        if self.timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue(
                "github.timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Branch naming settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BranchConfig {
    /// Prefix used when the command line gives none
    pub default_prefix: Option<String>,

    /// Maximum generated branch name length
    pub max_length: Option<usize>,

    /// Random suffix length
    pub suffix_len: Option<usize>,
}

impl BranchConfig {
    /// Validate the branch settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.suffix_len == Some(0) {
            return Err(ConfigError::InvalidValue(
                "branch.suffix_len must be greater than zero".to_string(),
            ));
        }
        let max_length = self.max_length.unwrap_or(BRANCH_MAX_LENGTH);
        let suffix_len = self.suffix_len.unwrap_or(DEFAULT_SUFFIX_LEN);
        if max_length <= suffix_len {
            return Err(ConfigError::InvalidValue(format!(
                "branch.max_length ({}) must exceed branch.suffix_len ({})",
                max_length, suffix_len
            )));
        }
        Ok(())
    }
}
