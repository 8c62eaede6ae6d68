//! core::config
//!
//! Configuration schema and loading.
//!
//! # Locations
//!
//! An explicit path (the `--config` flag) wins. Otherwise these are
//! searched in order and the first existing file is used:
//! 1. `$REPOBUMP_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/repobump/config.toml`
//! 3. `~/.repobump/config.toml`
//!
//! Missing files are not an error; defaults apply.
//!
//! # Example
//!
//! ```no_run
//! use repobump::core::config::Config;
//!
//! let config = Config::load(None).unwrap();
//! println!("API: {}", config.api_base());
//! println!("Timeout: {:?}", config.timeout());
//! ```

pub mod schema;

pub use schema::{BranchConfig, FileConfig, GitHubConfig};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::core::naming::{BRANCH_MAX_LENGTH, DEFAULT_SUFFIX_LEN};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "REPOBUMP_CONFIG";

/// Default GitHub API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Default environment variable holding the access token.
pub const DEFAULT_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Default per-request deadline.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

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

    #[error("no access token: environment variable '{0}' is not set")]
    MissingToken(String),
}

/// Loaded configuration with defaults applied through accessors.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Parsed file contents
    pub file: FileConfig,
    /// Path the file was loaded from, if any
    loaded_from: Option<PathBuf>,
}

impl Config {
    /// Load configuration from `explicit` or the default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit path is missing, or if a config file
    /// exists but cannot be read, parsed or validated.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }
        match Self::find() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load and validate a specific config file.
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

        Ok(Self {
            file,
            loaded_from: Some(path.to_path_buf()),
        })
    }

    /// Find the first existing config file in the default locations.
    fn find() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("repobump/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        dirs::home_dir()
            .map(|home| home.join(".repobump/config.toml"))
            .filter(|path| path.exists())
    }

    // =========================================================================
    // Accessor methods with defaults
    // =========================================================================

    /// GitHub API base URL.
    pub fn api_base(&self) -> &str {
        self.github()
            .and_then(|g| g.api_base.as_deref())
            .unwrap_or(DEFAULT_API_BASE)
    }

    /// Name of the environment variable holding the token.
    pub fn token_env(&self) -> &str {
        self.github()
            .and_then(|g| g.token_env.as_deref())
            .unwrap_or(DEFAULT_TOKEN_ENV)
    }

    /// Read the access token from the configured environment variable.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingToken` if the variable is unset or empty.
    pub fn token(&self) -> Result<String, ConfigError> {
        let var = self.token_env();
        match std::env::var(var) {
            Ok(token) if !token.is_empty() => Ok(token),
            _ => Err(ConfigError::MissingToken(var.to_string())),
        }
    }

    /// Per-request deadline.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(
            self.github()
                .and_then(|g| g.timeout_secs)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        )
    }

    /// Branch prefix used when none is given on the command line.
    pub fn default_prefix(&self) -> Option<&str> {
        self.branch().and_then(|b| b.default_prefix.as_deref())
    }

    /// Maximum generated branch name length.
    pub fn branch_max_length(&self) -> usize {
        self.branch()
            .and_then(|b| b.max_length)
            .unwrap_or(BRANCH_MAX_LENGTH)
    }

    /// Random suffix length for generated branch names.
    pub fn branch_suffix_len(&self) -> usize {
        self.branch()
            .and_then(|b| b.suffix_len)
            .unwrap_or(DEFAULT_SUFFIX_LEN)
    }

    /// Path the configuration was loaded from.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.loaded_from.as_deref()
    }

    fn github(&self) -> Option<&GitHubConfig> {
        self.file.github.as_ref()
    }

    fn branch(&self) -> Option<&BranchConfig> {
        self.file.branch.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_without_file() {
        let config = Config::default();

        assert_eq!(config.api_base(), DEFAULT_API_BASE);
        assert_eq!(config.token_env(), "GITHUB_TOKEN");
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.branch_max_length(), 100);
        assert_eq!(config.branch_suffix_len(), 5);
        assert!(config.default_prefix().is_none());
        assert!(config.loaded_from().is_none());
    }

    #[test]
    fn load_explicit_path() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("config.toml");
        fs::write(
            &config_path,
            r#"
            [github]
            api_base = "https://github.example.com/api/v3"
            timeout_secs = 5

            [branch]
            default_prefix = "update-image-"
            "#,
        )
        .unwrap();

        let config = Config::load(Some(&config_path)).unwrap();

        assert_eq!(config.api_base(), "https://github.example.com/api/v3");
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.default_prefix(), Some("update-image-"));
        assert_eq!(config.loaded_from(), Some(config_path.as_path()));
    }

    #[test]
    fn missing_explicit_path_is_error() {
        let temp = TempDir::new().unwrap();
        let result = Config::load(Some(&temp.path().join("absent.toml")));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("config.toml");
        fs::write(&config_path, "[github\napi_base = ").unwrap();

        let result = Config::load_from(&config_path);
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn invalid_values_rejected() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("config.toml");
        fs::write(&config_path, "[branch]\nsuffix_len = 0\n").unwrap();

        let result = Config::load_from(&config_path);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn token_read_from_configured_variable() {
        let config = Config {
            file: FileConfig {
                github: Some(GitHubConfig {
                    token_env: Some("REPOBUMP_TEST_TOKEN_PRESENT".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            },
            loaded_from: None,
        };

        std::env::set_var("REPOBUMP_TEST_TOKEN_PRESENT", "ghp_test");
        assert_eq!(config.token().unwrap(), "ghp_test");
        std::env::remove_var("REPOBUMP_TEST_TOKEN_PRESENT");
    }

    #[test]
    fn missing_token_names_variable() {
        let config = Config {
            file: FileConfig {
                github: Some(GitHubConfig {
                    token_env: Some("REPOBUMP_TEST_TOKEN_ABSENT".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            },
            loaded_from: None,
        };

        let err = config.token().unwrap_err();
        assert!(err.to_string().contains("REPOBUMP_TEST_TOKEN_ABSENT"));
    }
}
