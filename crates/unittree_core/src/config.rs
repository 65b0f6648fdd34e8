//! Runtime configuration read from the process environment.
//!
//! | Variable             | Default                  |
//! |----------------------|--------------------------|
//! | `UNITTREE_DB_PATH`   | `unittree.sqlite3`       |
//! | `UNITTREE_LOG_LEVEL` | `default_log_level()`    |
//! | `UNITTREE_LOG_DIR`   | unset (no file logging)  |

use crate::logging::{default_log_level, init_logging};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "UNITTREE_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "UNITTREE_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "UNITTREE_LOG_DIR";

const DEFAULT_DB_FILE_NAME: &str = "unittree.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitTreeConfig {
    pub database_path: PathBuf,
    pub log_level: String,
    /// File logging stays off when `None`.
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Variable is set but holds an unusable value.
    InvalidValue { variable: &'static str, message: String },
    /// Logging backend refused the configured settings.
    Logging(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { variable, message } => {
                write!(f, "invalid value for {variable}: {message}")
            }
            Self::Logging(message) => write!(f, "logging setup failed: {message}"),
        }
    }
}

impl Error for ConfigError {}

impl Default for UnitTreeConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DB_FILE_NAME),
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl UnitTreeConfig {
    /// Builds the configuration from `std::env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = non_blank(lookup(ENV_DB_PATH)) {
            config.database_path = PathBuf::from(value);
        }
        if let Some(value) = non_blank(lookup(ENV_LOG_LEVEL)) {
            config.log_level = value;
        }
        if let Some(value) = non_blank(lookup(ENV_LOG_DIR)) {
            let path = PathBuf::from(&value);
            if !path.is_absolute() {
                return Err(ConfigError::InvalidValue {
                    variable: ENV_LOG_DIR,
                    message: format!("expected an absolute path, got `{value}`"),
                });
            }
            config.log_dir = Some(path);
        }

        Ok(config)
    }

    /// Starts file logging when a log directory is configured.
    ///
    /// Returns `Ok(false)` when no directory is configured.
    pub fn init_logging(&self) -> Result<bool, ConfigError> {
        let Some(log_dir) = &self.log_dir else {
            return Ok(false);
        };
        init_logging(&self.log_level, &log_dir.to_string_lossy()).map_err(ConfigError::Logging)?;
        Ok(true)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
