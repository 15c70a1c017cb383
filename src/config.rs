//! Tool configuration.
//!
//! Loads and validates the optional `config.toml` that lives in the
//! workspace directory. It controls what a freshly created project looks
//! like and how archives are encoded; it never affects projects that
//! already exist.
//!
//! ## Config File Location
//!
//! ```text
//! .feed-deploy/
//! ├── config.toml          # This file (optional)
//! ├── configs.json         # Persisted projects
//! └── openedConfigNum.json # Index of the open project
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [defaults]
//! root = "/opt"            # Install root for new projects
//! batch_size = 100         # Records per batch for new projects
//! user = ""                # Service user for new projects ("" = root)
//!
//! [archive]
//! compression = "deflated" # "deflated" or "stored"
//! ```
//!
//! Config files are sparse: override just the values you want. Unknown keys
//! are rejected to catch typos early.

use crate::types::{DEFAULT_BATCH_SIZE, DEFAULT_ROOT, Project};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Name of the config file inside the workspace directory.
pub const CONFIG_FILENAME: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Tool configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Field values given to new projects.
    pub defaults: ProjectDefaults,
    /// Archive encoding settings.
    pub archive: ArchiveConfig,
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.defaults.batch_size == 0 {
            return Err(ConfigError::Validation(
                "defaults.batch_size must be greater than 0".into(),
            ));
        }
        if !self.defaults.root.starts_with('/') {
            return Err(ConfigError::Validation(
                "defaults.root must be an absolute path".into(),
            ));
        }
        if self.defaults.root.len() > 1 && self.defaults.root.ends_with('/') {
            return Err(ConfigError::Validation(
                "defaults.root must not end with '/'".into(),
            ));
        }
        Ok(())
    }
}

/// Values a new project starts with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectDefaults {
    pub root: String,
    pub batch_size: u32,
    /// Empty means the services run as root.
    pub user: String,
}

impl Default for ProjectDefaults {
    fn default() -> Self {
        Self {
            root: DEFAULT_ROOT.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            user: String::new(),
        }
    }
}

impl ProjectDefaults {
    pub fn new_project(&self, name: impl Into<String>) -> Project {
        Project {
            name: name.into(),
            root: self.root.clone(),
            batch_size: self.batch_size,
            user: self.user.clone(),
            ..Project::default()
        }
    }
}

/// Archive encoding settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArchiveConfig {
    pub compression: Compression,
}

/// Entry compression used by the zip codec.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Deflated,
    Stored,
}

/// Load `config.toml` from a workspace directory and validate it.
///
/// A missing file yields [`AppConfig::default`]; keys the file omits keep
/// their defaults.
pub fn load_config(dir: &Path) -> Result<AppConfig, ConfigError> {
    let config_path = dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(AppConfig::default());
    }
    let config: AppConfig = toml::from_str(&fs::read_to_string(&config_path)?)?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `config.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# feed-deploy configuration
# =========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file in the workspace directory (default: .feed-deploy/).
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# New projects
# ---------------------------------------------------------------------------
[defaults]
# Directory the project folder is installed under. Absolute, no trailing slash.
root = "/opt"

# Records (lines) per batch file.
batch_size = 100

# Local account that runs the services and owns the ssh keys for rsync.
# Empty means root.
user = ""

# ---------------------------------------------------------------------------
# Archives
# ---------------------------------------------------------------------------
[archive]
# "deflated" (smaller) or "stored" (no compression).
compression = "deflated"
"##
}
