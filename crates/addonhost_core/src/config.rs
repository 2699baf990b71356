//! Host configuration.
//!
//! # Responsibility
//! - Describe where addons live and how strict asset checks are.
//! - Carry logging and database settings for embedders.
//!
//! # Invariants
//! - Every field has a default; an empty JSON object is a valid config.

use crate::logging::default_log_level;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// What to do when a declared asset file is missing on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingAssetPolicy {
    /// Fail the install with `MissingAssetFile`.
    #[default]
    Abort,
    /// Log a warning and leave the asset out of the bundle.
    Skip,
}

/// Host-side settings consumed by the extension registry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Directory holding one sub-directory per extension. When unset, asset
    /// files are not checked on disk.
    pub addons_root: Option<PathBuf>,
    pub missing_asset_policy: MissingAssetPolicy,
    pub log_level: String,
    /// Absolute directory for rolling log files; logging stays off if unset.
    pub log_dir: Option<PathBuf>,
    /// SQLite file for the persisted registry; in-memory when unset.
    pub database_path: Option<PathBuf>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            addons_root: None,
            missing_asset_policy: MissingAssetPolicy::default(),
            log_level: default_log_level().to_string(),
            log_dir: None,
            database_path: None,
        }
    }
}

impl HostConfig {
    pub fn with_addons_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.addons_root = Some(root.into());
        self
    }

    pub fn with_missing_asset_policy(mut self, policy: MissingAssetPolicy) -> Self {
        self.missing_asset_policy = policy;
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Loads configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|err| ConfigError::Io(format!("{}: {err}", path.display())))?;
        Self::from_json_str(&content)
    }

    /// Returns whether `relative` exists under the addons root.
    ///
    /// Always `true` when no addons root is configured.
    pub fn asset_exists(&self, relative: &str) -> bool {
        match &self.addons_root {
            Some(root) => root.join(relative).is_file(),
            None => true,
        }
    }
}

/// Configuration loading errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Io(String),
    Parse(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(message) => write!(f, "failed to read host config: {message}"),
            Self::Parse(message) => write!(f, "host config is invalid: {message}"),
        }
    }
}

impl Error for ConfigError {}
