//! Configuration management for tenet
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. CLI arguments (highest precedence)
//! 2. Environment variables (TENET_* prefix, `__` between section and key)
//! 3. tenet.local.toml (gitignored, local overrides)
//! 4. tenet.toml (git-tracked, project config)
//! 5. ~/.config/tenet/config.toml (user defaults)
//! 6. Built-in defaults (lowest precedence)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;
pub use tenet_abac::PdpOptions;

/// Main tenet configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TenetConfig {
    pub pdp: PdpOptions,
    pub policy: PolicyConfig,
    pub logging: LoggingConfig,
}

/// Where the policy document lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub path: PathBuf,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("policy.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

impl TenetConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Resolve relative paths to absolute
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        if self.policy.path.is_relative() {
            self.policy.path = base_dir.as_ref().join(&self.policy.path);
        }
    }

    /// Rejects settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pdp.max_depth == 0 {
            return Err(ConfigError::ValidationError(
                "pdp.max_depth must be at least 1".to_string(),
            ));
        }
        let level = self.logging.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level '{}' is not one of {}",
                self.logging.level,
                LOG_LEVELS.join(", ")
            )));
        }
        Ok(())
    }

    /// Writes the default configuration to `tenet.toml` in `project_dir`.
    ///
    /// Refuses to overwrite an existing file.
    pub fn write_default(project_dir: impl AsRef<Path>) -> Result<PathBuf, ConfigError> {
        let path = Paths::project_config_file(project_dir);
        if path.exists() {
            return Err(ConfigError::AlreadyExists(path));
        }
        let rendered = toml::to_string_pretty(&Self::default())?;
        fs::write(&path, rendered).map_err(|source| ConfigError::WriteError {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}
