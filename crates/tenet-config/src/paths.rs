//! Where tenet looks for configuration files.
//!
//! One file per user, found through the platform's config directory, and
//! two per project: `tenet.toml` (checked in) and `tenet.local.toml`
//! (machine-specific overrides, usually gitignored).

use crate::ConfigError;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// File name of the per-user configuration.
pub const USER_CONFIG_FILE: &str = "config.toml";

/// File name of the project configuration.
pub const PROJECT_CONFIG_FILE: &str = "tenet.toml";

/// File name of the local, uncommitted project overrides.
pub const LOCAL_CONFIG_FILE: &str = "tenet.local.toml";

/// Configuration file locations.
pub struct Paths {
    dirs: Option<ProjectDirs>,
}

impl Paths {
    pub fn new() -> Self {
        Self {
            dirs: ProjectDirs::from("com", "Tenet", "tenet"),
        }
    }

    /// The per-user file, e.g. `~/.config/tenet/config.toml` on Linux.
    ///
    /// Fails when the platform has no home directory to derive it from.
    pub fn user_config_file(&self) -> Result<PathBuf, ConfigError> {
        let dirs = self.dirs.as_ref().ok_or_else(|| {
            ConfigError::XdgError("no home directory for the user config file".to_string())
        })?;
        Ok(dirs.config_dir().join(USER_CONFIG_FILE))
    }

    pub fn project_config_file(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join(PROJECT_CONFIG_FILE)
    }

    pub fn local_config_file(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join(LOCAL_CONFIG_FILE)
    }

    /// True once `tenet init` (or the user) has written a `tenet.toml`.
    pub fn is_initialized(project_dir: impl AsRef<Path>) -> bool {
        Self::project_config_file(project_dir).is_file()
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}
