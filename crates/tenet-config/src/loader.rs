//! Configuration loader with multi-source merging

use crate::{Paths, TenetConfig};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader with builder pattern
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
    env_source: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    /// Create a new config loader with default project directory (current dir)
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "TENET".to_string(),
            env_source: None,
        }
    }

    /// Set the project directory
    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the environment variable prefix (default: "TENET")
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Read environment overrides from `vars` instead of the process
    /// environment.
    pub fn with_env_source(mut self, vars: HashMap<String, String>) -> Self {
        self.env_source = Some(vars);
        self
    }

    /// Load configuration from all sources with proper precedence
    pub fn load(self) -> Result<TenetConfig> {
        let mut builder = config::Config::builder();

        // 1. Start with built-in defaults
        let defaults = TenetConfig::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        // 2. User config (~/.config/tenet/config.toml)
        let paths = Paths::new();
        if let Ok(user_config_file) = paths.user_config_file() {
            if user_config_file.exists() {
                builder = builder.add_source(
                    config::File::from(user_config_file)
                        .required(false)
                        .format(config::FileFormat::Toml),
                );
            }
        }

        // 3. Project config (tenet.toml)
        let project_config_file = Paths::project_config_file(&self.project_dir);
        if project_config_file.exists() {
            builder = builder.add_source(
                config::File::from(project_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 4. Local config (tenet.local.toml, gitignored)
        let local_config_file = Paths::local_config_file(&self.project_dir);
        if local_config_file.exists() {
            builder = builder.add_source(
                config::File::from(local_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 5. Environment variables (TENET_PDP__MAX_DEPTH=16)
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(self.env_source),
        );

        // Build and deserialize
        let config = builder.build().context("Failed to build configuration")?;

        let mut tenet_config: TenetConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        tenet_config
            .validate()
            .context("Configuration failed validation")?;

        // Resolve relative paths
        tenet_config.resolve_paths(&self.project_dir);

        Ok(tenet_config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default(self) -> TenetConfig {
        self.load().unwrap_or_default()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn loader(project_dir: &Path) -> ConfigLoader {
        ConfigLoader::new()
            .with_project_dir(project_dir)
            .with_env_source(HashMap::new())
    }

    #[test]
    fn test_load_defaults() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let config = loader(temp_dir.path()).load().expect("Failed to load config");

        assert_eq!(config.pdp.max_depth, 64);
        assert!(config.pdp.audit_decisions);
        assert_eq!(config.policy.path, temp_dir.path().join("policy.json"));
    }

    #[test]
    fn test_load_project_config() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        let config_content = r#"
[pdp]
max_depth = 16
audit_decisions = false

[policy]
path = "policies/edocs.json"

[logging]
level = "debug"
"#;
        fs::write(project_dir.join("tenet.toml"), config_content)
            .expect("Failed to write config");

        let config = loader(project_dir).load().expect("Failed to load config");

        assert_eq!(config.pdp.max_depth, 16);
        assert!(!config.pdp.audit_decisions);
        assert_eq!(config.policy.path, project_dir.join("policies/edocs.json"));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_local_overrides() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("tenet.toml"),
            r#"
[pdp]
max_depth = 16
"#,
        )
        .expect("Failed to write project config");

        fs::write(
            project_dir.join("tenet.local.toml"),
            r#"
[pdp]
max_depth = 8
"#,
        )
        .expect("Failed to write local config");

        let config = loader(project_dir).load().expect("Failed to load config");

        // Local config should override project config
        assert_eq!(config.pdp.max_depth, 8);
    }

    #[test]
    fn test_environment_overrides_files() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(project_dir.join("tenet.toml"), "[pdp]\nmax_depth = 16\n")
            .expect("Failed to write project config");

        let vars = HashMap::from([
            ("TENET_PDP__MAX_DEPTH".to_string(), "4".to_string()),
            ("TENET_LOGGING__LEVEL".to_string(), "warn".to_string()),
        ]);
        let config = ConfigLoader::new()
            .with_project_dir(project_dir)
            .with_env_source(vars)
            .load()
            .expect("Failed to load config");

        assert_eq!(config.pdp.max_depth, 4);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_custom_env_prefix() {
        let temp_dir = tempdir().expect("Failed to create temp dir");

        let vars = HashMap::from([
            ("GATEWAY_PDP__MAX_DEPTH".to_string(), "12".to_string()),
            ("TENET_PDP__MAX_DEPTH".to_string(), "4".to_string()),
        ]);
        let config = ConfigLoader::new()
            .with_project_dir(temp_dir.path())
            .with_env_prefix("GATEWAY")
            .with_env_source(vars)
            .load()
            .expect("Failed to load config");

        assert_eq!(config.pdp.max_depth, 12);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(project_dir.join("tenet.toml"), "[pdp]\nmax_depth = 0\n")
            .expect("Failed to write project config");

        assert!(loader(project_dir).load().is_err());
        assert_eq!(loader(project_dir).load_or_default(), TenetConfig::default());
    }
}
