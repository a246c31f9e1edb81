//! Configuration management commands.

use anyhow::{Context, Result};
use tenet_config::{Paths, TenetConfig};

/// Show current configuration.
pub fn show(config: TenetConfig, format: &str) -> Result<()> {
    match format {
        "json" => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{json}");
        }
        "toml" => {
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{toml_str}");
        }
        "text" => {
            println!("tenet Configuration");
            println!("===================\n");

            println!("PDP:");
            println!("  Audit decisions: {}", config.pdp.audit_decisions);
            println!("  Max depth: {}", config.pdp.max_depth);
            println!();

            println!("Policy:");
            println!("  Path: {}", config.policy.path.display());
            println!();

            println!("Logging:");
            println!("  Level: {}", config.logging.level);
        }
        other => anyhow::bail!("Unknown format '{other}' (expected text, json or toml)"),
    }
    Ok(())
}

/// Validate configuration.
pub fn validate(project: &str, config: Result<TenetConfig>) -> Result<()> {
    let config = config.context("Configuration is invalid")?;

    if Paths::is_initialized(project) {
        println!("tenet.toml: ok");
    } else {
        println!("No tenet.toml in {project}; using defaults");
    }
    if !config.policy.path.exists() {
        println!(
            "Warning: policy document {} does not exist",
            config.policy.path.display()
        );
    }
    Ok(())
}
