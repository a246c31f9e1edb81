//! Initialize command - writes tenet.toml and a starter policy.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tenet_abac::reference::edocs;
use tenet_config::{Paths, TenetConfig};

pub fn run(project: &str) -> Result<()> {
    let project_dir = Path::new(project);

    if Paths::is_initialized(project_dir) {
        anyhow::bail!(
            "Project already initialized in {}. tenet.toml already exists.",
            project_dir.display()
        );
    }

    fs::create_dir_all(project_dir).context("Failed to create project directory")?;
    let config_path = TenetConfig::write_default(project_dir)?;
    println!("Wrote {}", config_path.display());

    let policy_path = project_dir.join(TenetConfig::default().policy.path);
    if policy_path.exists() {
        println!("Kept existing {}", policy_path.display());
    } else {
        let json = edocs::document().to_json_pretty()?;
        fs::write(&policy_path, json)
            .with_context(|| format!("Failed to write {}", policy_path.display()))?;
        println!("Wrote {}", policy_path.display());
    }

    println!();
    println!("Next steps:");
    println!("  tenet validate {}", policy_path.display());
    println!("  tenet demo");
    Ok(())
}
