//! Validate command - load-time checks of a policy document.

use anyhow::{Context, Result};
use tenet_abac::PolicyDocument;
use tenet_config::TenetConfig;

pub fn run(config: TenetConfig, policy: Option<&str>) -> Result<()> {
    let path = policy.map_or(config.policy.path, Into::into);

    let document = PolicyDocument::load(&path)
        .with_context(|| format!("Failed to read policy document {}", path.display()))?;
    let attributes = document.attributes.len();
    let pdp = document
        .into_pdp(config.pdp)
        .with_context(|| format!("Invalid policy in {}", path.display()))?;

    let root = pdp.policy();
    println!("{}: ok", path.display());
    println!("  Root:       {}", root.id());
    println!("  Nodes:      {}", root.node_count());
    println!("  Depth:      {}", root.depth());
    println!("  Attributes: {attributes}");
    Ok(())
}

