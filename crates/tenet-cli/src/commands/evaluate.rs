//! Evaluate command - decides one request document.

use std::path::Path;

use anyhow::{Context, Result};
use tenet_abac::{PolicyDocument, RequestDocument};
use tenet_config::TenetConfig;

pub fn run(config: &TenetConfig, policy: &str, request: &str, stats: bool) -> Result<()> {
    let document = PolicyDocument::load(Path::new(policy))
        .with_context(|| format!("Failed to read policy document {policy}"))?;
    let catalog = document.catalog()?;
    let request = RequestDocument::load(Path::new(request))
        .with_context(|| format!("Failed to read request document {request}"))?
        .into_request(&catalog)
        .context("Request does not match the policy's attributes")?;

    let pdp = document
        .into_pdp(config.pdp.clone())
        .context("Invalid policy")?;
    let (response, evaluation) = pdp.evaluate_with_stats(&request);

    println!("{}", serde_json::to_string_pretty(&response)?);
    if stats {
        eprintln!("resolver calls: {}", evaluation.resolver_calls);
        eprintln!("cache hits:     {}", evaluation.cache_hits);
        eprintln!("nodes visited:  {}", evaluation.nodes_visited);
    }
    Ok(())
}
