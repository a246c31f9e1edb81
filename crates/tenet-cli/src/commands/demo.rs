//! Demo command - the document-management scenario.

use anyhow::{Context, Result};
use tenet_abac::reference::edocs;
use tenet_config::TenetConfig;

pub fn run(config: &TenetConfig) -> Result<()> {
    let pdp = edocs::pdp(config.pdp.clone()).context("Reference policy failed to load")?;

    let scenarios = [
        ("helpdesk, not assigned to the owning tenant", ["tenant1", "tenant3"]),
        ("helpdesk, assigned to the owning tenant", ["tenant1", "tenant4"]),
    ];

    for (i, (title, assigned)) in scenarios.iter().enumerate() {
        let request = edocs::helpdesk_request("maarten", assigned, "tenant4");
        let response = pdp.evaluate(&request);

        println!("Scenario {}: {title}", i + 1);
        println!("  assigned tenants: {}", assigned.join(", "));
        println!("  owning tenant:    tenant4");
        println!("  decision:         {}", response.decision);
        if response.obligations.is_empty() {
            println!("  obligations:      none");
        }
        for obligation in &response.obligations {
            println!("  obligation:       {}", obligation.id);
            for assignment in &obligation.assignments {
                println!("    {} = {}", assignment.name, assignment.value);
            }
        }
        println!();
    }
    Ok(())
}
