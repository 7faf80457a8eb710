//! Claim resources command implementation

use std::path::Path;

use colored::Colorize;
use orchard_core::Workspace;

use super::runtime;
use crate::error::Result;

/// List the cluster resources behind the deployed instances of a claim
pub fn run_claim_resources(path: &Path, claim: &str, json: bool) -> Result<()> {
    let workspace = Workspace::open(path)?;
    let enforcer = workspace.enforcer();
    let instances = runtime()?.block_on(enforcer.claim_resources(claim))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&instances)?);
        return Ok(());
    }

    if instances.is_empty() {
        println!("{} has no deployed instances", claim.cyan());
        return Ok(());
    }
    for instance in &instances {
        println!("{} {}", instance.deploy_name.bold(), instance.key.to_string().dimmed());
        for (kind, names) in &instance.resources.items {
            println!("  {}: {}", kind.cyan(), names.join(", "));
        }
    }
    Ok(())
}
