//! Claim status command implementation

use std::path::Path;

use colored::Colorize;
use orchard_core::{StatusFlag, Workspace};

use super::runtime;
use crate::error::Result;

/// Show deployment (and optionally readiness) of claims in the stored policy
pub fn run_claim_status(path: &Path, claims: &[String], readiness: bool, json: bool) -> Result<()> {
    let workspace = Workspace::open(path)?;
    let flag = if readiness {
        StatusFlag::Readiness
    } else {
        StatusFlag::Deployment
    };
    let enforcer = workspace.enforcer();
    let statuses = runtime()?.block_on(enforcer.claim_status(claims, flag))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
        return Ok(());
    }

    for status in &statuses {
        let state = if !status.found {
            "not found".red()
        } else if !status.resolved {
            "unresolved".red()
        } else if status.ready == Some(false) {
            "not ready".yellow()
        } else if !status.is_deployed() {
            "deploying".yellow()
        } else if status.ready == Some(true) {
            "ready".green()
        } else {
            "deployed".green()
        };
        println!(
            "{} {} ({}/{} instances)",
            status.claim.cyan(),
            state,
            status.deployed,
            status.instances
        );
        if let Some(reason) = &status.reason {
            println!("  {}", reason.dimmed());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::run_enforce;
    use orchard_test_utils::scenario::TestWorkspace;

    #[test]
    fn test_claim_status_after_enforce() {
        let ws = TestWorkspace::database();
        ws.write("orchard.toml", "[enforcer]\nnoop = true\n");
        run_enforce(ws.root(), "root", true, false).unwrap();

        let claims = vec!["main/c1".to_string(), "main/nope".to_string()];
        assert!(run_claim_status(ws.root(), &claims, true, false).is_ok());
        assert!(run_claim_status(ws.root(), &claims, false, true).is_ok());
    }
}
