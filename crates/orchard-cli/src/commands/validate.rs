//! Validate command implementation

use std::path::Path;

use colored::Colorize;
use orchard_core::Workspace;

use crate::error::Result;

/// Load the policy files and validate them
pub fn run_validate(path: &Path) -> Result<()> {
    let workspace = Workspace::open(path)?;
    let policy = workspace.validate_files()?;

    println!("{} Policy is valid", "OK".green().bold());
    println!("  {}:   {}", "Directory".dimmed(), workspace.policy_dir().display());
    println!("  {}:     {}", "Objects".dimmed(), policy.len());
    println!("  {}:      {}", "Claims".dimmed(), policy.claims().count());
    Ok(())
}
