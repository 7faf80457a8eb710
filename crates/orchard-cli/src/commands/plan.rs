//! Plan command implementation

use std::path::Path;

use colored::Colorize;
use orchard_core::Workspace;
use orchard_engine::Level;

use super::print_log;
use crate::error::Result;

/// Resolve the policy files and print the plan against the actual state
pub fn run_plan(path: &Path, json: bool) -> Result<()> {
    let workspace = Workspace::open(path)?;
    let preview = workspace.plan_files()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&preview.plan)?);
        return Ok(());
    }

    if preview.resolve_log.at_least(Level::Warn).next().is_some() {
        println!("{}:", "Resolution".bold());
        print_log(&preview.resolve_log, Level::Warn);
        println!();
    }
    print!("{}", preview.render());
    Ok(())
}
