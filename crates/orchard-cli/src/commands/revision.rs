//! Revision command implementation

use std::path::Path;

use colored::Colorize;
use orchard_core::{Revision, RevisionSelector, RevisionStatus, Workspace, revision_status};
use orchard_engine::Level;

use super::print_log;
use crate::error::{CliError, Result};

/// Show one revision
pub fn run_revision(path: &Path, selector: &str, show_log: bool, json: bool) -> Result<()> {
    let selector: RevisionSelector = selector.parse().map_err(CliError::user)?;
    let workspace = Workspace::open(path)?;
    let revision = revision_status(workspace.store().as_ref(), selector)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&revision)?);
    } else {
        print_revision(&revision, show_log);
    }
    Ok(())
}

pub(crate) fn print_revision(revision: &Revision, show_log: bool) {
    let status = match revision.status {
        RevisionStatus::Completed if revision.tally.is_success() => revision.status.to_string().green(),
        RevisionStatus::Completed => revision.status.to_string().yellow(),
        RevisionStatus::Error => revision.status.to_string().red(),
        _ => revision.status.to_string().cyan(),
    };

    println!("{} {}", "Revision".bold(), revision.generation);
    println!("  {}:  {}", "Policy".dimmed(), revision.policy_generation);
    println!("  {}:  {}", "Status".dimmed(), status);
    println!(
        "  {}: {}% ({}/{})",
        "Progress".dimmed(),
        revision.progress.percentage(),
        revision.progress.current,
        revision.progress.total
    );
    println!("  {}: {}", "Actions".dimmed(), revision.tally);
    println!("  {}: {}", "Created".dimmed(), revision.created_at.to_rfc3339());
    if let Some(finished) = revision.finished_at {
        println!("  {}: {}", "Finished".dimmed(), finished.to_rfc3339());
    }
    if let Some(error) = &revision.error {
        println!("  {}:   {}", "Error".dimmed(), error.red());
    }

    // Warnings and errors are always worth showing
    let min = if show_log { Level::Debug } else { Level::Warn };
    for log in [&revision.resolve_log, &revision.apply_log] {
        if log.at_least(min).next().is_none() {
            continue;
        }
        println!();
        println!("{}:", format!("{} log", log.scope()).bold());
        print_log(log, min);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchard_test_utils::scenario::TestWorkspace;

    #[test]
    fn test_revision_not_found() {
        let ws = TestWorkspace::database();
        let err = run_revision(ws.root(), "last", false, false).unwrap_err();
        assert_eq!(err.to_string(), "revision not found: last revision");
    }

    #[test]
    fn test_bad_selector_is_a_user_error() {
        let ws = TestWorkspace::database();
        let err = run_revision(ws.root(), "yesterday", false, false).unwrap_err();
        assert!(matches!(err, CliError::User { .. }));
    }
}
