//! Enforce command implementation

use std::path::Path;

use colored::Colorize;
use orchard_core::Workspace;

use super::revision::print_revision;
use super::runtime;
use crate::error::{CliError, Result};

/// Store the policy files on behalf of `user`, then run one enforcement cycle
pub fn run_enforce(path: &Path, user: &str, sync: bool, json: bool) -> Result<()> {
    let workspace = Workspace::open(path)?;

    if sync {
        let outcome = workspace.sync_policy(user)?;
        if !json {
            let label = if outcome.changed { "Stored" } else { "Unchanged" };
            println!("{} policy generation {}", label.green().bold(), outcome.generation);
        }
    }

    let enforcer = workspace.enforcer();
    let report = runtime()?.block_on(enforcer.enforce_once())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report.revision)?);
    } else {
        match &report.revision {
            Some(revision) => print_revision(revision, false),
            None => println!("{} Actual state matches policy generation {}", "OK".green().bold(), report.policy_generation),
        }
    }

    match report.revision {
        Some(revision) if !revision.tally.is_success() => Err(CliError::user(format!(
            "revision {} finished with failures: {}",
            revision.generation, revision.tally
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchard_test_utils::scenario::TestWorkspace;

    const NOOP: &str = "[enforcer]\nnoop = true\n";

    #[test]
    fn test_enforce_twice() {
        let ws = TestWorkspace::database();
        ws.write("orchard.toml", NOOP);

        run_enforce(ws.root(), "root", true, false).unwrap();
        assert!(ws.exists(".orchard/state.json"));
        run_enforce(ws.root(), "root", true, true).unwrap();
    }

    #[test]
    fn test_enforce_without_plugins_reports_failures() {
        let ws = TestWorkspace::database();
        let err = run_enforce(ws.root(), "root", true, false).unwrap_err();
        assert!(err.to_string().contains("finished with failures"));
    }

    #[test]
    fn test_enforce_as_consumer_is_denied() {
        let ws = TestWorkspace::database();
        ws.write("orchard.toml", NOOP);
        let err = run_enforce(ws.root(), "alice", true, false).unwrap_err();
        assert!(err.to_string().contains("doesn't have ACL permissions"));
    }
}
