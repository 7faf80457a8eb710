//! Orchard CLI
//!
//! Validates policy files, previews plans and enforces the policy against
//! the actual state of a workspace.

mod cli;
mod commands;
mod error;

use clap::Parser;
use colored::Colorize;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cli::{Cli, Commands};
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command.clone() {
        Some(cmd) => execute_command(cmd, &cli),
        None => {
            println!("{} policy enforcement CLI", "orchard".green().bold());
            println!();
            println!("Run {} for available commands.", "orchard --help".cyan());
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let builder = FmtSubscriber::builder().with_writer(std::io::stderr);
    let result = if verbose {
        tracing::subscriber::set_global_default(
            builder.with_max_level(Level::DEBUG).with_target(true).finish(),
        )
    } else {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        tracing::subscriber::set_global_default(builder.with_env_filter(filter).finish())
    };
    if result.is_err() {
        eprintln!("{}: tracing subscriber already installed", "warning".yellow());
    }
    tracing::debug!("Verbose mode enabled");
}

fn execute_command(cmd: Commands, cli: &Cli) -> Result<()> {
    let dir = cli.dir.as_path();
    match cmd {
        Commands::Validate => commands::run_validate(dir),
        Commands::Plan { json } => commands::run_plan(dir, json),
        Commands::Enforce { no_sync, json } => commands::run_enforce(dir, &cli.user, !no_sync, json),
        Commands::ClaimStatus {
            claims,
            readiness,
            json,
        } => commands::run_claim_status(dir, &claims, readiness, json),
        Commands::ClaimResources { claim, json } => commands::run_claim_resources(dir, &claim, json),
        Commands::Revision {
            selector,
            log,
            json,
        } => commands::run_revision(dir, &selector, log, json),
    }
}

#[cfg(test)]
mod tests {
    use crate::error::CliError;

    #[test]
    fn test_cli_error_user() {
        let error = CliError::user("test error");
        assert_eq!(format!("{}", error), "test error");
    }
}
