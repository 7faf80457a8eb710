//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Orchard - resolve claims against policy and keep deployments in line
#[derive(Parser, Debug)]
#[command(name = "orchard")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Workspace directory holding orchard.toml, policy files and users
    #[arg(short = 'C', long, global = true, default_value = ".")]
    pub dir: PathBuf,

    /// User policy changes are made on behalf of
    #[arg(short, long, global = true, env = "ORCHARD_USER", default_value = "root")]
    pub user: String,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Load and validate the policy files
    Validate,

    /// Show what enforcing the policy files would change, without changing anything
    Plan {
        /// Output the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Store the policy files as the current policy and enforce it once
    ///
    /// Examples:
    ///   orchard enforce              # Sync policy/ and apply the plan
    ///   orchard enforce --no-sync    # Enforce the stored policy as is
    Enforce {
        /// Skip loading the policy files first
        #[arg(long)]
        no_sync: bool,

        /// Output the revision as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the status of claims
    ClaimStatus {
        /// Claim ids as namespace/name
        #[arg(required = true)]
        claims: Vec<String>,

        /// Also ask plugins whether the instances are ready
        #[arg(long)]
        readiness: bool,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// List the cluster resources behind a claim's deployed instances
    ClaimResources {
        /// Claim id as namespace/name
        claim: String,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Show a revision
    ///
    /// Examples:
    ///   orchard revision             # The last revision
    ///   orchard revision 3           # Revision generation 3
    ///   orchard revision policy:5    # Latest revision for policy generation 5
    Revision {
        /// `last`, a revision generation, or `policy:<generation>`
        #[arg(default_value = "last")]
        selector: String,

        /// Print the resolve and apply logs
        #[arg(long)]
        log: bool,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },
}
