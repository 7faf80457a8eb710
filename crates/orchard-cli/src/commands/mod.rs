//! Command implementations for orchard-cli

pub mod enforce;
pub mod plan;
pub mod resources;
pub mod revision;
pub mod status;
pub mod validate;

pub use enforce::run_enforce;
pub use plan::run_plan;
pub use resources::run_claim_resources;
pub use revision::run_revision;
pub use status::run_claim_status;
pub use validate::run_validate;

use colored::Colorize;
use orchard_engine::{EventLog, Level};

use crate::error::Result;

/// Runtime for the async parts of the core
fn runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

/// Print the entries of `log` at `min` or above, one per line
fn print_log(log: &EventLog, min: Level) {
    for event in log.at_least(min) {
        let level = match event.level {
            Level::Error => event.level.to_string().red().bold(),
            Level::Warn => event.level.to_string().yellow(),
            Level::Info => event.level.to_string().normal(),
            Level::Debug => event.level.to_string().dimmed(),
        };
        print!("  {:>5} {}", level, event.message);
        if !event.objects.is_empty() {
            print!(" {}", format!("({})", event.objects.join(", ")).dimmed());
        }
        println!();
    }
}
