//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

/// Package Store - Find packages with pending upstream updates
#[derive(Parser, Debug)]
#[command(name = "package-store")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace).
    ///
    /// Defaults to `warn`, or to `RUST_LOG` when that is set.
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check repositories for available updates
    Check(commands::check::CheckArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(self.log_level.as_deref());

        match self.command {
            Commands::Check(args) => commands::check::execute(args, &self.color),
        }
    }
}

/// Routes the library's `log` output to stderr.
fn init_logging(level: Option<&str>) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if let Some(level) = level {
        builder.parse_filters(level);
    }
    // Already initialised when embedded in tests.
    let _ = builder.format_timestamp(None).try_init();
}
