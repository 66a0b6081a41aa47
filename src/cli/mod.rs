//! Command-line interface for upcast.
//!
//! Each command is implemented as a separate module with its own
//! argument struct and execution logic:
//!
//! - `check` - fetch and parse the feed, report which tasks would apply
//! - `apply` - run the full update pipeline
//! - `resume` - apply deferred (cold-run) tasks left by a previous run
//!
//! # Global Options
//!
//! - `--config <PATH>` - configuration file (default `./upcast.toml`)
//! - `--verbose` / `--quiet` - log verbosity
//! - `--no-progress` - disable progress bars (also honored via the
//!   `UPCAST_NO_PROGRESS` environment variable)

mod apply;
mod check;
mod resume;

pub use apply::ApplyCommand;
pub use check::CheckCommand;
pub use resume::ResumeCommand;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::UpdateConfig;

/// Feed-driven self-update engine.
#[derive(Parser)]
#[command(name = "upcast", version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file (default: ./upcast.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable progress bars and spinners
    #[arg(long, global = true)]
    pub no_progress: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the feed and report which tasks would apply
    Check(CheckCommand),
    /// Run the full update pipeline
    Apply(ApplyCommand),
    /// Apply deferred cold-run tasks from a previous run
    Resume(ResumeCommand),
}

impl Cli {
    /// Execute the selected command.
    pub async fn execute(self) -> Result<()> {
        init_logging(self.verbose, self.quiet);

        if self.no_progress {
            // SAFETY: called once at startup, before any threads spawn.
            unsafe {
                std::env::set_var("UPCAST_NO_PROGRESS", "1");
            }
        }

        let config = UpdateConfig::load(self.config.as_deref()).await?;

        match self.command {
            Commands::Check(cmd) => cmd.execute(config).await,
            Commands::Apply(cmd) => cmd.execute(config).await,
            Commands::Resume(cmd) => cmd.execute(config).await,
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let default_filter = if verbose {
        "upcast=debug"
    } else if quiet {
        "upcast=error"
    } else {
        "upcast=info"
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // try_init so repeated calls in tests stay harmless
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
}
