//! upcast CLI entry point
//!
//! Handles command-line argument parsing, logging setup, error display, and
//! command execution. The CLI supports three commands:
//! - `check` - fetch and parse the feed, list applicable tasks
//! - `apply` - run the full update pipeline
//! - `resume` - apply deferred (cold-run) tasks from a previous run

use anyhow::Result;
use clap::Parser;
use upcast::cli;
use upcast::core::error::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // Set up colored output for Windows
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            // Convert to user-friendly error with context and suggestions
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
