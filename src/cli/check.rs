//! `upcast check` - fetch the feed and report applicable tasks.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use crate::condition::EvalContext;
use crate::config::UpdateConfig;
use crate::pipeline::UpdatePipeline;
use crate::source::UpdateSource;
use crate::version::parse_version;

/// Check for available updates without changing anything.
#[derive(Args)]
pub struct CheckCommand {
    /// Output the task list as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct CheckEntry {
    id: usize,
    description: String,
    applicable: bool,
}

impl CheckCommand {
    /// Fetch and parse the feed, evaluate conditions, and report.
    pub async fn execute(self, config: UpdateConfig) -> Result<()> {
        let source = UpdateSource::for_config(&config)?;
        let feed = UpdatePipeline::fetch_feed(&config, &source).await?;

        let installed_version = match &config.installed_version {
            Some(raw) => Some(parse_version(raw)?),
            None => None,
        };

        let mut entries = Vec::with_capacity(feed.tasks.len());
        for (index, task) in feed.tasks.iter().enumerate() {
            let ctx = EvalContext {
                app_dir: &config.app_dir,
                installed_version: installed_version.as_ref(),
                task_target: task.target_path(),
            };
            entries.push(CheckEntry {
                id: index + 1,
                description: task.description(),
                applicable: task.conditions().is_met(&ctx)?,
            });
        }

        if self.json {
            println!("{}", serde_json::to_string_pretty(&entries)?);
            return Ok(());
        }

        let applicable = entries.iter().filter(|e| e.applicable).count();
        println!("{} task(s) in feed, {} applicable:", entries.len(), applicable);
        for entry in &entries {
            let marker = if entry.applicable { "apply".green() } else { " skip".dimmed() };
            println!("  {} {}", marker, entry.description);
        }

        if applicable == 0 {
            println!("{}", "Everything is up to date.".green());
        }
        Ok(())
    }
}
