//! `upcast apply` - run the full update pipeline.

use anyhow::{Result, anyhow};
use clap::Args;
use colored::Colorize;
use tracing::warn;

use crate::config::UpdateConfig;
use crate::pipeline::{PipelineReport, RunLock, UpdatePipeline};
use crate::source::UpdateSource;
use crate::task::ProgressSink;
use crate::utils::progress::ProgressBar;

/// Fetch the feed and apply every applicable task.
#[derive(Args)]
pub struct ApplyCommand {
    /// Print the final report as JSON
    #[arg(long)]
    json: bool,
}

impl ApplyCommand {
    /// Run one update pipeline under the staging-area lock.
    pub async fn execute(self, config: UpdateConfig) -> Result<()> {
        // One run per staging area; a second invocation fails fast.
        let _lock = RunLock::acquire(&config.staging_dir())?;

        let source = UpdateSource::for_config(&config)?;
        let feed = UpdatePipeline::fetch_feed(&config, &source).await?;

        if feed.tasks.is_empty() {
            println!("Feed contains no tasks; nothing to do.");
            return Ok(());
        }

        let bar = ProgressBar::new(100);
        bar.set_prefix("apply");
        let bar_for_sink = bar.clone();
        let sink = ProgressSink::new(move |event| {
            bar_for_sink.set_position(u64::from(event.percentage));
            bar_for_sink
                .set_message(format!("{}: {}", event.task_description, event.message));
        });

        let pipeline = UpdatePipeline::new(config, source, feed).with_progress(sink);

        // Ctrl-C cancels at the next task boundary; the task in flight
        // always finishes on its own terms first.
        let cancel = pipeline.cancel_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Cancellation requested; stopping at the next task boundary");
                cancel.cancel();
            }
        });

        let report = pipeline.run().await;
        bar.finish_and_clear();

        render_report(&report, self.json)?;
        if report.is_success() { Ok(()) } else { Err(anyhow!("update run failed")) }
    }
}

pub(super) fn render_report(report: &PipelineReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    if report.is_success() {
        println!("{}", report.summary().green());
    } else {
        eprintln!("{}", report.summary().red());
        for failure in &report.rollback_failures {
            eprintln!("  {} rollback of '{}' failed: {}", "!".red(), failure.task, failure.cause);
        }
    }
    Ok(())
}
