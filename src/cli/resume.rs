//! `upcast resume` - apply deferred cold-run tasks.
//!
//! A previous `apply` may have deferred mutations that were unsafe while
//! the target was live (file replacements without `hot_swap`). After a
//! restart, `resume` reloads the pending work list and executes it with
//! `cold_run = true`; the state file is cleared once everything applied.

use anyhow::{Result, anyhow};
use clap::Args;
use tracing::info;

use super::apply::render_report;
use crate::config::UpdateConfig;
use crate::core::UpcastError;
use crate::feed::Feed;
use crate::pipeline::{PendingState, RunLock, UpdatePipeline};
use crate::source::UpdateSource;
use crate::task::ProgressSink;
use crate::utils::progress::ProgressBar;

/// Apply tasks deferred by a previous run.
#[derive(Args)]
pub struct ResumeCommand {
    /// Print the final report as JSON
    #[arg(long)]
    json: bool,
}

impl ResumeCommand {
    /// Run the pending work list as a cold run.
    pub async fn execute(self, config: UpdateConfig) -> Result<()> {
        let _lock = RunLock::acquire(&config.staging_dir())?;

        let state = PendingState::load(&config.pending_state_path())
            .await?
            .ok_or(UpcastError::NothingToResume)?;

        let (base_url, tasks) = state.into_tasks();
        info!("Resuming {} deferred task(s)", tasks.len());

        let feed = Feed {
            base_url,
            payload_size: None,
            compressed_size: None,
            tasks,
        };
        let source = UpdateSource::for_config(&config)?;

        let bar = ProgressBar::new(100);
        bar.set_prefix("resume");
        let bar_for_sink = bar.clone();
        let sink = ProgressSink::new(move |event| {
            bar_for_sink.set_position(u64::from(event.percentage));
            bar_for_sink
                .set_message(format!("{}: {}", event.task_description, event.message));
        });

        let report = UpdatePipeline::new(config, source, feed)
            .with_progress(sink)
            .with_cold_run(true)
            .run()
            .await;
        bar.finish_and_clear();

        render_report(&report, self.json)?;
        if report.is_success() { Ok(()) } else { Err(anyhow!("resume run failed")) }
    }
}
