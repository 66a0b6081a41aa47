//! The update execution pipeline.
//!
//! Orchestrates one update run end to end:
//!
//! ```text
//! Idle → Preparing → Evaluating → Executing → (RollingBack) → Done
//! ```
//!
//! - **Preparing**: every task stages its payload, in feed order. The
//!   first failure aborts the run - nothing has executed, so nothing
//!   needs rolling back.
//! - **Evaluating**: each task's condition tree gates applicability.
//!   Skipped tasks never execute and never enter rollback accounting. A
//!   hard condition error is a configuration error and aborts before any
//!   execution.
//! - **Executing**: applicable tasks run strictly in feed order. Each
//!   success pushes onto the executed stack; a failure halts execution.
//! - **RollingBack**: on failure, the executed stack unwinds last-first.
//!   Reversal failures are collected but never stop the unwind - every
//!   executed task gets its rollback attempt.
//!
//! Execution is single-threaded and strictly sequential: tasks mutate
//! shared system state, and concurrent unordered mutation would make
//! rollback ordering ill-defined. Cancellation is cooperative and
//! honored only between task boundaries - an in-flight task always
//! completes or fails on its own terms, preserving the invariant that
//! "executed" means "fully applied, snapshot captured".

mod lock;
mod report;
mod staging;

pub use lock::RunLock;
pub use report::{FailureCause, PipelineReport, RollbackFailure, RunOutcome, TaskRecord};
pub use staging::{PendingState, PendingTask};

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use crate::condition::EvalContext;
use crate::config::UpdateConfig;
use crate::feed::{Feed, reader_for};
use crate::source::{PayloadCache, UpdateSource};
use crate::task::{ExecuteContext, ExecutionStatus, PrepareContext, ProgressSink};
use crate::utils::fs::ensure_dir;
use crate::version::parse_version;

/// Cooperative cancellation signal, checked between task boundaries.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// A fresh, un-cancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation at the next task boundary.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Phase of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Constructed, not yet started.
    Idle,
    /// Staging payloads.
    Preparing,
    /// Evaluating task conditions.
    Evaluating,
    /// Executing applicable tasks.
    Executing,
    /// Unwinding the executed stack after a failure.
    RollingBack,
    /// Finished; the report is final.
    Done,
}

/// One update run over one feed.
///
/// The pipeline owns the feed's task list exclusively for the duration
/// of the run. The caller enforces single-run-per-staging-area through
/// [`RunLock`] before constructing a pipeline.
pub struct UpdatePipeline {
    config: UpdateConfig,
    source: UpdateSource,
    feed: Feed,
    cache: PayloadCache,
    cancel: CancelToken,
    progress: ProgressSink,
    cold_run: bool,
    state: PipelineState,
}

impl UpdatePipeline {
    /// Build a pipeline for one run.
    #[must_use]
    pub fn new(config: UpdateConfig, source: UpdateSource, feed: Feed) -> Self {
        Self {
            config,
            source,
            feed,
            cache: PayloadCache::new(),
            cancel: CancelToken::new(),
            progress: ProgressSink::null(),
            cold_run: false,
            state: PipelineState::Idle,
        }
    }

    /// Forward task progress to `sink`.
    #[must_use]
    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = sink;
        self
    }

    /// Apply deferred mutations immediately (a cold run).
    #[must_use]
    pub fn with_cold_run(mut self, cold_run: bool) -> Self {
        self.cold_run = cold_run;
        self
    }

    /// A token that cancels this run at the next task boundary.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Current phase (advanced as the run progresses).
    #[must_use]
    pub const fn state(&self) -> PipelineState {
        self.state
    }

    /// Fetch and parse the configured feed.
    pub async fn fetch_feed(config: &UpdateConfig, source: &UpdateSource) -> Result<Feed> {
        let raw = source.fetch_feed().await?;
        let reader = reader_for(&config.feed_format)?;
        reader.read(&raw)
    }

    /// Run the pipeline to completion and report.
    ///
    /// Never panics on task failure; every failure mode maps into the
    /// report's outcome.
    pub async fn run(mut self) -> PipelineReport {
        let started_at = Utc::now();
        let total = self.feed.tasks.len();
        let mut skipped = vec![false; total];

        info!("Starting update run with {} task(s)", total);

        // Fatal configuration problems surface before anything mutates.
        let installed_version = match &self.config.installed_version {
            Some(raw) => match parse_version(raw) {
                Ok(v) => Some(v),
                Err(e) => {
                    return self.abort_before_execution(
                        started_at,
                        &skipped,
                        None,
                        format!("invalid installed_version in configuration: {e:#}"),
                    );
                }
            },
            None => None,
        };

        if let Err(e) = ensure_dir(&self.config.staging_dir()).await {
            return self.abort_before_execution(started_at, &skipped, None, format!("{e:#}"));
        }

        // Phase 1: prepare every task, fail-fast.
        self.state = PipelineState::Preparing;
        for index in 0..total {
            if self.cancel.is_cancelled() {
                return self.unwind(started_at, &skipped, Vec::new(), FailureCause::cancelled())
                    .await;
            }

            let description = self.feed.tasks[index].description();
            debug!("Preparing task {}/{}: {}", index + 1, total, description);

            let sink = per_task_sink(&self.progress, index, total, description.clone());
            let mut ctx = PrepareContext {
                config: &self.config,
                source: &self.source,
                cache: &mut self.cache,
                base_url: self.feed.base_url.as_deref(),
                progress: &sink,
            };

            if let Err(e) = self.feed.tasks[index].prepare(&mut ctx).await {
                warn!("Preparation of '{}' failed: {:#}", description, e);
                return self.abort_before_execution(
                    started_at,
                    &skipped,
                    Some(description),
                    format!("{e:#}"),
                );
            }
        }

        // Phase 2: evaluate conditions.
        self.state = PipelineState::Evaluating;
        for index in 0..total {
            let description = self.feed.tasks[index].description();
            let ctx = EvalContext {
                app_dir: &self.config.app_dir,
                installed_version: installed_version.as_ref(),
                task_target: self.feed.tasks[index].target_path(),
            };

            match self.feed.tasks[index].conditions().is_met(&ctx) {
                Ok(true) => {}
                Ok(false) => {
                    info!("Skipping '{}': condition not met", description);
                    skipped[index] = true;
                }
                Err(e) => {
                    return self.abort_before_execution(
                        started_at,
                        &skipped,
                        Some(description),
                        format!("{e:#}"),
                    );
                }
            }
        }

        // Phase 3: execute applicable tasks strictly in feed order.
        self.state = PipelineState::Executing;
        let applicable: Vec<usize> = (0..total).filter(|&i| !skipped[i]).collect();
        let mut executed: Vec<usize> = Vec::new();
        let mut deferred: Vec<usize> = Vec::new();

        for (slot, &index) in applicable.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!("Cancellation honored before task {}", index + 1);
                return self.unwind(started_at, &skipped, executed, FailureCause::cancelled())
                    .await;
            }

            let description = self.feed.tasks[index].description();
            info!("Executing task {}/{}: {}", slot + 1, applicable.len(), description);

            let sink = per_task_sink(&self.progress, slot, applicable.len(), description.clone());
            let ctx = ExecuteContext {
                config: &self.config,
                progress: &sink,
            };

            match self.feed.tasks[index].execute(&ctx, self.cold_run).await {
                Ok(ExecutionStatus::Successful) => executed.push(index),
                Ok(ExecutionStatus::RequiresRestart) => deferred.push(index),
                Ok(status) => {
                    // Executing tasks only report the two statuses above;
                    // anything else is a variant contract violation.
                    return self
                        .unwind(
                            started_at,
                            &skipped,
                            executed,
                            FailureCause::task(
                                description,
                                format!("task returned unexpected status {status:?}"),
                            ),
                        )
                        .await;
                }
                Err(e) => {
                    warn!("Task '{}' failed: {:#}", description, e);
                    return self
                        .unwind(
                            started_at,
                            &skipped,
                            executed,
                            FailureCause::task(description, format!("{e:#}")),
                        )
                        .await;
                }
            }
        }

        // Deferred tasks become the next cold run's work list.
        let pending_restart = !deferred.is_empty();
        if pending_restart {
            let deferred_tasks: Vec<&crate::task::Task> =
                deferred.iter().map(|&i| &self.feed.tasks[i]).collect();
            let state = PendingState::from_deferred(self.feed.base_url.clone(), &deferred_tasks);
            if let Err(e) = state.save(&self.config.pending_state_path()).await {
                return self
                    .unwind(
                        started_at,
                        &skipped,
                        executed,
                        FailureCause::task(
                            "persist deferred tasks".to_string(),
                            format!("{e:#}"),
                        ),
                    )
                    .await;
            }
        } else if self.cold_run
            && let Err(e) = PendingState::clear(&self.config.pending_state_path()).await
        {
            warn!("Failed to clear pending state: {:#}", e);
        }

        self.state = PipelineState::Done;
        info!(
            "Update run complete: {} executed, {} deferred, {} skipped",
            executed.len(),
            deferred.len(),
            skipped.iter().filter(|&&s| s).count()
        );

        PipelineReport {
            outcome: RunOutcome::Success,
            started_at,
            finished_at: Utc::now(),
            tasks: self.task_records(&skipped),
            rollback_failures: Vec::new(),
            pending_restart,
        }
    }

    /// Abort with nothing executed: preparation failures and fatal
    /// configuration errors. No rollback is needed.
    fn abort_before_execution(
        mut self,
        started_at: chrono::DateTime<Utc>,
        skipped: &[bool],
        task: Option<String>,
        cause: String,
    ) -> PipelineReport {
        self.state = PipelineState::Done;
        PipelineReport {
            outcome: RunOutcome::PreparationFailed {
                task,
                cause,
            },
            started_at,
            finished_at: Utc::now(),
            tasks: self.task_records(skipped),
            rollback_failures: Vec::new(),
            pending_restart: false,
        }
    }

    /// Unwind the executed stack in reverse order after a failure (or a
    /// honored cancellation, which takes the same path).
    async fn unwind(
        mut self,
        started_at: chrono::DateTime<Utc>,
        skipped: &[bool],
        executed: Vec<usize>,
        failure: FailureCause,
    ) -> PipelineReport {
        self.state = PipelineState::RollingBack;
        info!("Rolling back {} executed task(s)", executed.len());

        let mut rollback_failures = Vec::new();
        for &index in executed.iter().rev() {
            let description = self.feed.tasks[index].description();
            debug!("Rolling back '{}'", description);

            // A failed reversal never stops the unwind; every executed
            // task gets its rollback attempt.
            if let Err(e) = self.feed.tasks[index].rollback(&self.config).await {
                warn!("Rollback of '{}' failed: {:#}", description, e);
                rollback_failures.push(RollbackFailure {
                    task: description,
                    cause: format!("{e:#}"),
                });
            }
        }

        self.state = PipelineState::Done;
        let outcome = if rollback_failures.is_empty() {
            RunOutcome::RolledBack {
                failure,
            }
        } else {
            RunOutcome::RollbackIncomplete {
                failure,
            }
        };

        PipelineReport {
            outcome,
            started_at,
            finished_at: Utc::now(),
            tasks: self.task_records(skipped),
            rollback_failures,
            pending_restart: false,
        }
    }

    fn task_records(&self, skipped: &[bool]) -> Vec<TaskRecord> {
        self.feed
            .tasks
            .iter()
            .enumerate()
            .map(|(index, task)| TaskRecord {
                id: index + 1,
                description: task.description(),
                status: task.status(),
                skipped: skipped.get(index).copied().unwrap_or(false),
            })
            .collect()
    }
}

/// Wrap the run-level sink into a per-task sink that stamps task
/// identity and rescales the task's local percentage into its slot of
/// the overall run.
fn per_task_sink(
    overall: &ProgressSink,
    task_index: usize,
    task_count: usize,
    description: String,
) -> ProgressSink {
    let overall = overall.clone();
    ProgressSink::new(move |mut event| {
        event.task_id = task_index + 1;
        event.task_description = description.clone();

        // Scale so an odd task count still reaches 100% on the last task.
        let task_share = 100.0 / task_count as f32;
        event.percentage = ((event.percentage as f32 * task_share / 100.0)
            + task_index as f32 * task_share)
            .round() as u32;

        overall.emit(event);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::ProgressEvent;
    use std::sync::Mutex;

    #[test]
    fn cancel_token_flips_once() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn per_task_sink_scales_percentage_into_task_slot() {
        let events: Arc<Mutex<Vec<ProgressEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let collected = events.clone();
        let overall = ProgressSink::new(move |event| collected.lock().unwrap().push(event));

        // Second of four tasks, halfway through its own work
        let sink = per_task_sink(&overall, 1, 4, "second".to_string());
        sink.emit(ProgressEvent {
            task_id: 0,
            task_description: String::new(),
            message: "working".to_string(),
            percentage: 50,
            still_working: true,
        });

        let seen = events.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].task_id, 2);
        assert_eq!(seen[0].task_description, "second");
        // 25% per task: one full slot (25) + half of the second (12.5) ≈ 38
        assert_eq!(seen[0].percentage, 38);
    }

    #[test]
    fn per_task_sink_reaches_100_on_last_task() {
        let events: Arc<Mutex<Vec<ProgressEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let collected = events.clone();
        let overall = ProgressSink::new(move |event| collected.lock().unwrap().push(event));

        let sink = per_task_sink(&overall, 2, 3, "last".to_string());
        sink.emit(ProgressEvent {
            task_id: 0,
            task_description: String::new(),
            message: "done".to_string(),
            percentage: 100,
            still_working: false,
        });

        assert_eq!(events.lock().unwrap()[0].percentage, 100);
    }
}
