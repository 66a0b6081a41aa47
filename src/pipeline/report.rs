//! Pipeline run reports.
//!
//! A run ends in exactly one of four outcomes: success, failure before
//! anything executed (preparation or configuration), failure during
//! execution with a complete rollback, or failure during execution with
//! a degraded-but-complete rollback attempt. The report names the task
//! that triggered the failure, records every task's final status, and
//! lists any reversals that failed. Reports serialize to JSON for
//! tooling.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::task::ExecutionStatus;

/// What brought an executing run down.
#[derive(Debug, Clone, Serialize)]
pub struct FailureCause {
    /// True when the caller cancelled at a task boundary rather than a
    /// task failing.
    pub cancelled: bool,
    /// Description of the failing task (absent on cancellation).
    pub task: Option<String>,
    /// The underlying cause, including its context chain.
    pub cause: String,
}

impl FailureCause {
    pub(crate) fn cancelled() -> Self {
        Self {
            cancelled: true,
            task: None,
            cause: "cancelled by caller".to_string(),
        }
    }

    pub(crate) fn task(description: String, cause: String) -> Self {
        Self {
            cancelled: false,
            task: Some(description),
            cause,
        }
    }

    fn describe(&self) -> String {
        match &self.task {
            Some(task) => format!("task '{task}' failed: {}", self.cause),
            None => self.cause.clone(),
        }
    }
}

/// Aggregate outcome of one pipeline run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "kebab-case")]
pub enum RunOutcome {
    /// Every applicable task executed successfully.
    Success,
    /// The run aborted before any task executed - a preparation failure
    /// or a fatal configuration error. Nothing mutated, so nothing was
    /// rolled back.
    PreparationFailed {
        /// Description of the failing task, when one is attributable.
        task: Option<String>,
        /// The underlying cause.
        cause: String,
    },
    /// A task failed mid-run and every previously executed task was
    /// rolled back.
    RolledBack {
        /// What triggered the unwind.
        failure: FailureCause,
    },
    /// A task failed mid-run and at least one reversal failed; every
    /// executed task still got a rollback attempt.
    RollbackIncomplete {
        /// What triggered the unwind.
        failure: FailureCause,
    },
}

/// Final status of one task in the run.
#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    /// 1-based position in the feed.
    pub id: usize,
    /// The task's description.
    pub description: String,
    /// Final execution status.
    pub status: ExecutionStatus,
    /// True when the task's condition gated it out of the run.
    pub skipped: bool,
}

/// One failed reversal during rollback.
#[derive(Debug, Clone, Serialize)]
pub struct RollbackFailure {
    /// Description of the task whose reversal failed.
    pub task: String,
    /// Why the reversal failed.
    pub cause: String,
}

/// The full result of a pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    /// Aggregate outcome.
    pub outcome: RunOutcome,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// Per-task final states, in feed order.
    pub tasks: Vec<TaskRecord>,
    /// Reversals that failed during rollback.
    pub rollback_failures: Vec<RollbackFailure>,
    /// True when deferred tasks await a cold run (`upcast resume`).
    pub pending_restart: bool,
}

impl PipelineReport {
    /// Whether the run counts as successful for exit-code purposes.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.outcome, RunOutcome::Success)
    }

    /// One-paragraph human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let executed =
            self.tasks.iter().filter(|t| t.status == ExecutionStatus::Successful).count();
        let skipped = self.tasks.iter().filter(|t| t.skipped).count();

        match &self.outcome {
            RunOutcome::Success if self.pending_restart => {
                let deferred = self
                    .tasks
                    .iter()
                    .filter(|t| t.status == ExecutionStatus::RequiresRestart)
                    .count();
                format!(
                    "Update applied ({executed} executed, {skipped} skipped); \
                     {deferred} task(s) deferred - run 'upcast resume' after restart"
                )
            }
            RunOutcome::Success => {
                format!("Update applied successfully ({executed} executed, {skipped} skipped)")
            }
            RunOutcome::PreparationFailed {
                task,
                cause,
            } => match task {
                Some(task) => format!(
                    "Update aborted while preparing '{task}': {cause}; nothing was changed"
                ),
                None => format!("Update aborted before execution: {cause}; nothing was changed"),
            },
            RunOutcome::RolledBack {
                failure,
            } => {
                format!(
                    "Update failed ({}); all {executed} previously applied task(s) were rolled back",
                    failure.describe()
                )
            }
            RunOutcome::RollbackIncomplete {
                failure,
            } => {
                format!(
                    "Update failed ({}); rollback incomplete: {} reversal(s) failed",
                    failure.describe(),
                    self.rollback_failures.len()
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: usize, status: ExecutionStatus, skipped: bool) -> TaskRecord {
        TaskRecord {
            id,
            description: format!("task {id}"),
            status,
            skipped,
        }
    }

    #[test]
    fn summary_names_the_failing_task() {
        let report = PipelineReport {
            outcome: RunOutcome::RolledBack {
                failure: FailureCause::task("Replace bin/app".to_string(), "boom".to_string()),
            },
            started_at: Utc::now(),
            finished_at: Utc::now(),
            tasks: vec![record(1, ExecutionStatus::Successful, false)],
            rollback_failures: Vec::new(),
            pending_restart: false,
        };

        let summary = report.summary();
        assert!(summary.contains("Replace bin/app"));
        assert!(summary.contains("rolled back"));
        assert!(!report.is_success());
    }

    #[test]
    fn success_summary_counts_executed_and_skipped() {
        let report = PipelineReport {
            outcome: RunOutcome::Success,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            tasks: vec![
                record(1, ExecutionStatus::Successful, false),
                record(2, ExecutionStatus::Prepared, true),
            ],
            rollback_failures: Vec::new(),
            pending_restart: false,
        };

        assert!(report.is_success());
        assert!(report.summary().contains("1 executed, 1 skipped"));
    }

    #[test]
    fn report_serializes_to_json() {
        let report = PipelineReport {
            outcome: RunOutcome::PreparationFailed {
                task: None,
                cause: "bad feed".to_string(),
            },
            started_at: Utc::now(),
            finished_at: Utc::now(),
            tasks: Vec::new(),
            rollback_failures: Vec::new(),
            pending_restart: false,
        };

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"result\":\"preparation-failed\""));
    }
}
