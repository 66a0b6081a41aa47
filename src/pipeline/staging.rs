//! Pending cold-run state.
//!
//! When executing tasks return `RequiresRestart`, their mutations are
//! deferred until the target is no longer live - typically the next
//! process start. The pipeline persists the deferred task specs and
//! their staged payload paths as `pending.json` in the staging area;
//! `upcast resume` reloads it and executes with `cold_run = true`.
//!
//! Only the pending work list is persisted. Rollback snapshots live in
//! memory for the duration of one run and are never written to disk.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::task::{Task, TaskSpec};
use crate::utils::fs::ensure_parent_dir;

/// One deferred task: its spec plus the payload staged for it.
#[derive(Debug, Serialize, Deserialize)]
pub struct PendingTask {
    /// The task's declarative spec.
    pub spec: TaskSpec,
    /// Payload staged by the deferring run, when the variant has one.
    #[serde(default)]
    pub staged_payload: Option<PathBuf>,
}

/// The work list written by a deferring run and consumed by `resume`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PendingState {
    /// When the deferring run finished.
    pub created_at: DateTime<Utc>,
    /// Base URL of the feed the tasks came from.
    pub base_url: Option<String>,
    /// Deferred tasks in execution order.
    pub tasks: Vec<PendingTask>,
}

impl PendingState {
    /// Capture the deferred tasks of a run.
    #[must_use]
    pub fn from_deferred(base_url: Option<String>, deferred: &[&Task]) -> Self {
        Self {
            created_at: Utc::now(),
            base_url,
            tasks: deferred
                .iter()
                .map(|task| PendingTask {
                    spec: task.to_spec(),
                    staged_payload: task.staged_payload().map(Path::to_path_buf),
                })
                .collect(),
        }
    }

    /// Rebuild runtime tasks, re-attaching staged payloads.
    #[must_use]
    pub fn into_tasks(self) -> (Option<String>, Vec<Task>) {
        let tasks = self
            .tasks
            .into_iter()
            .map(|pending| {
                let mut task = Task::from_spec(pending.spec);
                if let Some(staged) = pending.staged_payload {
                    task.restore_staged(staged);
                }
                task
            })
            .collect();
        (self.base_url, tasks)
    }

    /// Write the state file.
    pub async fn save(&self, path: &Path) -> Result<()> {
        ensure_parent_dir(path).await?;
        let json = serde_json::to_string_pretty(self).context("Failed to serialize pending state")?;
        fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Saved {} pending task(s) to {}", self.tasks.len(), path.display());
        Ok(())
    }

    /// Load the state file, `None` when no run left one behind.
    pub async fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let state: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid pending state in {}", path.display()))?;
        debug!("Loaded {} pending task(s) from {}", state.tasks.len(), path.display());
        Ok(Some(state))
    }

    /// Remove the state file after a completed cold run.
    pub async fn clear(path: &Path) -> Result<()> {
        if path.exists() {
            fs::remove_file(path)
                .await
                .with_context(|| format!("Failed to remove {}", path.display()))?;
        }
        Ok(())
    }
}
