//! Command execution task.
//!
//! Runs an external program to completion, capturing its output. The
//! program is resolved on the PATH at prepare time so a missing command
//! fails the run before anything has mutated. A command has no snapshot
//! to capture; rollback runs the optional undo command when one is
//! declared and is otherwise a successful no-op.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, info};

use super::{ExecuteContext, ExecutionStatus, PrepareContext, ProgressEvent};
use crate::condition::ConditionTree;
use crate::config::{UpdateConfig, resolve_path};
use crate::core::UpcastError;

/// Schema for a command execution task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunCommandSpec {
    /// Informational description; defaults to naming the program.
    #[serde(default)]
    pub description: Option<String>,
    /// Program to run, resolved on the PATH.
    pub program: String,
    /// Arguments passed to the program.
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory; relative paths resolve against the install
    /// root, which is also the default.
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    /// Program run to reverse this command during rollback.
    #[serde(default)]
    pub undo_program: Option<String>,
    /// Arguments for the undo program.
    #[serde(default)]
    pub undo_args: Vec<String>,
    /// Conditions gating this task.
    #[serde(default)]
    pub conditions: ConditionTree,
}

impl RunCommandSpec {
    pub(super) fn description(&self) -> String {
        self.description.clone().unwrap_or_else(|| format!("Run {}", self.program))
    }
}

/// Runtime state for a command execution task.
#[derive(Debug)]
pub struct RunCommandTask {
    pub(super) spec: RunCommandSpec,
    resolved: Option<PathBuf>,
}

impl RunCommandTask {
    pub(super) fn new(spec: RunCommandSpec) -> Self {
        Self {
            spec,
            resolved: None,
        }
    }

    pub(super) fn prepare(&mut self, _ctx: &mut PrepareContext<'_>) -> Result<()> {
        let resolved = which::which(&self.spec.program)
            .with_context(|| format!("Command '{}' not found on PATH", self.spec.program))?;
        debug!("Resolved '{}' to {}", self.spec.program, resolved.display());
        self.resolved = Some(resolved);
        Ok(())
    }

    pub(super) async fn execute(&mut self, ctx: &ExecuteContext<'_>) -> Result<ExecutionStatus> {
        let program = self.resolved.clone().ok_or_else(|| anyhow!("task was not prepared"))?;

        ctx.progress.emit(ProgressEvent {
            task_id: 0,
            task_description: String::new(),
            message: format!("Running {}", self.spec.program),
            percentage: 0,
            still_working: true,
        });

        let cwd = match &self.spec.cwd {
            Some(dir) => resolve_path(&ctx.config.app_dir, dir),
            None => ctx.config.app_dir.clone(),
        };

        let output = Command::new(&program)
            .args(&self.spec.args)
            .current_dir(&cwd)
            .output()
            .await
            .with_context(|| format!("Failed to launch '{}'", self.spec.program))?;

        if !output.status.success() {
            return Err(UpcastError::CommandFailed {
                program: self.spec.program.clone(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }
            .into());
        }

        ctx.progress.emit(ProgressEvent {
            task_id: 0,
            task_description: String::new(),
            message: format!("Ran {}", self.spec.program),
            percentage: 100,
            still_working: false,
        });
        info!("Command '{}' completed", self.spec.program);
        Ok(ExecutionStatus::Successful)
    }

    pub(super) async fn rollback(&mut self, config: &UpdateConfig) -> Result<()> {
        let Some(undo) = &self.spec.undo_program else {
            // Nothing declared to reverse; a command with no undo is
            // reported as rolled back successfully.
            return Ok(());
        };

        let program = which::which(undo)
            .with_context(|| format!("Undo command '{undo}' not found on PATH"))?;

        let output = Command::new(&program)
            .args(&self.spec.undo_args)
            .current_dir(&config.app_dir)
            .output()
            .await
            .with_context(|| format!("Failed to launch undo command '{undo}'"))?;

        if !output.status.success() {
            return Err(UpcastError::CommandFailed {
                program: undo.clone(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }
            .into());
        }

        info!("Undo command '{}' completed", undo);
        Ok(())
    }
}
