//! Update tasks: the units of declarative system mutation.
//!
//! A task is one named, describable unit of change - replace a file, edit
//! a configuration value, run a command. The variant set is closed per
//! build and dispatched through the [`Task`] enum; feed documents select
//! variants with a `kind` tag deserialized into per-variant schema structs
//! ([`TaskSpec`]), so feed readers stay decoupled from concrete variant
//! types.
//!
//! # Lifecycle
//!
//! ```text
//! construct (from feed or spec)
//!   └─ prepare()            stage payloads; idempotent; never touches
//!      │                    the live target
//!   └─ conditions evaluated by the pipeline
//!   └─ execute(cold_run)    mutate, capturing a rollback snapshot first
//!   └─ rollback()           best-effort reversal, only if executed
//! ```
//!
//! Status transitions: `NotExecuted → Prepared → {Successful, Failed,
//! RequiresRestart}`. A task whose condition was unmet never leaves the
//! pre-execution states and is excluded from rollback accounting.

mod config_value;
mod file_replace;
mod run_command;

pub use config_value::{ConfigValue, ConfigValueSpec, ConfigValueTask};
pub use file_replace::{FileReplaceSpec, FileReplaceTask};
pub use run_command::{RunCommandSpec, RunCommandTask};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::condition::ConditionTree;
use crate::config::UpdateConfig;
use crate::source::{PayloadCache, UpdateSource};

/// Per-task execution state.
///
/// Only `Successful` tasks enter the rollback stack; everything else is
/// either pre-execution (`NotExecuted`, `Prepared`), terminal without a
/// mutation to reverse (`RequiresRestart` defers its mutation to a cold
/// run), or the failure that triggered the unwind (`Failed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionStatus {
    /// Constructed, not yet prepared or executed.
    #[default]
    NotExecuted,
    /// Payloads staged; ready to execute.
    Prepared,
    /// Mutation fully applied, snapshot captured.
    Successful,
    /// Mutation attempted and failed.
    Failed,
    /// Mutation deferred to a cold run (next process start).
    RequiresRestart,
}

/// A progress record emitted during `prepare` or `execute`.
///
/// Tasks fill in `message`, `percentage`, and `still_working`; the
/// pipeline stamps `task_id` and `task_description` and rescales the
/// percentage into the task's slot of the overall run before forwarding.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    /// 1-based position of the task in the run (0 before the pipeline
    /// stamps it).
    pub task_id: usize,
    /// Description of the emitting task.
    pub task_description: String,
    /// Human-readable progress message.
    pub message: String,
    /// Percent complete, 0-100.
    pub percentage: u32,
    /// False on the final event of a stream.
    pub still_working: bool,
}

/// Callback receiving progress events; forwarded without buffering.
///
/// Cheap to clone; the pipeline wraps a run-level sink into per-task
/// sinks that stamp task identity onto each event.
#[derive(Clone)]
pub struct ProgressSink {
    inner: Arc<dyn Fn(ProgressEvent) + Send + Sync>,
}

impl ProgressSink {
    /// Wrap a callback.
    pub fn new(callback: impl Fn(ProgressEvent) + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(callback),
        }
    }

    /// A sink that drops every event.
    #[must_use]
    pub fn null() -> Self {
        Self::new(|_event| {})
    }

    /// Deliver one event.
    pub fn emit(&self, event: ProgressEvent) {
        (self.inner.as_ref())(event);
    }
}

/// Everything a task may touch while staging payloads.
pub struct PrepareContext<'a> {
    /// Run configuration (staging/backup directories, install root).
    pub config: &'a UpdateConfig,
    /// Where payloads come from.
    pub source: &'a UpdateSource,
    /// The run's payload cache.
    pub cache: &'a mut PayloadCache,
    /// Base URL declared by the feed, if any.
    pub base_url: Option<&'a str>,
    /// Progress callback.
    pub progress: &'a ProgressSink,
}

/// Everything a task may touch while executing.
pub struct ExecuteContext<'a> {
    /// Run configuration.
    pub config: &'a UpdateConfig,
    /// Progress callback.
    pub progress: &'a ProgressSink,
}

/// Declarative description of one task, as it appears in feed documents
/// and in the pending cold-run state file.
///
/// The `kind` tag selects the variant; each variant's fields are its
/// explicit schema - there is no runtime field discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TaskSpec {
    /// Replace a file under the install root with a downloaded payload.
    FileReplace(FileReplaceSpec),
    /// Set or delete a value in a TOML settings document.
    ConfigValue(ConfigValueSpec),
    /// Run an external command.
    RunCommand(RunCommandSpec),
}

impl TaskSpec {
    /// The task's description, or a variant-specific default.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::FileReplace(s) => s.description(),
            Self::ConfigValue(s) => s.description(),
            Self::RunCommand(s) => s.description(),
        }
    }

    /// The task's condition tree.
    #[must_use]
    pub fn conditions(&self) -> &ConditionTree {
        match self {
            Self::FileReplace(s) => &s.conditions,
            Self::ConfigValue(s) => &s.conditions,
            Self::RunCommand(s) => &s.conditions,
        }
    }

    /// Mutable access to the condition tree (used by feed readers to
    /// AND-merge derived conditions).
    pub fn conditions_mut(&mut self) -> &mut ConditionTree {
        match self {
            Self::FileReplace(s) => &mut s.conditions,
            Self::ConfigValue(s) => &mut s.conditions,
            Self::RunCommand(s) => &mut s.conditions,
        }
    }
}

/// A runtime task: a spec plus execution state.
///
/// Owned exclusively by one pipeline run's ordered task list; tasks are
/// never shared across concurrent runs.
#[derive(Debug)]
pub struct Task {
    status: ExecutionStatus,
    kind: TaskKind,
}

#[derive(Debug)]
enum TaskKind {
    FileReplace(FileReplaceTask),
    ConfigValue(ConfigValueTask),
    RunCommand(RunCommandTask),
}

impl Task {
    /// Build a runtime task from its declarative spec.
    #[must_use]
    pub fn from_spec(spec: TaskSpec) -> Self {
        let kind = match spec {
            TaskSpec::FileReplace(s) => TaskKind::FileReplace(FileReplaceTask::new(s)),
            TaskSpec::ConfigValue(s) => TaskKind::ConfigValue(ConfigValueTask::new(s)),
            TaskSpec::RunCommand(s) => TaskKind::RunCommand(RunCommandTask::new(s)),
        };
        Self {
            status: ExecutionStatus::NotExecuted,
            kind,
        }
    }

    /// Reconstruct the declarative spec (for the pending-state file).
    #[must_use]
    pub fn to_spec(&self) -> TaskSpec {
        match &self.kind {
            TaskKind::FileReplace(t) => TaskSpec::FileReplace(t.spec.clone()),
            TaskKind::ConfigValue(t) => TaskSpec::ConfigValue(t.spec.clone()),
            TaskKind::RunCommand(t) => TaskSpec::RunCommand(t.spec.clone()),
        }
    }

    /// Informational description for reports and progress.
    #[must_use]
    pub fn description(&self) -> String {
        self.to_spec().description()
    }

    /// The task's condition tree (empty means unconditionally applicable).
    #[must_use]
    pub fn conditions(&self) -> &ConditionTree {
        match &self.kind {
            TaskKind::FileReplace(t) => &t.spec.conditions,
            TaskKind::ConfigValue(t) => &t.spec.conditions,
            TaskKind::RunCommand(t) => &t.spec.conditions,
        }
    }

    /// Current execution status.
    #[must_use]
    pub const fn status(&self) -> ExecutionStatus {
        self.status
    }

    /// The install-root-relative path this task targets, when it has one.
    /// Conditions may read it.
    #[must_use]
    pub fn target_path(&self) -> Option<&Path> {
        match &self.kind {
            TaskKind::FileReplace(t) => t.target_path(),
            TaskKind::ConfigValue(t) => Some(t.spec.file.as_path()),
            TaskKind::RunCommand(_) => None,
        }
    }

    /// The staged payload path, once prepared (persisted for cold runs).
    #[must_use]
    pub fn staged_payload(&self) -> Option<&Path> {
        match &self.kind {
            TaskKind::FileReplace(t) => t.staged_payload(),
            _ => None,
        }
    }

    /// Re-attach a payload staged by a previous run (cold-run resume).
    pub fn restore_staged(&mut self, path: PathBuf) {
        if let TaskKind::FileReplace(t) = &mut self.kind {
            t.restore_staged(path);
        }
    }

    /// Stage any remote payload into local storage.
    ///
    /// Idempotent, and side-effect-free with respect to the live target.
    /// On success the task is `Prepared`; on failure it stays
    /// `NotExecuted` and the pipeline aborts the whole run before any
    /// destructive step.
    pub async fn prepare(&mut self, ctx: &mut PrepareContext<'_>) -> Result<()> {
        match &mut self.kind {
            TaskKind::FileReplace(t) => t.prepare(ctx).await?,
            TaskKind::ConfigValue(t) => t.prepare(ctx)?,
            TaskKind::RunCommand(t) => t.prepare(ctx)?,
        }
        self.status = ExecutionStatus::Prepared;
        Ok(())
    }

    /// Perform the mutation, capturing enough pre-state to support
    /// [`rollback`](Self::rollback).
    ///
    /// `cold_run` signals "apply now even if the target could be live" -
    /// set on deferred application at next start. Variants that mutate
    /// safely regardless (settings edits, commands) ignore it.
    ///
    /// On `Err` the task is marked `Failed` and the pipeline begins
    /// rollback of previously executed tasks.
    pub async fn execute(
        &mut self,
        ctx: &ExecuteContext<'_>,
        cold_run: bool,
    ) -> Result<ExecutionStatus> {
        let result = match &mut self.kind {
            TaskKind::FileReplace(t) => t.execute(ctx, cold_run).await,
            TaskKind::ConfigValue(t) => t.execute(ctx).await,
            TaskKind::RunCommand(t) => t.execute(ctx).await,
        };

        match result {
            Ok(status) => {
                self.status = status;
                Ok(status)
            }
            Err(e) => {
                self.status = ExecutionStatus::Failed;
                Err(e)
            }
        }
    }

    /// Reverse the mutation using the snapshot captured by `execute`.
    ///
    /// Best-effort: a failure is recorded by the pipeline but never
    /// escalated into a second failure cascade.
    pub async fn rollback(&mut self, config: &UpdateConfig) -> Result<()> {
        match &mut self.kind {
            TaskKind::FileReplace(t) => t.rollback(config).await,
            TaskKind::ConfigValue(t) => t.rollback(config).await,
            TaskKind::RunCommand(t) => t.rollback(config).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_spec_kind_tags_round_trip() {
        let json = r#"{"kind": "file-replace", "path": "bin/app", "url": "app.bin"}"#;
        let spec: TaskSpec = serde_json::from_str(json).unwrap();
        assert!(matches!(spec, TaskSpec::FileReplace(_)));

        let toml_doc = "kind = \"run-command\"\nprogram = \"systemctl\"\nargs = [\"restart\", \"svc\"]\n";
        let spec: TaskSpec = toml::from_str(toml_doc).unwrap();
        assert!(matches!(spec, TaskSpec::RunCommand(_)));

        let unknown = r#"{"kind": "teleport", "path": "x"}"#;
        assert!(serde_json::from_str::<TaskSpec>(unknown).is_err());
    }

    #[test]
    fn fresh_task_is_not_executed() {
        let spec: TaskSpec =
            serde_json::from_str(r#"{"kind": "file-replace", "path": "bin/app"}"#).unwrap();
        let task = Task::from_spec(spec);
        assert_eq!(task.status(), ExecutionStatus::NotExecuted);
        assert!(task.conditions().is_empty());
        assert_eq!(task.target_path(), Some(Path::new("bin/app")));
    }

    #[test]
    fn default_descriptions_name_the_work() {
        let spec: TaskSpec =
            serde_json::from_str(r#"{"kind": "file-replace", "path": "bin/app"}"#).unwrap();
        assert!(Task::from_spec(spec).description().contains("bin/app"));

        let spec: TaskSpec = serde_json::from_str(
            r#"{"kind": "config-value", "file": "settings.toml", "key": "ui.theme"}"#,
        )
        .unwrap();
        assert!(Task::from_spec(spec).description().contains("ui.theme"));
    }
}
