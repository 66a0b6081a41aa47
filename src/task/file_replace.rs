//! File replacement task.
//!
//! Downloads a payload during `prepare`, then swaps it into place over a
//! target under the install root. The pre-existing target is copied into
//! the backup area before the first touch, which is the rollback
//! snapshot.
//!
//! The default mode is a cold update: the swap is deferred until a cold
//! run (next process start), because replacing a file that is currently
//! loaded cannot be done safely. `hot_swap = true` asks for an immediate
//! swap; a failed hot swap downgrades the task to a cold update instead
//! of failing the run.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use super::{ExecuteContext, ExecutionStatus, PrepareContext, ProgressEvent};
use crate::checksum::ChecksumVerifier;
use crate::condition::ConditionTree;
use crate::config::UpdateConfig;
use crate::utils::fs::{ensure_parent_dir, move_file};

/// Schema for a file replacement task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReplaceSpec {
    /// Informational description; defaults to naming the target.
    #[serde(default)]
    pub description: Option<String>,
    /// Target path, relative to the install root. An empty path makes
    /// the whole task a no-op.
    pub path: PathBuf,
    /// Name or URL of the payload at the remote location; the target
    /// path is used when left blank.
    #[serde(default, alias = "url")]
    pub update_to: Option<String>,
    /// Expected SHA-256 of the payload, verified after download.
    #[serde(default)]
    pub sha256: Option<String>,
    /// Attempt an immediate swap instead of deferring to a cold run.
    #[serde(default)]
    pub hot_swap: bool,
    /// Conditions gating this task.
    #[serde(default)]
    pub conditions: ConditionTree,
}

impl FileReplaceSpec {
    pub(super) fn description(&self) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| format!("Replace {}", self.path.display()))
    }
}

/// Runtime state for a file replacement task.
#[derive(Debug)]
pub struct FileReplaceTask {
    pub(super) spec: FileReplaceSpec,
    staged_file: Option<PathBuf>,
    dest_file: Option<PathBuf>,
    backup_file: Option<PathBuf>,
    hot_swap: bool,
    noop: bool,
}

impl FileReplaceTask {
    pub(super) fn new(spec: FileReplaceSpec) -> Self {
        let hot_swap = spec.hot_swap;
        Self {
            spec,
            staged_file: None,
            dest_file: None,
            backup_file: None,
            hot_swap,
            noop: false,
        }
    }

    pub(super) fn target_path(&self) -> Option<&Path> {
        if self.spec.path.as_os_str().is_empty() { None } else { Some(self.spec.path.as_path()) }
    }

    pub(super) fn staged_payload(&self) -> Option<&Path> {
        self.staged_file.as_deref()
    }

    pub(super) fn restore_staged(&mut self, path: PathBuf) {
        self.staged_file = Some(path);
    }

    pub(super) async fn prepare(&mut self, ctx: &mut PrepareContext<'_>) -> Result<()> {
        if self.spec.path.as_os_str().is_empty() {
            // Erroneous case, but there is nothing to prepare; prefer a
            // no-op over an error.
            warn!("file-replace task has an empty target path; task is a noop");
            self.noop = true;
            return Ok(());
        }

        let remote_name = self
            .spec
            .update_to
            .clone()
            .unwrap_or_else(|| self.spec.path.to_string_lossy().replace('\\', "/"));

        let staged = match self.staged_file.take() {
            // A payload staged by an earlier run (cold-run resume) is
            // reused instead of downloaded again.
            Some(existing) if existing.exists() => {
                debug!("Reusing staged payload at {}", existing.display());
                existing
            }
            _ => {
                debug!("Staging payload '{}'", remote_name);
                let progress = ctx.progress;
                let message = format!("Downloading {remote_name}");
                let on_bytes = |done: u64, total: Option<u64>| {
                    let percentage = match total {
                        Some(total) if total > 0 => {
                            ((done.saturating_mul(100)) / total).min(100) as u32
                        }
                        _ => 0,
                    };
                    progress.emit(ProgressEvent {
                        task_id: 0,
                        task_description: String::new(),
                        message: message.clone(),
                        percentage,
                        still_working: true,
                    });
                };
                ctx.cache
                    .fetch(
                        ctx.source,
                        &remote_name,
                        ctx.base_url,
                        &ctx.config.payload_dir(),
                        &on_bytes,
                    )
                    .await
                    .with_context(|| format!("Failed to stage payload '{remote_name}'"))?
            }
        };

        if let Some(expected) = &self.spec.sha256
            && ctx.config.verify_checksums
        {
            ChecksumVerifier::verify_checksum(&staged, expected)
                .await
                .with_context(|| format!("Staged payload for {}", self.spec.path.display()))?;
        }

        self.dest_file = Some(ctx.config.app_dir.join(&self.spec.path));
        self.staged_file = Some(staged);
        debug!(
            "Prepared file replacement; destination: {}",
            self.dest_file.as_ref().expect("just set").display()
        );
        Ok(())
    }

    pub(super) async fn execute(
        &mut self,
        ctx: &ExecuteContext<'_>,
        cold_run: bool,
    ) -> Result<ExecutionStatus> {
        if self.noop {
            warn!("file-replace task has an empty target path; task is a noop");
            return Ok(ExecutionStatus::Successful);
        }

        let dest = self.dest_file.clone().ok_or_else(|| anyhow!("task was not prepared"))?;
        ensure_parent_dir(&dest).await?;

        // Snapshot the pre-existing target before the first touch.
        if self.backup_file.is_none() && dest.exists() {
            let backup = ctx.config.backup_dir().join(&self.spec.path);
            ensure_parent_dir(&backup).await?;
            fs::copy(&dest, &backup)
                .await
                .with_context(|| format!("Failed to back up {}", dest.display()))?;
            debug!("Backed up {} to {}", dest.display(), backup.display());
            self.backup_file = Some(backup);
        }

        if self.hot_swap || cold_run {
            let staged =
                self.staged_file.clone().ok_or_else(|| anyhow!("task was not prepared"))?;

            let swap = async {
                if dest.exists() {
                    fs::remove_file(&dest).await?;
                }
                move_file(&staged, &dest).await
            };

            match swap.await {
                Ok(()) => {
                    self.staged_file = None;
                }
                Err(e) if cold_run => {
                    // The swap may have removed the target before failing;
                    // put the pre-execution state back, since a failed
                    // task never enters the rollback stack.
                    if !dest.exists() {
                        self.undo_swap(&dest).await;
                    }
                    return Err(e)
                        .with_context(|| format!("Could not replace {}", dest.display()));
                }
                Err(e) => {
                    // Failed hot swaps downgrade to cold tasks instead of
                    // failing the run.
                    warn!(
                        "Hot swap of {} failed ({}); deferring to cold run",
                        dest.display(),
                        e
                    );
                    self.hot_swap = false;
                }
            }
        }

        if cold_run || self.hot_swap {
            if let Some(expected) = &self.spec.sha256
                && ctx.config.verify_checksums
                && let Err(e) = ChecksumVerifier::verify_checksum(&dest, expected).await
            {
                // The write is bad; undo it ourselves since a failed task
                // never enters the rollback stack.
                self.undo_swap(&dest).await;
                return Err(e)
                    .with_context(|| format!("Written file {} failed verification", dest.display()));
            }

            ctx.progress.emit(ProgressEvent {
                task_id: 0,
                task_description: String::new(),
                message: format!("Replaced {}", self.spec.path.display()),
                percentage: 100,
                still_working: false,
            });
            info!("Replaced {}", dest.display());
            return Ok(ExecutionStatus::Successful);
        }

        info!("Deferred replacement of {} to cold run", dest.display());
        Ok(ExecutionStatus::RequiresRestart)
    }

    /// Put the pre-execution state back after a bad write.
    async fn undo_swap(&self, dest: &Path) {
        let restored = match &self.backup_file {
            Some(backup) => fs::copy(backup, dest).await.map(|_| ()),
            None => fs::remove_file(dest).await,
        };
        if let Err(e) = restored {
            warn!("Failed to restore {} after bad write: {}", dest.display(), e);
        }
    }

    pub(super) async fn rollback(&mut self, _config: &UpdateConfig) -> Result<()> {
        if self.noop {
            return Ok(());
        }
        let Some(dest) = self.dest_file.clone() else {
            return Ok(());
        };

        match &self.backup_file {
            Some(backup) => {
                fs::copy(backup, &dest).await.with_context(|| {
                    format!("Failed to restore {} from backup", dest.display())
                })?;
                info!("Restored {} from backup", dest.display());
            }
            None => {
                // The target did not exist before execution; rollback
                // restores absence, not an empty placeholder.
                if dest.exists() {
                    fs::remove_file(&dest)
                        .await
                        .with_context(|| format!("Failed to remove {}", dest.display()))?;
                    info!("Removed {} (no pre-existing file)", dest.display());
                }
            }
        }
        Ok(())
    }
}
