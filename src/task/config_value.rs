//! Configuration-value task: set or delete a value in a TOML settings
//! document.
//!
//! Before writing, the pre-existing value at the key (or its absence) is
//! cached in memory as the rollback snapshot. Leaving `value` blank is an
//! explicit delete: "leave blank to remove the key" is a real removal,
//! not a silent no-op. Rollback restores the cached value, and when the
//! pre-value was absent it restores absence - never a null placeholder.
//!
//! Edits go through `toml_edit` so untouched parts of the document keep
//! their formatting and comments.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;
use toml_edit::{DocumentMut, Item, Table};
use tracing::{debug, info};

use super::{ExecuteContext, ExecutionStatus, PrepareContext, ProgressEvent};
use crate::condition::ConditionTree;
use crate::config::{UpdateConfig, resolve_path};
use crate::core::UpcastError;
use crate::utils::fs::ensure_parent_dir;

/// A scalar value writable into a settings document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    /// Boolean value.
    Boolean(bool),
    /// Integer value.
    Integer(i64),
    /// Floating-point value.
    Float(f64),
    /// String value.
    String(String),
}

impl ConfigValue {
    fn to_item(&self) -> Item {
        match self {
            Self::Boolean(b) => toml_edit::value(*b),
            Self::Integer(i) => toml_edit::value(*i),
            Self::Float(f) => toml_edit::value(*f),
            Self::String(s) => toml_edit::value(s.clone()),
        }
    }
}

/// Schema for a configuration-value task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValueSpec {
    /// Informational description; defaults to naming the key.
    #[serde(default)]
    pub description: Option<String>,
    /// The settings document to edit. `~` expands; relative paths
    /// resolve against the install root.
    pub file: PathBuf,
    /// Dotted key path, e.g. `ui.theme`.
    pub key: String,
    /// The value to write; absent means delete the key.
    #[serde(default)]
    pub value: Option<ConfigValue>,
    /// Conditions gating this task.
    #[serde(default)]
    pub conditions: ConditionTree,
}

impl ConfigValueSpec {
    pub(super) fn description(&self) -> String {
        self.description.clone().unwrap_or_else(|| match &self.value {
            Some(_) => format!("Set {} in {}", self.key, self.file.display()),
            None => format!("Remove {} from {}", self.key, self.file.display()),
        })
    }
}

/// Pre-execution state captured for rollback.
#[derive(Debug)]
struct Snapshot {
    /// Whether the settings document existed before execution.
    file_existed: bool,
    /// The prior item at the key, `None` if absent.
    prior: Option<Item>,
}

/// Runtime state for a configuration-value task.
#[derive(Debug)]
pub struct ConfigValueTask {
    pub(super) spec: ConfigValueSpec,
    resolved_file: Option<PathBuf>,
    snapshot: Option<Snapshot>,
}

impl ConfigValueTask {
    pub(super) fn new(spec: ConfigValueSpec) -> Self {
        Self {
            spec,
            resolved_file: None,
            snapshot: None,
        }
    }

    pub(super) fn prepare(&mut self, ctx: &mut PrepareContext<'_>) -> Result<()> {
        if self.spec.key.trim().is_empty() {
            return Err(UpcastError::ConfigError {
                message: "config-value task requires a non-empty key".to_string(),
            }
            .into());
        }

        self.resolved_file = Some(resolve_path(&ctx.config.app_dir, &self.spec.file));
        Ok(())
    }

    pub(super) async fn execute(&mut self, ctx: &ExecuteContext<'_>) -> Result<ExecutionStatus> {
        let file = self.resolved_file.clone().ok_or_else(|| anyhow!("task was not prepared"))?;

        let file_existed = file.exists();
        let mut doc: DocumentMut = if file_existed {
            let raw = fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            raw.parse().with_context(|| format!("Invalid TOML in {}", file.display()))?
        } else {
            DocumentMut::new()
        };

        let segments: Vec<&str> = self.spec.key.split('.').collect();
        let (&leaf, parents) = segments.split_last().expect("key is non-empty");

        // Read and cache the existing value; this is the rollback snapshot.
        let table = navigate(doc.as_table_mut(), parents, &self.spec.key)?;
        let prior = table.get(leaf).cloned();
        debug!(
            "Snapshot of {} in {}: {}",
            self.spec.key,
            file.display(),
            if prior.is_some() { "present" } else { "absent" }
        );

        match &self.spec.value {
            Some(value) => {
                table.insert(leaf, value.to_item());
            }
            None => {
                // Blank value means delete, per the feed contract.
                table.remove(leaf);
            }
        }

        ensure_parent_dir(&file).await?;
        fs::write(&file, doc.to_string())
            .await
            .with_context(|| format!("Failed to write {}", file.display()))?;

        self.snapshot = Some(Snapshot {
            file_existed,
            prior,
        });

        ctx.progress.emit(ProgressEvent {
            task_id: 0,
            task_description: String::new(),
            message: format!("Updated {} in {}", self.spec.key, self.spec.file.display()),
            percentage: 100,
            still_working: false,
        });
        info!("Updated {} in {}", self.spec.key, file.display());
        Ok(ExecutionStatus::Successful)
    }

    pub(super) async fn rollback(&mut self, _config: &UpdateConfig) -> Result<()> {
        let Some(snapshot) = self.snapshot.take() else {
            return Ok(());
        };
        let file = self.resolved_file.clone().ok_or_else(|| anyhow!("task was not prepared"))?;

        if !snapshot.file_existed {
            // We created the document; restore its absence.
            if file.exists() {
                fs::remove_file(&file)
                    .await
                    .with_context(|| format!("Failed to remove {}", file.display()))?;
            }
            info!("Removed {} (document did not pre-exist)", file.display());
            return Ok(());
        }

        let raw = fs::read_to_string(&file)
            .await
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let mut doc: DocumentMut =
            raw.parse().with_context(|| format!("Invalid TOML in {}", file.display()))?;

        let segments: Vec<&str> = self.spec.key.split('.').collect();
        let (&leaf, parents) = segments.split_last().expect("key is non-empty");
        let table = navigate(doc.as_table_mut(), parents, &self.spec.key)?;

        match snapshot.prior {
            Some(item) => {
                table.insert(leaf, item);
            }
            None => {
                // The key was absent before execution; restore absence,
                // not a placeholder.
                table.remove(leaf);
            }
        }

        fs::write(&file, doc.to_string())
            .await
            .with_context(|| format!("Failed to write {}", file.display()))?;
        info!("Restored {} in {}", self.spec.key, file.display());
        Ok(())
    }
}

/// Walk (creating as needed) the table path leading to a key's parent.
fn navigate<'a>(mut table: &'a mut Table, parents: &[&str], key: &str) -> Result<&'a mut Table> {
    for &segment in parents {
        let item = table.entry(segment).or_insert_with(toml_edit::table);
        table = item.as_table_mut().ok_or_else(|| UpcastError::ConfigError {
            message: format!("key path '{key}' conflicts with a non-table value at '{segment}'"),
        })?;
    }
    Ok(table)
}
