//! File-based condition atoms.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::warn;

use super::EvalContext;

/// Applicable when a path exists under the install root.
///
/// When no path is declared, the condition falls back to the gated task's
/// own target path; with neither available it cannot determine an answer
/// and defaults to applicable.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileExistsCondition {
    /// Path to test; relative paths resolve against the install root.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl FileExistsCondition {
    pub(super) fn is_met(&self, ctx: &EvalContext<'_>) -> Result<bool> {
        let Some(path) = self.path.as_deref().or(ctx.task_target) else {
            warn!("file-exists condition has no path and the task has no target; not blocking");
            return Ok(true);
        };

        Ok(resolve(ctx.app_dir, path).exists())
    }
}

/// Applicable when a file's SHA-256 digest matches the declared value.
///
/// Useful for gating a replacement on "the installed file is still the
/// version we think it is". An unreadable or missing file counts as a
/// digest mismatch (the file is certainly not the expected content); a
/// missing parameter means the condition cannot determine an answer and
/// defaults to applicable.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileChecksumCondition {
    /// File to digest; relative paths resolve against the install root.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Expected SHA-256, hex-encoded, optionally `sha256:`-prefixed.
    #[serde(default)]
    pub sha256: Option<String>,
}

impl FileChecksumCondition {
    pub(super) fn is_met(&self, ctx: &EvalContext<'_>) -> Result<bool> {
        let (Some(path), Some(expected)) = (self.path.as_deref(), self.sha256.as_deref()) else {
            warn!("file-checksum condition is missing path or sha256; not blocking");
            return Ok(true);
        };

        let full = resolve(ctx.app_dir, path);
        let contents = match std::fs::read(&full) {
            Ok(c) => c,
            Err(_) => return Ok(false),
        };

        let mut hasher = Sha256::new();
        hasher.update(&contents);
        let actual = hex::encode(hasher.finalize());

        let expected = expected.trim().strip_prefix("sha256:").unwrap_or(expected.trim());
        Ok(actual.eq_ignore_ascii_case(expected))
    }
}

fn resolve(app_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        app_dir.join(path)
    }
}
