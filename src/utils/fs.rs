//! Filesystem helpers used by tasks and the pipeline.

use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

/// Create a directory and all missing parents.
pub async fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .await
        .with_context(|| format!("Failed to create directory {}", path.display()))
}

/// Create the parent directory of `path` if it has one.
pub async fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent).await?;
    }
    Ok(())
}

/// Move a file, falling back to copy+remove when rename fails.
///
/// Staging areas commonly live on a different filesystem than the install
/// root, where a plain rename returns `EXDEV`.
pub async fn move_file(from: &Path, to: &Path) -> Result<()> {
    match fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(from, to).await.with_context(|| {
                format!("Failed to copy {} to {}", from.display(), to.display())
            })?;
            fs::remove_file(from)
                .await
                .with_context(|| format!("Failed to remove {}", from.display()))?;
            Ok(())
        }
    }
}
