//! Staging-area run lock.
//!
//! At most one pipeline run may be active per staging area: two
//! concurrent runs would race on the same staged payloads and the same
//! target installation. The gate is an OS file lock on `run.lock` inside
//! the staging directory, held for the lifetime of the returned guard
//! and released on drop. Acquisition does not block - a held lock is an
//! immediate [`UpcastError::RunInProgress`].

use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::constants::RUN_LOCK_NAME;
use crate::core::UpcastError;

/// Exclusive lock over one staging area.
#[derive(Debug)]
pub struct RunLock {
    _file: File,
    path: PathBuf,
}

impl RunLock {
    /// Try to acquire the run lock for `staging_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`UpcastError::RunInProgress`] when another process holds
    /// the lock, or an IO error when the lock file cannot be created.
    pub fn acquire(staging_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(staging_dir).with_context(|| {
            format!("Failed to create staging directory {}", staging_dir.display())
        })?;

        let path = staging_dir.join(RUN_LOCK_NAME);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .with_context(|| format!("Failed to open lock file {}", path.display()))?;

        let acquired = file
            .try_lock_exclusive()
            .with_context(|| format!("Failed to lock {}", path.display()))?;
        if !acquired {
            return Err(UpcastError::RunInProgress {
                staging_dir: staging_dir.display().to_string(),
            }
            .into());
        }

        debug!("Acquired run lock at {}", path.display());
        Ok(Self {
            _file: file,
            path,
        })
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        // The lock is released when the file handle closes; unlock
        // explicitly so the release is not tied to close ordering.
        if let Err(e) = FileExt::unlock(&self._file) {
            tracing::warn!("Failed to unlock {}: {}", self.path.display(), e);
        }
    }
}
