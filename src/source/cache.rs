//! Per-run payload cache.
//!
//! One pipeline run owns exactly one cache, keyed by the payload's
//! resolved name. Two tasks referencing the same payload share one
//! download. The cache is an explicitly passed object with a defined
//! lifetime - it is created for a run and dropped with it, keeping the
//! pipeline free of hidden shared mutable state.

use anyhow::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

use super::{ByteProgress, UpdateSource};
use crate::utils::fs::ensure_dir;

/// Maps resolved payload names to staged local files for one run.
#[derive(Default)]
pub struct PayloadCache {
    entries: HashMap<String, PathBuf>,
}

impl PayloadCache {
    /// An empty cache for a new run.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an already-staged payload.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Path> {
        self.entries.get(key).map(PathBuf::as_path)
    }

    /// Record a payload staged outside the cache (e.g. restored from a
    /// pending cold-run state file).
    pub fn insert(&mut self, key: impl Into<String>, path: PathBuf) {
        self.entries.insert(key.into(), path);
    }

    /// Fetch a payload through the source unless it is already staged.
    ///
    /// New payloads land in `payload_dir` under a fresh UUID file name so
    /// concurrent feeds with colliding payload names cannot clobber each
    /// other across runs.
    pub async fn fetch(
        &mut self,
        source: &UpdateSource,
        name: &str,
        base_url: Option<&str>,
        payload_dir: &Path,
        on_bytes: ByteProgress<'_>,
    ) -> Result<PathBuf> {
        let key = cache_key(name, base_url);
        if let Some(path) = self.entries.get(&key) {
            debug!("Payload '{}' already staged at {}", name, path.display());
            return Ok(path.clone());
        }

        ensure_dir(payload_dir).await?;
        let dest = payload_dir.join(Uuid::new_v4().to_string());
        source.fetch_payload(name, base_url, &dest, on_bytes).await?;

        self.entries.insert(key, dest.clone());
        Ok(dest)
    }
}

fn cache_key(name: &str, base_url: Option<&str>) -> String {
    match base_url {
        Some(base) => format!("{base}|{name}"),
        None => name.to_string(),
    }
}
