//! Configuration for update runs.
//!
//! Configuration lives in an `upcast.toml` file next to the managed
//! installation (or at a path given with `--config`). It names the feed,
//! the install root the tasks mutate, and the staging area used for
//! downloads, backups, and the run lock.
//!
//! ## TOML Example
//!
//! ```toml
//! feed_url = "https://releases.example.com/appcast.json"
//! feed_format = "appcast"
//! app_dir = "."
//! installed_version = "1.2.0"
//! verify_checksums = true
//! # staging_dir defaults to the platform cache directory
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::constants::{BACKUP_DIR_NAME, CONFIG_FILE_NAME, PAYLOAD_DIR_NAME, PENDING_STATE_NAME};
use crate::core::UpcastError;

/// Configuration settings for an update run.
///
/// All relative paths resolve against the directory the configuration file
/// was loaded from, so a config checked in next to the installation keeps
/// working regardless of the process working directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Location of the update feed.
    ///
    /// An `http(s)://` URL is fetched over the network; anything else is
    /// treated as a local path (useful for tests and LAN deployments).
    pub feed_url: String,

    /// Format of the feed document: `appcast` (JSON) or `manifest` (TOML).
    #[serde(default = "default_feed_format")]
    pub feed_format: String,

    /// Root directory of the managed installation.
    ///
    /// File-replacement targets and relative settings-file paths resolve
    /// against this directory.
    #[serde(default = "default_app_dir")]
    pub app_dir: PathBuf,

    /// Staging area for downloaded payloads, backups, the run lock, and
    /// pending cold-run state.
    ///
    /// Defaults to `<platform cache dir>/upcast`.
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,

    /// Version of the currently installed application, consulted by
    /// version conditions. When unset, version conditions cannot determine
    /// an answer and default to applicable.
    #[serde(default)]
    pub installed_version: Option<String>,

    /// Whether to verify payload checksums declared in the feed.
    ///
    /// Disabling this skips verification for feeds that declare no
    /// checksums at all; a declared-but-mismatched checksum always fails.
    #[serde(default = "default_verify_checksums")]
    pub verify_checksums: bool,
}

fn default_feed_format() -> String {
    "appcast".to_string()
}

fn default_app_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_verify_checksums() -> bool {
    true // Always verify declared checksums unless explicitly disabled
}

impl UpdateConfig {
    /// Load configuration from `path`, or from `upcast.toml` in the current
    /// directory when no path is given.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the file is missing or does not
    /// parse, and when `feed_url` is empty.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => PathBuf::from(CONFIG_FILE_NAME),
        };

        if !config_path.exists() {
            return Err(UpcastError::ConfigError {
                message: format!("configuration file not found: {}", config_path.display()),
            }
            .into());
        }

        let raw = tokio::fs::read_to_string(&config_path)
            .await
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let mut config: Self = toml::from_str(&raw)
            .with_context(|| format!("Invalid configuration in {}", config_path.display()))?;

        config.validate()?;

        // Anchor relative paths at the config file's directory
        let base = config_path.parent().unwrap_or_else(|| Path::new("."));
        config.app_dir = resolve_path(base, &config.app_dir);
        if let Some(staging) = config.staging_dir.take() {
            config.staging_dir = Some(resolve_path(base, &staging));
        }
        if !config.feed_url.starts_with("http://") && !config.feed_url.starts_with("https://") {
            // A non-URL feed location is a local path and anchors like
            // the other paths.
            config.feed_url =
                resolve_path(base, Path::new(&config.feed_url)).to_string_lossy().into_owned();
        }

        debug!("Loaded configuration from {}", config_path.display());
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.feed_url.trim().is_empty() {
            return Err(UpcastError::ConfigError {
                message: "feed_url must not be empty".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// The staging directory for this run, created on demand by the
    /// pipeline. Falls back to the platform cache directory.
    #[must_use]
    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir().unwrap_or_else(std::env::temp_dir).join("upcast")
        })
    }

    /// Directory holding pre-execution backups for the current run.
    #[must_use]
    pub fn backup_dir(&self) -> PathBuf {
        self.staging_dir().join(BACKUP_DIR_NAME)
    }

    /// Directory holding downloaded payloads.
    #[must_use]
    pub fn payload_dir(&self) -> PathBuf {
        self.staging_dir().join(PAYLOAD_DIR_NAME)
    }

    /// Path of the pending cold-run state file.
    #[must_use]
    pub fn pending_state_path(&self) -> PathBuf {
        self.staging_dir().join(PENDING_STATE_NAME)
    }
}

/// Expand `~` and resolve a possibly-relative path against `base`.
pub fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
    let expanded = PathBuf::from(expanded);
    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}
