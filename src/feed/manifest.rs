//! TOML manifest reader.
//!
//! The manifest format carries full task definitions - any variant, any
//! condition tree - using the task schema structs as the document format.
//!
//! ## Document shape
//!
//! ```toml
//! base_url = "https://releases.example.com/v2/"
//! payload_size = 1048576
//!
//! [[tasks]]
//! kind = "file-replace"
//! path = "bin/example"
//! url = "example-2.1.0.bin"   # optional; defaults to the target path
//! sha256 = "..."
//! hot_swap = true
//!
//! [[tasks.conditions]]
//! kind = "installed-version"
//! op = "less"
//! version = "2.1.0"
//!
//! [[tasks]]
//! kind = "config-value"
//! file = "settings.toml"
//! key = "ui.theme"
//! value = "dark"
//! ```

use anyhow::Result;
use serde::Deserialize;

use super::{Feed, FeedReader};
use crate::core::UpcastError;
use crate::task::{Task, TaskSpec};

#[derive(Debug, Deserialize)]
struct ManifestDoc {
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    payload_size: Option<u64>,
    #[serde(default)]
    compressed_size: Option<u64>,
    #[serde(default)]
    tasks: Vec<TaskSpec>,
}

/// Reader for TOML task manifests.
#[derive(Debug)]
pub struct ManifestReader;

impl FeedReader for ManifestReader {
    fn read(&self, raw: &str) -> Result<Feed> {
        let doc: ManifestDoc = toml::from_str(raw).map_err(|e| {
            UpcastError::FeedParseError {
                reason: e.to_string(),
            }
        })?;

        Ok(Feed {
            base_url: doc.base_url,
            payload_size: doc.payload_size,
            compressed_size: doc.compressed_size,
            tasks: doc.tasks.into_iter().map(Task::from_spec).collect(),
        })
    }
}
