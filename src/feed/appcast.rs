//! JSON appcast reader.
//!
//! An appcast is a release feed: each item announces one version of one
//! artifact via an enclosure. Every item yields exactly one file
//! replacement task, gated by an `installed-version < item.version`
//! condition so already-current installations skip it. The derived
//! condition is AND-merged into whatever conditions the item already
//! declares - never replacing them.
//!
//! ## Document shape
//!
//! ```json
//! {
//!   "title": "Example App",
//!   "base_url": "https://releases.example.com/v2/",
//!   "items": [
//!     {
//!       "description": "Example App 2.1.0",
//!       "version": "2.1.0",
//!       "path": "bin/example",
//!       "enclosure": {
//!         "url": "example-2.1.0.bin",
//!         "length": 1048576,
//!         "sha256": "..."
//!       }
//!     }
//!   ]
//! }
//! ```

use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;

use super::{Feed, FeedReader};
use crate::condition::{Condition, ConditionTree, VersionCondition};
use crate::core::UpcastError;
use crate::task::{FileReplaceSpec, Task, TaskSpec};
use crate::version::CompareOp;

#[derive(Debug, Deserialize)]
struct AppcastDoc {
    #[allow(dead_code)]
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    base_url: Option<String>,
    items: Vec<AppcastItem>,
}

#[derive(Debug, Deserialize)]
struct AppcastItem {
    #[serde(default)]
    description: Option<String>,
    version: String,
    /// Install-root-relative target; defaults to the enclosure's file name.
    #[serde(default)]
    path: Option<PathBuf>,
    enclosure: Enclosure,
    #[serde(default)]
    conditions: ConditionTree,
    #[serde(default)]
    hot_swap: bool,
}

#[derive(Debug, Deserialize)]
struct Enclosure {
    url: String,
    #[serde(default)]
    length: Option<u64>,
    #[serde(default)]
    sha256: Option<String>,
}

/// Reader for JSON appcast documents.
#[derive(Debug)]
pub struct AppcastReader;

impl FeedReader for AppcastReader {
    fn read(&self, raw: &str) -> Result<Feed> {
        let doc: AppcastDoc = serde_json::from_str(raw).map_err(|e| {
            UpcastError::FeedParseError {
                reason: e.to_string(),
            }
        })?;

        let mut tasks = Vec::with_capacity(doc.items.len());
        let mut payload_size = Some(0u64);

        for (index, item) in doc.items.into_iter().enumerate() {
            let path = match item.path {
                Some(path) => path,
                None => target_from_url(&item.enclosure.url).ok_or_else(|| {
                    UpcastError::FeedParseError {
                        reason: format!(
                            "item {} has no target path and none can be derived from '{}'",
                            index + 1,
                            item.enclosure.url
                        ),
                    }
                })?,
            };

            // Total size is only meaningful when every item declares one
            payload_size = match (payload_size, item.enclosure.length) {
                (Some(total), Some(len)) => Some(total + len),
                _ => None,
            };

            let mut spec = TaskSpec::FileReplace(FileReplaceSpec {
                description: item.description,
                path,
                update_to: Some(item.enclosure.url),
                sha256: item.enclosure.sha256,
                hot_swap: item.hot_swap,
                conditions: item.conditions,
            });

            // Gate on the item's version, keeping any declared conditions
            spec.conditions_mut().push_and(Condition::InstalledVersion(VersionCondition {
                op: CompareOp::Less,
                version: Some(item.version),
            }));

            tasks.push(Task::from_spec(spec));
        }

        Ok(Feed {
            base_url: doc.base_url,
            payload_size,
            compressed_size: None,
            tasks,
        })
    }
}

/// Derive an install target from the last path segment of an URL.
fn target_from_url(url: &str) -> Option<PathBuf> {
    let trimmed = url.split(['?', '#']).next().unwrap_or(url);
    let name = trimmed.rsplit('/').next().unwrap_or(trimmed);
    if name.is_empty() { None } else { Some(PathBuf::from(name)) }
}
