//! Update feed parsing.
//!
//! A feed is the parsed result of a remote update manifest: feed-level
//! metadata plus an ordered list of tasks. Two document formats are
//! supported, selected by the `feed_format` configuration key:
//!
//! - [`appcast`] - a JSON appcast: release items with enclosure URLs and
//!   version markers, each yielding one version-gated file replacement
//! - [`manifest`] - a TOML document carrying full task definitions with
//!   arbitrary variants and condition trees
//!
//! Malformed documents fail fast with a parse error; no partial feed is
//! ever returned. Tasks come out in document order, which the pipeline
//! preserves for execution and reverses for rollback.

mod appcast;
mod manifest;

pub use appcast::AppcastReader;
pub use manifest::ManifestReader;

use anyhow::Result;

use crate::core::UpcastError;
use crate::task::Task;

/// The parsed result of a feed document.
#[derive(Debug)]
pub struct Feed {
    /// Base URL payload names resolve against.
    pub base_url: Option<String>,
    /// Total payload size in bytes, when every item declares one.
    pub payload_size: Option<u64>,
    /// Size of a compressed payload bundle, when the feed ships one.
    pub compressed_size: Option<u64>,
    /// Tasks in document order.
    pub tasks: Vec<Task>,
}

/// Parses a raw feed document into a [`Feed`].
pub trait FeedReader: std::fmt::Debug {
    /// Parse `raw` into a feed.
    ///
    /// # Errors
    ///
    /// Returns [`UpcastError::FeedParseError`] for malformed documents;
    /// never returns a partial feed.
    fn read(&self, raw: &str) -> Result<Feed>;
}

/// Resolve the reader registered for a format tag.
pub fn reader_for(format: &str) -> Result<Box<dyn FeedReader>> {
    match format {
        "appcast" => Ok(Box::new(AppcastReader)),
        "manifest" => Ok(Box::new(ManifestReader)),
        other => Err(UpcastError::UnknownFeedFormat {
            format: other.to_string(),
        }
        .into()),
    }
}
