//! Payload sources: where feed documents and task payloads come from.
//!
//! A source abstracts "already local" versus "fetch from remote" behind
//! two operations: fetching the raw feed document and fetching a named
//! payload to a local path. Tasks only ever see a synchronous-looking
//! `prepare` call; any internal streaming or retrying completes before
//! the fetch returns.
//!
//! Payload URLs resolve like the feed's links: an absolute URL is used
//! as-is, otherwise the name joins the feed's `base_url` (or the feed
//! document's own location when no base is declared).

mod cache;

pub use cache::PayloadCache;

use anyhow::{Context, Result};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio_retry::Retry;
use tokio_retry::strategy::ExponentialBackoff;
use tracing::{debug, info, warn};

use crate::config::UpdateConfig;
use crate::constants::{
    DOWNLOAD_RETRIES, FEED_FETCH_TIMEOUT, MAX_BACKOFF_DELAY_MS, PAYLOAD_FETCH_TIMEOUT,
    STARTING_BACKOFF_DELAY_MS,
};
use crate::core::UpcastError;

/// Byte-level progress callback: `(bytes_so_far, total_if_known)`.
pub type ByteProgress<'a> = &'a (dyn Fn(u64, Option<u64>) + Send + Sync);

/// A source of feed documents and payloads.
pub enum UpdateSource {
    /// Payloads live in a local directory (tests, LAN shares).
    LocalDir(LocalDirSource),
    /// Payloads are fetched over HTTP(S).
    Http(HttpSource),
}

impl UpdateSource {
    /// Build the source matching the configured feed location.
    pub fn for_config(config: &UpdateConfig) -> Result<Self> {
        let url = config.feed_url.trim();
        if url.starts_with("http://") || url.starts_with("https://") {
            Ok(Self::Http(HttpSource::new(url.to_string())?))
        } else {
            Ok(Self::LocalDir(LocalDirSource::new(PathBuf::from(url))))
        }
    }

    /// Fetch the raw feed document.
    pub async fn fetch_feed(&self) -> Result<String> {
        match self {
            Self::LocalDir(s) => s.fetch_feed().await,
            Self::Http(s) => s.fetch_feed().await,
        }
    }

    /// Fetch a named payload into `dest`, reporting byte progress.
    ///
    /// `name` may be an absolute URL or a name resolved against
    /// `base_url`. The destination file is fully written when this
    /// returns; partial downloads are removed on failure.
    pub async fn fetch_payload(
        &self,
        name: &str,
        base_url: Option<&str>,
        dest: &Path,
        on_bytes: ByteProgress<'_>,
    ) -> Result<()> {
        match self {
            Self::LocalDir(s) => s.fetch_payload(name, base_url, dest, on_bytes).await,
            Self::Http(s) => s.fetch_payload(name, base_url, dest, on_bytes).await,
        }
    }
}

/// Source backed by the local filesystem.
///
/// The "feed URL" is a path to the feed document; payload names resolve
/// against `base_url` (as a directory) or the feed document's directory.
pub struct LocalDirSource {
    feed_path: PathBuf,
}

impl LocalDirSource {
    /// Create a source for a feed document on disk.
    #[must_use]
    pub fn new(feed_path: PathBuf) -> Self {
        Self {
            feed_path,
        }
    }

    async fn fetch_feed(&self) -> Result<String> {
        debug!("Reading feed from {}", self.feed_path.display());
        tokio::fs::read_to_string(&self.feed_path)
            .await
            .with_context(|| format!("Failed to read feed {}", self.feed_path.display()))
    }

    async fn fetch_payload(
        &self,
        name: &str,
        base_url: Option<&str>,
        dest: &Path,
        on_bytes: ByteProgress<'_>,
    ) -> Result<()> {
        let candidate = PathBuf::from(name);
        let path = if candidate.is_absolute() {
            candidate
        } else if let Some(base) = base_url {
            PathBuf::from(base).join(name)
        } else {
            let dir = self.feed_path.parent().unwrap_or_else(|| Path::new("."));
            dir.join(name)
        };

        debug!("Copying payload {} to {}", path.display(), dest.display());
        let bytes = tokio::fs::copy(&path, dest).await.map_err(|e| {
            UpcastError::PayloadFetchError {
                url: path.display().to_string(),
                reason: e.to_string(),
            }
        })?;
        on_bytes(bytes, Some(bytes));
        Ok(())
    }
}

/// Source backed by HTTP(S), with retry and streamed progress.
pub struct HttpSource {
    client: reqwest::Client,
    feed_url: reqwest::Url,
}

impl HttpSource {
    /// Create an HTTP source for the given feed URL.
    pub fn new(feed_url: String) -> Result<Self> {
        let feed_url = reqwest::Url::parse(&feed_url)
            .with_context(|| format!("Invalid feed URL: {feed_url}"))?;
        let client = reqwest::Client::builder()
            .user_agent(concat!("upcast/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            feed_url,
        })
    }

    async fn fetch_feed(&self) -> Result<String> {
        info!("Fetching feed from {}", self.feed_url);
        let response = self
            .client
            .get(self.feed_url.clone())
            .timeout(FEED_FETCH_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("Failed to fetch feed from {}", self.feed_url))?;

        if !response.status().is_success() {
            return Err(UpcastError::PayloadFetchError {
                url: self.feed_url.to_string(),
                reason: format!("HTTP {}", response.status()),
            }
            .into());
        }

        response.text().await.context("Failed to read feed response body")
    }

    /// Resolve a payload name against the declared base URL or the feed's
    /// own location.
    fn resolve_url(&self, name: &str, base_url: Option<&str>) -> Result<reqwest::Url> {
        if let Ok(absolute) = reqwest::Url::parse(name) {
            return Ok(absolute);
        }

        let base = match base_url {
            Some(base) => {
                // A base of http://host/folder with payload app.bin would
                // otherwise resolve to http://host/app.bin; the trailing
                // slash makes the joiner treat the base as a directory.
                let base =
                    if base.ends_with('/') { base.to_string() } else { format!("{base}/") };
                reqwest::Url::parse(&base).with_context(|| format!("Invalid base URL: {base}"))?
            }
            None => self.feed_url.clone(),
        };

        base.join(name).with_context(|| format!("Cannot resolve payload URL for '{name}'"))
    }

    async fn fetch_payload(
        &self,
        name: &str,
        base_url: Option<&str>,
        dest: &Path,
        on_bytes: ByteProgress<'_>,
    ) -> Result<()> {
        let url = self.resolve_url(name, base_url)?;

        let strategy = ExponentialBackoff::from_millis(STARTING_BACKOFF_DELAY_MS)
            .max_delay(std::time::Duration::from_millis(MAX_BACKOFF_DELAY_MS))
            .take(DOWNLOAD_RETRIES);

        Retry::spawn(strategy, || async {
            match self.download_once(&url, dest, on_bytes).await {
                Ok(()) => Ok(()),
                Err(e) => {
                    warn!("Download of {} failed, may retry: {:#}", url, e);
                    Err(e)
                }
            }
        })
        .await
        .map_err(|e| {
            UpcastError::PayloadFetchError {
                url: url.to_string(),
                reason: format!("{e:#}"),
            }
            .into()
        })
    }

    async fn download_once(
        &self,
        url: &reqwest::Url,
        dest: &Path,
        on_bytes: ByteProgress<'_>,
    ) -> Result<()> {
        debug!("Downloading {} to {}", url, dest.display());

        let response = self
            .client
            .get(url.clone())
            .timeout(PAYLOAD_FETCH_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("Request to {url} failed"))?;

        if !response.status().is_success() {
            anyhow::bail!("HTTP {}", response.status());
        }

        let total = response.content_length();
        let mut file = tokio::fs::File::create(dest)
            .await
            .with_context(|| format!("Failed to create {}", dest.display()))?;

        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    // Leave no partial file behind for the retry to trip on
                    drop(file);
                    let _ = tokio::fs::remove_file(dest).await;
                    return Err(e).context("Download stream interrupted");
                }
            };
            file.write_all(&chunk).await.context("Failed to write payload chunk")?;
            downloaded += chunk.len() as u64;
            on_bytes(downloaded, total);
        }

        file.flush().await.context("Failed to flush payload file")?;
        info!("Downloaded {} ({} bytes)", url, downloaded);
        Ok(())
    }
}
