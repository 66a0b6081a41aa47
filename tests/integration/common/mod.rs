//! Shared fixtures for integration tests.

use std::path::Path;
use tempfile::TempDir;
use upcast::config::UpdateConfig;
use upcast::source::UpdateSource;

/// A disposable installation: install root, staging area, and a feed
/// document next to them.
pub struct TestEnv {
    pub temp: TempDir,
}

impl TestEnv {
    /// Create the directory skeleton and write the feed document.
    pub fn new(feed_file: &str, feed_contents: &str) -> Self {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("install")).unwrap();
        std::fs::write(temp.path().join(feed_file), feed_contents).unwrap();
        Self {
            temp,
        }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn install_dir(&self) -> std::path::PathBuf {
        self.temp.path().join("install")
    }

    /// Drop a payload file next to the feed.
    pub fn add_payload(&self, name: &str, contents: &[u8]) {
        std::fs::write(self.temp.path().join(name), contents).unwrap();
    }

    /// Drop a file into the install root.
    pub fn add_installed(&self, name: &str, contents: &[u8]) {
        let path = self.install_dir().join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    pub fn installed(&self, name: &str) -> Option<Vec<u8>> {
        std::fs::read(self.install_dir().join(name)).ok()
    }

    /// A config pointing at the feed, with an isolated staging area.
    pub fn config(&self, feed_file: &str, feed_format: &str) -> UpdateConfig {
        UpdateConfig {
            feed_url: self.temp.path().join(feed_file).to_string_lossy().into_owned(),
            feed_format: feed_format.to_string(),
            app_dir: self.install_dir(),
            staging_dir: Some(self.temp.path().join("staging")),
            installed_version: None,
            verify_checksums: true,
        }
    }

    pub fn source(&self, config: &UpdateConfig) -> UpdateSource {
        UpdateSource::for_config(config).unwrap()
    }
}

/// SHA-256 of a file, hex-encoded (for feed fixtures).
pub async fn sha256_of(path: &Path) -> String {
    upcast::checksum::ChecksumVerifier::compute_sha256(path).await.unwrap()
}
