//! SHA-256 integrity verification for staged payloads and installed files.
//!
//! Checksum verification here is local integrity checking - it detects
//! corrupted or incomplete downloads, not a tampered feed origin. The
//! pipeline verifies payloads before any destructive step, and individual
//! tasks may verify written files afterward.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

use crate::core::UpcastError;

/// Verifies file integrity using SHA-256 checksums.
pub struct ChecksumVerifier;

impl ChecksumVerifier {
    /// Compute the SHA-256 checksum of a file.
    ///
    /// Returns the lowercase hex-encoded digest.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub async fn compute_sha256(file_path: &Path) -> Result<String> {
        debug!("Computing SHA256 checksum for: {:?}", file_path);

        let contents = fs::read(file_path)
            .await
            .with_context(|| format!("Failed to read file: {file_path:?}"))?;

        let mut hasher = Sha256::new();
        hasher.update(&contents);
        Ok(hex::encode(hasher.finalize()))
    }

    /// Verify a file against an expected checksum.
    ///
    /// The comparison is case-insensitive and tolerates an optional
    /// `sha256:` prefix on the expected value (checksums copied from
    /// release pages come in both shapes).
    ///
    /// # Errors
    ///
    /// Returns [`UpcastError::ChecksumMismatch`] if the digests differ, or
    /// an IO error if the file cannot be read.
    pub async fn verify_checksum(file_path: &Path, expected_checksum: &str) -> Result<()> {
        info!("Verifying checksum for: {:?}", file_path);

        let actual = Self::compute_sha256(file_path).await?;
        let expected = expected_checksum
            .trim()
            .strip_prefix("sha256:")
            .unwrap_or(expected_checksum.trim());

        if !actual.eq_ignore_ascii_case(expected) {
            return Err(UpcastError::ChecksumMismatch {
                name: file_path.display().to_string(),
                expected: expected.to_string(),
                actual,
            }
            .into());
        }

        info!("Checksum verification successful");
        Ok(())
    }
}
