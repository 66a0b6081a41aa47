//! Version parsing and comparison utilities.
//!
//! Feeds and conditions carry version strings in a handful of common
//! shapes: `1.2.3`, `v1.2.3`, `version-1.2.3`, `release-1.2.3`. This module
//! normalizes those prefixes and exposes the comparison operators used by
//! version conditions.
//!
//! # Examples
//!
//! ```rust
//! use upcast::version::{CompareOp, parse_version};
//!
//! # fn example() -> anyhow::Result<()> {
//! let installed = parse_version("v1.2.0")?;
//! let required = parse_version("1.3.0")?;
//!
//! assert!(CompareOp::Less.matches(&installed, &required));
//! assert!(!CompareOp::GreaterOrEqual.matches(&installed, &required));
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use semver::Version;
use serde::{Deserialize, Serialize};

/// Parse a version string, stripping common prefixes.
///
/// Handles `v1.2.3`, `version-1.2.3`, and `release-1.2.3` in addition to
/// bare semantic versions.
///
/// # Errors
///
/// Returns an error if the remainder is not a valid semantic version.
pub fn parse_version(version: &str) -> Result<Version> {
    let cleaned = strip_prefix(version);
    Version::parse(cleaned).with_context(|| format!("Invalid version string: '{version}'"))
}

fn strip_prefix(version: &str) -> &str {
    let version = version.trim();
    for prefix in ["version-", "release-", "v"] {
        if let Some(rest) = version.strip_prefix(prefix) {
            return rest;
        }
    }
    version
}

/// Comparison operator applied between an installed version and a feed
/// version by version conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CompareOp {
    /// Installed version is older than the reference
    #[default]
    Less,
    /// Installed version is older than or equal to the reference
    LessOrEqual,
    /// Versions are equal
    Equal,
    /// Versions differ
    NotEqual,
    /// Installed version is newer than or equal to the reference
    GreaterOrEqual,
    /// Installed version is newer than the reference
    Greater,
}

impl CompareOp {
    /// Apply this operator: `left <op> right`.
    #[must_use]
    pub fn matches(self, left: &Version, right: &Version) -> bool {
        match self {
            Self::Less => left < right,
            Self::LessOrEqual => left <= right,
            Self::Equal => left == right,
            Self::NotEqual => left != right,
            Self::GreaterOrEqual => left >= right,
            Self::Greater => left > right,
        }
    }
}
