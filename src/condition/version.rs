//! Installed-version condition atom.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::EvalContext;
use crate::core::UpcastError;
use crate::version::{CompareOp, parse_version};

/// Applicable when `installed_version <op> version` holds.
///
/// The default operator is `less`, matching the common gate "apply this
/// update only when the installation is older than the feed item".
///
/// When the installed version is unknown (not configured), the condition
/// cannot determine an answer and defaults to applicable - a fresh or
/// unversioned installation should not be blocked from updating.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VersionCondition {
    /// Comparison operator applied as `installed <op> version`.
    #[serde(default)]
    pub op: CompareOp,
    /// The version literal to compare against.
    #[serde(default)]
    pub version: Option<String>,
}

impl VersionCondition {
    pub(super) fn is_met(&self, ctx: &EvalContext<'_>) -> Result<bool> {
        let Some(version) = self.version.as_deref() else {
            warn!("installed-version condition has no version literal; not blocking");
            return Ok(true);
        };

        // A literal that does not parse is broken feed configuration, not
        // a "cannot determine" case.
        let reference = parse_version(version).map_err(|e| UpcastError::ConditionError {
            reason: format!("installed-version condition: {e:#}"),
        })?;

        let Some(installed) = ctx.installed_version else {
            warn!("installed version is not configured; not blocking");
            return Ok(true);
        };

        Ok(self.op.matches(installed, &reference))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn ctx<'a>(installed: Option<&'a semver::Version>) -> EvalContext<'a> {
        EvalContext {
            app_dir: Path::new("."),
            installed_version: installed,
            task_target: None,
        }
    }

    #[test]
    fn older_installation_passes_less_gate() {
        let installed = semver::Version::new(1, 1, 0);
        let cond = VersionCondition {
            op: CompareOp::Less,
            version: Some("1.2.0".to_string()),
        };
        assert!(cond.is_met(&ctx(Some(&installed))).unwrap());
    }

    #[test]
    fn equal_installation_fails_greater_gate() {
        // installed 1.2.0 against "> 1.2.0" must not apply
        let installed = semver::Version::new(1, 2, 0);
        let cond = VersionCondition {
            op: CompareOp::Greater,
            version: Some("1.2.0".to_string()),
        };
        assert!(!cond.is_met(&ctx(Some(&installed))).unwrap());
    }

    #[test]
    fn unknown_installed_version_is_applicable() {
        let cond = VersionCondition {
            op: CompareOp::Less,
            version: Some("1.2.0".to_string()),
        };
        assert!(cond.is_met(&ctx(None)).unwrap());
    }

    #[test]
    fn missing_literal_is_applicable() {
        let installed = semver::Version::new(1, 0, 0);
        let cond = VersionCondition::default();
        assert!(cond.is_met(&ctx(Some(&installed))).unwrap());
    }

    #[test]
    fn malformed_literal_is_fatal() {
        let installed = semver::Version::new(1, 0, 0);
        let cond = VersionCondition {
            op: CompareOp::Less,
            version: Some("one.two".to_string()),
        };
        assert!(cond.is_met(&ctx(Some(&installed))).is_err());
    }
}
