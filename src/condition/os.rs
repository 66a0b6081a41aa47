//! Operating-system condition atom.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::EvalContext;

/// Applicable when the running platform matches the declared constraints.
///
/// Each field constrains independently; an unset field does not constrain
/// at all, so an empty condition is always applicable. Values follow
/// [`std::env::consts`]: `linux` / `macos` / `windows` for `os`,
/// `x86_64` / `aarch64` / ... for `arch`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OsCondition {
    /// Required operating system.
    #[serde(default)]
    pub os: Option<String>,
    /// Required CPU architecture.
    #[serde(default)]
    pub arch: Option<String>,
}

impl OsCondition {
    pub(super) fn is_met(&self, _ctx: &EvalContext<'_>) -> Result<bool> {
        if let Some(os) = &self.os
            && !os.eq_ignore_ascii_case(std::env::consts::OS)
        {
            return Ok(false);
        }

        if let Some(arch) = &self.arch
            && !arch.eq_ignore_ascii_case(std::env::consts::ARCH)
        {
            return Ok(false);
        }

        Ok(true)
    }
}
