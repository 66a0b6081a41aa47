//! Condition trees gating task applicability.
//!
//! Every task may carry a condition tree: an ordered sequence of
//! `(join, negate, condition)` entries where a condition is either an
//! atomic predicate or a nested group. Evaluation folds left-to-right:
//! the result starts from the first child, then each subsequent entry
//! combines with `AND` or `OR`. There is **no short-circuiting** - every
//! child is evaluated - which is what allows atoms to be side-effect-free
//! by contract and evaluation order to never matter for system state.
//!
//! An empty tree evaluates to `true`: a task that declares no conditions
//! is unconditionally applicable.
//!
//! # Failure semantics
//!
//! Conditions are advisory gates, not task logic. An atom that cannot
//! determine its answer (missing parameter, unknown installed version,
//! unreadable file) logs a warning and yields `true` so it never blocks a
//! task. A hard error (e.g. an unparseable version literal in the feed) is
//! a fatal configuration error that aborts the pipeline before anything
//! executes.
//!
//! # Atoms
//!
//! - [`FileExistsCondition`] - a path exists under the install root
//! - [`VersionCondition`] - compares the installed version to a literal
//! - [`OsCondition`] - matches the running OS and architecture
//! - [`FileChecksumCondition`] - a file's SHA-256 matches a literal

mod file;
mod os;
mod version;

pub use file::{FileChecksumCondition, FileExistsCondition};
pub use os::OsCondition;
pub use version::VersionCondition;

use anyhow::Result;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Ambient state conditions read from during evaluation.
///
/// Atoms are pure reads over this context plus the filesystem; they never
/// mutate anything.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    /// Root directory of the managed installation; relative condition
    /// paths resolve against it.
    pub app_dir: &'a Path,
    /// The currently installed version, when known.
    pub installed_version: Option<&'a Version>,
    /// The gated task's target path, when it has one (atoms may read task
    /// fields, e.g. "does the task's target exist").
    pub task_target: Option<&'a Path>,
}

/// How an entry combines with the accumulated result to its left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Join {
    /// Logical AND (the default)
    #[default]
    And,
    /// Logical OR
    Or,
}

/// One child of a condition tree: a condition plus how it joins the fold.
///
/// `negate` inverts the child's own result before it enters the fold,
/// covering the `and-not` / `or-not` combinators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionEntry {
    /// Combinator joining this entry to the accumulated result.
    #[serde(default)]
    pub join: Join,
    /// Invert this entry's result before folding.
    #[serde(default)]
    pub negate: bool,
    /// The condition itself.
    #[serde(flatten)]
    pub condition: Condition,
}

impl ConditionEntry {
    /// An AND-joined, non-negated entry - the common case.
    #[must_use]
    pub fn and(condition: Condition) -> Self {
        Self {
            join: Join::And,
            negate: false,
            condition,
        }
    }
}

/// A single condition: an atomic predicate or a nested group.
///
/// The variant set is closed per build; the `kind` tag in feed documents
/// selects the variant, replacing the original design's runtime type
/// discovery with explicit schema structs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Condition {
    /// A nested boolean group.
    Group(GroupCondition),
    /// A path exists.
    FileExists(FileExistsCondition),
    /// The installed version compares against a literal.
    InstalledVersion(VersionCondition),
    /// The running OS / architecture matches.
    Os(OsCondition),
    /// A file's SHA-256 digest matches a literal.
    FileChecksum(FileChecksumCondition),
}

impl Condition {
    /// Evaluate this condition against ambient state.
    ///
    /// # Errors
    ///
    /// Returns an error only for fatally misconfigured conditions (see
    /// module docs); "cannot determine" cases yield `Ok(true)`.
    pub fn is_met(&self, ctx: &EvalContext<'_>) -> Result<bool> {
        match self {
            Self::Group(group) => group.children.is_met(ctx),
            Self::FileExists(cond) => cond.is_met(ctx),
            Self::InstalledVersion(cond) => cond.is_met(ctx),
            Self::Os(cond) => cond.is_met(ctx),
            Self::FileChecksum(cond) => cond.is_met(ctx),
        }
    }
}

/// A nested group of conditions with its own fold.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GroupCondition {
    /// The group's children, evaluated like a top-level tree.
    #[serde(default)]
    pub children: ConditionTree,
}

/// An ordered condition tree attached to a task.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct ConditionTree(pub Vec<ConditionEntry>);

impl ConditionTree {
    /// An empty tree (always applicable).
    #[must_use]
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    /// Whether the tree has no children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append a condition joined with AND, keeping any existing children.
    ///
    /// Feed readers use this to attach derived conditions (e.g. an
    /// appcast item's version gate) without replacing conditions the task
    /// already carries.
    pub fn push_and(&mut self, condition: Condition) {
        self.0.push(ConditionEntry::and(condition));
    }

    /// Evaluate the tree with a full left-to-right fold.
    ///
    /// Every child is evaluated; there is no short-circuiting. An empty
    /// tree is `true`.
    ///
    /// # Errors
    ///
    /// Propagates fatal configuration errors from children.
    pub fn is_met(&self, ctx: &EvalContext<'_>) -> Result<bool> {
        let mut result: Option<bool> = None;

        for entry in &self.0 {
            let mut value = entry.condition.is_met(ctx)?;
            if entry.negate {
                value = !value;
            }

            result = Some(match result {
                None => value,
                Some(acc) => match entry.join {
                    Join::And => acc && value,
                    Join::Or => acc || value,
                },
            });
        }

        Ok(result.unwrap_or(true))
    }
}
