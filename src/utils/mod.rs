//! Cross-platform utilities shared by the engine and the CLI.
//!
//! - [`fs`] - filesystem helpers used by tasks (directory creation,
//!   cross-device-safe moves, backup path mapping)
//! - [`progress`] - indicatif-backed progress rendering for the CLI,
//!   honoring `UPCAST_NO_PROGRESS`

pub mod fs;
pub mod progress;

pub use fs::{ensure_dir, move_file};
pub use progress::ProgressBar;
