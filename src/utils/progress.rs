//! Progress indicators for CLI output.
//!
//! Thin wrapper around `indicatif` giving upcast operations a consistent
//! look and a single disable switch. Progress bars are hidden when the
//! `UPCAST_NO_PROGRESS` environment variable is set (CI, scripts, clean
//! logs) or when `--no-progress` was passed.

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle as IndicatifStyle};
use std::time::Duration;

/// Checks if progress bars should be disabled via the environment.
fn is_progress_disabled() -> bool {
    std::env::var("UPCAST_NO_PROGRESS").is_ok()
}

/// A progress bar with consistent styling.
///
/// Wraps `indicatif` with upcast-specific styling and the global disable
/// switch; the run-level bar tracks overall percentage across all tasks
/// while per-task messages stream through [`set_message`].
///
/// [`set_message`]: ProgressBar::set_message
#[derive(Clone)]
pub struct ProgressBar {
    bar: IndicatifBar,
}

impl ProgressBar {
    /// Create a percentage bar spanning `len` units.
    #[must_use]
    pub fn new(len: u64) -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            IndicatifBar::new(len)
        };
        bar.set_style(
            IndicatifStyle::default_bar()
                .template("{prefix} [{bar:30.cyan/blue}] {percent:>3}% {msg}")
                .expect("valid progress template")
                .progress_chars("=> "),
        );
        Self {
            bar,
        }
    }

    /// Create a spinner for indeterminate work.
    #[must_use]
    pub fn new_spinner() -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            IndicatifBar::new_spinner()
        };
        bar.set_style(
            IndicatifStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .expect("valid spinner template"),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Self {
            bar,
        }
    }

    /// Update the trailing message.
    pub fn set_message(&self, msg: impl Into<String>) {
        self.bar.set_message(msg.into());
    }

    /// Update the leading prefix.
    pub fn set_prefix(&self, prefix: impl Into<String>) {
        self.bar.set_prefix(prefix.into());
    }

    /// Set the absolute position.
    pub fn set_position(&self, pos: u64) {
        self.bar.set_position(pos);
    }

    /// Finish, leaving a final message behind.
    pub fn finish_with_message(&self, msg: impl Into<String>) {
        self.bar.finish_with_message(msg.into());
    }

    /// Finish and remove the bar from the terminal.
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}
