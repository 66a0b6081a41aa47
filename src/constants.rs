//! Global constants used throughout the upcast codebase.
//!
//! Timeout durations, retry parameters, and well-known file names used
//! across multiple modules. Defining them centrally keeps magic numbers
//! discoverable.

use std::time::Duration;

/// Configuration file searched for in the working directory.
pub const CONFIG_FILE_NAME: &str = "upcast.toml";

/// Name of the run lock file inside the staging directory.
///
/// The lock guarantees at most one pipeline run per staging area; two
/// concurrent runs would race on the same staged payloads and the same
/// target installation.
pub const RUN_LOCK_NAME: &str = "run.lock";

/// Name of the pending cold-run state file inside the staging directory.
pub const PENDING_STATE_NAME: &str = "pending.json";

/// Subdirectory of the staging area holding pre-execution backups.
pub const BACKUP_DIR_NAME: &str = "backup";

/// Subdirectory of the staging area holding downloaded payloads.
pub const PAYLOAD_DIR_NAME: &str = "payloads";

/// Number of download attempts before a payload fetch is reported failed.
pub const DOWNLOAD_RETRIES: usize = 3;

/// Starting delay for exponential backoff between download attempts (10ms).
///
/// The delay doubles on each retry attempt.
pub const STARTING_BACKOFF_DELAY_MS: u64 = 10;

/// Maximum backoff delay between download attempts (500ms).
///
/// Exponential backoff delays are capped at this value to prevent
/// excessive wait times during retry operations.
pub const MAX_BACKOFF_DELAY_MS: u64 = 500;

/// Timeout for fetching the feed document (30 seconds).
pub const FEED_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for a single payload download (120 seconds).
///
/// Payloads may be large; the timeout bounds hung connections, not slow
/// transfers, so it is applied per request rather than per chunk.
pub const PAYLOAD_FETCH_TIMEOUT: Duration = Duration::from_secs(120);
