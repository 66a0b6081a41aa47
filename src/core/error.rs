//! Error handling for upcast
//!
//! The error system is built around two types:
//! - [`UpcastError`] - enumerated error types for all failure cases, used
//!   for precise matching in code
//! - [`ErrorContext`] - a wrapper adding user-friendly details and
//!   suggestions, rendered with colors by the CLI
//!
//! Common library errors convert automatically:
//! [`std::io::Error`] → [`UpcastError::IoError`],
//! [`toml::de::Error`] → [`UpcastError::TomlError`],
//! [`serde_json::Error`] → [`UpcastError::JsonError`],
//! [`semver::Error`] → [`UpcastError::SemverError`].
//!
//! Use [`user_friendly_error`] at the CLI boundary to convert any
//! [`anyhow::Error`] into a displayable context with suggestions.

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for upcast operations
///
/// Each variant represents a specific failure mode and carries enough
/// context (paths, urls, reasons) for user-facing reporting. Variants map
/// onto the engine's error taxonomy:
///
/// - **Configuration errors** (malformed feed, unknown kinds, bad config
///   file): fatal before any mutation.
/// - **Preparation errors** (payload unreachable or corrupt): fatal for the
///   run, no rollback needed.
/// - **Execution errors** (a task's mutation fails): trigger reverse-order
///   rollback of everything executed so far.
#[derive(Error, Debug)]
pub enum UpcastError {
    /// Configuration file problem (missing, unreadable, or invalid values)
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },

    /// The feed document could not be parsed
    ///
    /// Raised for malformed documents and for items missing required fields
    /// (an appcast item without an enclosure URL, a task without a kind).
    /// No partial feed is ever returned.
    #[error("Invalid update feed: {reason}")]
    FeedParseError {
        /// Specific reason for the parsing failure
        reason: String,
    },

    /// The configured feed format has no registered reader
    #[error("Unknown feed format '{format}'")]
    UnknownFeedFormat {
        /// The format tag that could not be resolved
        format: String,
    },

    /// A task spec referenced a condition kind with no registered builder
    #[error("Unknown condition kind '{kind}'")]
    UnknownConditionKind {
        /// The condition kind tag from the feed
        kind: String,
    },

    /// Condition evaluation failed hard (not merely "could not determine")
    ///
    /// Atoms that cannot answer default to `true`; this error is reserved
    /// for genuinely broken condition configuration and aborts the pipeline
    /// before any execution.
    #[error("Condition evaluation failed: {reason}")]
    ConditionError {
        /// Why evaluation was impossible
        reason: String,
    },

    /// A staged payload did not match its declared checksum
    #[error("Checksum mismatch for '{name}'")]
    ChecksumMismatch {
        /// The payload or file being verified
        name: String,
        /// The checksum the feed declared
        expected: String,
        /// The checksum actually computed
        actual: String,
    },

    /// A payload could not be fetched from the update source
    #[error("Failed to fetch '{url}': {reason}")]
    PayloadFetchError {
        /// The resolved payload URL
        url: String,
        /// The underlying failure
        reason: String,
    },

    /// Preparing a task failed (payload staging, resolution)
    #[error("Failed to prepare task: {task}")]
    TaskPrepareFailed {
        /// Description of the failing task
        task: String,
        /// The underlying failure
        reason: String,
    },

    /// Executing a task failed; triggers rollback of prior tasks
    #[error("Update task execution failed: {task}")]
    TaskExecuteFailed {
        /// Description of the failing task
        task: String,
        /// The underlying failure
        reason: String,
    },

    /// An external command run by a task exited with a failure
    #[error("Command '{program}' failed")]
    CommandFailed {
        /// The program that was executed
        program: String,
        /// Captured standard error output
        stderr: String,
    },

    /// The run was cancelled by the caller at a task boundary
    #[error("Update run cancelled")]
    Cancelled,

    /// Another pipeline run holds the staging-area lock
    #[error("Another update run is already in progress for {staging_dir}")]
    RunInProgress {
        /// The contended staging directory
        staging_dir: String,
    },

    /// No pending cold-run state exists to resume
    #[error("Nothing to resume: no pending update state found")]
    NothingToResume,

    /// General filesystem failure with operation context
    #[error("File system error during {operation}: {path}")]
    FileSystemError {
        /// The operation that failed (e.g. "backup", "swap")
        operation: String,
        /// The path involved
        path: String,
    },

    /// IO error from [`std::io::Error`]
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// TOML parsing error from [`toml::de::Error`]
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// JSON parsing error from [`serde_json::Error`]
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Semantic version parsing error from [`semver::Error`]
    #[error("Version parsing error: {0}")]
    SemverError(#[from] semver::Error),

    /// Generic error with a message
    #[error("{message}")]
    Other {
        /// The error message
        message: String,
    },
}

/// Error context wrapper that provides user-friendly error information
///
/// Wraps an [`UpcastError`] with optional details and an actionable
/// suggestion. When displayed, errors show:
/// 1. **error**: the main message in red
/// 2. **details**: additional context in yellow (optional)
/// 3. **suggestion**: steps to resolve the issue in green (optional)
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying upcast error
    pub error: UpcastError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: UpcastError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add an actionable suggestion, displayed in green.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add details explaining why the error occurred, displayed in yellow.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print this error to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] for CLI display
///
/// Recognizes [`UpcastError`] variants and common library errors, attaching
/// tailored suggestions. Unrecognized errors fall through with their
/// message and full cause chain preserved.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if error.downcast_ref::<UpcastError>().is_some() {
        // Take ownership of the typed error so the context carries it intact.
        let upcast_error = error.downcast::<UpcastError>().expect("checked above");
        return contextualize(upcast_error);
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(UpcastError::FileSystemError {
                    operation: "file access".to_string(),
                    path: "unknown".to_string(),
                })
                .with_suggestion(
                    "Check file ownership, or run with the permissions the installation requires",
                )
                .with_details("upcast does not have permission to read or write a target file");
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(UpcastError::FileSystemError {
                    operation: "file access".to_string(),
                    path: "unknown".to_string(),
                })
                .with_suggestion("Check that the file or directory exists and the path is correct");
            }
            _ => {}
        }
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(UpcastError::ConfigError {
            message: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax: verify quotes, brackets, and table headers");
    }

    // Preserve the cause chain for everything else
    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();
    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(UpcastError::Other {
        message,
    })
}

/// Attach standard suggestions to well-known error variants.
fn contextualize(error: UpcastError) -> ErrorContext {
    match &error {
        UpcastError::FeedParseError {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Validate the feed document against the expected format")
            .with_details(
                "Malformed feeds are rejected whole; no tasks from this feed were prepared or executed",
            ),
        UpcastError::UnknownFeedFormat {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Set feed_format to one of: appcast, manifest"),
        UpcastError::ChecksumMismatch {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Re-run the update; if the mismatch persists the feed's checksum is stale")
            .with_details("The downloaded payload does not match the checksum declared in the feed"),
        UpcastError::RunInProgress {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Wait for the other run to finish, or remove a stale run.lock if no run is active"),
        UpcastError::NothingToResume => ErrorContext::new(error)
            .with_suggestion("Run 'upcast apply' first; 'resume' only applies deferred cold-run tasks"),
        _ => ErrorContext::new(error),
    }
}
