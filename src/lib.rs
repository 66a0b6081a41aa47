//! upcast - feed-driven self-update engine
//!
//! upcast consumes a declarative update feed (a JSON appcast or a TOML task
//! manifest), decides which of its tasks apply to the local installation via
//! conditional logic, executes them in order with checksum-verified payloads,
//! and reverses partially-applied changes on failure.
//!
//! # Architecture Overview
//!
//! An update run flows through a fixed sequence of phases:
//!
//! ```text
//! 1. Fetch & parse
//!    ├── UpdateSource fetches the raw feed document
//!    └── FeedReader turns it into feed metadata + an ordered task list
//!
//! 2. Prepare
//!    ├── Every task stages its payload (download, checksum verification)
//!    └── First failure aborts the run - nothing has mutated yet
//!
//! 3. Evaluate
//!    └── Each task's condition tree gates applicability (skipped tasks
//!        never execute and never enter rollback accounting)
//!
//! 4. Execute
//!    ├── Applicable tasks run strictly in feed order
//!    ├── Successful tasks are pushed onto the rollback stack
//!    └── A failure halts execution and unwinds the stack in reverse
//!
//! 5. Report
//!    └── One of: Success, PreparationFailed, RolledBack,
//!        RollbackIncomplete - naming the task that triggered it
//! ```
//!
//! # Core Modules
//!
//! - [`feed`] - feed parsing (JSON appcast, TOML manifest) into task specs
//! - [`task`] - the task variants: file replacement, configuration-value
//!   edits, command execution
//! - [`condition`] - boolean condition trees gating task applicability
//! - [`pipeline`] - the execution state machine, rollback protocol, run lock
//! - [`source`] - payload sources (local directory, HTTP) and the per-run
//!   payload cache
//! - [`checksum`] - SHA-256 integrity verification of staged payloads
//!
//! # Supporting Modules
//!
//! - [`cli`] - `check` / `apply` / `resume` commands
//! - [`config`] - `upcast.toml` configuration
//! - [`core`] - error types and user-facing error rendering
//! - [`version`] - lenient semantic version parsing and comparison
//! - [`utils`] - filesystem helpers and progress indicators
//!
//! # Example
//!
//! ```rust,no_run
//! use upcast::config::UpdateConfig;
//! use upcast::pipeline::UpdatePipeline;
//! use upcast::source::UpdateSource;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = UpdateConfig::load(None).await?;
//! let source = UpdateSource::for_config(&config)?;
//! let feed = UpdatePipeline::fetch_feed(&config, &source).await?;
//!
//! let report = UpdatePipeline::new(config, source, feed).run().await;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

pub mod checksum;
pub mod cli;
pub mod condition;
pub mod config;
pub mod constants;
pub mod core;
pub mod feed;
pub mod pipeline;
pub mod source;
pub mod task;
pub mod utils;
pub mod version;
