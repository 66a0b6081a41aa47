//! Core types and error handling for upcast.
//!
//! This module is the foundation of upcast's type system. It provides the
//! strongly-typed error enum used throughout the crate ([`UpcastError`]) and
//! the user-facing error wrapper ([`ErrorContext`]) the CLI renders with
//! colors and actionable suggestions.
//!
//! # Design Principles
//!
//! - **Error-first**: every fallible operation returns a [`Result`] carrying
//!   meaningful, typed error information.
//! - **Two audiences**: [`UpcastError`] is for code that needs to match on
//!   failure modes; [`ErrorContext`] is for humans reading a terminal.
//! - **Context at the boundary**: low-level errors are wrapped with the
//!   failing task's description at the pipeline boundary, so reports always
//!   name the task, not just the syscall.

pub mod error;

pub use error::{ErrorContext, UpcastError, user_friendly_error};
