//! logfold - rotating log file consolidator.
//!
//! This crate tails a directory of date-stamped rotating log files and
//! appends newly written bytes to one consolidated output file. Per-file read
//! offsets live in a small persisted JSON document, so a restart picks up
//! where the previous run stopped instead of reprocessing content.
//!
//! # Overview
//!
//! Each scan lists the files matching the configured pattern, skips anything
//! outside the retention window, and compares every file's size against the
//! recorded offset. Growth is read incrementally and appended; a size
//! decrease means the file was rotated or rewritten externally and resets the
//! offset to 0. The state document is rewritten after every scan.
//!
//! The design trusts file sizes: an in-place rewrite that does not change a
//! file's size is invisible. Detecting that would require content hashing,
//! which this tool deliberately avoids.
//!
//! # Modules
//!
//! - [`config`]: Configuration from environment variables and CLI overrides
//! - [`dates`]: Filename date extraction and retention filtering
//! - [`state`]: Persisted per-file offset state
//! - [`reader`]: Incremental reads of growing source files
//! - [`appender`]: Destination writes with bounded retry
//! - [`processor`]: Per-file scan evaluation
//! - [`monitor`]: The scan loop
//! - [`error`]: Error types

pub mod appender;
pub mod config;
pub mod dates;
pub mod error;
pub mod monitor;
pub mod processor;
pub mod reader;
pub mod state;

pub use appender::{Appender, RetryPolicy};
pub use config::{Config, ConfigError, Overrides};
pub use error::{FoldError, Result};
pub use monitor::{Monitor, ScanSummary};
pub use processor::{FileProcessor, ScanOutcome};
pub use reader::read_from_offset;
pub use state::{State, TrackedFile};
