//! Per-file scan evaluation.
//!
//! Each candidate file goes through the same sequence once per scan: date
//! extraction, retention check, existence check, then a size comparison
//! against the recorded offset. Growth triggers an incremental read and an
//! append; a size decrease means the file was rotated or rewritten externally
//! and resets the recorded offset to 0 first.
//!
//! A file whose size is unchanged is never re-read, so an in-place rewrite
//! that does not change the size goes unnoticed. That is a limitation of
//! size-based change detection and is left as-is.

use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::appender::Appender;
use crate::config::Config;
use crate::dates::{extract_date, within_retention};
use crate::error::Result;
use crate::reader::read_from_offset;
use crate::state::State;

/// What happened to one file during one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// New bytes were consolidated and the offset advanced.
    Processed {
        /// Bytes beyond the previously recorded offset.
        bytes: u64,
    },

    /// Size unchanged; newly seen files are recorded without an append.
    NoGrowth,

    /// The filename did not match the date pattern.
    SkippedInvalidDate,

    /// The extracted date falls outside the retention window.
    SkippedRetention,

    /// The file disappeared (or could not be stat'ed) at scan time.
    NotFound,
}

/// Evaluates candidate files against the tracked state.
pub struct FileProcessor<'a> {
    config: &'a Config,
    appender: &'a Appender,
}

impl<'a> FileProcessor<'a> {
    /// Creates a processor borrowing the runtime configuration and appender.
    #[must_use]
    pub fn new(config: &'a Config, appender: &'a Appender) -> Self {
        Self { config, appender }
    }

    /// Runs the per-file state machine for a single scan.
    ///
    /// Skips (invalid date, retention, missing file) leave the state
    /// untouched. Truncation resets the recorded size to 0 while keeping the
    /// file's date entry, then falls through to the growth check.
    ///
    /// # Errors
    ///
    /// The only propagated failure is append-retry exhaustion; the monitor
    /// loop logs it and moves on to the next file.
    pub async fn process(&self, path: &Path, state: &mut State) -> Result<ScanOutcome> {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return Ok(ScanOutcome::SkippedInvalidDate);
        };

        let Some(date) = extract_date(name, &self.config.date_pattern) else {
            debug!(file = %name, "Filename does not match the date pattern");
            return Ok(ScanOutcome::SkippedInvalidDate);
        };

        if !within_retention(&date, &self.config.date_format, self.config.retention_days) {
            debug!(file = %name, date = %date, "Outside the retention window");
            return Ok(ScanOutcome::SkippedRetention);
        }

        let current = match fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(file = %name, "File disappeared before processing");
                return Ok(ScanOutcome::NotFound);
            }
            Err(e) => {
                warn!(file = %name, error = %e, "Failed to stat file, skipping this scan");
                return Ok(ScanOutcome::NotFound);
            }
        };

        let mut last = state.recorded_size(name);
        if current < last {
            info!(
                file = %name,
                recorded = last,
                current,
                "Truncation detected, rereading from the start"
            );
            state.reset_size(name);
            last = 0;
        }

        if current > last {
            let text = read_from_offset(path, last, self.config.encoding);
            if !text.trim().is_empty() {
                self.appender.append(&text).await?;
            }
            state.track(name, current, date);
            debug!(file = %name, bytes = current - last, "Consolidated new bytes");
            return Ok(ScanOutcome::Processed {
                bytes: current - last,
            });
        }

        if !state.is_tracked(name) {
            state.track(name, current, date);
        }
        Ok(ScanOutcome::NoGrowth)
    }
}
