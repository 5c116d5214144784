//! The scan loop.
//!
//! A [`Monitor`] owns the tracked state for the lifetime of the process. Each
//! scan prunes expired entries, lists candidate files, processes them oldest
//! first, and persists the state document; [`Monitor::run`] repeats that on a
//! fixed interval until a shutdown future resolves. Errors inside a scan are
//! logged and the loop keeps going; the only way to stop the monitor is the
//! shutdown signal.

use std::fs;
use std::future::Future;
use std::path::PathBuf;

use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::appender::Appender;
use crate::config::Config;
use crate::dates::extract_date;
use crate::error::Result;
use crate::processor::{FileProcessor, ScanOutcome};
use crate::state::State;

/// Counters accumulated over one scan, for reporting only.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanSummary {
    /// Files that had new bytes consolidated.
    pub processed: usize,

    /// Files tracked for the first time during this scan.
    pub new_files: usize,

    /// Total bytes appended to the consolidated file.
    pub appended_bytes: u64,
}

/// A candidate source file found during directory listing.
struct Candidate {
    name: String,
    path: PathBuf,
    date: Option<String>,
}

/// Drives scans over the source directory and owns the persisted state.
pub struct Monitor {
    config: Config,
    appender: Appender,
    state: State,
}

impl Monitor {
    /// Creates a monitor, loading any previously persisted state.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let state = State::load(&config.state_path);
        if !state.files.is_empty() {
            info!(tracked = state.files.len(), "Loaded existing state");
        }
        let appender = Appender::new(config.output_path.clone(), config.encoding, config.retry);
        Self {
            config,
            appender,
            state,
        }
    }

    /// Returns the current in-memory state.
    #[must_use]
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Performs a single scan.
    ///
    /// Prunes expired entries, processes every candidate file in date order,
    /// and persists the state document, even when nothing changed.
    /// Per-file append failures are logged here and do not fail the scan.
    ///
    /// # Errors
    ///
    /// Returns an error if the source directory cannot be listed or the state
    /// document cannot be written. [`Monitor::run`] catches both.
    pub async fn run_once(&mut self) -> Result<ScanSummary> {
        self.state
            .prune_expired(&self.config.date_format, self.config.retention_days);

        let candidates = self.list_candidates()?;
        let mut summary = ScanSummary::default();
        let processor = FileProcessor::new(&self.config, &self.appender);

        for candidate in candidates {
            let was_tracked = self.state.is_tracked(&candidate.name);
            match processor.process(&candidate.path, &mut self.state).await {
                Ok(ScanOutcome::Processed { bytes }) => {
                    summary.processed += 1;
                    summary.appended_bytes += bytes;
                }
                Ok(_) => {}
                Err(e) => {
                    error!(file = %candidate.name, error = %e, "Failed to process file");
                }
            }
            if !was_tracked && self.state.is_tracked(&candidate.name) {
                summary.new_files += 1;
            }
        }

        self.state.save(&self.config.state_path)?;
        Ok(summary)
    }

    /// Runs scans on the configured interval until `shutdown` resolves.
    ///
    /// A failed scan is logged and followed by the same sleep as a successful
    /// one; the loop itself never terminates on error.
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) {
        info!(
            source_dir = %self.config.source_dir.display(),
            pattern = %self.config.log_pattern,
            interval_secs = self.config.poll_interval.as_secs(),
            "Monitor started"
        );

        tokio::pin!(shutdown);
        loop {
            match self.run_once().await {
                Ok(summary) => info!(
                    processed = summary.processed,
                    new_files = summary.new_files,
                    appended_bytes = summary.appended_bytes,
                    "Scan complete"
                ),
                Err(e) => error!(error = %e, "Scan failed"),
            }

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
                _ = sleep(self.config.poll_interval) => {}
            }
        }
    }

    /// Lists regular files matching the glob, sorted by extracted date.
    ///
    /// Directories are skipped, as are the consolidated output and the state
    /// document themselves (a broad pattern like `*.log` must not make the
    /// tool consume its own output). Files whose name yields no date sort
    /// first; the sort is stable so ties keep directory-listing order.
    fn list_candidates(&self) -> Result<Vec<Candidate>> {
        let mut candidates = Vec::new();

        for entry in fs::read_dir(&self.config.source_dir)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable directory entry");
                    continue;
                }
            };

            let path = entry.path();
            match entry.file_type() {
                Ok(file_type) if file_type.is_file() => {}
                Ok(_) => continue,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping entry with unknown type");
                    continue;
                }
            }

            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !self.config.glob.is_match(name) {
                continue;
            }
            if path == self.config.output_path || path == self.config.state_path {
                continue;
            }

            let date = extract_date(name, &self.config.date_pattern);
            candidates.push(Candidate {
                name: name.to_string(),
                path,
                date,
            });
        }

        candidates.sort_by(|a, b| a.date.cmp(&b.date));
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appender::RetryPolicy;
    use chrono::{Duration as ChronoDuration, Local};
    use regex::Regex;
    use std::path::Path;
    use std::time::Duration;

    fn test_config(dir: &Path) -> Config {
        Config {
            source_dir: dir.to_path_buf(),
            output_path: dir.join("consolidated.log"),
            state_path: dir.join("logfold-state.json"),
            log_pattern: "ADSI*.log".to_string(),
            glob: Regex::new(r"^ADSI.*\.log$").unwrap(),
            date_pattern: Regex::new(r"^ADSI\.(\d{8})\.log$").unwrap(),
            date_format: "%Y%m%d".to_string(),
            retention_days: 14,
            poll_interval: Duration::from_secs(60),
            retry: RetryPolicy {
                max_attempts: 1,
                delay: Duration::from_millis(0),
            },
            encoding: encoding_rs::UTF_8,
        }
    }

    fn stamp(days_ago: i64) -> String {
        (Local::now().date_naive() - ChronoDuration::days(days_ago))
            .format("%Y%m%d")
            .to_string()
    }

    #[test]
    fn listing_filters_and_sorts_by_date() {
        let dir = tempfile::tempdir().unwrap();
        let newer = format!("ADSI.{}.log", stamp(0));
        let older = format!("ADSI.{}.log", stamp(2));
        fs::write(dir.path().join(&newer), "n").unwrap();
        fs::write(dir.path().join(&older), "o").unwrap();
        fs::write(dir.path().join("ADSI-undated.log"), "u").unwrap();
        fs::write(dir.path().join("other.txt"), "x").unwrap();
        fs::create_dir(dir.path().join("ADSI.99999999.log")).unwrap();

        let monitor = Monitor::new(test_config(dir.path()));
        let candidates = monitor.list_candidates().unwrap();

        let names: Vec<&str> = candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["ADSI-undated.log", older.as_str(), newer.as_str()]);
    }

    #[test]
    fn listing_excludes_own_output_and_state_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        // A broad glob that would match the output file itself.
        config.log_pattern = "*.log".to_string();
        config.glob = Regex::new(r"^.*\.log$").unwrap();

        fs::write(dir.path().join("consolidated.log"), "out").unwrap();
        let source = format!("ADSI.{}.log", stamp(0));
        fs::write(dir.path().join(&source), "in").unwrap();

        let monitor = Monitor::new(config);
        let candidates = monitor.list_candidates().unwrap();

        let names: Vec<&str> = candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec![source.as_str()]);
    }

    #[tokio::test]
    async fn scan_of_missing_directory_fails_but_is_catchable() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.source_dir = dir.path().join("vanished");

        let mut monitor = Monitor::new(config);
        assert!(monitor.run_once().await.is_err());
    }

    #[tokio::test]
    async fn scan_counts_processed_and_new_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        fs::write(
            dir.path().join(format!("ADSI.{}.log", stamp(0))),
            "fresh\n",
        )
        .unwrap();
        fs::write(dir.path().join(format!("ADSI.{}.log", stamp(1))), "").unwrap();

        let mut monitor = Monitor::new(config);
        let summary = monitor.run_once().await.unwrap();

        assert_eq!(summary.processed, 1);
        assert_eq!(summary.new_files, 2);
        assert_eq!(summary.appended_bytes, 6);
    }

    #[tokio::test]
    async fn empty_scan_still_persists_state() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let state_path = config.state_path.clone();

        let mut monitor = Monitor::new(config);
        let summary = monitor.run_once().await.unwrap();

        assert_eq!(summary, ScanSummary::default());
        assert!(state_path.exists());
    }
}
