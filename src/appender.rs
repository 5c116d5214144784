//! Appends consolidated text to the destination file.
//!
//! The destination is opened in append mode for every write, so an external
//! reader can hold the file open between scans. Transient failures (the usual
//! case is a sharing violation from such a reader) are retried a bounded
//! number of times with a fixed delay; once the budget is exhausted the error
//! propagates to the caller, which treats it as a per-file failure for the
//! current scan.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use encoding_rs::Encoding;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{FoldError, Result};

/// Bounded retry policy for destination writes.
///
/// A plain value so tests can exercise the retry loop under a paused clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,

    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(150),
        }
    }
}

/// Writes new text to the consolidated output file.
pub struct Appender {
    path: PathBuf,
    encoding: &'static Encoding,
    retry: RetryPolicy,
}

impl Appender {
    /// Creates an appender for the given destination.
    #[must_use]
    pub fn new(path: PathBuf, encoding: &'static Encoding, retry: RetryPolicy) -> Self {
        Self {
            path,
            encoding,
            retry,
        }
    }

    /// Appends `text` to the destination, creating it on first use.
    ///
    /// A literally empty string is a no-op; whitespace-only text is still
    /// written. The text is encoded with the configured encoding.
    ///
    /// # Errors
    ///
    /// Returns [`FoldError::AppendExhausted`] once every retry attempt has
    /// failed; intermediate failures are logged and retried after the
    /// configured delay.
    pub async fn append(&self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }

        let (bytes, _, _) = self.encoding.encode(text);

        let mut attempt = 1;
        loop {
            match self.try_append(&bytes) {
                Ok(()) => {
                    debug!(
                        path = %self.path.display(),
                        bytes = bytes.len(),
                        "Appended to consolidated file"
                    );
                    return Ok(());
                }
                Err(e) if attempt >= self.retry.max_attempts => {
                    return Err(FoldError::AppendExhausted {
                        path: self.path.clone(),
                        attempts: attempt,
                        source: e,
                    });
                }
                Err(e) => {
                    warn!(
                        path = %self.path.display(),
                        attempt,
                        error = %e,
                        "Append failed, retrying"
                    );
                    sleep(self.retry.delay).await;
                    attempt += 1;
                }
            }
        }
    }

    fn try_append(&self, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(())
    }
}
