//! Configuration for logfold.
//!
//! Configuration is assembled once at startup from `LOGFOLD_*` environment
//! variables plus a handful of CLI overrides, validated, and then passed by
//! reference into every component. Nothing reads ambient configuration after
//! startup.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `LOGFOLD_OUTPUT_FILE` | `consolidated.log` | Destination filename, resolved inside the source directory unless absolute |
//! | `LOGFOLD_STATE_FILE` | `logfold-state.json` | Offset state document, resolved like the output file |
//! | `LOGFOLD_LOG_PATTERN` | `ADSI*.log` | Source filename glob (`*` and `?`) |
//! | `LOGFOLD_DATE_PATTERN` | `^ADSI\.(\d{8})\.log$` | Regex with exactly one capture group extracting the date |
//! | `LOGFOLD_DATE_FORMAT` | `%Y%m%d` | chrono format paired with the date pattern |
//! | `LOGFOLD_RETENTION_DAYS` | 30 | Look-back window for tracking files (>= 1) |
//! | `LOGFOLD_POLL_INTERVAL_SECS` | 60 | Seconds between scans (>= 1) |
//! | `LOGFOLD_MAX_RETRY_ATTEMPTS` | 3 | Append retry attempts (1-10) |
//! | `LOGFOLD_RETRY_DELAY_MS` | 150 | Fixed delay between append retries |
//! | `LOGFOLD_FILE_ENCODING` | `utf-8` | Text encoding for source reads and destination writes |
//!
//! The date pattern and date format must stay consistent with each other; the
//! pattern captures the substring and the format parses it.

use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use encoding_rs::Encoding;
use regex::Regex;
use thiserror::Error;

use crate::appender::RetryPolicy;

/// Default destination filename.
const DEFAULT_OUTPUT_FILE: &str = "consolidated.log";

/// Default state document filename.
const DEFAULT_STATE_FILE: &str = "logfold-state.json";

/// Default source filename glob.
const DEFAULT_LOG_PATTERN: &str = "ADSI*.log";

/// Default date extraction pattern (one capture group).
const DEFAULT_DATE_PATTERN: &str = r"^ADSI\.(\d{8})\.log$";

/// Default chrono format paired with [`DEFAULT_DATE_PATTERN`].
const DEFAULT_DATE_FORMAT: &str = "%Y%m%d";

/// Default retention window in days.
const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Default seconds between scans.
const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Default append retry attempts.
const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 3;

/// Minimum allowed append retry attempts.
const MIN_RETRY_ATTEMPTS: u32 = 1;

/// Maximum allowed append retry attempts.
const MAX_RETRY_ATTEMPTS: u32 = 10;

/// Default delay between append retries in milliseconds.
const DEFAULT_RETRY_DELAY_MS: u64 = 150;

/// Default text encoding label.
const DEFAULT_ENCODING_LABEL: &str = "utf-8";

/// Errors that can occur while assembling the configuration.
///
/// All of these are fatal: they are reported before the scan loop starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The source directory does not exist or is not a directory.
    #[error("source directory does not exist: {0}")]
    SourceDirNotFound(PathBuf),

    /// An environment variable or override has an invalid value.
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// The date pattern failed to compile or has the wrong capture shape.
    #[error("invalid date pattern '{pattern}': {message}")]
    InvalidDatePattern { pattern: String, message: String },

    /// The encoding label is not recognized by `encoding_rs`.
    #[error("unknown encoding label: {0}")]
    UnknownEncoding(String),
}

/// CLI overrides applied on top of the environment.
///
/// Only the four deployment-time knobs the original tool exposed on its
/// command line; everything else is environment-only.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Destination filename override (`-o/--output`).
    pub output_file: Option<String>,

    /// Source glob override (`-p/--pattern`).
    pub log_pattern: Option<String>,

    /// Retention window override (`-r/--retention-days`).
    pub retention_days: Option<u32>,

    /// Poll interval override in seconds (`-i/--interval`).
    pub poll_interval_secs: Option<u64>,
}

/// Immutable runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory scanned for source log files.
    pub source_dir: PathBuf,

    /// Resolved path of the consolidated output file.
    pub output_path: PathBuf,

    /// Resolved path of the persisted state document.
    pub state_path: PathBuf,

    /// Raw source glob, kept for reporting.
    pub log_pattern: String,

    /// The glob compiled to an anchored regex.
    pub glob: Regex,

    /// Date extraction pattern with exactly one capture group.
    pub date_pattern: Regex,

    /// chrono format string parsing the captured date.
    pub date_format: String,

    /// Look-back window in days for tracking files.
    pub retention_days: u32,

    /// Sleep between scans.
    pub poll_interval: Duration,

    /// Append retry policy.
    pub retry: RetryPolicy,

    /// Text encoding for source reads and destination writes.
    pub encoding: &'static Encoding,
}

impl Config {
    /// Assembles the configuration from the environment and CLI overrides.
    ///
    /// Precedence per option is override, then environment variable, then
    /// built-in default.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the source directory is missing, a numeric
    /// value is out of range, the date pattern does not compile or does not
    /// have exactly one capture group, or the encoding label is unknown.
    pub fn load(source_dir: PathBuf, overrides: &Overrides) -> Result<Self, ConfigError> {
        if !source_dir.is_dir() {
            return Err(ConfigError::SourceDirNotFound(source_dir));
        }

        let output_file = overrides
            .output_file
            .clone()
            .or_else(|| env::var("LOGFOLD_OUTPUT_FILE").ok())
            .unwrap_or_else(|| DEFAULT_OUTPUT_FILE.to_string());
        let state_file =
            env::var("LOGFOLD_STATE_FILE").unwrap_or_else(|_| DEFAULT_STATE_FILE.to_string());
        let output_path = resolve_path(&source_dir, &output_file);
        let state_path = resolve_path(&source_dir, &state_file);

        let log_pattern = overrides
            .log_pattern
            .clone()
            .or_else(|| env::var("LOGFOLD_LOG_PATTERN").ok())
            .unwrap_or_else(|| DEFAULT_LOG_PATTERN.to_string());
        let glob = glob_to_regex(&log_pattern).map_err(|e| ConfigError::InvalidValue {
            key: "LOGFOLD_LOG_PATTERN".to_string(),
            message: e.to_string(),
        })?;

        let date_pattern_raw =
            env::var("LOGFOLD_DATE_PATTERN").unwrap_or_else(|_| DEFAULT_DATE_PATTERN.to_string());
        let date_pattern =
            Regex::new(&date_pattern_raw).map_err(|e| ConfigError::InvalidDatePattern {
                pattern: date_pattern_raw.clone(),
                message: e.to_string(),
            })?;
        // captures_len counts the implicit whole-match group.
        if date_pattern.captures_len() != 2 {
            return Err(ConfigError::InvalidDatePattern {
                pattern: date_pattern_raw,
                message: "pattern must contain exactly one capture group".to_string(),
            });
        }

        let date_format =
            env::var("LOGFOLD_DATE_FORMAT").unwrap_or_else(|_| DEFAULT_DATE_FORMAT.to_string());

        let retention_days = match overrides.retention_days {
            Some(days) => days,
            None => parse_env("LOGFOLD_RETENTION_DAYS", DEFAULT_RETENTION_DAYS)?,
        };
        if retention_days == 0 {
            return Err(ConfigError::InvalidValue {
                key: "LOGFOLD_RETENTION_DAYS".to_string(),
                message: "retention must be at least 1 day".to_string(),
            });
        }

        let poll_interval_secs = match overrides.poll_interval_secs {
            Some(secs) => secs,
            None => parse_env("LOGFOLD_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?,
        };
        if poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "LOGFOLD_POLL_INTERVAL_SECS".to_string(),
                message: "poll interval must be at least 1 second".to_string(),
            });
        }

        let max_attempts: u32 =
            parse_env("LOGFOLD_MAX_RETRY_ATTEMPTS", DEFAULT_MAX_RETRY_ATTEMPTS)?;
        if !(MIN_RETRY_ATTEMPTS..=MAX_RETRY_ATTEMPTS).contains(&max_attempts) {
            return Err(ConfigError::InvalidValue {
                key: "LOGFOLD_MAX_RETRY_ATTEMPTS".to_string(),
                message: format!(
                    "retry attempts must be between {MIN_RETRY_ATTEMPTS} and {MAX_RETRY_ATTEMPTS}, got {max_attempts}"
                ),
            });
        }
        let retry_delay_ms: u64 = parse_env("LOGFOLD_RETRY_DELAY_MS", DEFAULT_RETRY_DELAY_MS)?;

        let encoding_label =
            env::var("LOGFOLD_FILE_ENCODING").unwrap_or_else(|_| DEFAULT_ENCODING_LABEL.to_string());
        let encoding = Encoding::for_label(encoding_label.as_bytes())
            .ok_or_else(|| ConfigError::UnknownEncoding(encoding_label.clone()))?;

        Ok(Self {
            source_dir,
            output_path,
            state_path,
            log_pattern,
            glob,
            date_pattern,
            date_format,
            retention_days,
            poll_interval: Duration::from_secs(poll_interval_secs),
            retry: RetryPolicy {
                max_attempts,
                delay: Duration::from_millis(retry_delay_ms),
            },
            encoding,
        })
    }
}

/// Resolves a filename against the source directory unless it is absolute.
fn resolve_path(source_dir: &Path, name: &str) -> PathBuf {
    let path = Path::new(name);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        source_dir.join(name)
    }
}

/// Parses an environment variable, falling back to a default when unset.
fn parse_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
{
    match env::var(key) {
        Ok(val) => val.parse::<T>().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected an integer, got '{val}'"),
        }),
        Err(_) => Ok(default),
    }
}

/// Translates a shell-style glob (`*`, `?`) into an anchored regex.
///
/// Every other character is matched literally.
fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');
    Regex::new(&expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    /// Helper to run tests with isolated environment variables.
    /// Clears all LOGFOLD_* vars before the test and restores them after.
    fn with_clean_env<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let saved_vars: Vec<(String, String)> = env::vars()
            .filter(|(k, _)| k.starts_with("LOGFOLD_"))
            .collect();

        for (key, _) in &saved_vars {
            env::remove_var(key);
        }

        let result = f();

        for (key, value) in saved_vars {
            env::set_var(key, value);
        }

        result
    }

    fn source_dir() -> TempDir {
        tempfile::tempdir().expect("Failed to create temp dir")
    }

    #[test]
    #[serial]
    fn test_defaults() {
        with_clean_env(|| {
            let dir = source_dir();
            let config =
                Config::load(dir.path().to_path_buf(), &Overrides::default()).expect("defaults");

            assert_eq!(config.output_path, dir.path().join("consolidated.log"));
            assert_eq!(config.state_path, dir.path().join("logfold-state.json"));
            assert_eq!(config.log_pattern, "ADSI*.log");
            assert_eq!(config.date_format, "%Y%m%d");
            assert_eq!(config.retention_days, DEFAULT_RETENTION_DAYS);
            assert_eq!(config.poll_interval, Duration::from_secs(60));
            assert_eq!(config.retry.max_attempts, 3);
            assert_eq!(config.retry.delay, Duration::from_millis(150));
            assert_eq!(config.encoding, encoding_rs::UTF_8);
        });
    }

    #[test]
    #[serial]
    fn test_missing_source_dir() {
        with_clean_env(|| {
            let result = Config::load(PathBuf::from("/nonexistent/path"), &Overrides::default());
            assert!(matches!(result, Err(ConfigError::SourceDirNotFound(_))));
        });
    }

    #[test]
    #[serial]
    fn test_env_values() {
        with_clean_env(|| {
            let dir = source_dir();
            env::set_var("LOGFOLD_OUTPUT_FILE", "merged.txt");
            env::set_var("LOGFOLD_LOG_PATTERN", "app-*.log");
            env::set_var("LOGFOLD_RETENTION_DAYS", "7");
            env::set_var("LOGFOLD_POLL_INTERVAL_SECS", "5");
            env::set_var("LOGFOLD_RETRY_DELAY_MS", "25");

            let config =
                Config::load(dir.path().to_path_buf(), &Overrides::default()).expect("env config");

            assert_eq!(config.output_path, dir.path().join("merged.txt"));
            assert_eq!(config.log_pattern, "app-*.log");
            assert_eq!(config.retention_days, 7);
            assert_eq!(config.poll_interval, Duration::from_secs(5));
            assert_eq!(config.retry.delay, Duration::from_millis(25));
        });
    }

    #[test]
    #[serial]
    fn test_overrides_beat_env() {
        with_clean_env(|| {
            let dir = source_dir();
            env::set_var("LOGFOLD_OUTPUT_FILE", "from-env.log");
            env::set_var("LOGFOLD_RETENTION_DAYS", "7");

            let overrides = Overrides {
                output_file: Some("from-cli.log".to_string()),
                retention_days: Some(14),
                ..Overrides::default()
            };
            let config = Config::load(dir.path().to_path_buf(), &overrides).expect("overrides");

            assert_eq!(config.output_path, dir.path().join("from-cli.log"));
            assert_eq!(config.retention_days, 14);
        });
    }

    #[test]
    #[serial]
    fn test_absolute_output_path_respected() {
        with_clean_env(|| {
            let dir = source_dir();
            let overrides = Overrides {
                output_file: Some("/var/log/merged.log".to_string()),
                ..Overrides::default()
            };
            let config = Config::load(dir.path().to_path_buf(), &overrides).expect("config");

            assert_eq!(config.output_path, PathBuf::from("/var/log/merged.log"));
        });
    }

    #[test]
    #[serial]
    fn test_zero_retention_rejected() {
        with_clean_env(|| {
            let dir = source_dir();
            env::set_var("LOGFOLD_RETENTION_DAYS", "0");

            let result = Config::load(dir.path().to_path_buf(), &Overrides::default());
            assert!(matches!(
                result,
                Err(ConfigError::InvalidValue { ref key, .. }) if key == "LOGFOLD_RETENTION_DAYS"
            ));
        });
    }

    #[test]
    #[serial]
    fn test_zero_poll_interval_rejected() {
        with_clean_env(|| {
            let dir = source_dir();
            env::set_var("LOGFOLD_POLL_INTERVAL_SECS", "0");

            let result = Config::load(dir.path().to_path_buf(), &Overrides::default());
            assert!(matches!(
                result,
                Err(ConfigError::InvalidValue { ref key, .. })
                    if key == "LOGFOLD_POLL_INTERVAL_SECS"
            ));
        });
    }

    #[test]
    #[serial]
    fn test_retry_attempts_out_of_range() {
        with_clean_env(|| {
            let dir = source_dir();
            env::set_var("LOGFOLD_MAX_RETRY_ATTEMPTS", "11");

            let result = Config::load(dir.path().to_path_buf(), &Overrides::default());
            assert!(matches!(
                result,
                Err(ConfigError::InvalidValue { ref key, ref message })
                    if key == "LOGFOLD_MAX_RETRY_ATTEMPTS" && message.contains("between 1 and 10")
            ));
        });
    }

    #[test]
    #[serial]
    fn test_non_numeric_env_rejected() {
        with_clean_env(|| {
            let dir = source_dir();
            env::set_var("LOGFOLD_RETENTION_DAYS", "not-a-number");

            let result = Config::load(dir.path().to_path_buf(), &Overrides::default());
            assert!(matches!(
                result,
                Err(ConfigError::InvalidValue { ref key, .. }) if key == "LOGFOLD_RETENTION_DAYS"
            ));
        });
    }

    #[test]
    #[serial]
    fn test_date_pattern_without_capture_group_rejected() {
        with_clean_env(|| {
            let dir = source_dir();
            env::set_var("LOGFOLD_DATE_PATTERN", r"^ADSI\.\d{8}\.log$");

            let result = Config::load(dir.path().to_path_buf(), &Overrides::default());
            assert!(matches!(
                result,
                Err(ConfigError::InvalidDatePattern { ref message, .. })
                    if message.contains("exactly one capture group")
            ));
        });
    }

    #[test]
    #[serial]
    fn test_date_pattern_that_does_not_compile_rejected() {
        with_clean_env(|| {
            let dir = source_dir();
            env::set_var("LOGFOLD_DATE_PATTERN", r"^ADSI\.([0-9]{8}\.log$");

            let result = Config::load(dir.path().to_path_buf(), &Overrides::default());
            assert!(matches!(result, Err(ConfigError::InvalidDatePattern { .. })));
        });
    }

    #[test]
    #[serial]
    fn test_unknown_encoding_rejected() {
        with_clean_env(|| {
            let dir = source_dir();
            env::set_var("LOGFOLD_FILE_ENCODING", "ebcdic-37");

            let result = Config::load(dir.path().to_path_buf(), &Overrides::default());
            assert!(matches!(
                result,
                Err(ConfigError::UnknownEncoding(ref label)) if label == "ebcdic-37"
            ));
        });
    }

    #[test]
    #[serial]
    fn test_windows_1252_encoding_accepted() {
        with_clean_env(|| {
            let dir = source_dir();
            env::set_var("LOGFOLD_FILE_ENCODING", "windows-1252");

            let config = Config::load(dir.path().to_path_buf(), &Overrides::default())
                .expect("windows-1252 is a valid label");
            assert_eq!(config.encoding, encoding_rs::WINDOWS_1252);
        });
    }

    #[test]
    fn test_glob_matches_default_pattern() {
        let glob = glob_to_regex("ADSI*.log").unwrap();
        assert!(glob.is_match("ADSI.20251111.log"));
        assert!(glob.is_match("ADSI-old.log"));
        assert!(!glob.is_match("other.txt"));
        assert!(!glob.is_match("ADSI.20251111.log.bak"));
    }

    #[test]
    fn test_glob_question_mark_matches_single_char() {
        let glob = glob_to_regex("log-?.txt").unwrap();
        assert!(glob.is_match("log-1.txt"));
        assert!(!glob.is_match("log-12.txt"));
    }

    #[test]
    fn test_glob_escapes_regex_metacharacters() {
        // The dot must not act as a wildcard.
        let glob = glob_to_regex("a.b").unwrap();
        assert!(glob.is_match("a.b"));
        assert!(!glob.is_match("axb"));
    }
}
