//! Filename date extraction and retention filtering.
//!
//! Source files carry their calendar date in the filename
//! (`ADSI.20251111.log` by default). The date string drives two decisions:
//! whether a file is still inside the retention window, and the order files
//! are processed in during a scan.

use chrono::{Duration, Local, NaiveDate};
use regex::Regex;

/// Extracts the date substring from a filename.
///
/// The pattern is expected to carry exactly one capture group (validated at
/// configuration time). Returns `None` when the filename does not match.
///
/// # Example
///
/// ```
/// use regex::Regex;
/// use logfold::dates::extract_date;
///
/// let pattern = Regex::new(r"^ADSI\.(\d{8})\.log$").unwrap();
/// assert_eq!(
///     extract_date("ADSI.20251111.log", &pattern).as_deref(),
///     Some("20251111")
/// );
/// assert!(extract_date("other.txt", &pattern).is_none());
/// ```
#[must_use]
pub fn extract_date(name: &str, pattern: &Regex) -> Option<String> {
    pattern
        .captures(name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Returns `true` when a date string falls inside the retention window.
///
/// The string is parsed with the configured chrono format; parse failures
/// fail closed and exclude the file. The window is inclusive: a file dated
/// exactly `retention_days` ago is still retained. "Today" is evaluated fresh
/// on every call.
#[must_use]
pub fn within_retention(date: &str, format: &str, retention_days: u32) -> bool {
    let Ok(parsed) = NaiveDate::parse_from_str(date, format) else {
        return false;
    };
    let cutoff = Local::now().date_naive() - Duration::days(i64::from(retention_days));
    parsed >= cutoff
}
