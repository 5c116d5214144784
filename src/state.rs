//! Persisted per-file offset state.
//!
//! The state document is a small JSON file mapping each tracked source
//! filename to the byte size consolidated so far and the date extracted from
//! its name, plus a `lastUpdate` timestamp:
//!
//! ```json
//! {
//!   "files": {
//!     "ADSI.20251111.log": { "size": 5120, "date": "20251111" }
//!   },
//!   "lastUpdate": "2025-11-11T08:30:00Z"
//! }
//! ```
//!
//! Loading is deliberately forgiving: a missing, unreadable, or unparsable
//! document yields a fresh empty state with a warning, and individual entries
//! are coerced field by field rather than rejected wholesale. Losing state
//! only costs a re-read of recent files; crashing on startup would cost the
//! whole tool. Saving is a plain overwrite; durability against a mid-write
//! crash is out of scope.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::dates::within_retention;
use crate::error::Result;

/// Consolidation progress for one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackedFile {
    /// Bytes of this file already appended to the consolidated output.
    ///
    /// Never exceeds the file's true size unless the file was truncated
    /// externally; truncation is detected by the processor and resets this
    /// to 0 before any further read.
    pub size: u64,

    /// Date string extracted from the filename.
    pub date: String,
}

/// The full persisted state: tracked files plus the last save timestamp.
///
/// Owned exclusively by the monitor loop for the lifetime of the process.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    /// Tracked source files keyed by filename.
    pub files: BTreeMap<String, TrackedFile>,

    /// Timestamp of the most recent save, refreshed by [`State::save`].
    pub last_update: DateTime<Utc>,
}

impl State {
    /// Creates an empty state stamped with the current time.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            files: BTreeMap::new(),
            last_update: Utc::now(),
        }
    }

    /// Loads the state document from `path`.
    ///
    /// Never fails: a missing file starts fresh silently, and a document that
    /// cannot be read or parsed starts fresh with a warning. Entries inside a
    /// parsable document are coerced field by field.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "No state document, starting fresh");
            return Self::empty();
        }

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read state document, starting fresh");
                return Self::empty();
            }
        };

        match serde_json::from_str::<Value>(&contents) {
            Ok(doc) => Self::from_document(&doc),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "State document is not valid JSON, starting fresh");
                Self::empty()
            }
        }
    }

    /// Builds a state from a parsed JSON document, coercing lenient shapes.
    ///
    /// Sizes are accepted as non-negative integers, floats (truncated),
    /// negative numbers (clamped to 0), or numeric strings. An entry that is
    /// not an object or has no string `date` is dropped on its own; the rest
    /// of the document survives.
    fn from_document(doc: &Value) -> Self {
        let mut files = BTreeMap::new();

        if let Some(entries) = doc.get("files").and_then(Value::as_object) {
            for (name, entry) in entries {
                let Some(fields) = entry.as_object() else {
                    warn!(file = %name, "Dropping malformed state entry");
                    continue;
                };
                let Some(date) = fields.get("date").and_then(Value::as_str) else {
                    warn!(file = %name, "Dropping state entry without a date");
                    continue;
                };
                files.insert(
                    name.clone(),
                    TrackedFile {
                        size: coerce_size(fields.get("size")),
                        date: date.to_string(),
                    },
                );
            }
        }

        let last_update = doc
            .get("lastUpdate")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map_or_else(Utc::now, |dt| dt.with_timezone(&Utc));

        Self { files, last_update }
    }

    /// Serializes the state to `path`, refreshing `lastUpdate` first.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails. The caller (the
    /// monitor loop) logs and carries on; the next scan saves again.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.last_update = Utc::now();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Removes every entry whose date falls outside the retention window.
    pub fn prune_expired(&mut self, format: &str, retention_days: u32) {
        let before = self.files.len();
        self.files
            .retain(|_, file| within_retention(&file.date, format, retention_days));
        let pruned = before - self.files.len();
        if pruned > 0 {
            debug!(pruned, "Pruned expired state entries");
        }
    }

    /// Returns the recorded size for a file, 0 when untracked.
    #[must_use]
    pub fn recorded_size(&self, name: &str) -> u64 {
        self.files.get(name).map_or(0, |file| file.size)
    }

    /// Returns `true` if the file has a state entry.
    #[must_use]
    pub fn is_tracked(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    /// Records the current size and date for a file.
    pub fn track(&mut self, name: &str, size: u64, date: String) {
        self.files.insert(name.to_string(), TrackedFile { size, date });
    }

    /// Resets a tracked file's size to 0, keeping its date.
    ///
    /// Called when truncation is detected so the next read starts over.
    pub fn reset_size(&mut self, name: &str) {
        if let Some(file) = self.files.get_mut(name) {
            file.size = 0;
        }
    }
}

/// Coerces a JSON value into a non-negative byte count.
fn coerce_size(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => {
            if let Some(size) = n.as_u64() {
                size
            } else if let Some(f) = n.as_f64() {
                if f > 0.0 {
                    f.trunc() as u64
                } else {
                    0
                }
            } else {
                0
            }
        }
        Some(Value::String(s)) => {
            if let Ok(size) = s.parse::<u64>() {
                size
            } else if let Ok(f) = s.parse::<f64>() {
                if f > 0.0 {
                    f.trunc() as u64
                } else {
                    0
                }
            } else {
                0
            }
        }
        _ => 0,
    }
}
