//! Incremental reads of growing source files.
//!
//! A source file is opened with ordinary shared read access (the external log
//! writer keeps appending while we read), positioned at the byte offset
//! recorded in the state document, and drained to end-of-file. Every failure
//! mode collapses to an empty string: a locked or just-rotated file must cost
//! one scan at most, never abort it.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use encoding_rs::Encoding;
use tracing::warn;

/// Reads and decodes everything from `offset` to end-of-file.
///
/// Decoding uses the configured encoding and tolerates a byte-order mark at
/// the start of the stream. Malformed byte sequences are replaced rather than
/// rejected, with a warning.
///
/// Returns the empty string if the file does not exist or any I/O error
/// occurs; errors are logged, never propagated.
#[must_use]
pub fn read_from_offset(path: &Path, offset: u64, encoding: &'static Encoding) -> String {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to open source file");
            return String::new();
        }
    };

    if offset > 0 {
        if let Err(e) = file.seek(SeekFrom::Start(offset)) {
            warn!(path = %path.display(), offset, error = %e, "Failed to seek source file");
            return String::new();
        }
    }

    let mut bytes = Vec::new();
    if let Err(e) = file.read_to_end(&mut bytes) {
        warn!(path = %path.display(), error = %e, "Failed to read source file");
        return String::new();
    }
    if bytes.is_empty() {
        return String::new();
    }

    let (text, _, had_errors) = encoding.decode(&bytes);
    if had_errors {
        warn!(path = %path.display(), "Replaced malformed byte sequences while decoding");
    }
    text.into_owned()
}
