//! # Formats
//!
//! On-disk and on-wire encodings of the graph, plus the atomic file write
//! shared by every durable artifact.

mod snapshot;

pub use snapshot::*;

use crate::MemlinkError;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Replace the file at `path` with `bytes` atomically.
///
/// The bytes go to a temporary file in the destination directory, which is
/// synced and renamed over `path`. On failure any previous file is intact.
pub fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), MemlinkError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| MemlinkError::storage(path, e))?;
    tmp.write_all(bytes)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| MemlinkError::storage(path, e))?;
    tmp.persist(path)
        .map_err(|e| MemlinkError::storage(path, e.error))?;
    Ok(())
}
