//! Atomic file replacement
//!
//! Content is written to a temp file in the destination directory, synced,
//! then renamed over the destination. A crash at any point leaves either the
//! old file or the new one, never a truncated mix.

use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

use super::FileWriter;

/// Default [`FileWriter`]: temp file + fsync + rename
#[derive(Debug, Default, Clone, Copy)]
pub struct AtomicFileWriter;

impl FileWriter for AtomicFileWriter {
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        write_atomic(path, contents)
    }
}

/// Replace `path` with `contents` atomically.
///
/// The temp file is created by `tempfile`, which opens it with owner-only
/// permissions on Unix, so new files end up 0600. When `path` already
/// exists its permissions are copied onto the temp file before the rename.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(contents)?;
    match std::fs::metadata(path) {
        Ok(existing) => temp.as_file().set_permissions(existing.permissions())?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    debug!("Atomically wrote {} bytes to {:?}", contents.len(), path);
    Ok(())
}

/// Read a file to a string, mapping "not found" to `None`
pub fn read_optional(path: &Path) -> io::Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
