//! Atomic file replacement
//!
//! Files are written with the write-fsync-rename pattern:
//! 1. Write to `<final>.tmp`
//! 2. fsync the temp file
//! 3. Rename temp to final (atomic on POSIX)
//! 4. fsync the parent directory so the rename itself is durable
//!
//! If any step fails, the temp file is cleaned up and the final path is
//! left exactly as it was.

use dayvec_core::{IndexError, IndexResult};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Suffix appended to the final file name while a write is in flight
pub const TEMP_SUFFIX: &str = ".tmp";

/// Temp path used while writing `path`
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

/// Atomically replace `path` with `bytes`
pub fn write_atomic(path: &Path, bytes: &[u8]) -> IndexResult<()> {
    let temp_path = temp_path_for(path);

    if temp_path.exists() {
        warn!(path = %temp_path.display(), "Removing stale temp file");
        let _ = fs::remove_file(&temp_path);
    }

    if let Err(e) = write_and_sync(&temp_path, bytes) {
        warn!(
            temp_path = %temp_path.display(),
            error = %e,
            "Write failed, cleaning up temp file"
        );
        let _ = fs::remove_file(&temp_path);
        return Err(IndexError::io(&temp_path, e));
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        warn!(
            temp_path = %temp_path.display(),
            error = %e,
            "Rename failed, cleaning up temp file"
        );
        let _ = fs::remove_file(&temp_path);
        return Err(IndexError::io(path, e));
    }
    debug!(path = %path.display(), bytes = bytes.len(), "Atomic rename completed");

    if let Some(parent) = path.parent() {
        sync_dir(parent).map_err(|e| IndexError::io(parent, e))?;
    }

    Ok(())
}

/// Remove a file, treating "not found" as success
///
/// Returns whether a file was actually removed.
pub fn remove_if_exists(path: &Path) -> IndexResult<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(IndexError::io(path, e)),
    }
}

fn write_and_sync(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

// Directories cannot be opened for sync on Windows; rename durability is
// left to the filesystem there.
#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
