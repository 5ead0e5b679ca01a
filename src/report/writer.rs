//! Atomic report output.

use crate::error::{BatchError, BatchResult};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Path of the backup kept for `path` (`report.txt` -> `report.txt.bak`).
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".bak");
    path.with_file_name(name)
}

/// Write `content` to `path` in full or not at all.
///
/// The content goes to a temporary file in the destination directory,
/// which is then renamed over the target. With `backup`, an existing
/// target is first copied to [`backup_path`].
pub fn write_atomic(path: &Path, content: &[u8], backup: bool) -> BatchResult<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    if !dir.is_dir() {
        return Err(BatchError::sink(path, "destination directory does not exist"));
    }
    if path.is_dir() {
        return Err(BatchError::sink(path, "destination is a directory"));
    }

    if backup && path.exists() {
        let backup = backup_path(path);
        fs::copy(path, &backup).map_err(|e| BatchError::sink(&backup, e))?;
        info!("Previous output kept at {}", backup.display());
    }

    let mut temp = NamedTempFile::new_in(dir).map_err(|e| BatchError::sink(path, e))?;
    temp.write_all(content)
        .and_then(|_| temp.flush())
        .map_err(|e| BatchError::sink(path, e))?;
    temp.persist(path).map_err(|e| BatchError::sink(path, e.error))?;

    debug!("Wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}
