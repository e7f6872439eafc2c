use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::{AppError, AppResult};

/// Write `bytes` to `path` atomically: stage into a temp file in the same
/// directory, then rename over the destination. Readers observe either the
/// old content or the new content, never a partial write.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> AppResult<()> {
    let parent = path.parent().ok_or_else(|| {
        AppError::new("IO/NO_PARENT", "Destination path has no parent directory")
            .with_context("path", path.display().to_string())
    })?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|err| {
        AppError::from(err)
            .with_context("operation", "write_atomic_stage")
            .with_context("path", path.display().to_string())
    })?;
    tmp.write_all(bytes).map_err(|err| {
        AppError::from(err)
            .with_context("operation", "write_atomic_write")
            .with_context("path", path.display().to_string())
    })?;
    tmp.as_file().sync_all().map_err(|err| {
        AppError::from(err)
            .with_context("operation", "write_atomic_sync")
            .with_context("path", path.display().to_string())
    })?;
    tmp.persist(path).map_err(|err| {
        AppError::from(err.error)
            .with_context("operation", "write_atomic_rename")
            .with_context("path", path.display().to_string())
    })?;
    Ok(())
}
