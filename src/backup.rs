//! Whole-tree backup and restore of the data root.
//!
//! Export streams the tree file-by-file into one deflate-compressed zip; the
//! tree is never materialized in memory. Import extracts into the target
//! directory, overwriting files at the same relative path: no dry run, no
//! diff, no rollback. A failure partway through an import can leave a mixed
//! old/new tree; callers are told so. Overlapping imports are likewise not
//! mutually excluded. Both are deliberate simplicity trade-offs recorded in
//! DESIGN.md; a hardened variant would stage into a temp directory and swap
//! with an atomic rename.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use fs2::available_space;
use serde::Serialize;
use tracing::{info, warn};
use ts_rs::TS;
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::paths::DATA_DIR_NAME;
use crate::{AppError, AppResult};

/// Outcome of a completed export.
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../bindings/")]
pub struct ExportReceipt {
    pub path: String,
    pub size: u64,
}

/// Suggested archive file name for today, e.g. `daybook_backup_2026-08-08.zip`.
pub fn default_archive_name() -> String {
    format!("daybook_backup_{}.zip", Local::now().format("%Y-%m-%d"))
}

/// Stream the entire tree at `data_root` into a compressed archive at `dest`.
/// A directory destination gets today's default archive name appended.
///
/// Entries are rooted under a top-level `Daybook_Data/` folder so that
/// extracting the archive into a home directory restores the tree in place.
pub fn export_archive(data_root: &Path, dest: &Path) -> AppResult<ExportReceipt> {
    let dest: PathBuf = if dest.is_dir() {
        dest.join(default_archive_name())
    } else {
        dest.to_path_buf()
    };
    let dest = dest.as_path();

    if !data_root.is_dir() {
        return Err(AppError::new(
            "ARCHIVE/NO_DATA",
            "No data directory to export yet. Run the telemetry collector first.",
        )
        .with_context("path", data_root.display().to_string()));
    }

    // Preflight: refuse up front rather than fail mid-stream on a full disk.
    let estimate = dir_size(data_root);
    if let Ok(avail) = free_space_for(dest) {
        if avail < estimate {
            return Err(AppError::new(
                "ARCHIVE/LOW_DISK",
                "Not enough disk space for the backup archive.",
            )
            .with_context("available_bytes", avail.to_string())
            .with_context("estimated_bytes", estimate.to_string()));
        }
    }

    let file = File::create(dest).map_err(|err| {
        AppError::from(err)
            .with_context("operation", "export_create_archive")
            .with_context("path", dest.display().to_string())
    })?;

    let mut writer = ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9));

    for entry in WalkDir::new(data_root).follow_links(false) {
        let entry = entry.map_err(|err| {
            AppError::new("ARCHIVE/WALK", err.to_string())
                .with_context("operation", "export_walk_tree")
        })?;
        let relative = entry
            .path()
            .strip_prefix(data_root)
            .expect("walkdir yields children of its root");
        if relative.as_os_str().is_empty() {
            continue;
        }
        let entry_name = format!("{DATA_DIR_NAME}/{}", zip_entry_name(relative));

        if entry.file_type().is_dir() {
            writer
                .add_directory(entry_name, options)
                .map_err(|err| AppError::from(err).with_context("operation", "export_add_dir"))?;
        } else if entry.file_type().is_file() {
            writer
                .start_file(entry_name, options)
                .map_err(|err| AppError::from(err).with_context("operation", "export_add_file"))?;
            let mut source = File::open(entry.path()).map_err(|err| {
                AppError::from(err)
                    .with_context("operation", "export_open_source")
                    .with_context("path", entry.path().display().to_string())
            })?;
            io::copy(&mut source, &mut writer).map_err(|err| {
                AppError::from(err)
                    .with_context("operation", "export_copy")
                    .with_context("path", entry.path().display().to_string())
            })?;
        }
        // Symlinks and other special files are not part of the collector
        // contract and are skipped.
    }

    writer
        .finish()
        .map_err(|err| AppError::from(err).with_context("operation", "export_finish"))?;

    let size = fs::metadata(dest).map(|m| m.len()).unwrap_or(0);
    info!(
        target: "daybook",
        event = "export_complete",
        path = %dest.display(),
        bytes = size
    );
    Ok(ExportReceipt {
        path: dest.display().to_string(),
        size,
    })
}

/// Extract `archive` into `target`, overwriting files at the same relative
/// path. Entries that would escape `target` (zip-slip) are skipped, not
/// extracted.
pub fn import_archive(archive: &Path, target: &Path) -> AppResult<()> {
    let file = File::open(archive).map_err(|err| {
        AppError::from(err)
            .with_context("operation", "import_open_archive")
            .with_context("path", archive.display().to_string())
    })?;
    let mut zip = ZipArchive::new(file)
        .map_err(|err| AppError::from(err).with_context("operation", "import_read_archive"))?;

    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .map_err(|err| AppError::from(err).with_context("operation", "import_read_entry"))?;
        let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
            warn!(
                target: "daybook",
                event = "import_entry_skipped",
                name = entry.name(),
                "archive entry escapes the target directory"
            );
            continue;
        };
        let dest = target.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&dest).map_err(|err| {
                AppError::from(err)
                    .with_context("operation", "import_create_dir")
                    .with_context("path", dest.display().to_string())
            })?;
            continue;
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                AppError::from(err)
                    .with_context("operation", "import_create_parent")
                    .with_context("path", parent.display().to_string())
            })?;
        }
        let mut out = File::create(&dest).map_err(|err| {
            AppError::from(err)
                .with_context("operation", "import_create_file")
                .with_context("path", dest.display().to_string())
        })?;
        io::copy(&mut entry, &mut out).map_err(|err| {
            AppError::from(err)
                .with_context("operation", "import_copy")
                .with_context("path", dest.display().to_string())
        })?;
    }

    info!(
        target: "daybook",
        event = "import_complete",
        archive = %archive.display(),
        target = %target.display()
    );
    Ok(())
}

fn zip_entry_name(relative: &Path) -> String {
    // Zip entry names always use forward slashes.
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn free_space_for(dest: &Path) -> io::Result<u64> {
    let probe = if dest.exists() {
        dest
    } else {
        dest.parent().unwrap_or(Path::new("."))
    };
    available_space(probe)
}

fn dir_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .flatten()
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|meta| meta.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_names_use_forward_slashes() {
        let rel = Path::new("notes").join("2026-02-09").join("raw.json");
        assert_eq!(zip_entry_name(&rel), "notes/2026-02-09/raw.json");
    }

    #[test]
    fn default_name_is_dated_zip() {
        let name = default_archive_name();
        assert!(name.starts_with("daybook_backup_"));
        assert!(name.ends_with(".zip"));
        assert_eq!(name.len(), "daybook_backup_YYYY-MM-DD.zip".len());
    }

    #[test]
    fn export_refuses_missing_data_root() {
        let dir = tempfile::tempdir().unwrap();
        let err = export_archive(&dir.path().join("nope"), &dir.path().join("out.zip"))
            .expect_err("missing root must fail");
        assert_eq!(err.code(), "ARCHIVE/NO_DATA");
    }
}
