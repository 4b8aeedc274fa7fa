//! Backup Engine
//!
//! Full-tree snapshots of a save directory stored under its own reserved
//! [`BACKUP_DIR_NAME`] subdirectory, listing newest first, and destructive
//! restore.
//!
//! ## Snapshot layout
//!
//! ```text
//! <save>/
//! ├── level.dat
//! ├── region/r.0.0.mca
//! └── .worldvault_backups/
//!     ├── backup-20240101-120000/
//!     │   ├── level.dat
//!     │   └── region/r.0.0.mca
//!     └── backup-20240102-080000/
//! ```
//!
//! Only regular files are copied; symlinks are not followed and empty
//! directories are not recorded. The reserved directory is skipped only at
//! the top of the walked tree, so a snapshot never contains older snapshots.
//!
//! ## Same-second snapshots
//!
//! Names have second resolution. Two snapshots taken within the same second
//! share one directory and the second copy overwrites the first file by file.
//!
//! ## Restore
//!
//! Restore deletes every top-level entry of the save except the reserved
//! directory and then copies the snapshot back in. It is not atomic: if the
//! process dies in between, the save is left partially restored and the
//! restore has to be run again.

use crate::error::{Result, WorldError};
use crate::types::{BackupEntry, CopyProgress, ProgressSink, RestoreReport};
use crate::utils::{copy_file_preserving, format_bytes, make_relative, remove_entry};
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, trace};
use walkdir::WalkDir;

pub use crate::types::{BACKUP_DIR_NAME, BACKUP_PREFIX, BACKUP_TIMESTAMP_FORMAT};

/// Snapshot directory name for a local time
pub fn snapshot_name(at: DateTime<Local>) -> String {
    format!("{}{}", BACKUP_PREFIX, at.format(BACKUP_TIMESTAMP_FORMAT))
}

/// Relative paths of every regular file under `root`, reserved directory
/// excluded, in a stable order
pub fn collect_files(root: &Path) -> Result<Vec<PathBuf>> {
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !(e.depth() == 1 && e.file_name() == BACKUP_DIR_NAME));

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(make_relative(entry.path(), root)?);
        }
    }
    Ok(files)
}

/// Copy `files` from `src_root` to `dst_root`, reporting after each file.
/// Returns total bytes written.
fn copy_tree(src_root: &Path, dst_root: &Path, files: &[PathBuf], progress: &dyn ProgressSink) -> Result<u64> {
    let total = files.len();
    let mut bytes = 0u64;
    for (index, relative) in files.iter().enumerate() {
        bytes += copy_file_preserving(&src_root.join(relative), &dst_root.join(relative))?;
        trace!("Copied {:?}", relative);
        progress.on_progress(&CopyProgress {
            completed: index + 1,
            total,
            relative_path: relative.clone(),
        });
    }
    Ok(bytes)
}

/// Snapshot `save_path` into a directory named after the current local time
pub fn create_snapshot(save_path: &Path, progress: &dyn ProgressSink) -> Result<BackupEntry> {
    create_snapshot_at(save_path, Local::now(), progress)
}

/// Snapshot `save_path` into the directory named for `at`
///
/// An existing snapshot with the same name is merged into, file by file.
pub fn create_snapshot_at(
    save_path: &Path,
    at: DateTime<Local>,
    progress: &dyn ProgressSink,
) -> Result<BackupEntry> {
    let start = Instant::now();
    let name = snapshot_name(at);
    let dest = save_path.join(BACKUP_DIR_NAME).join(&name);

    let files = collect_files(save_path)?;
    debug!("Snapshot {} will copy {} files", name, files.len());

    fs::create_dir_all(&dest)?;
    let bytes = copy_tree(save_path, &dest, &files, progress)?;

    info!(
        "Created snapshot {} in {}ms ({} files, {})",
        name,
        start.elapsed().as_millis(),
        files.len(),
        format_bytes(bytes)
    );
    Ok(BackupEntry { name, path: dest })
}

/// Snapshots of `save_path`, newest first
///
/// Empty when the save has never been backed up.
pub fn list_snapshots(save_path: &Path) -> Result<Vec<BackupEntry>> {
    let dir = save_path.join(BACKUP_DIR_NAME);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            entries.push(BackupEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: entry.path(),
            });
        }
    }
    entries.sort_by(|a, b| b.name.cmp(&a.name));
    Ok(entries)
}

/// Look up one snapshot by name
pub fn find_snapshot(save_path: &Path, name: &str) -> Result<BackupEntry> {
    let plain = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\']);
    let path = save_path.join(BACKUP_DIR_NAME).join(name);
    if !plain || !path.is_dir() {
        return Err(WorldError::not_found(format!("Backup not found: {}", name)));
    }
    Ok(BackupEntry {
        name: name.to_string(),
        path,
    })
}

/// Replace the contents of `save_path` with snapshot `name`
///
/// # Errors
///
/// - [`WorldError::NotFound`] if the snapshot does not exist; nothing is
///   removed in that case
/// - [`WorldError::Io`] if removing or copying fails part way
pub fn restore_snapshot(save_path: &Path, name: &str, progress: &dyn ProgressSink) -> Result<RestoreReport> {
    let start = Instant::now();
    let backup = find_snapshot(save_path, name)?;
    info!("Restoring snapshot {} into {:?}", name, save_path);

    let files = collect_files(&backup.path)?;

    let mut entries_removed = 0;
    for entry in fs::read_dir(save_path)? {
        let entry = entry?;
        if entry.file_name() == BACKUP_DIR_NAME {
            continue;
        }
        remove_entry(&entry.path())?;
        entries_removed += 1;
    }
    debug!("Removed {} top-level entries", entries_removed);

    let bytes_written = copy_tree(&backup.path, save_path, &files, progress)?;

    let report = RestoreReport {
        backup: backup.name,
        entries_removed,
        files_restored: files.len(),
        bytes_written,
        duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
    };
    info!(
        "Restored snapshot {} in {}ms ({} files restored, {} entries removed)",
        report.backup, report.duration_ms, report.files_restored, report.entries_removed
    );
    Ok(report)
}
