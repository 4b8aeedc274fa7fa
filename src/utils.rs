//! Utility functions for worldvault
//!
//! Small filesystem and formatting helpers shared by the backup engine, the
//! path resolver and the command-line front end.
//!
//! ## Categories of Utilities
//!
//! ### File Operations
//! - Copying a file while keeping its modification time
//! - Removing a directory entry without following symlinks
//!
//! ### Path Manipulation
//! - Converting absolute paths to relative paths
//! - Expanding a leading `~` against the home directory
//!
//! ### Formatting
//! - Byte formatting (human-readable sizes)

use crate::error::{Result, WorldError};
use filetime::FileTime;
use std::fs;
use std::path::{Path, PathBuf};

/// Home directory from `HOME`, falling back to `USERPROFILE`
pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|v| !v.is_empty())
        .or_else(|| std::env::var_os("USERPROFILE").filter(|v| !v.is_empty()))
        .map(PathBuf::from)
}

/// Expand a leading `~` component against the home directory
///
/// Paths without a leading `~`, or when no home directory is known, are
/// returned unchanged.
///
/// ```rust
/// use worldvault::utils::expand_home;
/// use std::path::Path;
///
/// assert_eq!(expand_home(Path::new("/srv/saves")), Path::new("/srv/saves"));
/// ```
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

/// Convert an absolute path to a path relative to `base`
///
/// A lexical strip is tried first so symlinked paths keep their own name;
/// canonical paths are compared only when that fails.
pub fn make_relative(path: &Path, base: &Path) -> Result<PathBuf> {
    if let Ok(relative) = path.strip_prefix(base) {
        return Ok(relative.to_path_buf());
    }

    let path_canon = path.canonicalize()?;
    let base_canon = base.canonicalize()?;

    path_canon
        .strip_prefix(&base_canon)
        .map(|p| p.to_path_buf())
        .map_err(|_| WorldError::internal(format!(
            "Path {:?} is not relative to {:?}",
            path_canon, base_canon
        )))
}

/// Copy `src` to `dst`, creating parent directories and keeping the
/// modification time. Returns the number of bytes copied.
///
/// An existing `dst` is overwritten.
pub fn copy_file_preserving(src: &Path, dst: &Path) -> Result<u64> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    let bytes = fs::copy(src, dst)?;
    let meta = fs::metadata(src)?;
    let mtime = FileTime::from_last_modification_time(&meta);
    filetime::set_file_mtime(dst, mtime)?;
    Ok(bytes)
}

/// Remove a directory entry
///
/// Real directories are removed recursively; files and symlinks (including
/// symlinks to directories) are unlinked without touching their target.
pub fn remove_entry(path: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(path)?;
    if meta.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    Ok(())
}

/// Format bytes in human-readable form
///
/// Uses binary units (1024-based). Values below 1 KB are whole numbers.
///
/// ```rust
/// use worldvault::utils::format_bytes;
///
/// assert_eq!(format_bytes(1023), "1023 B");
/// assert_eq!(format_bytes(1536), "1.50 KB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}
