//! Core types for worldvault
//!
//! Value types passed between the resolver, the backup engine and the
//! mutation orchestrator, plus the [`ProgressSink`] seam through which long
//! copies report progress.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File holding the root document of a save
pub const LEVEL_FILE: &str = "level.dat";
/// Reserved subdirectory inside each save holding its snapshots
pub const BACKUP_DIR_NAME: &str = ".worldvault_backups";
/// Prefix of every snapshot directory name
pub const BACKUP_PREFIX: &str = "backup-";
/// `chrono` format of the timestamp following [`BACKUP_PREFIX`]
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Identity of a resolved save directory
///
/// Only the resolver creates these, after checking that `path` is a
/// directory containing [`LEVEL_FILE`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveRef {
    /// Directory name of the save
    pub name: String,
    /// Absolute path to the save directory
    pub path: PathBuf,
}

impl SaveRef {
    pub(crate) fn new(name: impl Into<String>, path: PathBuf) -> Self {
        Self {
            name: name.into(),
            path,
        }
    }

    pub fn level_path(&self) -> PathBuf {
        self.path.join(LEVEL_FILE)
    }

    pub fn region_dir(&self) -> PathBuf {
        self.path.join("region")
    }

    pub fn entities_dir(&self) -> PathBuf {
        self.path.join("entities")
    }

    pub fn playerdata_dir(&self) -> PathBuf {
        self.path.join("playerdata")
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.path.join(BACKUP_DIR_NAME)
    }

    /// Player document for `uuid`
    pub fn player_path(&self, uuid: &str) -> PathBuf {
        self.playerdata_dir().join(format!("{}.dat", uuid))
    }
}

/// One snapshot directory under a save's backup store
///
/// Names sort lexicographically in creation order because the timestamp is
/// zero-padded.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BackupEntry {
    /// Directory name, `backup-YYYYMMDD-HHMMSS`
    pub name: String,
    /// Full path of the snapshot directory
    pub path: PathBuf,
}

impl BackupEntry {
    /// Local creation time encoded in the name, if it follows the scheme
    pub fn timestamp(&self) -> Option<DateTime<Local>> {
        let stamp = self.name.strip_prefix(BACKUP_PREFIX)?;
        let naive = NaiveDateTime::parse_from_str(stamp, BACKUP_TIMESTAMP_FORMAT).ok()?;
        Local.from_local_datetime(&naive).earliest()
    }
}

/// Progress of a tree copy, emitted after each file completes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyProgress {
    /// Files copied so far, including the current one
    pub completed: usize,
    /// Files in the whole copy, fixed before the first file
    pub total: usize,
    /// Path of the file just copied, relative to the copy root
    pub relative_path: PathBuf,
}

impl CopyProgress {
    /// Progress as a percentage (0-100); an empty copy counts as complete
    pub fn percentage(&self) -> f32 {
        if self.total == 0 {
            100.0
        } else {
            (self.completed as f32 / self.total as f32) * 100.0
        }
    }
}

/// Receiver of [`CopyProgress`] events
///
/// Implemented for any `Fn(&CopyProgress)` closure, so tests and front ends
/// can pass a closure directly.
///
/// # Examples
///
/// ```rust
/// use worldvault::types::{CopyProgress, ProgressSink};
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let seen = AtomicUsize::new(0);
/// let sink = |_: &CopyProgress| {
///     seen.fetch_add(1, Ordering::SeqCst);
/// };
/// sink.on_progress(&CopyProgress { completed: 1, total: 1, relative_path: "level.dat".into() });
/// assert_eq!(seen.load(Ordering::SeqCst), 1);
/// ```
pub trait ProgressSink: Send + Sync {
    /// Called once per copied file, in order
    fn on_progress(&self, progress: &CopyProgress);
}

impl<F> ProgressSink for F
where
    F: Fn(&CopyProgress) + Send + Sync,
{
    fn on_progress(&self, progress: &CopyProgress) {
        self(progress)
    }
}

/// Sink that drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _progress: &CopyProgress) {}
}

/// Sink that turns every event into a `tracing` debug event
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn on_progress(&self, progress: &CopyProgress) {
        tracing::debug!(
            completed = progress.completed,
            total = progress.total,
            "Copied {}",
            progress.relative_path.display()
        );
    }
}

/// Result of a restore operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreReport {
    /// Name of the snapshot that was restored
    pub backup: String,
    /// Top-level entries removed from the save before copying
    pub entries_removed: usize,
    /// Number of files copied back in
    pub files_restored: usize,
    /// Total bytes written
    pub bytes_written: u64,
    /// Time taken in milliseconds
    pub duration_ms: u64,
}

/// Outcome of an orchestrated write
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationReport {
    /// File or directory the operation touched
    pub target: PathBuf,
    /// Number of files or fields affected
    pub affected: usize,
    /// Snapshot taken before the write, if any
    pub backup: Option<BackupEntry>,
}

impl MutationReport {
    pub(crate) fn new(target: impl AsRef<Path>, affected: usize, backup: Option<BackupEntry>) -> Self {
        Self {
            target: target.as_ref().to_path_buf(),
            affected,
            backup,
        }
    }
}

/// Summary of a save shown by `inspect`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldInfo {
    pub name: String,
    pub path: PathBuf,
    pub data_version: i32,
    pub level_name: String,
    pub difficulty: Option<String>,
    pub game_mode: Option<String>,
    pub hardcore: bool,
    pub time: i64,
    pub day_time: i64,
    pub spawn: (i32, i32, i32),
    pub gamerule_count: usize,
    pub player_count: usize,
    pub region_count: usize,
    pub entity_region_count: usize,
    pub backup_count: usize,
    /// Whether the session marker is currently present
    pub locked: bool,
}
