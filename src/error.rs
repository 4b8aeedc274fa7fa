//! Error types for worldvault
//!
//! This module defines every error a world operation can produce. Each
//! variant maps onto one coarse [`ErrorKind`] so front ends can react to the
//! category (not found, aborted, corrupt, ...) without matching on details.

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the worldvault library
pub type Result<T> = std::result::Result<T, WorldError>;

/// Coarse error categories surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A world, backup, player or region target does not exist
    NotFound,
    /// No fields supplied or a malformed value
    InvalidArgument,
    /// The user declined a confirmation
    Aborted,
    /// A document failed to load or has an unexpected shape
    CorruptOrUnreadable,
    /// Document schema version is below the supported floor
    UnsupportedVersion,
    /// Copy, delete or rename failed at the filesystem boundary
    IoFailure,
    /// Unexpected internal condition (worker panic, poisoned state)
    Internal,
}

/// Main error type for all worldvault operations
#[derive(Debug, Error)]
pub enum WorldError {
    /// I/O errors during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Directory walk failed
    #[error("Walk directory error: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// Configuration file could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Resolution target, backup, player file or region file is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller supplied nothing to change or a malformed value
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// User declined a confirmation prompt
    #[error("Aborted: {0}")]
    Aborted(String),

    /// Document is missing, truncated or not a valid tag tree
    #[error("Corrupt or unreadable document {path:?}: {reason}")]
    CorruptDocument {
        /// Document that failed to load
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// Malformed tag stream (no path attached yet)
    #[error("Malformed tag data: {0}")]
    Malformed(String),

    /// A required tag is absent from a compound
    #[error("Missing tag: {0}")]
    MissingTag(String),

    /// A tag exists but holds a different type
    #[error("Tag '{key}' has type {found}, expected {expected}")]
    TagMismatch {
        /// Key of the offending tag
        key: String,
        /// Type the accessor asked for
        expected: &'static str,
        /// Type actually stored
        found: &'static str,
    },

    /// Document schema version below the supported floor
    #[error("Unsupported world DataVersion {found}; version {minimum} or newer is required")]
    UnsupportedVersion {
        /// Version read from the document
        found: i32,
        /// Minimum supported version
        minimum: i32,
    },

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WorldError {
    /// Create a not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        WorldError::NotFound(msg.into())
    }

    /// Create an invalid-argument error
    pub fn invalid(msg: impl Into<String>) -> Self {
        WorldError::InvalidArgument(msg.into())
    }

    /// Create an aborted error
    pub fn aborted(msg: impl Into<String>) -> Self {
        WorldError::Aborted(msg.into())
    }

    /// Create a corrupt-document error for `path`
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        WorldError::CorruptDocument {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        WorldError::Internal(msg.into())
    }

    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorldError::Io(_) | WorldError::WalkDir(_) => ErrorKind::IoFailure,
            WorldError::Json(_) | WorldError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            WorldError::NotFound(_) => ErrorKind::NotFound,
            WorldError::Aborted(_) => ErrorKind::Aborted,
            WorldError::CorruptDocument { .. }
            | WorldError::Malformed(_)
            | WorldError::MissingTag(_)
            | WorldError::TagMismatch { .. } => ErrorKind::CorruptOrUnreadable,
            WorldError::UnsupportedVersion { .. } => ErrorKind::UnsupportedVersion,
            WorldError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Check if this error indicates a damaged or unexpected document
    pub fn is_corruption(&self) -> bool {
        self.kind() == ErrorKind::CorruptOrUnreadable
    }

    /// Check if this error came from a declined confirmation
    pub fn is_user_abort(&self) -> bool {
        matches!(self, WorldError::Aborted(_))
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            WorldError::NotFound(what) => {
                format!("{}. Use 'worlds list' or the matching list command to see what exists.", what)
            }
            WorldError::Aborted(why) => format!("{}. Nothing was changed.", why),
            WorldError::UnsupportedVersion { found, minimum } => format!(
                "World DataVersion {} is older than {}. Open and save the world in a newer game version first.",
                found, minimum
            ),
            WorldError::CorruptDocument { path, reason } => format!(
                "Could not read {:?} ({}). Restore a backup if the file is damaged.",
                path, reason
            ),
            _ => self.to_string(),
        }
    }
}
