//! # worldvault - safe edits for block-game world saves
//!
//! A library for inspecting and editing world save directories in place
//! without losing data: every write goes through a lock-aware, optionally
//! snapshotted, atomically saved pipeline.
//!
//! ## Overview
//!
//! worldvault lets you:
//! - Find save directories and resolve a world by name or path
//! - Read and edit the tagged-tree root document (`level.dat`) and player files
//! - Take full snapshots of a save, list them and restore them
//! - Delete region files or reset chunks, with confirmation
//! - Queue in-game commands for the next time the world is loaded
//!
//! ## Architecture
//!
//! - **Path Resolver** ([`paths`]): saves root discovery and world resolution
//! - **Document Codec** ([`codec`], [`nbt`]): tagged tree model, gzip/zlib
//!   detection and atomic replace on save
//! - **Lock Gate** ([`lock`]): asks a [`Confirmer`] before touching a world
//!   whose `session.lock` is present
//! - **Backup Engine** ([`backup`]): snapshots under `.worldvault_backups`,
//!   newest-first listing and destructive restore with progress
//! - **Mutation Orchestrator** ([`manager`]): composes the above for every
//!   write operation
//! - **Background worker** ([`worker`]): runs one operation off the calling
//!   thread and streams progress back
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use worldvault::{AssumeYes, BackupPolicy, WorldManager};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = WorldManager::builder()
//!     .confirmer(AssumeYes)
//!     .backup_policy(BackupPolicy::Always)
//!     .build();
//!
//! for world in manager.list_worlds()? {
//!     println!("{} -> {}", world.name, world.path.display());
//! }
//!
//! let report = manager.set_gamerule("Survival", "keepInventory", "true")?;
//! if let Some(backup) = report.backup {
//!     println!("Snapshot taken first: {}", backup.name);
//! }
//!
//! // Undo it
//! let backups = manager.list_backups("Survival")?;
//! manager.restore_backup("Survival", &backups[0].name)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Safety Model
//!
//! - A document save writes a temporary file next to the target, syncs it
//!   and renames it over the target. Failures before the rename leave the
//!   original untouched.
//! - Edits are validated, the world resolved and its schema version checked
//!   before anything is written.
//! - `session.lock` is an advisory marker. worldvault never takes a lock of
//!   its own and assumes one operation per save at a time.
//! - Restore is not atomic. It clears the save and then copies the snapshot
//!   back; an interrupted restore must be run again.
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`] with a [`WorldError`]. Use
//! [`WorldError::kind`] to branch on the category (not found, aborted,
//! corrupt, unsupported version, I/O).
//!
//! ## Module Organization
//!
//! - [`manager`]: the orchestrator and its builder
//! - [`backup`]: snapshot, list and restore
//! - [`nbt`]: tag tree and binary encoding
//! - [`codec`]: document files on disk
//! - [`edits`]: field edits for level and player documents
//! - [`regions`]: region file naming and chunk mapping
//! - [`config`]: JSON and environment settings
//! - [`types`]: shared value types and the progress seam
//! - [`error`]: error types and handling

pub mod backup;
pub mod codec;
pub mod config;
pub mod edits;
pub mod error;
pub mod lock;
pub mod manager;
pub mod nbt;
pub mod paths;
pub mod regions;
pub mod types;
pub mod utils;
pub mod versioning;
pub mod worker;

pub use config::Config;
pub use error::{ErrorKind, Result, WorldError};
pub use lock::{AssumeNo, AssumeYes, Confirmer, StdinConfirmer};
pub use manager::{BackupPolicy, WorldManager, WorldManagerBuilder};
pub use nbt::{Compound, Document, Encoding, Tag};
pub use regions::RegionCoord;
pub use types::*;
pub use worker::BackgroundTask;
