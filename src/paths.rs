//! Path Resolver
//!
//! Locates the saves root and turns a user-supplied identifier (a path or a
//! bare world name) into a [`SaveRef`]. A directory counts as a save when it
//! directly contains [`LEVEL_FILE`]; nothing else is checked.

use crate::error::{Result, WorldError};
use crate::types::{SaveRef, LEVEL_FILE};
use crate::utils::{expand_home, home_dir};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Platform default location of the saves root
pub fn default_saves_dir() -> PathBuf {
    #[cfg(windows)]
    {
        let appdata = std::env::var_os("APPDATA")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| home_dir().map(|h| h.join("AppData").join("Roaming")))
            .unwrap_or_default();
        appdata.join(".minecraft").join("saves")
    }
    #[cfg(target_os = "macos")]
    {
        home_dir()
            .unwrap_or_default()
            .join("Library")
            .join("Application Support")
            .join("minecraft")
            .join("saves")
    }
    #[cfg(not(any(windows, target_os = "macos")))]
    {
        home_dir().unwrap_or_default().join(".minecraft").join("saves")
    }
}

/// The override (with `~` expanded) when given, else [`default_saves_dir`]
pub fn resolve_saves_dir(saves_dir: Option<&Path>) -> PathBuf {
    match saves_dir {
        Some(dir) => expand_home(dir),
        None => default_saves_dir(),
    }
}

/// Whether `path` is a directory directly containing the root document
pub fn is_save_dir(path: &Path) -> bool {
    path.is_dir() && path.join(LEVEL_FILE).is_file()
}

fn save_ref_for(path: &Path) -> Result<SaveRef> {
    let path = path.canonicalize()?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned());
    Ok(SaveRef::new(name, path))
}

/// Resolve `identifier` to a save directory
///
/// The identifier is first tried as a literal path, then as a name under the
/// saves root.
///
/// # Errors
///
/// - [`WorldError::InvalidArgument`] for an empty identifier
/// - [`WorldError::NotFound`] when neither candidate is a save directory
pub fn resolve_world(identifier: &str, saves_dir: Option<&Path>) -> Result<SaveRef> {
    if identifier.trim().is_empty() {
        return Err(WorldError::invalid("world identifier is empty"));
    }

    let direct = expand_home(Path::new(identifier));
    if is_save_dir(&direct) {
        debug!("Resolved {:?} as a direct path", identifier);
        return save_ref_for(&direct);
    }

    let root = resolve_saves_dir(saves_dir);
    let joined = root.join(identifier);
    trace!("Trying {:?} under saves root {:?}", identifier, root);
    if is_save_dir(&joined) {
        debug!("Resolved {:?} under {:?}", identifier, root);
        return save_ref_for(&joined);
    }

    Err(WorldError::not_found(format!("World not found: {}", identifier)))
}

/// Every save directly under the saves root, sorted by name ignoring case
///
/// A missing saves root yields an empty list.
pub fn list_worlds(saves_dir: Option<&Path>) -> Result<Vec<SaveRef>> {
    let root = resolve_saves_dir(saves_dir);
    if !root.is_dir() {
        debug!("Saves root {:?} does not exist", root);
        return Ok(Vec::new());
    }

    let mut worlds = Vec::new();
    for entry in fs::read_dir(&root)? {
        let path = entry?.path();
        if is_save_dir(&path) {
            worlds.push(save_ref_for(&path)?);
        }
    }
    worlds.sort_by_key(|w| w.name.to_lowercase());
    Ok(worlds)
}
