//! Mutation Orchestrator
//!
//! [`WorldManager`] is the entry point for every operation on a save. Write
//! operations all follow the same sequence, failing fast at the first error:
//!
//! 1. validate arguments (empty edits are rejected before any I/O)
//! 2. resolve the world
//! 3. validate the target file (player, region, snapshot) exists
//! 4. lock gate: ask the confirmer if `session.lock` is present
//! 5. confirm destructive operations (deletes, restore)
//! 6. load the document and check its schema version
//! 7. take a snapshot if the [`BackupPolicy`] asks for one
//! 8. mutate, then atomically save
//!
//! Nothing is written when any step before 8 fails.

use crate::backup;
use crate::codec;
use crate::edits::{
    kill_command, summon_command, AdvancedEdit, Difficulty, GameMode, GameruleEdit, MetadataEdit, PlayerEdit,
};
use crate::error::{Result, WorldError};
use crate::lock::{self, Confirmer, StdinConfirmer};
use crate::nbt::{Compound, Document, Tag};
use crate::paths;
use crate::regions::{list_region_files, RegionCoord};
use crate::types::{BackupEntry, MutationReport, NoProgress, ProgressSink, RestoreReport, SaveRef, WorldInfo};
use crate::versioning::{data_version, ensure_supported};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Directory inside a save holding queued in-game commands
pub const COMMAND_DIR: &str = "worldvault_commands";
/// Append-only command file inside [`COMMAND_DIR`]
pub const COMMAND_FILE: &str = "queued_commands.mcfunction";

const BACKUP_PROMPT: &str = "Create backup before write? [y/N]: ";

/// When to snapshot a world before writing to it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupPolicy {
    /// Write without a snapshot
    #[default]
    Never,
    /// Snapshot before every write
    Always,
    /// Ask the confirmer before every write
    Ask,
}

impl fmt::Display for BackupPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackupPolicy::Never => "never",
            BackupPolicy::Always => "always",
            BackupPolicy::Ask => "ask",
        })
    }
}

impl FromStr for BackupPolicy {
    type Err = WorldError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "never" => Ok(BackupPolicy::Never),
            "always" => Ok(BackupPolicy::Always),
            "ask" => Ok(BackupPolicy::Ask),
            other => Err(WorldError::invalid(format!(
                "backup policy must be one of: always, never, ask (got {:?})",
                other
            ))),
        }
    }
}

/// Orchestrates reads and safe writes on world saves
///
/// Cloning is cheap; the confirmer and progress sink are shared.
///
/// # Examples
///
/// ```rust,no_run
/// use worldvault::{AssumeYes, BackupPolicy, WorldManager};
/// use worldvault::edits::{Difficulty, MetadataEdit};
///
/// # fn example() -> worldvault::Result<()> {
/// let manager = WorldManager::builder()
///     .saves_dir("/srv/minecraft/saves")
///     .confirmer(AssumeYes)
///     .backup_policy(BackupPolicy::Always)
///     .build();
///
/// let edit = MetadataEdit {
///     difficulty: Some(Difficulty::Hard),
///     ..Default::default()
/// };
/// let report = manager.set_metadata("Survival", &edit)?;
/// println!("{} fields written, backup {:?}", report.affected, report.backup);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct WorldManager {
    saves_dir: Option<PathBuf>,
    confirmer: Arc<dyn Confirmer>,
    progress: Arc<dyn ProgressSink>,
    backup_policy: BackupPolicy,
}

impl fmt::Debug for WorldManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorldManager")
            .field("saves_dir", &self.saves_dir)
            .field("backup_policy", &self.backup_policy)
            .finish_non_exhaustive()
    }
}

impl Default for WorldManager {
    fn default() -> Self {
        WorldManagerBuilder::new().build()
    }
}

impl WorldManager {
    pub fn builder() -> WorldManagerBuilder {
        WorldManagerBuilder::new()
    }

    /// Same manager reporting copy progress to `progress`
    pub fn with_progress(&self, progress: Arc<dyn ProgressSink>) -> Self {
        Self {
            progress,
            ..self.clone()
        }
    }

    pub fn backup_policy(&self) -> BackupPolicy {
        self.backup_policy
    }

    /// Saves root this manager resolves bare names against
    pub fn saves_dir(&self) -> PathBuf {
        paths::resolve_saves_dir(self.saves_dir.as_deref())
    }

    pub fn resolve(&self, world: &str) -> Result<SaveRef> {
        paths::resolve_world(world, self.saves_dir.as_deref())
    }

    // ---- read operations ----

    pub fn list_worlds(&self) -> Result<Vec<SaveRef>> {
        paths::list_worlds(self.saves_dir.as_deref())
    }

    /// Load the root document of a world
    pub fn load_level(&self, world: &str) -> Result<Document> {
        let save = self.resolve(world)?;
        codec::load(&save.level_path())
    }

    /// Load one player's document
    pub fn load_player(&self, world: &str, uuid: &str) -> Result<Document> {
        let uuid = player_id(uuid)?;
        let save = self.resolve(world)?;
        codec::load(&existing_player(&save, uuid)?)
    }

    #[instrument(skip(self))]
    pub fn inspect(&self, world: &str) -> Result<WorldInfo> {
        let save = self.resolve(world)?;
        let doc = codec::load(&save.level_path())?;
        let data = doc.root.compound("Data")?;

        let named = |key: &str, name: fn(i64) -> Option<String>| {
            data.get(key)
                .and_then(Tag::as_i64)
                .map(|id| name(id).unwrap_or_else(|| id.to_string()))
        };

        Ok(WorldInfo {
            data_version: data_version(data)?,
            level_name: data.str_or("LevelName", &save.name)?.to_string(),
            difficulty: named("Difficulty", |id| Difficulty::from_id(id).map(|d| d.to_string())),
            game_mode: named("GameType", |id| GameMode::from_id(id).map(|m| m.to_string())),
            hardcore: data.i64_or("hardcore", 0)? != 0,
            time: data.i64_or("Time", 0)?,
            day_time: data.i64_or("DayTime", 0)?,
            spawn: (
                data.i32_or("SpawnX", 0)?,
                data.i32_or("SpawnY", 0)?,
                data.i32_or("SpawnZ", 0)?,
            ),
            gamerule_count: data
                .get("GameRules")
                .and_then(Tag::as_compound)
                .map_or(0, Compound::len),
            player_count: player_ids(&save)?.len(),
            region_count: list_region_files(&save.region_dir())?.len(),
            entity_region_count: list_region_files(&save.entities_dir())?.len(),
            backup_count: backup::list_snapshots(&save.path)?.len(),
            locked: lock::is_locked(&save.path),
            name: save.name,
            path: save.path,
        })
    }

    pub fn list_backups(&self, world: &str) -> Result<Vec<BackupEntry>> {
        let save = self.resolve(world)?;
        backup::list_snapshots(&save.path)
    }

    /// Player ids (file stems under `playerdata/`), sorted
    pub fn list_players(&self, world: &str) -> Result<Vec<String>> {
        player_ids(&self.resolve(world)?)
    }

    pub fn list_regions(&self, world: &str) -> Result<Vec<String>> {
        list_region_files(&self.resolve(world)?.region_dir())
    }

    pub fn list_entity_regions(&self, world: &str) -> Result<Vec<String>> {
        list_region_files(&self.resolve(world)?.entities_dir())
    }

    // ---- backups ----

    #[instrument(skip(self))]
    pub fn create_backup(&self, world: &str) -> Result<BackupEntry> {
        let save = self.resolve(world)?;
        lock::gate(&save.path, self.confirmer.as_ref())?;
        backup::create_snapshot(&save.path, self.progress.as_ref())
    }

    /// Replace the world with one of its snapshots
    ///
    /// Always asks for confirmation. Not atomic: see [`crate::backup`].
    #[instrument(skip(self))]
    pub fn restore_backup(&self, world: &str, name: &str) -> Result<RestoreReport> {
        let save = self.resolve(world)?;
        backup::find_snapshot(&save.path, name)?;
        lock::gate(&save.path, self.confirmer.as_ref())?;
        self.confirm_destructive(&format!(
            "Restore backup {} into world {}? Everything outside the backup store will be deleted first. [y/N]: ",
            name, save.name
        ))?;
        if let Some(pre) = self.maybe_snapshot(&save, Some(name))? {
            info!("Saved current state as {} before restoring", pre.name);
        }
        backup::restore_snapshot(&save.path, name, self.progress.as_ref())
    }

    // ---- level document edits ----

    #[instrument(skip(self))]
    pub fn set_metadata(&self, world: &str, edit: &MetadataEdit) -> Result<MutationReport> {
        edit.validate()?;
        self.edit_level(world, |data| Ok(edit.apply(data)))
    }

    #[instrument(skip(self))]
    pub fn set_advanced(&self, world: &str, edit: &AdvancedEdit) -> Result<MutationReport> {
        edit.validate()?;
        self.edit_level(world, |data| Ok(edit.apply(data)))
    }

    #[instrument(skip(self))]
    pub fn set_gamerule(&self, world: &str, rule: &str, value: &str) -> Result<MutationReport> {
        let edit = GameruleEdit::new(rule, value);
        edit.validate()?;
        self.edit_level(world, |data| edit.apply(data))
    }

    // ---- players ----

    #[instrument(skip(self))]
    pub fn set_player(&self, world: &str, uuid: &str, edit: &PlayerEdit) -> Result<MutationReport> {
        edit.validate()?;
        let uuid = player_id(uuid)?;
        let save = self.resolve(world)?;
        let target = existing_player(&save, uuid)?;
        lock::gate(&save.path, self.confirmer.as_ref())?;
        self.edit_document(&save, &target, false, |root| edit.apply(root))
    }

    /// Set a player's health to zero
    pub fn kill_player(&self, world: &str, uuid: &str) -> Result<MutationReport> {
        self.set_player(world, uuid, &PlayerEdit::kill())
    }

    #[instrument(skip(self))]
    pub fn delete_player(&self, world: &str, uuid: &str) -> Result<MutationReport> {
        let uuid = player_id(uuid)?;
        let save = self.resolve(world)?;
        let target = existing_player(&save, uuid)?;
        self.delete_files(&save, vec![target], &format!("player {}", uuid))
    }

    // ---- regions ----

    /// Delete one terrain region file, named `r.<x>.<z>.mca`
    #[instrument(skip(self))]
    pub fn delete_region(&self, world: &str, region: &str) -> Result<MutationReport> {
        let coord = region_coord(region)?;
        let save = self.resolve(world)?;
        let target = existing_region(&save.region_dir(), coord, "Region")?;
        self.delete_files(&save, vec![target], &format!("region {}", coord))
    }

    /// Delete the terrain region file owning chunk `(chunk_x, chunk_z)`
    #[instrument(skip(self))]
    pub fn reset_chunk(&self, world: &str, chunk_x: i32, chunk_z: i32) -> Result<MutationReport> {
        let coord = RegionCoord::for_chunk(chunk_x, chunk_z);
        debug!("Chunk {},{} lives in {}", chunk_x, chunk_z, coord);
        let save = self.resolve(world)?;
        let target = existing_region(&save.region_dir(), coord, "Region")?;
        self.delete_files(
            &save,
            vec![target],
            &format!("region {} (holds chunk {},{} and 1023 neighbours)", coord, chunk_x, chunk_z),
        )
    }

    #[instrument(skip(self))]
    pub fn delete_entity_region(&self, world: &str, region: &str) -> Result<MutationReport> {
        let coord = region_coord(region)?;
        let save = self.resolve(world)?;
        let target = existing_region(&save.entities_dir(), coord, "Entity region")?;
        self.delete_files(&save, vec![target], &format!("entity region {}", coord))
    }

    /// Delete every entity region file
    ///
    /// When there are none this returns a report with `affected == 0`
    /// without prompting or taking a snapshot.
    #[instrument(skip(self))]
    pub fn delete_all_entity_regions(&self, world: &str) -> Result<MutationReport> {
        let save = self.resolve(world)?;
        let dir = save.entities_dir();
        let files: Vec<PathBuf> = list_region_files(&dir)?
            .into_iter()
            .map(|name| dir.join(name))
            .collect();
        if files.is_empty() {
            debug!("No entity regions in {:?}", dir);
            return Ok(MutationReport::new(&dir, 0, None));
        }
        let report = self.delete_files(&save, files, "all entity regions")?;
        Ok(MutationReport { target: dir, ..report })
    }

    // ---- queued commands ----

    /// Append one command line to the world's queued command file
    #[instrument(skip(self))]
    pub fn queue_command(&self, world: &str, command: &str) -> Result<MutationReport> {
        let command = command.trim();
        if command.is_empty() {
            return Err(WorldError::invalid("Command is empty"));
        }
        if command.contains(['\n', '\r']) {
            return Err(WorldError::invalid("Command must be a single line"));
        }

        let save = self.resolve(world)?;
        lock::gate(&save.path, self.confirmer.as_ref())?;
        let backup = self.maybe_snapshot(&save, None)?;

        let dir = save.path.join(COMMAND_DIR);
        fs::create_dir_all(&dir)?;
        let path = dir.join(COMMAND_FILE);
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file, "{}", command)?;

        info!("Queued command for {}: {}", save.name, command);
        Ok(MutationReport::new(path, 1, backup))
    }

    pub fn queue_summon(
        &self,
        world: &str,
        entity: &str,
        (x, y, z): (f64, f64, f64),
        nbt: Option<&str>,
    ) -> Result<MutationReport> {
        let command = summon_command(entity, x, y, z, nbt)?;
        self.queue_command(world, &command)
    }

    pub fn queue_kill(&self, world: &str, selector: &str) -> Result<MutationReport> {
        let command = kill_command(selector)?;
        self.queue_command(world, &command)
    }

    // ---- pipeline steps ----

    fn confirm_destructive(&self, message: &str) -> Result<()> {
        if self.confirmer.confirm(message) {
            Ok(())
        } else {
            Err(WorldError::aborted("Declined"))
        }
    }

    /// Snapshot per the policy. A snapshot taken in the same second as `keep`
    /// would merge into it, so that case waits for the next second.
    fn maybe_snapshot(&self, save: &SaveRef, keep: Option<&str>) -> Result<Option<BackupEntry>> {
        let wanted = match self.backup_policy {
            BackupPolicy::Never => false,
            BackupPolicy::Always => true,
            BackupPolicy::Ask => self.confirmer.confirm(BACKUP_PROMPT),
        };
        if !wanted {
            return Ok(None);
        }
        if let Some(keep) = keep {
            if backup::snapshot_name(Local::now()) == keep {
                debug!("Waiting for a snapshot name other than {}", keep);
                while backup::snapshot_name(Local::now()) == keep {
                    thread::sleep(Duration::from_millis(50));
                }
            }
        }
        backup::create_snapshot(&save.path, self.progress.as_ref()).map(Some)
    }

    fn edit_level<F>(&self, world: &str, mutate: F) -> Result<MutationReport>
    where
        F: FnOnce(&mut Compound) -> Result<usize>,
    {
        let save = self.resolve(world)?;
        lock::gate(&save.path, self.confirmer.as_ref())?;
        let level = save.level_path();
        self.edit_document(&save, &level, true, |root| mutate(root.compound_mut("Data")?))
    }

    fn edit_document<F>(&self, save: &SaveRef, path: &Path, check_version: bool, mutate: F) -> Result<MutationReport>
    where
        F: FnOnce(&mut Compound) -> Result<usize>,
    {
        let mut doc = codec::load(path)?;
        if check_version {
            let version = data_version(doc.root.compound("Data")?)?;
            ensure_supported(version)?;
        }

        let backup = self.maybe_snapshot(save, None)?;
        let affected = mutate(&mut doc.root)?;
        codec::save(path, &doc)?;

        info!("Wrote {} field(s) to {:?}", affected, path);
        Ok(MutationReport::new(path, affected, backup))
    }

    fn delete_files(&self, save: &SaveRef, files: Vec<PathBuf>, what: &str) -> Result<MutationReport> {
        lock::gate(&save.path, self.confirmer.as_ref())?;
        self.confirm_destructive(&format!(
            "Delete {} from world {}? This cannot be undone without a backup. [y/N]: ",
            what, save.name
        ))?;
        let backup = self.maybe_snapshot(save, None)?;

        for file in &files {
            fs::remove_file(file)?;
            debug!("Deleted {:?}", file);
        }
        info!("Deleted {} from {} ({} file(s))", what, save.name, files.len());

        let target = match files.as_slice() {
            [single] => single.clone(),
            _ => save.path.clone(),
        };
        Ok(MutationReport::new(target, files.len(), backup))
    }
}

fn player_ids(save: &SaveRef) -> Result<Vec<String>> {
    let dir = save.playerdata_dir();
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut ids = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some(stem) = name.strip_suffix(".dat") {
            ids.push(stem.to_string());
        }
    }
    ids.sort();
    Ok(ids)
}

/// Accepts `uuid` or `uuid.dat`; rejects anything that could leave `playerdata/`
fn player_id(raw: &str) -> Result<&str> {
    let id = raw.trim();
    let id = id.strip_suffix(".dat").unwrap_or(id);
    if id.is_empty() || id == "." || id.contains("..") || id.contains(['/', '\\']) {
        return Err(WorldError::invalid(format!("Invalid player id: {:?}", raw)));
    }
    Ok(id)
}

fn existing_player(save: &SaveRef, uuid: &str) -> Result<PathBuf> {
    let target = save.player_path(uuid);
    if !target.is_file() {
        return Err(WorldError::not_found(format!("Player file not found: {}", target.display())));
    }
    Ok(target)
}

/// Only the exact `r.<x>.<z>[.mca]` spelling of a region names it; `r.01.0` or
/// `r.+1.0` would otherwise parse onto a different existing file
fn region_coord(name: &str) -> Result<RegionCoord> {
    let not_found = || WorldError::not_found(format!("Region file not found: {}", name));
    let trimmed = name.trim();
    let coord: RegionCoord = trimmed.parse().map_err(|_| not_found())?;
    let file_name = if trimmed.ends_with(".mca") {
        trimmed.to_string()
    } else {
        format!("{}.mca", trimmed)
    };
    if file_name != coord.file_name() {
        return Err(not_found());
    }
    Ok(coord)
}

fn existing_region(dir: &Path, coord: RegionCoord, label: &str) -> Result<PathBuf> {
    let target = dir.join(coord.file_name());
    if !target.is_file() {
        return Err(WorldError::not_found(format!("{} file not found: {}", label, coord.file_name())));
    }
    Ok(target)
}

/// Builder for [`WorldManager`]
///
/// Defaults: platform saves root, [`StdinConfirmer`], no progress output,
/// [`BackupPolicy::Never`].
pub struct WorldManagerBuilder {
    saves_dir: Option<PathBuf>,
    confirmer: Option<Arc<dyn Confirmer>>,
    progress: Option<Arc<dyn ProgressSink>>,
    backup_policy: BackupPolicy,
}

impl Default for WorldManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldManagerBuilder {
    pub fn new() -> Self {
        Self {
            saves_dir: None,
            confirmer: None,
            progress: None,
            backup_policy: BackupPolicy::default(),
        }
    }

    /// Saves root used to resolve bare world names
    pub fn saves_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.saves_dir = Some(dir.into());
        self
    }

    pub fn maybe_saves_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.saves_dir = dir;
        self
    }

    /// Source of answers for lock, destructive and backup prompts
    pub fn confirmer(mut self, confirmer: impl Confirmer + 'static) -> Self {
        self.confirmer = Some(Arc::new(confirmer));
        self
    }

    pub fn progress(mut self, progress: impl ProgressSink + 'static) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }

    pub fn backup_policy(mut self, policy: BackupPolicy) -> Self {
        self.backup_policy = policy;
        self
    }

    pub fn build(self) -> WorldManager {
        WorldManager {
            saves_dir: self.saves_dir,
            confirmer: self.confirmer.unwrap_or_else(|| Arc::new(StdinConfirmer)),
            progress: self.progress.unwrap_or_else(|| Arc::new(NoProgress)),
            backup_policy: self.backup_policy,
        }
    }
}
