//! Integration tests for worldvault
//!
//! Builds realistic save folders (level document, players, terrain and
//! entity regions, extra data) and drives them through the public API.

use ::worldvault::edits::{AdvancedEdit, Difficulty, GameMode, MetadataEdit, PlayerEdit};
use ::worldvault::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::info;

/// A saves folder holding generated worlds
pub struct WorldFixture {
    pub saves_dir: TempDir,
    pub generator: SaveGenerator,
}

/// Shape of a generated world
#[derive(Debug, Clone)]
pub struct WorldConfig {
    pub players: usize,
    pub regions: usize,
    pub entity_regions: usize,
    pub data_files: usize,
    pub region_size: std::ops::Range<usize>,
    pub data_version: i32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            players: 2,
            regions: 4,
            entity_regions: 2,
            data_files: 3,
            region_size: 512..4096,
            data_version: 3700,
        }
    }
}

impl WorldFixture {
    pub fn new() -> Self {
        Self {
            saves_dir: TempDir::new().unwrap(),
            generator: SaveGenerator::new(42),
        }
    }

    pub fn saves(&self) -> &Path {
        self.saves_dir.path()
    }

    /// Manager that answers yes to every prompt
    pub fn manager(&self) -> WorldManager {
        self.manager_with(AssumeYes, BackupPolicy::Never)
    }

    pub fn manager_with(&self, confirmer: impl Confirmer + 'static, policy: BackupPolicy) -> WorldManager {
        WorldManager::builder()
            .saves_dir(self.saves())
            .confirmer(confirmer)
            .backup_policy(policy)
            .build()
    }

    /// Generate a world folder and return its path
    pub fn create_world(&mut self, name: &str, config: WorldConfig) -> PathBuf {
        let world = self.saves().join(name);
        self.generator.populate(&world, name, &config).unwrap();
        world
    }

    /// Every regular file under `root` (outside the backup folder) with its bytes
    pub fn snapshot_tree(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
        backup::collect_files(root)
            .unwrap()
            .into_iter()
            .map(|rel| {
                let bytes = fs::read(root.join(&rel)).unwrap();
                (rel, bytes)
            })
            .collect()
    }

    /// Order-independent fingerprint of a tree: hex SHA-256 over sorted paths and contents
    pub fn tree_digest(root: &Path) -> String {
        let mut hasher = Sha256::new();
        for (rel, bytes) in Self::snapshot_tree(root) {
            hasher.update(rel.to_string_lossy().as_bytes());
            hasher.update([0u8]);
            hasher.update(&bytes);
        }
        hex::encode(hasher.finalize())
    }
}

/// Deterministic content for generated saves
pub struct SaveGenerator {
    pub rng: StdRng,
}

impl SaveGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn bytes(&mut self, size: std::ops::Range<usize>) -> Vec<u8> {
        let len = self.rng.random_range(size);
        (0..len).map(|_| self.rng.random()).collect()
    }

    pub fn level(&mut self, name: &str, data_version: i32) -> Document {
        let mut rules = Compound::new();
        rules.insert("keepInventory", "false");
        rules.insert("doDaylightCycle", "true");

        let mut data = Compound::new();
        data.insert("DataVersion", data_version);
        data.insert("LevelName", name);
        data.insert("Difficulty", Tag::Byte(Difficulty::Normal.id() as i8));
        data.insert("GameType", GameMode::Survival.id());
        data.insert("Time", self.rng.random_range(0..1_000_000i64));
        data.insert("DayTime", 1000i64);
        data.insert("SpawnX", self.rng.random_range(-500..500i32));
        data.insert("SpawnY", 64i32);
        data.insert("SpawnZ", self.rng.random_range(-500..500i32));
        data.insert("GameRules", rules);

        let mut root = Compound::new();
        root.insert("Data", data);
        Document::new(root)
    }

    pub fn player(&mut self) -> Document {
        let mut player = Compound::new();
        player.insert("Health", 20.0f32);
        player.insert("foodLevel", 20i32);
        player.insert("SelectedItemSlot", 0i32);
        player.insert(
            "Pos",
            vec![
                Tag::Double(self.rng.random_range(-100.0..100.0)),
                Tag::Double(64.0),
                Tag::Double(self.rng.random_range(-100.0..100.0)),
            ],
        );
        Document::new(player)
    }

    pub fn populate(&mut self, world: &Path, name: &str, config: &WorldConfig) -> anyhow::Result<()> {
        fs::create_dir_all(world.join("playerdata"))?;
        fs::create_dir_all(world.join("region"))?;
        fs::create_dir_all(world.join("entities"))?;
        fs::create_dir_all(world.join("data"))?;

        codec::save(&world.join(LEVEL_FILE), &self.level(name, config.data_version))?;

        for i in 0..config.players {
            let doc = self.player();
            codec::save(&world.join("playerdata").join(format!("player-{}.dat", i)), &doc)?;
        }
        for i in 0..config.regions {
            let coord = RegionCoord::new(i as i32 - 1, -(i as i32));
            fs::write(world.join("region").join(coord.file_name()), self.bytes(config.region_size.clone()))?;
        }
        for i in 0..config.entity_regions {
            let coord = RegionCoord::new(i as i32, 0);
            fs::write(world.join("entities").join(coord.file_name()), self.bytes(config.region_size.clone()))?;
        }
        for i in 0..config.data_files {
            fs::write(world.join("data").join(format!("map_{}.dat", i)), self.bytes(16..256))?;
        }
        info!("Generated world {} at {:?}", name, world);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_inspect_generated_world() {
        let mut fixture = WorldFixture::new();
        fixture.create_world("Survival", WorldConfig::default());
        let manager = fixture.manager();

        let info = manager.inspect("Survival").unwrap();
        assert_eq!(info.level_name, "Survival");
        assert_eq!(info.data_version, 3700);
        assert_eq!(info.difficulty.as_deref(), Some("normal"));
        assert_eq!(info.game_mode.as_deref(), Some("survival"));
        assert_eq!(info.gamerule_count, 2);
        assert_eq!(info.player_count, 2);
        assert_eq!(info.region_count, 4);
        assert_eq!(info.entity_region_count, 2);
        assert_eq!(info.backup_count, 0);
    }

    #[test]
    fn test_snapshot_restore_restores_exact_tree() {
        let mut fixture = WorldFixture::new();
        let world = fixture.create_world(
            "Big",
            WorldConfig {
                players: 5,
                regions: 12,
                ..Default::default()
            },
        );
        let manager = fixture.manager();
        let before = WorldFixture::snapshot_tree(&world);

        let snapshot = manager.create_backup("Big").unwrap();

        manager.delete_region("Big", "r.0.-1.mca").unwrap();
        manager.delete_player("Big", "player-3").unwrap();
        manager.set_gamerule("Big", "keepInventory", "true").unwrap();
        fs::write(world.join("stray.txt"), "left behind").unwrap();
        assert_ne!(WorldFixture::snapshot_tree(&world), before);

        let report = manager.restore_backup("Big", &snapshot.name).unwrap();
        assert_eq!(report.files_restored, before.len());
        assert_eq!(WorldFixture::snapshot_tree(&world), before);
        assert!(!world.join("stray.txt").exists());

        // The snapshot itself survives its own restore
        assert_eq!(manager.list_backups("Big").unwrap(), vec![snapshot]);
    }

    #[test]
    fn test_backup_always_snapshots_every_write() {
        let mut fixture = WorldFixture::new();
        let world = fixture.create_world("Careful", WorldConfig::default());
        let before = WorldFixture::tree_digest(&world);
        let manager = fixture.manager_with(AssumeYes, BackupPolicy::Always);

        let report = manager
            .set_metadata(
                "Careful",
                &MetadataEdit {
                    difficulty: Some(Difficulty::Hard),
                    ..Default::default()
                },
            )
            .unwrap();

        let backup = report.backup.expect("snapshot taken before the edit");
        assert_eq!(WorldFixture::tree_digest(&backup.path), before);
        assert_ne!(WorldFixture::tree_digest(&world), before);
    }

    #[test]
    fn test_backup_ask_respects_answer() {
        let mut fixture = WorldFixture::new();
        fixture.create_world("Asked", WorldConfig::default());
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&prompts);
        let manager = fixture.manager_with(
            move |msg: &str| {
                seen.lock().push(msg.to_string());
                false
            },
            BackupPolicy::Ask,
        );

        let report = manager.set_gamerule("Asked", "doFireTick", "false").unwrap();
        assert!(report.backup.is_none());
        assert_eq!(prompts.lock().len(), 1);
        assert!(manager.list_backups("Asked").unwrap().is_empty());
    }

    #[test]
    fn test_locked_world_declined_is_untouched() {
        let mut fixture = WorldFixture::new();
        let world = fixture.create_world("Open", WorldConfig::default());
        fs::write(world.join("session.lock"), b"\xe2\x98\x83").unwrap();
        let before = WorldFixture::snapshot_tree(&world);
        let manager = fixture.manager_with(AssumeNo, BackupPolicy::Always);

        let err = manager
            .set_advanced(
                "Open",
                &AdvancedEdit {
                    time: Some(0),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(err.is_user_abort());
        assert_eq!(WorldFixture::snapshot_tree(&world), before);
        assert!(!world.join(BACKUP_DIR_NAME).exists());
    }

    #[test]
    fn test_outdated_world_is_rejected_before_writing() {
        let mut fixture = WorldFixture::new();
        let world = fixture.create_world(
            "Old",
            WorldConfig {
                data_version: 1343,
                ..Default::default()
            },
        );
        let before = WorldFixture::snapshot_tree(&world);
        let manager = fixture.manager_with(AssumeYes, BackupPolicy::Always);

        let err = manager.set_gamerule("Old", "keepInventory", "true").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedVersion);
        assert_eq!(WorldFixture::snapshot_tree(&world), before);
        assert!(manager.list_backups("Old").unwrap().is_empty());
    }

    #[test]
    fn test_player_edits_round_trip() {
        let mut fixture = WorldFixture::new();
        let world = fixture.create_world("Players", WorldConfig::default());
        let manager = fixture.manager();

        manager
            .set_player(
                "Players",
                "player-0",
                &PlayerEdit {
                    y: Some(-12.5),
                    hunger: Some(3),
                    selected_slot: Some(8),
                    ..Default::default()
                },
            )
            .unwrap();
        manager.kill_player("Players", "player-1").unwrap();

        let p0 = codec::load(&world.join("playerdata").join("player-0.dat")).unwrap();
        assert_eq!(p0.root.list("Pos").unwrap()[1], Tag::Double(-12.5));
        assert_eq!(p0.root.i32("foodLevel").unwrap(), 3);
        assert_eq!(p0.root.i32("SelectedItemSlot").unwrap(), 8);

        let p1 = manager.load_player("Players", "player-1.dat").unwrap();
        assert_eq!(p1.root.get("Health"), Some(&Tag::Float(0.0)));
    }

    #[test]
    fn test_chunk_reset_targets_owning_region() {
        let mut fixture = WorldFixture::new();
        fixture.create_world("Terrain", WorldConfig::default());
        let manager = fixture.manager();

        // Chunk (31, -1) lives in r.0.-1
        manager.reset_chunk("Terrain", 31, -1).unwrap();
        let regions = manager.list_regions("Terrain").unwrap();
        assert_eq!(regions.len(), 3);
        assert!(!regions.contains(&"r.0.-1.mca".to_string()));

        let err = manager.reset_chunk("Terrain", 10_000, 10_000).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_entity_cleanup_and_command_queue() {
        let mut fixture = WorldFixture::new();
        let world = fixture.create_world("Mobs", WorldConfig::default());
        let manager = fixture.manager();

        let report = manager.delete_all_entity_regions("Mobs").unwrap();
        assert_eq!(report.affected, 2);
        assert!(manager.list_entity_regions("Mobs").unwrap().is_empty());

        manager
            .queue_summon("Mobs", "minecraft:zombie", (1.0, 64.0, -3.5), Some("{NoAI:1b}"))
            .unwrap();
        manager.queue_kill("Mobs", "@e[type=minecraft:zombie]").unwrap();

        let queued = fs::read_to_string(
            world
                .join(manager::COMMAND_DIR)
                .join(manager::COMMAND_FILE),
        )
        .unwrap();
        let lines: Vec<&str> = queued.lines().collect();
        assert_eq!(
            lines,
            vec![
                "summon minecraft:zombie 1.0 64.0 -3.5 {NoAI:1b}",
                "kill @e[type=minecraft:zombie]",
            ]
        );
    }

    #[test]
    fn test_background_backup_reports_every_file() {
        let mut fixture = WorldFixture::new();
        let world = fixture.create_world("Bg", WorldConfig::default());
        let expected = WorldFixture::snapshot_tree(&world).len();
        let manager = fixture.manager();

        let mut task = manager.spawn(|m| m.create_backup("Bg")).unwrap();
        let mut events = Vec::new();
        while !task.is_finished() {
            events.extend(task.drain());
            std::thread::yield_now();
        }
        events.extend(task.drain());
        let entry = task.join().unwrap();

        assert_eq!(events.len(), expected);
        assert!(events.iter().all(|e| e.total == expected));
        assert_eq!(events.last().map(|e| e.completed), Some(expected));
        assert!(entry.path.join(LEVEL_FILE).exists());
    }
}
