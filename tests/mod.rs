//! Main test module for worldvault
//!
//! This module includes all test suites:
//! - Integration tests for full edit and backup workflows
//! - Chaos tests for damaged saves
//! - Property-based tests for codec and snapshot invariants

pub mod integration;
pub mod property;

#[cfg(test)]
mod edge_cases {
    use ::worldvault::*;
    use std::fs;
    use tempfile::TempDir;

    fn minimal_world(root: &std::path::Path) {
        fs::create_dir_all(root).unwrap();
        let mut data = Compound::new();
        data.insert("DataVersion", 3700i32);
        let mut level = Compound::new();
        level.insert("Data", data);
        codec::save(&root.join(LEVEL_FILE), &Document::new(level)).unwrap();
    }

    fn manager(saves: &std::path::Path) -> WorldManager {
        WorldManager::builder().saves_dir(saves).confirmer(AssumeYes).build()
    }

    #[test]
    fn test_bare_world_defaults() {
        let saves = TempDir::new().unwrap();
        minimal_world(&saves.path().join("Bare"));
        let manager = manager(saves.path());

        // No players, regions or entities folders at all
        let info = manager.inspect("Bare").unwrap();
        assert_eq!(info.level_name, "Bare");
        assert_eq!(info.player_count, 0);
        assert_eq!(info.region_count, 0);
        assert!(info.difficulty.is_none());
        assert!(manager.list_players("Bare").unwrap().is_empty());
        assert!(manager.list_entity_regions("Bare").unwrap().is_empty());

        let report = manager.delete_all_entity_regions("Bare").unwrap();
        assert_eq!(report.affected, 0);
    }

    #[test]
    fn test_unicode_world_names() {
        let saves = TempDir::new().unwrap();
        let names = ["Мир", "世界", "ワールド", "🚀 base"];

        let mut created = Vec::new();
        for name in names {
            let path = saves.path().join(name);
            if fs::create_dir_all(&path).is_err() {
                // Skip names the filesystem refuses
                continue;
            }
            minimal_world(&path);
            created.push(name);
        }

        let manager = manager(saves.path());
        for name in &created {
            manager.set_gamerule(name, "doWeatherCycle", "false").unwrap();
            let entry = manager.create_backup(name).unwrap();
            assert!(entry.path.join(LEVEL_FILE).exists());
        }
        assert_eq!(manager.list_worlds().unwrap().len(), created.len());
    }

    #[test]
    fn test_world_by_absolute_path_outside_saves() {
        let saves = TempDir::new().unwrap();
        let elsewhere = TempDir::new().unwrap();
        let world = elsewhere.path().join("Portable");
        minimal_world(&world);

        let manager = manager(saves.path());
        let report = manager.set_gamerule(world.to_str().unwrap(), "keepInventory", "true").unwrap();
        assert_eq!(report.target, world.canonicalize().unwrap().join(LEVEL_FILE));
        assert!(manager.list_worlds().unwrap().is_empty());
    }

    #[test]
    fn test_directory_without_level_is_not_a_world() {
        let saves = TempDir::new().unwrap();
        fs::create_dir_all(saves.path().join("screenshots")).unwrap();
        fs::write(saves.path().join("notes.txt"), "hi").unwrap();

        let manager = manager(saves.path());
        assert!(manager.list_worlds().unwrap().is_empty());
        assert_eq!(manager.inspect("screenshots").unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(manager.inspect("").unwrap_err().kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_traversal_names_are_rejected() {
        let saves = TempDir::new().unwrap();
        minimal_world(&saves.path().join("Safe"));
        let manager = manager(saves.path());

        for bad in ["../Safe", "a/b", ".."] {
            assert!(manager.delete_player("Safe", bad).is_err(), "{}", bad);
        }
        for bad in ["../level.dat", "r.0.0.mca/..", "level.dat"] {
            assert_eq!(manager.delete_region("Safe", bad).unwrap_err().kind(), ErrorKind::NotFound);
        }
        assert!(saves.path().join("Safe").join(LEVEL_FILE).exists());
    }

    #[test]
    fn test_snapshot_of_empty_save() {
        let saves = TempDir::new().unwrap();
        let world = saves.path().join("Empty");
        fs::create_dir_all(&world).unwrap();

        let entry = backup::create_snapshot(&world, &NoProgress).unwrap();
        fs::write(world.join("later.txt"), "added").unwrap();

        let report = backup::restore_snapshot(&world, &entry.name, &NoProgress).unwrap();
        assert_eq!(report.files_restored, 0);
        assert_eq!(report.entries_removed, 1);
        assert!(!world.join("later.txt").exists());
    }

    #[test]
    fn test_permission_preservation() {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let saves = TempDir::new().unwrap();
            let world = saves.path().join("Perms");
            minimal_world(&world);
            let script = world.join("start.sh");
            fs::write(&script, "#!/bin/sh\n").unwrap();
            fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
            fs::set_permissions(world.join(LEVEL_FILE), fs::Permissions::from_mode(0o640)).unwrap();

            let manager = manager(saves.path());
            let entry = manager.create_backup("Perms").unwrap();
            manager.set_gamerule("Perms", "keepInventory", "true").unwrap();

            let mode = |p: &std::path::Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode(&entry.path.join("start.sh")), 0o755);
            assert_eq!(mode(&world.join(LEVEL_FILE)), 0o640);
        }
    }
}
