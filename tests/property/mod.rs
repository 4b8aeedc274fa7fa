//! Property-based testing for worldvault
//!
//! Uses proptest to check the tag codec, region mapping and the
//! snapshot/restore cycle across generated inputs.

use ::worldvault::*;
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Leaf tags of every scalar and array kind
fn leaf_strategy() -> impl Strategy<Value = Tag> {
    prop_oneof![
        any::<i8>().prop_map(Tag::Byte),
        any::<i16>().prop_map(Tag::Short),
        any::<i32>().prop_map(Tag::Int),
        any::<i64>().prop_map(Tag::Long),
        // NaN never compares equal, so stay finite
        (-1.0e6f32..1.0e6).prop_map(Tag::Float),
        (-1.0e12f64..1.0e12).prop_map(Tag::Double),
        "\\PC{0,24}".prop_map(Tag::String),
        prop::collection::vec(any::<i8>(), 0..32).prop_map(Tag::ByteArray),
        prop::collection::vec(any::<i32>(), 0..16).prop_map(Tag::IntArray),
        prop::collection::vec(any::<i64>(), 0..8).prop_map(Tag::LongArray),
    ]
}

/// Arbitrary tag trees a few levels deep
fn tag_strategy() -> impl Strategy<Value = Tag> {
    leaf_strategy().prop_recursive(4, 64, 6, |inner| {
        prop_oneof![
            prop::collection::vec(any::<i32>(), 0..6)
                .prop_map(|v| Tag::List(v.into_iter().map(Tag::Int).collect())),
            prop::collection::vec(inner.clone(), 0..2).prop_map(Tag::List),
            prop::collection::vec(("[A-Za-z_]{1,10}", inner), 0..6)
                .prop_map(|fields| Tag::Compound(fields.into_iter().collect())),
        ]
    })
}

fn compound_strategy() -> impl Strategy<Value = Compound> {
    prop::collection::vec(("[A-Za-z_][A-Za-z0-9_]{0,12}", tag_strategy()), 0..10)
        .prop_map(|fields| fields.into_iter().collect())
}

/// Relative file paths inside a save
fn save_path_strategy() -> impl Strategy<Value = PathBuf> {
    let dirs = prop::collection::vec(
        prop_oneof![
            Just("region".to_string()),
            Just("playerdata".to_string()),
            Just("data".to_string()),
            "[a-z]{1,8}",
        ],
        0..=3,
    );
    let file = prop_oneof!["[a-z]{1,8}\\.(dat|mca|json)", "[a-z]{3,10}"];
    (dirs, file).prop_map(|(dirs, file)| {
        let mut path: PathBuf = dirs.into_iter().collect();
        path.push(file);
        path
    })
}

fn tree_strategy() -> impl Strategy<Value = BTreeMap<PathBuf, Vec<u8>>> {
    prop::collection::btree_map(save_path_strategy(), prop::collection::vec(any::<u8>(), 0..512), 1..24)
}

/// Write files, skipping any whose path collides with an existing file
/// or directory
fn write_tree(root: &Path, files: &BTreeMap<PathBuf, Vec<u8>>) -> BTreeMap<PathBuf, Vec<u8>> {
    let mut written = BTreeMap::new();
    for (rel, content) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            if fs::create_dir_all(parent).is_err() {
                continue;
            }
        }
        if path.is_dir() || fs::write(&path, content).is_err() {
            continue;
        }
        written.insert(rel.clone(), content.clone());
    }
    written
}

fn read_tree(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    backup::collect_files(root)
        .unwrap()
        .into_iter()
        .map(|rel| {
            let bytes = fs::read(root.join(&rel)).unwrap();
            (rel, bytes)
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Encoding then decoding a document gives back the same tree, key order included
    #[test]
    fn document_codec_identity(root in compound_strategy(), name in "[a-z]{0,8}") {
        let doc = Document { name, root, encoding: Encoding::Uncompressed };
        let bytes = nbt::encode(&doc).unwrap();
        let decoded = nbt::decode(&bytes).unwrap();
        prop_assert_eq!(decoded, doc);
    }

    /// Every compression choice reads back to the same document
    #[test]
    fn compressed_document_identity(root in compound_strategy(), pick in 0..3usize) {
        let encoding = [Encoding::Gzip, Encoding::Zlib, Encoding::Uncompressed][pick];
        let doc = Document::new(root).with_encoding(encoding);
        let bytes = codec::to_bytes(&doc).unwrap();
        prop_assert_eq!(codec::detect_encoding(&bytes), encoding);
        prop_assert_eq!(codec::from_bytes(&bytes).unwrap(), doc);
    }

    /// Truncating an encoded document is always reported, never a panic
    #[test]
    fn truncated_documents_are_rejected(root in compound_strategy(), cut in 0.0f64..1.0) {
        let bytes = nbt::encode(&Document::new(root).with_encoding(Encoding::Uncompressed)).unwrap();
        let keep = ((bytes.len() - 1) as f64 * cut) as usize;
        prop_assert!(nbt::decode(&bytes[..keep]).is_err());
    }

    /// Random bytes either decode or fail cleanly
    #[test]
    fn arbitrary_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = nbt::decode(&bytes);
        let _ = codec::from_bytes(&bytes);
    }

    /// A chunk maps to the region given by floor division by 32
    #[test]
    fn chunk_to_region_is_floor_division(cx in any::<i32>(), cz in any::<i32>()) {
        let coord = RegionCoord::for_chunk(cx, cz);
        prop_assert_eq!(coord.x as i64, (cx as f64 / 32.0).floor() as i64);
        prop_assert_eq!(coord.z as i64, (cz as f64 / 32.0).floor() as i64);
        prop_assert!(coord.x * 32 <= cx && cx - coord.x * 32 < 32);
    }

    /// Region names parse back to the same coordinates
    #[test]
    fn region_names_parse_back(x in any::<i32>(), z in any::<i32>()) {
        let coord = RegionCoord::new(x, z);
        prop_assert_eq!(coord.file_name().parse::<RegionCoord>().unwrap(), coord);
        prop_assert_eq!(coord.to_string().parse::<RegionCoord>().unwrap(), coord);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Restoring a snapshot reproduces the tree as it was when taken
    #[test]
    fn snapshot_restore_identity(original in tree_strategy(), changes in tree_strategy()) {
        let temp_dir = TempDir::new().unwrap();
        let save = temp_dir.path();
        let expected = write_tree(save, &original);
        prop_assume!(!expected.is_empty());

        let entry = backup::create_snapshot(save, &NoProgress).unwrap();
        prop_assert_eq!(read_tree(&entry.path), expected.clone());

        write_tree(save, &changes);
        let report = backup::restore_snapshot(save, &entry.name, &NoProgress).unwrap();

        prop_assert_eq!(report.files_restored, expected.len());
        prop_assert_eq!(read_tree(save), expected);
        prop_assert_eq!(backup::list_snapshots(save).unwrap().len(), 1);
    }

    /// Snapshots never contain the backup folder itself
    #[test]
    fn snapshot_never_nests(files in tree_strategy(), rounds in 1..4usize) {
        let temp_dir = TempDir::new().unwrap();
        let save = temp_dir.path();
        write_tree(save, &files);

        for _ in 0..rounds {
            let entry = backup::create_snapshot(save, &NoProgress).unwrap();
            prop_assert!(!entry.path.join(BACKUP_DIR_NAME).exists());
        }
    }
}
