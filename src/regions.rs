//! Region addressing
//!
//! Terrain and entity storage is split into region files of 32x32 chunks
//! named `r.<x>.<z>.mca`. Region files are opaque here: they are listed and
//! deleted whole, never parsed.

use crate::error::{Result, WorldError};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Chunks per region along each axis
pub const CHUNKS_PER_REGION: i32 = 32;
/// Extension of region files
pub const REGION_EXTENSION: &str = "mca";

/// Integer coordinates of one region file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionCoord {
    pub x: i32,
    pub z: i32,
}

impl RegionCoord {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Region owning chunk `(cx, cz)`, rounding toward negative infinity
    ///
    /// ```rust
    /// use worldvault::regions::RegionCoord;
    ///
    /// assert_eq!(RegionCoord::for_chunk(-1, 31), RegionCoord::new(-1, 0));
    /// assert_eq!(RegionCoord::for_chunk(-33, 32).to_string(), "r.-2.1");
    /// ```
    pub fn for_chunk(cx: i32, cz: i32) -> Self {
        Self {
            x: cx.div_euclid(CHUNKS_PER_REGION),
            z: cz.div_euclid(CHUNKS_PER_REGION),
        }
    }

    /// `r.<x>.<z>.mca`
    pub fn file_name(&self) -> String {
        format!("{}.{}", self, REGION_EXTENSION)
    }
}

impl fmt::Display for RegionCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r.{}.{}", self.x, self.z)
    }
}

impl FromStr for RegionCoord {
    type Err = WorldError;

    /// Parses `r.<x>.<z>.mca`; the `.mca` suffix is optional
    fn from_str(s: &str) -> Result<Self> {
        let bad = || WorldError::invalid(format!("not a region file name: {:?}", s));
        let stem = s
            .strip_suffix(".mca")
            .unwrap_or(s)
            .strip_prefix("r.")
            .ok_or_else(bad)?;
        let (x, z) = stem.split_once('.').ok_or_else(bad)?;
        Ok(Self {
            x: x.parse().map_err(|_| bad())?,
            z: z.parse().map_err(|_| bad())?,
        })
    }
}

/// Region files directly inside `dir`, sorted by file name
///
/// A missing directory has no regions.
pub fn list_region_files(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(".mca") && name.parse::<RegionCoord>().is_ok() {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}
