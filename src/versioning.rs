//! Document schema version floor

use crate::error::{Result, WorldError};
use crate::nbt::Compound;

/// Oldest `DataVersion` this crate writes to
pub const MIN_DATA_VERSION: i32 = 3465;

/// Fail with [`WorldError::UnsupportedVersion`] below [`MIN_DATA_VERSION`]
pub fn ensure_supported(version: i32) -> Result<()> {
    if version < MIN_DATA_VERSION {
        return Err(WorldError::UnsupportedVersion {
            found: version,
            minimum: MIN_DATA_VERSION,
        });
    }
    Ok(())
}

/// `DataVersion` of a level document's `Data` mapping (0 when absent)
pub fn data_version(data: &Compound) -> Result<i32> {
    data.i32_or("DataVersion", 0)
}
