//! Configuration
//!
//! Settings come from three layers, later ones winning: an optional JSON
//! file, `WORLDVAULT_*` environment variables, then command-line flags
//! (applied by the binary).
//!
//! ```json
//! {
//!   "saves_dir": "~/games/minecraft/saves",
//!   "backup_policy": "always",
//!   "assume_yes": false
//! }
//! ```

use crate::error::{Result, WorldError};
use crate::lock::AssumeYes;
use crate::manager::{BackupPolicy, WorldManagerBuilder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const ENV_SAVES_DIR: &str = "WORLDVAULT_SAVES_DIR";
pub const ENV_BACKUP: &str = "WORLDVAULT_BACKUP";
pub const ENV_ASSUME_YES: &str = "WORLDVAULT_ASSUME_YES";

/// User settings for a [`crate::WorldManager`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Saves root override; `~` is expanded
    pub saves_dir: Option<PathBuf>,
    pub backup_policy: BackupPolicy,
    /// Answer yes to every prompt
    pub assume_yes: bool,
}

impl Config {
    /// Read a JSON config file; missing keys take their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config = serde_json::from_str(&text)?;
        debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Overlay the `WORLDVAULT_*` environment variables
    pub fn apply_env(self) -> Result<Self> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    pub(crate) fn apply_vars<F>(mut self, var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = var(ENV_SAVES_DIR).filter(|v| !v.trim().is_empty()) {
            self.saves_dir = Some(PathBuf::from(dir));
        }
        if let Some(policy) = var(ENV_BACKUP).filter(|v| !v.trim().is_empty()) {
            self.backup_policy = policy.parse()?;
        }
        if let Some(flag) = var(ENV_ASSUME_YES) {
            self.assume_yes = parse_flag(ENV_ASSUME_YES, &flag)?;
        }
        Ok(self)
    }

    /// Builder preloaded with these settings
    ///
    /// The confirmer is only set when `assume_yes` is on; otherwise the
    /// builder default (standard input) applies.
    pub fn manager_builder(&self) -> WorldManagerBuilder {
        let builder = WorldManagerBuilder::new()
            .maybe_saves_dir(self.saves_dir.clone())
            .backup_policy(self.backup_policy);
        if self.assume_yes {
            builder.confirmer(AssumeYes)
        } else {
            builder
        }
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => Err(WorldError::invalid(format!("{} must be true or false, got {:?}", name, other))),
    }
}
