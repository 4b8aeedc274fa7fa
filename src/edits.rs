//! Field edits applied to level and player documents
//!
//! Each edit type collects optional field changes, validates them before any
//! I/O happens and applies them to an already loaded compound. Applying
//! returns how many fields were written.

use crate::error::{Result, WorldError};
use crate::nbt::{Compound, Tag};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Weather duration in ticks used when none is given
pub const DEFAULT_WEATHER_DURATION: i32 = 6000;

macro_rules! named_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $id:expr => $text:literal),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),*
        }

        impl $name {
            /// Numeric id stored in the document
            pub fn id(self) -> i32 {
                match self {
                    $($name::$variant => $id),*
                }
            }

            pub fn from_id(id: i64) -> Option<Self> {
                match id {
                    $(x if x == $id => Some($name::$variant),)*
                    _ => None,
                }
            }

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),*
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = WorldError;

            fn from_str(s: &str) -> Result<Self> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($name::$variant),)*
                    _ => Err(WorldError::invalid(format!(
                        concat!(stringify!($name), " must be one of: {}"),
                        [$($text),*].join(", ")
                    ))),
                }
            }
        }
    };
}

named_enum!(
    /// World difficulty, stored as a byte
    Difficulty {
        Peaceful = 0 => "peaceful",
        Easy = 1 => "easy",
        Normal = 2 => "normal",
        Hard = 3 => "hard",
    }
);

named_enum!(
    /// Default game mode, stored as an int
    GameMode {
        Survival = 0 => "survival",
        Creative = 1 => "creative",
        Adventure = 2 => "adventure",
        Spectator = 3 => "spectator",
    }
);

named_enum!(
    /// Weather state
    Weather {
        Clear = 0 => "clear",
        Rain = 1 => "rain",
        Thunder = 2 => "thunder",
    }
);

/// Name, difficulty and game mode of a world
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataEdit {
    pub name: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub game_mode: Option<GameMode>,
}

impl MetadataEdit {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.difficulty.is_none() && self.game_mode.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(WorldError::invalid(
                "Provide at least one change: name, difficulty, or game mode",
            ));
        }
        Ok(())
    }

    /// Write the requested fields into a level `Data` compound
    pub fn apply(&self, data: &mut Compound) -> usize {
        let mut changed = 0;
        if let Some(name) = &self.name {
            data.insert("LevelName", name.as_str());
            changed += 1;
        }
        if let Some(difficulty) = self.difficulty {
            data.insert("Difficulty", difficulty.id() as i8);
            changed += 1;
        }
        if let Some(mode) = self.game_mode {
            data.insert("GameType", mode.id());
            changed += 1;
        }
        changed
    }
}

/// Time, weather, spawn, border, flags and seed of a world
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvancedEdit {
    pub time: Option<i64>,
    pub weather: Option<Weather>,
    /// Ticks the weather lasts; only meaningful together with `weather`
    pub weather_duration: Option<i32>,
    pub spawn_x: Option<i32>,
    pub spawn_y: Option<i32>,
    pub spawn_z: Option<i32>,
    pub border_center_x: Option<f64>,
    pub border_center_z: Option<f64>,
    pub border_size: Option<f64>,
    pub hardcore: Option<bool>,
    pub allow_commands: Option<bool>,
    pub seed: Option<i64>,
}

impl AdvancedEdit {
    pub fn is_empty(&self) -> bool {
        self.time.is_none()
            && self.weather.is_none()
            && self.weather_duration.is_none()
            && self.spawn_x.is_none()
            && self.spawn_y.is_none()
            && self.spawn_z.is_none()
            && self.border_center_x.is_none()
            && self.border_center_z.is_none()
            && self.border_size.is_none()
            && self.hardcore.is_none()
            && self.allow_commands.is_none()
            && self.seed.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(WorldError::invalid("No advanced world fields provided to update"));
        }
        if self.weather_duration.is_some() && self.weather.is_none() {
            return Err(WorldError::invalid("A weather duration needs a weather to apply to"));
        }
        if matches!(self.weather_duration, Some(d) if d < 0) {
            return Err(WorldError::invalid("Weather duration cannot be negative"));
        }
        if matches!(self.border_size, Some(s) if !s.is_finite() || s <= 0.0) {
            return Err(WorldError::invalid("Border size must be a positive number"));
        }
        Ok(())
    }

    pub fn apply(&self, data: &mut Compound) -> usize {
        let mut changed = 0;

        if let Some(time) = self.time {
            data.insert("Time", time);
            data.insert("DayTime", time);
            changed += 2;
        }

        if let Some(weather) = self.weather {
            let duration = self.weather_duration.unwrap_or(DEFAULT_WEATHER_DURATION);
            let (raining, thundering, clear, rain, thunder) = match weather {
                Weather::Clear => (false, false, duration, 0, 0),
                Weather::Rain => (true, false, 0, duration, 0),
                Weather::Thunder => (true, true, 0, duration, duration),
            };
            data.insert("raining", Tag::boolean(raining));
            data.insert("thundering", Tag::boolean(thundering));
            data.insert("clearWeatherTime", clear);
            data.insert("rainTime", rain);
            data.insert("thunderTime", thunder);
            changed += 5;
        }

        for (key, value) in [
            ("SpawnX", self.spawn_x),
            ("SpawnY", self.spawn_y),
            ("SpawnZ", self.spawn_z),
        ] {
            if let Some(v) = value {
                data.insert(key, v);
                changed += 1;
            }
        }

        for (key, value) in [
            ("BorderCenterX", self.border_center_x),
            ("BorderCenterZ", self.border_center_z),
            ("BorderSize", self.border_size),
        ] {
            if let Some(v) = value {
                data.insert(key, v);
                changed += 1;
            }
        }

        if let Some(hardcore) = self.hardcore {
            data.insert("hardcore", Tag::boolean(hardcore));
            changed += 1;
        }
        if let Some(allow) = self.allow_commands {
            data.insert("allowCommands", Tag::boolean(allow));
            changed += 1;
        }

        if let Some(seed) = self.seed {
            match data.get_mut("WorldGenSettings").and_then(Tag::as_compound_mut) {
                Some(settings) => {
                    settings.insert("seed", seed);
                }
                None => {
                    data.insert("RandomSeed", seed);
                }
            }
            changed += 1;
        }

        changed
    }
}

/// One game rule assignment; rule values are always stored as strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameruleEdit {
    pub rule: String,
    pub value: String,
}

impl GameruleEdit {
    pub fn new(rule: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            value: value.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.rule.trim().is_empty() {
            return Err(WorldError::invalid("Game rule name is empty"));
        }
        if self.value.trim().is_empty() {
            return Err(WorldError::invalid(format!("No value given for game rule {}", self.rule)));
        }
        Ok(())
    }

    /// Set `GameRules.<rule>`, creating `GameRules` when absent
    pub fn apply(&self, data: &mut Compound) -> Result<usize> {
        data.entry_compound("GameRules")?
            .insert(self.rule.as_str(), self.value.as_str());
        Ok(1)
    }
}

/// Position and survival stats of a player
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerEdit {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub health: Option<f32>,
    pub hunger: Option<i32>,
    pub selected_slot: Option<i32>,
}

impl PlayerEdit {
    /// Edit that only sets health to zero
    pub fn kill() -> Self {
        Self {
            health: Some(0.0),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_none()
            && self.y.is_none()
            && self.z.is_none()
            && self.health.is_none()
            && self.hunger.is_none()
            && self.selected_slot.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(WorldError::invalid("No player fields provided to update"));
        }
        if [self.x, self.y, self.z].iter().flatten().any(|v| !v.is_finite()) {
            return Err(WorldError::invalid("Player coordinates must be finite numbers"));
        }
        if matches!(self.health, Some(h) if !h.is_finite() || h < 0.0) {
            return Err(WorldError::invalid("Health must be zero or more"));
        }
        if matches!(self.selected_slot, Some(s) if !(0..=8).contains(&s)) {
            return Err(WorldError::invalid("Selected slot must be between 0 and 8"));
        }
        Ok(())
    }

    /// Write the requested fields into a player compound
    ///
    /// Position is rewritten as a three-double `Pos` list; axes not being
    /// changed keep their stored value (`0, 64, 0` when there is no `Pos`).
    pub fn apply(&self, player: &mut Compound) -> Result<usize> {
        let mut changed = 0;

        if self.x.is_some() || self.y.is_some() || self.z.is_some() {
            let current = match player.get("Pos") {
                None => [0.0, 64.0, 0.0],
                Some(_) => read_position(player.list("Pos")?)?,
            };
            let pos = vec![
                Tag::Double(self.x.unwrap_or(current[0])),
                Tag::Double(self.y.unwrap_or(current[1])),
                Tag::Double(self.z.unwrap_or(current[2])),
            ];
            player.insert("Pos", pos);
            changed += 1;
        }

        if let Some(health) = self.health {
            player.insert("Health", health);
            changed += 1;
        }
        if let Some(hunger) = self.hunger {
            player.insert("foodLevel", hunger);
            changed += 1;
        }
        if let Some(slot) = self.selected_slot {
            player.insert("SelectedItemSlot", slot);
            changed += 1;
        }

        Ok(changed)
    }
}

fn read_position(items: &[Tag]) -> Result<[f64; 3]> {
    let axis = |i: usize| {
        items.get(i).and_then(Tag::as_f64).ok_or_else(|| WorldError::TagMismatch {
            key: format!("Pos[{}]", i),
            expected: "double",
            found: items.get(i).map(Tag::type_name).unwrap_or("nothing"),
        })
    };
    Ok([axis(0)?, axis(1)?, axis(2)?])
}

/// `summon <entity> <x> <y> <z> [nbt]`
pub fn summon_command(entity: &str, x: f64, y: f64, z: f64, nbt: Option<&str>) -> Result<String> {
    let entity = entity.trim();
    if entity.is_empty() {
        return Err(WorldError::invalid("Entity id is empty"));
    }
    if [x, y, z].iter().any(|v| !v.is_finite()) {
        return Err(WorldError::invalid("Summon coordinates must be finite numbers"));
    }
    let mut command = format!("summon {} {:?} {:?} {:?}", entity, x, y, z);
    if let Some(extra) = nbt.map(str::trim).filter(|s| !s.is_empty()) {
        command.push(' ');
        command.push_str(extra);
    }
    Ok(command)
}

/// `kill <selector>`
pub fn kill_command(selector: &str) -> Result<String> {
    let selector = selector.trim();
    if selector.is_empty() {
        return Err(WorldError::invalid("Entity selector is empty"));
    }
    Ok(format!("kill {}", selector))
}
