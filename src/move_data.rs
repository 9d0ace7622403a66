use schema::{
    EffectTarget, HazardType, MoveCategory, MoveFlag, MoveTarget, PokemonType, StatType,
    StatusKind, Terrain, Weather,
};
use serde::{Deserialize, Serialize};

/// A stage change carried by a move, applied to the user or its opponent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatChange {
    pub stat: StatType,
    pub stages: i8,
    pub target: EffectTarget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusInflict {
    pub status: StatusKind,
    /// Percent chance, 1..=100.
    pub chance: u8,
}

/// Extra effect that may follow a damaging hit. One chance roll gates the
/// whole block; the status and flinch parts then roll on their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondaryEffect {
    pub chance: u8,
    #[serde(default)]
    pub stat_changes: Vec<StatChange>,
    #[serde(default)]
    pub status_inflict: Option<StatusInflict>,
    #[serde(default)]
    pub flinch_chance: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiHit {
    pub min_hits: u8,
    pub max_hits: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherEffect {
    pub weather: Weather,
    pub duration: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainEffect {
    pub terrain: Terrain,
    pub duration: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveData {
    pub name: String,
    pub move_type: PokemonType,
    pub category: MoveCategory,
    #[serde(default)]
    pub power: u16,
    /// 0 means the move never misses.
    #[serde(default)]
    pub accuracy: u8,
    pub pp: u8,
    #[serde(default)]
    pub priority: i8,
    #[serde(default)]
    pub crit_ratio: u8,
    #[serde(default)]
    pub target: MoveTarget,
    #[serde(default)]
    pub flags: Vec<MoveFlag>,
    #[serde(default)]
    pub recoil_percent: u8,
    #[serde(default)]
    pub drain_percent: u8,
    #[serde(default)]
    pub heal_percent: u8,
    #[serde(default)]
    pub stat_changes: Vec<StatChange>,
    #[serde(default)]
    pub status_inflict: Option<StatusInflict>,
    #[serde(default)]
    pub secondary: Option<SecondaryEffect>,
    #[serde(default)]
    pub multi_hit: Option<MultiHit>,
    #[serde(default)]
    pub weather: Option<WeatherEffect>,
    #[serde(default)]
    pub terrain: Option<TerrainEffect>,
    #[serde(default)]
    pub hazard: Option<HazardType>,
}

impl MoveData {
    pub fn is_status(&self) -> bool {
        self.category == MoveCategory::Status
    }

    pub fn has_flag(&self, flag: MoveFlag) -> bool {
        self.flags.contains(&flag)
    }

    pub fn makes_contact(&self) -> bool {
        self.has_flag(MoveFlag::Contact)
    }
}
