use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{EnumCount, EnumIter};

/// The seven stats that carry an in-battle stage.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount,
)]
pub enum StatType {
    Attack,
    Defense,
    SpAttack,
    SpDefense,
    Speed,
    Accuracy,
    Evasion,
}

impl fmt::Display for StatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let display_name = match self {
            StatType::Attack => "Attack",
            StatType::Defense => "Defense",
            StatType::SpAttack => "Sp. Atk",
            StatType::SpDefense => "Sp. Def",
            StatType::Speed => "Speed",
            StatType::Accuracy => "accuracy",
            StatType::Evasion => "evasiveness",
        };
        write!(f, "{}", display_name)
    }
}

/// Primary status conditions, without their per-battle counters.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum StatusKind {
    Burn,
    Freeze,
    Paralysis,
    Poison,
    BadlyPoisoned,
    Sleep,
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let display_name = match self {
            StatusKind::Burn => "burn",
            StatusKind::Freeze => "freeze",
            StatusKind::Paralysis => "paralysis",
            StatusKind::Poison => "poison",
            StatusKind::BadlyPoisoned => "bad poison",
            StatusKind::Sleep => "sleep",
        };
        write!(f, "{}", display_name)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum Weather {
    Sun,
    Rain,
    Sandstorm,
    Hail,
    Snow,
}

impl Weather {
    pub fn start_message(&self) -> &'static str {
        match self {
            Weather::Sun => "The sunlight turned harsh!",
            Weather::Rain => "It started to rain!",
            Weather::Sandstorm => "A sandstorm kicked up!",
            Weather::Hail => "It started to hail!",
            Weather::Snow => "It started to snow!",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum Terrain {
    Electric,
    Grassy,
    Misty,
    Psychic,
}

impl Terrain {
    pub fn start_message(&self) -> &'static str {
        match self {
            Terrain::Electric => "An electric current ran across the battlefield!",
            Terrain::Grassy => "Grass grew to cover the battlefield!",
            Terrain::Misty => "Mist swirled about the battlefield!",
            Terrain::Psychic => "The battlefield got weird!",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HazardType {
    StealthRock,
    Spikes,
    ToxicSpikes,
    StickyWeb,
}

impl fmt::Display for HazardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let display_name = match self {
            HazardType::StealthRock => "Stealth Rock",
            HazardType::Spikes => "Spikes",
            HazardType::ToxicSpikes => "Toxic Spikes",
            HazardType::StickyWeb => "Sticky Web",
        };
        write!(f, "{}", display_name)
    }
}
