use crate::StatType;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumCount, EnumIter};

/// One of the 25 natures. Twenty raise one stat by 10% and lower another by
/// 10%; the five where both would be the same stat are neutral.
#[derive(
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    EnumCount,
    Display,
)]
pub enum Nature {
    Hardy,
    Lonely,
    Brave,
    Adamant,
    Naughty,
    Bold,
    Docile,
    Relaxed,
    Impish,
    Lax,
    Timid,
    Hasty,
    Serious,
    Jolly,
    Naive,
    Modest,
    Mild,
    Quiet,
    Bashful,
    Rash,
    Calm,
    Gentle,
    Sassy,
    Careful,
    Quirky,
}

impl Nature {
    /// `(raised, lowered)` for non-neutral natures.
    pub fn modified_stats(self) -> Option<(StatType, StatType)> {
        use Nature::*;
        use StatType::*;

        match self {
            Hardy | Docile | Serious | Bashful | Quirky => None,
            Lonely => Some((Attack, Defense)),
            Brave => Some((Attack, Speed)),
            Adamant => Some((Attack, SpAttack)),
            Naughty => Some((Attack, SpDefense)),
            Bold => Some((Defense, Attack)),
            Relaxed => Some((Defense, Speed)),
            Impish => Some((Defense, SpAttack)),
            Lax => Some((Defense, SpDefense)),
            Timid => Some((Speed, Attack)),
            Hasty => Some((Speed, Defense)),
            Jolly => Some((Speed, SpAttack)),
            Naive => Some((Speed, SpDefense)),
            Modest => Some((SpAttack, Attack)),
            Mild => Some((SpAttack, Defense)),
            Quiet => Some((SpAttack, Speed)),
            Rash => Some((SpAttack, SpDefense)),
            Calm => Some((SpDefense, Attack)),
            Gentle => Some((SpDefense, Defense)),
            Sassy => Some((SpDefense, Speed)),
            Careful => Some((SpDefense, SpAttack)),
        }
    }

    /// Multiplier as an integer percentage: 110, 90 or 100.
    pub fn multiplier_percent(self, stat: StatType) -> u32 {
        match self.modified_stats() {
            Some((raised, _)) if raised == stat => 110,
            Some((_, lowered)) if lowered == stat => 90,
            _ => 100,
        }
    }

    pub fn multiplier(self, stat: StatType) -> f64 {
        f64::from(self.multiplier_percent(stat)) / 100.0
    }

    pub fn is_neutral(self) -> bool {
        self.modified_stats().is_none()
    }
}
