use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveCategory {
    Physical,
    Special,
    Status,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MoveTarget {
    #[default]
    Opponent,
    User,
    /// Affects the whole field (weather, terrain).
    Field,
    /// Affects the opponent's side rather than the opponent itself (hazards).
    OpponentSide,
}

/// Which combatant a stat change or status effect lands on.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectTarget {
    User,
    Opponent,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveFlag {
    Contact,
    Sound,
    Punch,
    Bite,
    Pulse,
    Slicing,
    Powder,
}
