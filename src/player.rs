use crate::pokemon::BattlePokemon;
use schema::HazardType;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One of the two sides of a battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerTarget {
    Player1,
    Player2,
}

impl PlayerTarget {
    pub fn to_index(self) -> usize {
        match self {
            PlayerTarget::Player1 => 0,
            PlayerTarget::Player2 => 1,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(PlayerTarget::Player1),
            1 => Some(PlayerTarget::Player2),
            _ => None,
        }
    }

    pub fn opponent(self) -> Self {
        match self {
            PlayerTarget::Player1 => PlayerTarget::Player2,
            PlayerTarget::Player2 => PlayerTarget::Player1,
        }
    }

    pub fn both() -> [PlayerTarget; 2] {
        [PlayerTarget::Player1, PlayerTarget::Player2]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerAction {
    UseMove { move_index: usize },
    Forfeit,
}

/// Priority given to a forfeit so it always resolves last.
pub const FORFEIT_PRIORITY: i8 = -8;

/// Hazards laid on one side of the field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryHazards {
    pub stealth_rock: bool,
    pub spikes: u8,
    pub toxic_spikes: u8,
    pub sticky_web: bool,
}

impl EntryHazards {
    pub const MAX_SPIKES: u8 = 3;
    pub const MAX_TOXIC_SPIKES: u8 = 2;

    /// Adds one layer of `hazard`. Returns false when that hazard is
    /// already at its cap.
    pub fn add(&mut self, hazard: HazardType) -> bool {
        match hazard {
            HazardType::StealthRock if !self.stealth_rock => {
                self.stealth_rock = true;
                true
            }
            HazardType::Spikes if self.spikes < Self::MAX_SPIKES => {
                self.spikes += 1;
                true
            }
            HazardType::ToxicSpikes if self.toxic_spikes < Self::MAX_TOXIC_SPIKES => {
                self.toxic_spikes += 1;
                true
            }
            HazardType::StickyWeb if !self.sticky_web => {
                self.sticky_web = true;
                true
            }
            _ => false,
        }
    }

    pub fn layers(&self, hazard: HazardType) -> u8 {
        match hazard {
            HazardType::StealthRock => u8::from(self.stealth_rock),
            HazardType::Spikes => self.spikes,
            HazardType::ToxicSpikes => self.toxic_spikes,
            HazardType::StickyWeb => u8::from(self.sticky_web),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattlePlayer {
    pub player_id: Uuid,
    pub pokemon: BattlePokemon,
    pub pending_action: Option<PlayerAction>,
    pub hazards: EntryHazards,
}

impl BattlePlayer {
    pub fn new(player_id: Uuid, pokemon: BattlePokemon) -> Self {
        Self {
            player_id,
            pokemon,
            pending_action: None,
            hazards: EntryHazards::default(),
        }
    }

    pub fn has_submitted(&self) -> bool {
        self.pending_action.is_some()
    }
}
