use crate::PokemonType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseStats {
    pub hp: u8,
    pub attack: u8,
    pub defense: u8,
    pub sp_attack: u8,
    pub sp_defense: u8,
    pub speed: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
    Mythic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PokemonSpecies {
    /// National index number.
    pub id: u16,
    pub name: String,
    pub primary_type: PokemonType,
    #[serde(default)]
    pub secondary_type: Option<PokemonType>,
    pub base_stats: BaseStats,
    pub rarity: Rarity,
}

impl PokemonSpecies {
    pub fn types(&self) -> impl Iterator<Item = PokemonType> + '_ {
        std::iter::once(self.primary_type).chain(self.secondary_type)
    }

    pub fn has_type(&self, pokemon_type: PokemonType) -> bool {
        self.types().any(|t| t == pokemon_type)
    }
}
