use crate::battle::stats::StatStages;
use crate::effects::{Ability, ConditionContext, HeldItem};
use crate::errors::{ActionError, ActionResult};
use crate::move_data::MoveData;
use schema::{BaseStats, Nature, PokemonSpecies, PokemonType, StatType, StatusKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_IV: u8 = 31;
pub const MAX_MOVES: usize = 4;

/// Individual values, fixed when the creature is acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ivs {
    pub hp: u8,
    pub attack: u8,
    pub defense: u8,
    pub sp_attack: u8,
    pub sp_defense: u8,
    pub speed: u8,
}

impl Ivs {
    pub fn uniform(value: u8) -> Self {
        let value = value.min(MAX_IV);
        Ivs {
            hp: value,
            attack: value,
            defense: value,
            sp_attack: value,
            sp_defense: value,
            speed: value,
        }
    }

    pub fn is_valid(&self) -> bool {
        [
            self.hp,
            self.attack,
            self.defense,
            self.sp_attack,
            self.sp_defense,
            self.speed,
        ]
        .iter()
        .all(|iv| *iv <= MAX_IV)
    }
}

/// A creature as the persistence layer stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnedCreature {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub species_id: u16,
    pub ivs: Ivs,
    pub nature: Nature,
    pub level: u8,
    /// Move names, looked up in the definition catalog when battling.
    #[serde(default)]
    pub moves: Vec<String>,
    #[serde(default)]
    pub ability: Option<String>,
    #[serde(default)]
    pub held_item: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputedStats {
    pub hp: u16,
    pub attack: u16,
    pub defense: u16,
    pub sp_attack: u16,
    pub sp_defense: u16,
    pub speed: u16,
}

impl ComputedStats {
    /// Raw value for one of the five non-HP battle stats. Accuracy and
    /// evasion have no base value.
    pub fn value(&self, stat: StatType) -> Option<u16> {
        match stat {
            StatType::Attack => Some(self.attack),
            StatType::Defense => Some(self.defense),
            StatType::SpAttack => Some(self.sp_attack),
            StatType::SpDefense => Some(self.sp_defense),
            StatType::Speed => Some(self.speed),
            StatType::Accuracy | StatType::Evasion => None,
        }
    }
}

/// Derives the six stats from base stats, IVs, level and nature.
///
/// HP: `(2*base + iv) * level / 100 + level + 10`.
/// Others: `((2*base + iv) * level / 100 + 5) * nature`, where the nature
/// factor is applied as an integer percentage so the floor is exact.
pub fn calculate_stats(base: &BaseStats, ivs: &Ivs, nature: Nature, level: u8) -> ComputedStats {
    let level = u32::from(level);

    let hp = (2 * u32::from(base.hp) + u32::from(ivs.hp)) * level / 100 + level + 10;

    let other = |base_stat: u8, iv: u8, stat: StatType| -> u16 {
        let raw = (2 * u32::from(base_stat) + u32::from(iv)) * level / 100 + 5;
        let adjusted = raw * nature.multiplier_percent(stat) / 100;
        adjusted.min(u32::from(u16::MAX)) as u16
    };

    ComputedStats {
        hp: hp.min(u32::from(u16::MAX)) as u16,
        attack: other(base.attack, ivs.attack, StatType::Attack),
        defense: other(base.defense, ivs.defense, StatType::Defense),
        sp_attack: other(base.sp_attack, ivs.sp_attack, StatType::SpAttack),
        sp_defense: other(base.sp_defense, ivs.sp_defense, StatType::SpDefense),
        speed: other(base.speed, ivs.speed, StatType::Speed),
    }
}

/// Primary status. Sleep carries the turns left; bad poison carries the
/// number of turns it has ticked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusCondition {
    Burn,
    Freeze,
    Paralysis,
    Poison,
    BadlyPoisoned(u8),
    Sleep(u8),
}

impl StatusCondition {
    pub fn kind(&self) -> StatusKind {
        match self {
            StatusCondition::Burn => StatusKind::Burn,
            StatusCondition::Freeze => StatusKind::Freeze,
            StatusCondition::Paralysis => StatusKind::Paralysis,
            StatusCondition::Poison => StatusKind::Poison,
            StatusCondition::BadlyPoisoned(_) => StatusKind::BadlyPoisoned,
            StatusCondition::Sleep(_) => StatusKind::Sleep,
        }
    }

    /// Fresh condition of the given kind. `sleep_turns` is only read for sleep.
    pub fn from_kind(kind: StatusKind, sleep_turns: u8) -> Self {
        match kind {
            StatusKind::Burn => StatusCondition::Burn,
            StatusKind::Freeze => StatusCondition::Freeze,
            StatusKind::Paralysis => StatusCondition::Paralysis,
            StatusKind::Poison => StatusCondition::Poison,
            StatusKind::BadlyPoisoned => StatusCondition::BadlyPoisoned(0),
            StatusKind::Sleep => StatusCondition::Sleep(sleep_turns),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveInstance {
    pub data: MoveData,
    pub pp: u8,
}

impl MoveInstance {
    /// Create a new move instance with max PP
    pub fn new(data: MoveData) -> Self {
        let pp = data.pp;
        MoveInstance { data, pp }
    }

    pub fn max_pp(&self) -> u8 {
        self.data.pp
    }

    pub fn is_usable(&self) -> bool {
        self.pp > 0
    }

    /// Use the move (decrease PP)
    pub fn use_move(&mut self) -> bool {
        if self.pp > 0 {
            self.pp -= 1;
            true
        } else {
            false
        }
    }
}

/// A combatant's mutable in-battle snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattlePokemon {
    pub creature_id: Uuid,
    pub species: PokemonSpecies,
    pub level: u8,
    pub nature: Nature,
    pub stats: ComputedStats,
    current_hp: u16,
    pub status: Option<StatusCondition>,
    pub stat_stages: StatStages,
    pub moves: Vec<MoveInstance>,
    pub ability: Option<Ability>,
    pub held_item: Option<HeldItem>,
    /// Set by a flinch roll; cleared at end of turn.
    pub flinched: bool,
}

impl BattlePokemon {
    pub fn new(
        creature_id: Uuid,
        species: PokemonSpecies,
        level: u8,
        nature: Nature,
        stats: ComputedStats,
        moves: Vec<MoveData>,
    ) -> Self {
        BattlePokemon {
            creature_id,
            species,
            level,
            nature,
            current_hp: stats.hp,
            stats,
            status: None,
            stat_stages: StatStages::default(),
            moves: moves.into_iter().take(MAX_MOVES).map(MoveInstance::new).collect(),
            ability: None,
            held_item: None,
            flinched: false,
        }
    }

    /// Builds the battle snapshot for an owned creature.
    pub fn from_owned(
        creature: &OwnedCreature,
        species: PokemonSpecies,
        moves: Vec<MoveData>,
        ability: Option<Ability>,
        held_item: Option<HeldItem>,
    ) -> Self {
        let stats = calculate_stats(&species.base_stats, &creature.ivs, creature.nature, creature.level);
        let mut pokemon = Self::new(
            creature.id,
            species,
            creature.level,
            creature.nature,
            stats,
            moves,
        );
        pokemon.ability = ability;
        pokemon.held_item = held_item;
        pokemon
    }

    pub fn name(&self) -> &str {
        &self.species.name
    }

    pub fn current_hp(&self) -> u16 {
        self.current_hp
    }

    pub fn max_hp(&self) -> u16 {
        self.stats.hp
    }

    /// Fainted exactly when HP is zero.
    pub fn is_fainted(&self) -> bool {
        self.current_hp == 0
    }

    pub fn has_type(&self, pokemon_type: PokemonType) -> bool {
        self.species.has_type(pokemon_type)
    }

    pub fn status_kind(&self) -> Option<StatusKind> {
        self.status.map(|s| s.kind())
    }

    /// Sets HP directly, clamped to `[0, max_hp]`.
    pub fn set_hp(&mut self, hp: u16) {
        self.current_hp = hp.min(self.max_hp());
    }

    /// Applies damage and returns the HP actually lost.
    pub fn take_damage(&mut self, amount: u16) -> u16 {
        let lost = amount.min(self.current_hp);
        self.current_hp -= lost;
        lost
    }

    /// Restores HP and returns the amount actually healed. Fainted
    /// combatants cannot be healed.
    pub fn heal(&mut self, amount: u16) -> u16 {
        if self.is_fainted() {
            return 0;
        }
        let healed = amount.min(self.max_hp() - self.current_hp);
        self.current_hp += healed;
        healed
    }

    /// Checks that the move at `index` exists and still has PP.
    pub fn check_move_usable(&self, index: usize) -> ActionResult<&MoveInstance> {
        let instance = self
            .moves
            .get(index)
            .ok_or(ActionError::InvalidMoveIndex(index))?;
        if !instance.is_usable() {
            return Err(ActionError::MoveUnusable(instance.data.name.clone()));
        }
        Ok(instance)
    }

    /// Decrements PP for the move at `index`, returning its data.
    pub fn use_move(&mut self, index: usize) -> ActionResult<MoveData> {
        self.check_move_usable(index)?;
        let instance = &mut self.moves[index];
        instance.use_move();
        Ok(instance.data.clone())
    }

    /// Snapshot for evaluating ability/item conditions, optionally in the
    /// context of a move being used.
    pub fn condition_context(
        &self,
        field: &crate::battle::state::FieldState,
        turn_number: u32,
        move_data: Option<&MoveData>,
    ) -> ConditionContext {
        ConditionContext {
            current_hp: self.current_hp,
            max_hp: self.max_hp(),
            status: self.status_kind(),
            weather: field.weather,
            terrain: field.terrain,
            move_category: move_data.map(|m| m.category),
            move_type: move_data.map(|m| m.move_type),
            is_contact: move_data.is_some_and(|m| m.makes_contact()),
            turn_number,
        }
    }
}
