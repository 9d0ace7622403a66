use crate::battle::engine::resolve_turn;
use crate::battle::rng::TurnRng;
use crate::battle::state::{BattleState, TurnResolution};
use crate::effects::{Ability, ConditionContext, HeldItem};
use crate::move_data::MoveData;
use crate::player::{BattlePlayer, PlayerAction, PlayerTarget};
use crate::pokemon::{calculate_stats, BattlePokemon, Ivs, StatusCondition};
use schema::{BaseStats, MoveCategory, MoveFlag, MoveTarget, Nature, PokemonSpecies, PokemonType, Rarity};
use std::fmt::Display;
use uuid::Uuid;

/// A builder for creating test combatants with common defaults: level 50,
/// IVs of 31, a neutral nature, pure Normal typing and base stats of 80.
///
/// # Example
/// ```ignore
/// let pokemon = TestPokemonBuilder::new("Sparky")
///     .with_types(PokemonType::Electric, None)
///     .with_moves(vec![special_move("Thunderbolt", PokemonType::Electric, 90)])
///     .with_status(StatusCondition::Paralysis)
///     .build();
/// ```
pub struct TestPokemonBuilder {
    name: String,
    level: u8,
    base: u8,
    speed: Option<u8>,
    primary_type: PokemonType,
    secondary_type: Option<PokemonType>,
    nature: Nature,
    moves: Option<Vec<MoveData>>,
    status: Option<StatusCondition>,
    current_hp: Option<u16>,
    ability: Option<Ability>,
    held_item: Option<HeldItem>,
}

impl TestPokemonBuilder {
    /// Creates a new builder for a combatant with the given species name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            level: 50,
            base: 80,
            speed: None,
            primary_type: PokemonType::Normal,
            secondary_type: None,
            nature: Nature::Hardy,
            moves: None,
            status: None,
            current_hp: None,
            ability: None,
            held_item: None,
        }
    }

    pub fn with_level(mut self, level: u8) -> Self {
        self.level = level;
        self
    }

    /// Sets every base stat to the same value.
    pub fn with_base_stats(mut self, base: u8) -> Self {
        self.base = base;
        self
    }

    /// Overrides just the base speed, for turn order tests.
    pub fn with_base_speed(mut self, speed: u8) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_types(mut self, primary: PokemonType, secondary: Option<PokemonType>) -> Self {
        self.primary_type = primary;
        self.secondary_type = secondary;
        self
    }

    pub fn with_nature(mut self, nature: Nature) -> Self {
        self.nature = nature;
        self
    }

    /// Sets the moves for the test combatant.
    pub fn with_moves(mut self, moves: Vec<MoveData>) -> Self {
        self.moves = Some(moves);
        self
    }

    /// Sets the status condition for the test combatant.
    pub fn with_status(mut self, status: StatusCondition) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the current HP. If not set, HP will be max.
    pub fn with_hp(mut self, hp: u16) -> Self {
        self.current_hp = Some(hp);
        self
    }

    pub fn with_ability(mut self, ability: Ability) -> Self {
        self.ability = Some(ability);
        self
    }

    pub fn with_item(mut self, item: HeldItem) -> Self {
        self.held_item = Some(item);
        self
    }

    /// Builds the `BattlePokemon`.
    pub fn build(self) -> BattlePokemon {
        let base_stats = BaseStats {
            hp: self.base,
            attack: self.base,
            defense: self.base,
            sp_attack: self.base,
            sp_defense: self.base,
            speed: self.speed.unwrap_or(self.base),
        };
        let species = PokemonSpecies {
            id: 0,
            name: self.name,
            primary_type: self.primary_type,
            secondary_type: self.secondary_type,
            base_stats,
            rarity: Rarity::Common,
        };
        let stats = calculate_stats(&species.base_stats, &Ivs::uniform(31), self.nature, self.level);
        let moves = self
            .moves
            .unwrap_or_else(|| vec![physical_move("Tackle", PokemonType::Normal, 40)]);

        let mut pokemon = BattlePokemon::new(Uuid::new_v4(), species, self.level, self.nature, stats, moves);
        pokemon.status = self.status;
        pokemon.ability = self.ability;
        pokemon.held_item = self.held_item;
        if let Some(hp) = self.current_hp {
            pokemon.set_hp(hp);
        }
        pokemon
    }
}

fn base_move(name: &str, move_type: PokemonType, category: MoveCategory, power: u16) -> MoveData {
    MoveData {
        name: name.to_string(),
        move_type,
        category,
        power,
        accuracy: 100,
        pp: 20,
        priority: 0,
        crit_ratio: 0,
        target: MoveTarget::Opponent,
        flags: Vec::new(),
        recoil_percent: 0,
        drain_percent: 0,
        heal_percent: 0,
        stat_changes: Vec::new(),
        status_inflict: None,
        secondary: None,
        multi_hit: None,
        weather: None,
        terrain: None,
        hazard: None,
    }
}

/// A 100% accurate contact move with no side effects.
pub fn physical_move(name: &str, move_type: PokemonType, power: u16) -> MoveData {
    let mut data = base_move(name, move_type, MoveCategory::Physical, power);
    data.flags.push(MoveFlag::Contact);
    data
}

pub fn special_move(name: &str, move_type: PokemonType, power: u16) -> MoveData {
    base_move(name, move_type, MoveCategory::Special, power)
}

/// A status move that never misses; callers fill in its effects.
pub fn status_move(name: &str, move_type: PokemonType) -> MoveData {
    let mut data = base_move(name, move_type, MoveCategory::Status, 0);
    data.accuracy = 0;
    data
}

/// A status move with no effect at all.
pub fn splash() -> MoveData {
    status_move("Splash", PokemonType::Normal)
}

/// Full HP, no status, clear field, no move, turn 2.
pub fn neutral_context() -> ConditionContext {
    ConditionContext {
        current_hp: 100,
        max_hp: 100,
        status: None,
        weather: None,
        terrain: None,
        move_category: None,
        move_type: None,
        is_contact: false,
        turn_number: 2,
    }
}

/// Creates a standard 1v1 battle state for testing.
pub fn create_test_battle(p1_pokemon: BattlePokemon, p2_pokemon: BattlePokemon) -> BattleState {
    let player1 = BattlePlayer::new(Uuid::new_v4(), p1_pokemon);
    let player2 = BattlePlayer::new(Uuid::new_v4(), p2_pokemon);

    BattleState::new(Uuid::new_v4(), player1, player2)
}

/// Queues both actions and resolves the turn.
pub fn run_turn(
    state: &mut BattleState,
    p1_action: PlayerAction,
    p2_action: PlayerAction,
    rng: &mut TurnRng,
) -> TurnResolution {
    assert_ok(state.submit_action(PlayerTarget::Player1, p1_action));
    assert_ok(state.submit_action(PlayerTarget::Player2, p2_action));
    resolve_turn(state, rng)
}

pub const USE_FIRST_MOVE: PlayerAction = PlayerAction::UseMove { move_index: 0 };

/// Creates a `TurnRng` instance with a long list of default values (50).
/// Useful for tests where the specific RNG outcome is not important, preventing panics from exhaustion.
pub fn predictable_rng() -> TurnRng {
    TurnRng::new_for_test(vec![50; 100])
}

/// Asserts that a Result is Ok and returns the value.
pub fn assert_ok<T, E: Display>(result: Result<T, E>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => panic!("Expected Ok but got error: {}", err),
    }
}
