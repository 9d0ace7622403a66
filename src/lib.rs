//! Creature Battle Engine
//!
//! One-on-one creature battles with a wager on the outcome. The engine
//! covers stat derivation, the damage pipeline, turn ordering and resolution,
//! conditional ability and item effects, and a session manager that takes a
//! battle from creation through escrow to settlement.

// --- MODULE DECLARATIONS ---
pub mod battle;
pub mod config;
pub mod definitions;
pub mod effects;
pub mod errors;
pub mod move_data;
pub mod player;
pub mod pokemon;
pub mod session;

// --- PUBLIC API RE-EXPORTS ---

// --- From the `schema` crate ---
pub use schema::{
    BaseStats, EffectTarget, HazardType, MoveCategory, MoveFlag, MoveTarget, Nature, PokemonSpecies,
    PokemonType, Rarity, StatType, StatusKind, Terrain, Weather,
};

// --- From this crate's modules (`src/`) ---

// Turn resolution and battle state.
pub use battle::engine::{apply_entry_abilities, apply_forfeit, resolve_turn};
pub use battle::rng::TurnRng;
pub use battle::state::{BattleEvent, BattleOutcome, BattleState, EndReason, GameState, TurnResolution};

// Runtime types for a battle.
pub use player::{BattlePlayer, PlayerAction, PlayerTarget};
pub use pokemon::{calculate_stats, BattlePokemon, ComputedStats, Ivs, OwnedCreature, StatusCondition};

// Definitions and configuration.
pub use config::BattleConfig;
pub use definitions::{DefinitionCatalog, DefinitionLookup};
pub use effects::{Ability, HeldItem};
pub use move_data::MoveData;

// Sessions.
pub use session::{Battle, BattleSessionManager, BattleSnapshot, BattleStatus};

// Crate-specific error and result types.
pub use errors::{
    ActionError, ActionResult, BattleEngineError, BattleResult, ConfigError, DefinitionError, DefinitionResult,
    ErrorKind, RepositoryError, RepositoryResult, SessionError, SessionResult, TransportSignal,
};
