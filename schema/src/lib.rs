// Creature Battle Schema - Shared type definitions
// Static, data-only enums and records used by both the rules engine and the
// definition catalogs it loads.

// Re-export the main types
pub use battle_data::*;
pub use move_types::*;
pub use nature::*;
pub use pokemon_types::*;
pub use species_data::*;

pub mod battle_data;
pub mod move_types;
pub mod nature;
pub mod pokemon_types;
pub mod species_data;
