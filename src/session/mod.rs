//! Battle sessions: the persisted envelope, the repositories it is stored
//! through, and the manager that takes a battle from creation to settlement.

pub mod envelope;
pub mod manager;
pub mod memory;
pub mod repository;

pub use envelope::{Battle, BattleSnapshot, BattleStatus};
pub use manager::BattleSessionManager;
pub use repository::{BattleRepository, CreatureRepository, LedgerEntry, Posting, User, UserRepository};
