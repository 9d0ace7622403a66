//! Contracts for the persistence collaborators the session manager drives.

use crate::errors::RepositoryResult;
use crate::pokemon::OwnedCreature;
use crate::session::envelope::Battle;
use chrono::{DateTime, Utc};
use schema::PokemonSpecies;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    /// Identifier in the chat or web front end.
    pub external_handle: String,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    pub user_id: Uuid,
    pub delta: i64,
}

/// A set of balance changes applied all-or-nothing under an idempotency key.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub key: String,
    pub postings: Vec<Posting>,
}

impl LedgerEntry {
    pub fn new(key: impl Into<String>, postings: Vec<Posting>) -> Self {
        Self {
            key: key.into(),
            postings,
        }
    }
}

pub trait UserRepository: Send + Sync {
    fn get_by_id(&self, id: Uuid) -> RepositoryResult<User>;

    fn get_by_external_handle(&self, handle: &str) -> RepositoryResult<User>;

    fn balance(&self, id: Uuid) -> RepositoryResult<i64>;

    /// Single-user change. Fails without effect if the balance would go
    /// negative.
    fn adjust_balance(&self, id: Uuid, delta: i64) -> RepositoryResult<i64>;

    /// Applies every posting or none. A key that was already applied is
    /// accepted again without effect, and reported as `Ok(false)`.
    fn post_ledger_entry(&self, entry: &LedgerEntry) -> RepositoryResult<bool>;
}

pub trait CreatureRepository: Send + Sync {
    fn get_creature(&self, id: Uuid) -> RepositoryResult<OwnedCreature>;

    fn get_species(&self, species_id: u16) -> RepositoryResult<PokemonSpecies>;
}

pub trait BattleRepository: Send + Sync {
    fn create(&self, battle: &Battle) -> RepositoryResult<()>;

    fn get(&self, id: Uuid) -> RepositoryResult<Battle>;

    fn update(&self, battle: &Battle) -> RepositoryResult<()>;
}
