//! In-memory repositories for tests and local runs, with switches that make
//! writes fail on demand.

use crate::errors::{RepositoryError, RepositoryResult};
use crate::pokemon::OwnedCreature;
use crate::session::envelope::Battle;
use crate::session::repository::{BattleRepository, CreatureRepository, LedgerEntry, User, UserRepository};
use chrono::Utc;
use schema::PokemonSpecies;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use uuid::Uuid;

fn poisoned() -> RepositoryError {
    RepositoryError::Unavailable("lock poisoned".to_string())
}

#[derive(Default)]
struct Ledger {
    applied: HashSet<String>,
    entries: Vec<LedgerEntry>,
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<Uuid, User>>,
    ledger: RwLock<Ledger>,
    failing_prefixes: RwLock<Vec<String>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a user with the given balance and returns its id.
    pub fn add_user(&self, handle: &str, balance: i64) -> Uuid {
        let user = User {
            id: Uuid::new_v4(),
            external_handle: handle.to_string(),
            balance,
            created_at: Utc::now(),
        };
        let id = user.id;
        if let Ok(mut users) = self.users.write() {
            users.insert(id, user);
        }
        id
    }

    /// Ledger entries whose key starts with `prefix` fail as unavailable.
    pub fn fail_ledger_entries(&self, prefix: &str) {
        if let Ok(mut prefixes) = self.failing_prefixes.write() {
            prefixes.push(prefix.to_string());
        }
    }

    pub fn clear_failures(&self) {
        if let Ok(mut prefixes) = self.failing_prefixes.write() {
            prefixes.clear();
        }
    }

    /// Every entry applied so far, oldest first.
    pub fn ledger_entries(&self) -> Vec<LedgerEntry> {
        self.ledger
            .read()
            .map(|ledger| ledger.entries.clone())
            .unwrap_or_default()
    }

    fn should_fail(&self, key: &str) -> RepositoryResult<bool> {
        let prefixes = self.failing_prefixes.read().map_err(|_| poisoned())?;
        Ok(prefixes.iter().any(|prefix| key.starts_with(prefix.as_str())))
    }
}

impl UserRepository for InMemoryUserRepository {
    fn get_by_id(&self, id: Uuid) -> RepositoryResult<User> {
        let users = self.users.read().map_err(|_| poisoned())?;
        users
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("user {}", id)))
    }

    fn get_by_external_handle(&self, handle: &str) -> RepositoryResult<User> {
        let users = self.users.read().map_err(|_| poisoned())?;
        users
            .values()
            .find(|user| user.external_handle == handle)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("user handle {}", handle)))
    }

    fn balance(&self, id: Uuid) -> RepositoryResult<i64> {
        self.get_by_id(id).map(|user| user.balance)
    }

    fn adjust_balance(&self, id: Uuid, delta: i64) -> RepositoryResult<i64> {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        let user = users
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("user {}", id)))?;
        let new_balance = user.balance + delta;
        if new_balance < 0 {
            return Err(RepositoryError::InsufficientBalance {
                user: id,
                required: -delta,
                available: user.balance,
            });
        }
        user.balance = new_balance;
        Ok(new_balance)
    }

    fn post_ledger_entry(&self, entry: &LedgerEntry) -> RepositoryResult<bool> {
        if self.should_fail(&entry.key)? {
            return Err(RepositoryError::Unavailable(format!("ledger write {}", entry.key)));
        }

        let mut ledger = self.ledger.write().map_err(|_| poisoned())?;
        if ledger.applied.contains(&entry.key) {
            return Ok(false);
        }

        let mut users = self.users.write().map_err(|_| poisoned())?;
        // Check every posting before touching any balance.
        let mut totals: HashMap<Uuid, i64> = HashMap::new();
        for posting in &entry.postings {
            *totals.entry(posting.user_id).or_default() += posting.delta;
        }
        for (user_id, delta) in &totals {
            let user = users
                .get(user_id)
                .ok_or_else(|| RepositoryError::NotFound(format!("user {}", user_id)))?;
            if user.balance + delta < 0 {
                return Err(RepositoryError::InsufficientBalance {
                    user: *user_id,
                    required: -delta,
                    available: user.balance,
                });
            }
        }
        for (user_id, delta) in totals {
            if let Some(user) = users.get_mut(&user_id) {
                user.balance += delta;
            }
        }

        ledger.applied.insert(entry.key.clone());
        ledger.entries.push(entry.clone());
        Ok(true)
    }
}

#[derive(Default)]
pub struct InMemoryCreatureRepository {
    creatures: RwLock<HashMap<Uuid, OwnedCreature>>,
    species: RwLock<HashMap<u16, PokemonSpecies>>,
}

impl InMemoryCreatureRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_species(&self, species: PokemonSpecies) {
        if let Ok(mut all) = self.species.write() {
            all.insert(species.id, species);
        }
    }

    pub fn add_creature(&self, creature: OwnedCreature) {
        if let Ok(mut all) = self.creatures.write() {
            all.insert(creature.id, creature);
        }
    }
}

impl CreatureRepository for InMemoryCreatureRepository {
    fn get_creature(&self, id: Uuid) -> RepositoryResult<OwnedCreature> {
        let creatures = self.creatures.read().map_err(|_| poisoned())?;
        creatures
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("creature {}", id)))
    }

    fn get_species(&self, species_id: u16) -> RepositoryResult<PokemonSpecies> {
        let species = self.species.read().map_err(|_| poisoned())?;
        species
            .get(&species_id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("species {}", species_id)))
    }
}

#[derive(Default)]
pub struct InMemoryBattleRepository {
    battles: RwLock<HashMap<Uuid, Battle>>,
    fail_creates: AtomicBool,
    fail_updates: AtomicBool,
}

impl InMemoryBattleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }
}

impl BattleRepository for InMemoryBattleRepository {
    fn create(&self, battle: &Battle) -> RepositoryResult<()> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("battle create".to_string()));
        }
        let mut battles = self.battles.write().map_err(|_| poisoned())?;
        if battles.contains_key(&battle.id) {
            return Err(RepositoryError::Conflict(format!("battle {}", battle.id)));
        }
        battles.insert(battle.id, battle.clone());
        Ok(())
    }

    fn get(&self, id: Uuid) -> RepositoryResult<Battle> {
        let battles = self.battles.read().map_err(|_| poisoned())?;
        battles
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("battle {}", id)))
    }

    fn update(&self, battle: &Battle) -> RepositoryResult<()> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("battle update".to_string()));
        }
        let mut battles = self.battles.write().map_err(|_| poisoned())?;
        match battles.get_mut(&battle.id) {
            Some(stored) => {
                *stored = battle.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound(format!("battle {}", battle.id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::repository::Posting;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ledger_entry_is_all_or_nothing() {
        let users = InMemoryUserRepository::new();
        let rich = users.add_user("rich", 500);
        let poor = users.add_user("poor", 20);
        let entry = LedgerEntry::new(
            "escrow:test:1",
            vec![
                Posting { user_id: rich, delta: -100 },
                Posting { user_id: poor, delta: -100 },
            ],
        );

        let result = users.post_ledger_entry(&entry);

        assert!(matches!(result, Err(RepositoryError::InsufficientBalance { user, .. }) if user == poor));
        assert_eq!(users.balance(rich), Ok(500));
        assert_eq!(users.balance(poor), Ok(20));
        assert!(users.ledger_entries().is_empty());
    }

    #[test]
    fn test_ledger_keys_are_idempotent() {
        let users = InMemoryUserRepository::new();
        let id = users.add_user("winner", 0);
        let entry = LedgerEntry::new("payout:test:1", vec![Posting { user_id: id, delta: 200 }]);

        assert_eq!(users.post_ledger_entry(&entry), Ok(true));
        assert_eq!(users.post_ledger_entry(&entry), Ok(false));
        assert_eq!(users.balance(id), Ok(200));
    }

    #[test]
    fn test_failure_injection_by_prefix() {
        let users = InMemoryUserRepository::new();
        let id = users.add_user("someone", 100);
        users.fail_ledger_entries("refund:");

        let refund = LedgerEntry::new("refund:x:1", vec![Posting { user_id: id, delta: 5 }]);
        assert!(matches!(users.post_ledger_entry(&refund), Err(RepositoryError::Unavailable(_))));

        users.clear_failures();
        assert_eq!(users.post_ledger_entry(&refund), Ok(true));
        assert_eq!(users.get_by_external_handle("someone").map(|u| u.balance), Ok(105));
    }

    #[test]
    fn test_adjust_balance_refuses_overdraft() {
        let users = InMemoryUserRepository::new();
        let id = users.add_user("saver", 30);
        assert_eq!(users.adjust_balance(id, -10), Ok(20));
        assert!(users.adjust_balance(id, -21).is_err());
        assert_eq!(users.balance(id), Ok(20));
    }
}
