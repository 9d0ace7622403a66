use crate::battle::engine::{apply_entry_abilities, apply_forfeit, resolve_turn};
use crate::battle::rng::TurnRng;
use crate::battle::state::{BattleState, EndReason, TurnResolution};
use crate::config::BattleConfig;
use crate::definitions::DefinitionLookup;
use crate::errors::{RepositoryError, SessionError, SessionResult};
use crate::player::{BattlePlayer, PlayerAction, PlayerTarget};
use crate::pokemon::{BattlePokemon, OwnedCreature};
use crate::session::envelope::{Battle, BattleSnapshot, BattleStatus};
use crate::session::repository::{
    BattleRepository, CreatureRepository, LedgerEntry, Posting, UserRepository,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// How a finished battle still has to be recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingSettlement {
    winner: Option<PlayerTarget>,
    status: BattleStatus,
    /// The payout went through but could not be reversed, so a retry only
    /// rewrites the envelope.
    payout_applied: bool,
}

/// Everything the manager keeps for one battle between calls.
struct LiveBattle {
    envelope: Battle,
    combatants: [Option<BattlePokemon>; 2],
    state: Option<BattleState>,
    rng: TurnRng,
    escrowed: bool,
    settlement: Option<PendingSettlement>,
    /// Bumped after every failed money movement so retried ledger keys are fresh.
    attempts: u32,
    last_activity: DateTime<Utc>,
}

impl LiveBattle {
    fn snapshot(&self) -> BattleSnapshot {
        BattleSnapshot {
            battle: self.envelope.clone(),
            state: self.state.clone(),
            settlement_pending: self.settlement.is_some(),
        }
    }

    fn accepts_actions(&self) -> bool {
        self.envelope.status == BattleStatus::InProgress && self.settlement.is_none() && self.state.is_some()
    }
}

#[derive(Default)]
struct SessionIndex {
    battles: HashMap<Uuid, Arc<Mutex<LiveBattle>>>,
    /// Player to the battle they are currently in.
    players: HashMap<Uuid, Uuid>,
}

/// Owns every live battle and drives it from creation to settlement.
///
/// Each battle sits behind its own lock, so unrelated battles never wait on
/// each other. A short-lived index lock maps ids to battles. When both are
/// needed the battle lock is taken first.
pub struct BattleSessionManager {
    config: BattleConfig,
    users: Arc<dyn UserRepository>,
    creatures: Arc<dyn CreatureRepository>,
    battles: Arc<dyn BattleRepository>,
    definitions: Arc<dyn DefinitionLookup>,
    index: Mutex<SessionIndex>,
    /// Battles created so far; feeds the per-battle seed.
    created: AtomicU64,
}

impl BattleSessionManager {
    pub fn new(
        config: BattleConfig,
        users: Arc<dyn UserRepository>,
        creatures: Arc<dyn CreatureRepository>,
        battles: Arc<dyn BattleRepository>,
        definitions: Arc<dyn DefinitionLookup>,
    ) -> Self {
        Self {
            config,
            users,
            creatures,
            battles,
            definitions,
            index: Mutex::new(SessionIndex::default()),
            created: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &BattleConfig {
        &self.config
    }

    /// Opens a battle between two players. Nothing is escrowed until both
    /// have chosen a combatant.
    pub fn create(&self, player1_id: Uuid, player2_id: Uuid, wager: i64) -> SessionResult<Battle> {
        if player1_id == player2_id {
            return Err(SessionError::InvalidRequest("a player cannot battle themselves".to_string()));
        }
        if !self.config.wager_in_range(wager) {
            return Err(SessionError::InvalidRequest(format!(
                "wager {} is outside {}..={}",
                wager, self.config.min_wager, self.config.max_wager
            )));
        }
        for player_id in [player1_id, player2_id] {
            let balance = self.user_balance(player_id)?;
            if balance < wager {
                return Err(SessionError::InsufficientFunds {
                    user: player_id,
                    required: wager,
                    available: balance,
                });
            }
        }

        let now = Utc::now();
        let envelope = Battle::new(Uuid::new_v4(), player1_id, player2_id, wager, now);
        let battle_id = envelope.id;
        let live = LiveBattle {
            rng: self.battle_rng(),
            envelope,
            combatants: [None, None],
            state: None,
            escrowed: false,
            settlement: None,
            attempts: 0,
            last_activity: now,
        };
        let handle = Arc::new(Mutex::new(live));
        let live = lock_live(&handle)?;

        {
            let mut index = self.lock_index()?;
            for player_id in [player1_id, player2_id] {
                if index.players.contains_key(&player_id) {
                    return Err(SessionError::BattleAlreadyExists(player_id));
                }
            }
            index.battles.insert(battle_id, Arc::clone(&handle));
            index.players.insert(player1_id, battle_id);
            index.players.insert(player2_id, battle_id);
        }

        if let Err(err) = self.battles.create(&live.envelope) {
            tracing::warn!(battle_id = %battle_id, error = %err, "failed to persist new battle");
            self.evict(&live.envelope)?;
            return Err(err.into());
        }

        tracing::info!(
            battle_id = %battle_id,
            player1 = %player1_id,
            player2 = %player2_id,
            wager,
            "battle created"
        );
        Ok(live.envelope.clone())
    }

    /// Records a player's combatant. The second selection starts the battle:
    /// both wagers are escrowed and the envelope moves to in progress.
    pub fn select_combatant(&self, battle_id: Uuid, player_id: Uuid, creature_id: Uuid) -> SessionResult<Battle> {
        let handle = self.handle(battle_id)?;
        let mut guard = lock_live(&handle)?;
        let live = &mut *guard;

        if live.envelope.status != BattleStatus::WaitingForPlayers {
            return Err(SessionError::BattleNotActive);
        }
        let side = live
            .envelope
            .side_of(player_id)
            .ok_or(SessionError::PlayerNotInBattle(player_id))?;
        if live.envelope.creature(side).is_some() {
            return Err(SessionError::CombatantAlreadySelected(player_id));
        }

        let creature = self.creatures.get_creature(creature_id).map_err(|err| match err {
            RepositoryError::NotFound(_) => SessionError::CreatureNotFound(creature_id),
            other => SessionError::Repository(other),
        })?;
        if creature.owner_id != player_id {
            return Err(SessionError::CreatureNotOwned {
                creature: creature_id,
                player: player_id,
            });
        }
        let combatant = self.load_combatant(&creature)?;

        live.envelope.set_creature(side, creature_id);
        live.combatants[side.to_index()] = Some(combatant);
        live.last_activity = Utc::now();

        let result = if live.envelope.both_selected() {
            self.start_battle(live)
        } else {
            self.battles.update(&live.envelope).map_err(SessionError::from)
        };
        if let Err(err) = result {
            live.envelope.clear_creature(side);
            live.combatants[side.to_index()] = None;
            return Err(err);
        }

        tracing::info!(battle_id = %battle_id, player = %player_id, creature = %creature_id, "combatant selected");
        Ok(live.envelope.clone())
    }

    /// Queues an action. Once both sides have one the turn resolves and its
    /// result is returned; until then the result is `None`.
    ///
    /// If the turn ends the battle but settlement fails, the error is returned
    /// instead. The turn still happened: its events are in the state log that
    /// `get_state` returns while the settlement is pending.
    pub fn submit_action(
        &self,
        battle_id: Uuid,
        player_id: Uuid,
        action: PlayerAction,
    ) -> SessionResult<Option<TurnResolution>> {
        let handle = self.handle(battle_id)?;
        let mut guard = lock_live(&handle)?;
        let live = &mut *guard;

        let side = live
            .envelope
            .side_of(player_id)
            .ok_or(SessionError::PlayerNotInBattle(player_id))?;
        if !live.accepts_actions() {
            return Err(SessionError::BattleNotActive);
        }
        let Some(state) = live.state.as_mut() else {
            return Err(SessionError::BattleNotActive);
        };

        state.submit_action(side, action)?;
        live.last_activity = Utc::now();
        if !state.ready_for_turn_resolution() {
            tracing::debug!(battle_id = %battle_id, side = ?side, "action queued");
            return Ok(None);
        }

        let resolution = resolve_turn(state, &mut live.rng);
        live.envelope.current_turn = state.turn_number;
        tracing::debug!(battle_id = %battle_id, turn = resolution.turn, "turn resolved");

        if let Some(outcome) = resolution.outcome {
            let status = match outcome.reason {
                EndReason::Fainted => BattleStatus::Completed,
                EndReason::Forfeit => BattleStatus::Abandoned,
            };
            self.settle(live, Some(outcome.winner), status)?;
        } else if let Err(err) = self.battles.update(&live.envelope) {
            // The live state stays authoritative; the next write catches up.
            tracing::warn!(battle_id = %battle_id, error = %err, "failed to persist turn counter");
        }

        Ok(Some(resolution))
    }

    /// Ends the battle in the opponent's favour. Before both combatants are
    /// chosen nothing has been escrowed, so the battle is simply abandoned.
    pub fn forfeit(&self, battle_id: Uuid, player_id: Uuid) -> SessionResult<Battle> {
        let handle = self.handle(battle_id)?;
        let mut guard = lock_live(&handle)?;
        let live = &mut *guard;

        let side = live
            .envelope
            .side_of(player_id)
            .ok_or(SessionError::PlayerNotInBattle(player_id))?;
        if live.envelope.status.is_terminal() || live.settlement.is_some() {
            return Err(SessionError::BattleNotActive);
        }

        let winner = match live.state.as_mut() {
            Some(state) => {
                apply_forfeit(state, side);
                Some(side.opponent())
            }
            None => None,
        };
        tracing::info!(battle_id = %battle_id, player = %player_id, "player forfeited");
        self.settle(live, winner, BattleStatus::Abandoned)?;
        Ok(live.envelope.clone())
    }

    /// A copy of the battle as it stands. Battles that are no longer live are
    /// read back from the repository without a state.
    pub fn get_state(&self, battle_id: Uuid) -> SessionResult<BattleSnapshot> {
        if let Some(handle) = self.find_handle(battle_id)? {
            return Ok(lock_live(&handle)?.snapshot());
        }
        let battle = self.battles.get(battle_id).map_err(|err| match err {
            RepositoryError::NotFound(_) => SessionError::BattleNotFound(battle_id),
            other => SessionError::Repository(other),
        })?;
        Ok(BattleSnapshot {
            battle,
            state: None,
            settlement_pending: false,
        })
    }

    /// Envelopes of every battle still held in memory, oldest first.
    pub fn list_active_battles(&self) -> SessionResult<Vec<Battle>> {
        let mut active = Vec::new();
        for handle in self.all_handles()? {
            active.push(lock_live(&handle)?.envelope.clone());
        }
        active.sort_by_key(|battle| battle.created_at);
        Ok(active)
    }

    pub fn player_battle(&self, player_id: Uuid) -> SessionResult<Option<Uuid>> {
        Ok(self.lock_index()?.players.get(&player_id).copied())
    }

    /// Tries again to record a battle whose settlement failed.
    pub fn retry_settlement(&self, battle_id: Uuid) -> SessionResult<Battle> {
        let handle = self.handle(battle_id)?;
        let mut guard = lock_live(&handle)?;
        let live = &mut *guard;
        if live.settlement.is_none() {
            return Err(SessionError::BattleNotActive);
        }
        self.complete_settlement(live)?;
        Ok(live.envelope.clone())
    }

    /// Ends battles idle for longer than the configured timeout and returns
    /// their ids. With exactly one side waiting on the other, the idle side
    /// forfeits; any other stalled battle is abandoned and refunded.
    pub fn expire_stalled(&self, now: DateTime<Utc>) -> SessionResult<Vec<Uuid>> {
        let Some(timeout_secs) = self.config.stall_timeout_secs else {
            return Ok(Vec::new());
        };

        let mut expired = Vec::new();
        for handle in self.all_handles()? {
            let mut guard = lock_live(&handle)?;
            let live = &mut *guard;
            if live.settlement.is_some()
                || live.envelope.status.is_terminal()
                || !idle_for(live.last_activity, now, timeout_secs)
            {
                continue;
            }

            let battle_id = live.envelope.id;
            let waiting: Vec<PlayerTarget> = match live.state.as_ref() {
                Some(state) => PlayerTarget::both()
                    .into_iter()
                    .filter(|side| state.player(*side).has_submitted())
                    .collect(),
                None => Vec::new(),
            };

            let winner = match (waiting.as_slice(), live.state.as_mut()) {
                ([ready], Some(state)) => {
                    apply_forfeit(state, ready.opponent());
                    Some(*ready)
                }
                _ => None,
            };
            tracing::info!(battle_id = %battle_id, winner = ?winner, "expiring stalled battle");

            match self.settle(live, winner, BattleStatus::Abandoned) {
                Ok(()) => expired.push(battle_id),
                Err(err) => {
                    tracing::warn!(battle_id = %battle_id, error = %err, "stalled battle left pending settlement");
                }
            }
        }
        Ok(expired)
    }

    fn start_battle(&self, live: &mut LiveBattle) -> SessionResult<()> {
        let battle_id = live.envelope.id;
        let wager = live.envelope.wager;
        let [Some(first), Some(second)] = live.combatants.clone() else {
            return Err(SessionError::BattleNotActive);
        };

        // A refund that failed on an earlier attempt leaves the wagers held.
        if wager > 0 && !live.escrowed {
            let entry = LedgerEntry::new(
                format!("escrow:{}:{}", battle_id, live.attempts),
                postings(&live.envelope.players(), -wager),
            );
            self.users.post_ledger_entry(&entry).map_err(|err| match err {
                RepositoryError::InsufficientBalance { user, available, .. } => SessionError::InsufficientFunds {
                    user,
                    required: wager,
                    available,
                },
                other => SessionError::Repository(other),
            })?;
            live.escrowed = true;
        }

        let now = Utc::now();
        live.envelope.status = BattleStatus::InProgress;
        live.envelope.started_at = Some(now);
        live.envelope.current_turn = 1;

        if let Err(original) = self.battles.update(&live.envelope) {
            live.envelope.status = BattleStatus::WaitingForPlayers;
            live.envelope.started_at = None;
            live.envelope.current_turn = 0;
            let refunded = self.refund_escrow(live);
            live.attempts += 1;
            return match refunded {
                Ok(()) => {
                    tracing::warn!(battle_id = %battle_id, error = %original, "battle start not persisted, escrow refunded");
                    Err(original.into())
                }
                Err(compensation) => {
                    tracing::error!(
                        battle_id = %battle_id,
                        error = %original,
                        compensation = %compensation,
                        "battle start not persisted and escrow refund failed"
                    );
                    Err(SessionError::CompensationFailed {
                        battle_id,
                        original,
                        compensation,
                    })
                }
            };
        }

        let mut state = BattleState::new(
            battle_id,
            BattlePlayer::new(live.envelope.player1_id, first),
            BattlePlayer::new(live.envelope.player2_id, second),
        );
        apply_entry_abilities(&mut state, &mut live.rng);
        live.state = Some(state);
        live.last_activity = now;

        tracing::info!(battle_id = %battle_id, wager, "battle started");
        Ok(())
    }

    fn refund_escrow(&self, live: &mut LiveBattle) -> Result<(), RepositoryError> {
        if !live.escrowed {
            return Ok(());
        }
        let entry = LedgerEntry::new(
            format!("escrow-refund:{}:{}", live.envelope.id, live.attempts),
            postings(&live.envelope.players(), live.envelope.wager),
        );
        self.users.post_ledger_entry(&entry)?;
        live.escrowed = false;
        Ok(())
    }

    fn settle(&self, live: &mut LiveBattle, winner: Option<PlayerTarget>, status: BattleStatus) -> SessionResult<()> {
        live.settlement = Some(PendingSettlement {
            winner,
            status,
            payout_applied: false,
        });
        self.complete_settlement(live)
    }

    /// Pays out, writes the terminal envelope and evicts the battle. A failed
    /// envelope write reverses the payout and leaves the settlement pending.
    fn complete_settlement(&self, live: &mut LiveBattle) -> SessionResult<()> {
        let Some(mut pending) = live.settlement else {
            return Ok(());
        };
        let battle_id = live.envelope.id;
        let wager = live.envelope.wager;
        let winner_id = pending.winner.map(|side| live.envelope.player_id(side));

        let payout = match (live.escrowed && !pending.payout_applied, winner_id) {
            (false, _) => None,
            (true, Some(winner)) => Some(LedgerEntry::new(
                format!("payout:{}:{}", battle_id, live.attempts),
                vec![Posting {
                    user_id: winner,
                    delta: 2 * wager,
                }],
            )),
            (true, None) => Some(LedgerEntry::new(
                format!("refund:{}:{}", battle_id, live.attempts),
                postings(&live.envelope.players(), wager),
            )),
        };
        if let Some(entry) = &payout {
            if let Err(err) = self.users.post_ledger_entry(entry) {
                tracing::warn!(battle_id = %battle_id, key = %entry.key, error = %err, "payout failed");
                return Err(err.into());
            }
        }

        let previous = live.envelope.clone();
        live.envelope.status = pending.status;
        live.envelope.winner_id = winner_id;
        live.envelope.completed_at = Some(Utc::now());

        if let Err(original) = self.battles.update(&live.envelope) {
            live.envelope = previous;
            let reversal = payout.map(|entry| {
                let reversed = entry
                    .postings
                    .iter()
                    .map(|p| Posting {
                        user_id: p.user_id,
                        delta: -p.delta,
                    })
                    .collect();
                LedgerEntry::new(format!("payout-reversal:{}:{}", battle_id, live.attempts), reversed)
            });
            live.attempts += 1;

            if let Some(reversal) = reversal {
                if let Err(compensation) = self.users.post_ledger_entry(&reversal) {
                    pending.payout_applied = true;
                    live.settlement = Some(pending);
                    tracing::error!(
                        battle_id = %battle_id,
                        error = %original,
                        compensation = %compensation,
                        "settlement not persisted and payout reversal failed"
                    );
                    return Err(SessionError::CompensationFailed {
                        battle_id,
                        original,
                        compensation,
                    });
                }
            }
            tracing::warn!(battle_id = %battle_id, error = %original, "settlement not persisted, payout reversed");
            return Err(original.into());
        }

        live.settlement = None;
        live.escrowed = false;
        self.evict(&live.envelope)?;
        tracing::info!(
            battle_id = %battle_id,
            status = ?live.envelope.status,
            winner = ?winner_id,
            "battle settled"
        );
        Ok(())
    }

    fn load_combatant(&self, creature: &OwnedCreature) -> SessionResult<BattlePokemon> {
        if !creature.ivs.is_valid() || !(1..=100).contains(&creature.level) {
            return Err(SessionError::InvalidRequest(format!(
                "creature {} has out-of-range IVs or level",
                creature.id
            )));
        }
        let species = self.creatures.get_species(creature.species_id)?;
        let names = if creature.moves.is_empty() {
            &self.config.default_moves
        } else {
            &creature.moves
        };
        let moves = self.definitions.resolve_moves(names)?;
        let ability = creature
            .ability
            .as_deref()
            .and_then(|name| self.definitions.get_ability(name));
        let held_item = creature
            .held_item
            .as_deref()
            .and_then(|name| self.definitions.get_item(name));
        Ok(BattlePokemon::from_owned(creature, species, moves, ability, held_item))
    }

    fn user_balance(&self, user_id: Uuid) -> SessionResult<i64> {
        self.users
            .get_by_id(user_id)
            .map(|user| user.balance)
            .map_err(|err| match err {
                RepositoryError::NotFound(_) => SessionError::UserNotFound(user_id),
                other => SessionError::Repository(other),
            })
    }

    /// Seeded battles offset the base seed by their creation order, so the
    /// same sequence of calls replays the same rolls.
    fn battle_rng(&self) -> TurnRng {
        let sequence = self.created.fetch_add(1, Ordering::Relaxed);
        match self.config.rng_seed {
            Some(seed) => TurnRng::from_seed(seed.wrapping_add(sequence)),
            None => TurnRng::new_random(),
        }
    }

    fn lock_index(&self) -> SessionResult<MutexGuard<'_, SessionIndex>> {
        self.index.lock().map_err(|_| SessionError::LockPoisoned)
    }

    fn find_handle(&self, battle_id: Uuid) -> SessionResult<Option<Arc<Mutex<LiveBattle>>>> {
        Ok(self.lock_index()?.battles.get(&battle_id).cloned())
    }

    fn handle(&self, battle_id: Uuid) -> SessionResult<Arc<Mutex<LiveBattle>>> {
        self.find_handle(battle_id)?
            .ok_or(SessionError::BattleNotFound(battle_id))
    }

    fn all_handles(&self) -> SessionResult<Vec<Arc<Mutex<LiveBattle>>>> {
        Ok(self.lock_index()?.battles.values().cloned().collect())
    }

    fn evict(&self, envelope: &Battle) -> SessionResult<()> {
        let mut index = self.lock_index()?;
        index.battles.remove(&envelope.id);
        for player_id in envelope.players() {
            if index.players.get(&player_id) == Some(&envelope.id) {
                index.players.remove(&player_id);
            }
        }
        Ok(())
    }
}

fn lock_live(handle: &Arc<Mutex<LiveBattle>>) -> SessionResult<MutexGuard<'_, LiveBattle>> {
    handle.lock().map_err(|_| SessionError::LockPoisoned)
}

/// Clock skew that puts `now` before the last activity never counts as idle.
fn idle_for(last_activity: DateTime<Utc>, now: DateTime<Utc>, timeout_secs: u64) -> bool {
    u64::try_from(now.signed_duration_since(last_activity).num_seconds())
        .is_ok_and(|elapsed| elapsed >= timeout_secs)
}

fn postings(players: &[Uuid; 2], delta: i64) -> Vec<Posting> {
    players
        .iter()
        .map(|user_id| Posting {
            user_id: *user_id,
            delta,
        })
        .collect()
}
