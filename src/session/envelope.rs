use crate::battle::state::BattleState;
use crate::player::PlayerTarget;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattleStatus {
    WaitingForPlayers,
    InProgress,
    /// Ended by a knockout; the winner was paid.
    Completed,
    /// Ended by a forfeit or by expiry.
    Abandoned,
}

impl BattleStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, BattleStatus::Completed | BattleStatus::Abandoned)
    }
}

/// The persisted record of a battle. The live [`BattleState`] is held by the
/// session manager and is not part of it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Battle {
    pub id: Uuid,
    pub player1_id: Uuid,
    pub player2_id: Uuid,
    pub player1_creature: Option<Uuid>,
    pub player2_creature: Option<Uuid>,
    pub wager: i64,
    pub status: BattleStatus,
    pub winner_id: Option<Uuid>,
    pub current_turn: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Battle {
    pub fn new(id: Uuid, player1_id: Uuid, player2_id: Uuid, wager: i64, now: DateTime<Utc>) -> Self {
        Self {
            id,
            player1_id,
            player2_id,
            player1_creature: None,
            player2_creature: None,
            wager,
            status: BattleStatus::WaitingForPlayers,
            winner_id: None,
            current_turn: 0,
            created_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn side_of(&self, player_id: Uuid) -> Option<PlayerTarget> {
        if player_id == self.player1_id {
            Some(PlayerTarget::Player1)
        } else if player_id == self.player2_id {
            Some(PlayerTarget::Player2)
        } else {
            None
        }
    }

    pub fn player_id(&self, side: PlayerTarget) -> Uuid {
        match side {
            PlayerTarget::Player1 => self.player1_id,
            PlayerTarget::Player2 => self.player2_id,
        }
    }

    pub fn creature(&self, side: PlayerTarget) -> Option<Uuid> {
        match side {
            PlayerTarget::Player1 => self.player1_creature,
            PlayerTarget::Player2 => self.player2_creature,
        }
    }

    pub fn set_creature(&mut self, side: PlayerTarget, creature_id: Uuid) {
        match side {
            PlayerTarget::Player1 => self.player1_creature = Some(creature_id),
            PlayerTarget::Player2 => self.player2_creature = Some(creature_id),
        }
    }

    pub fn clear_creature(&mut self, side: PlayerTarget) {
        match side {
            PlayerTarget::Player1 => self.player1_creature = None,
            PlayerTarget::Player2 => self.player2_creature = None,
        }
    }

    pub fn both_selected(&self) -> bool {
        self.player1_creature.is_some() && self.player2_creature.is_some()
    }

    pub fn players(&self) -> [Uuid; 2] {
        [self.player1_id, self.player2_id]
    }
}

/// A point-in-time copy of a battle for callers outside the session manager.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BattleSnapshot {
    pub battle: Battle,
    /// Present while the battle is live.
    pub state: Option<BattleState>,
    /// The battle ended but its payout has not been recorded yet.
    pub settlement_pending: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sides_and_selection() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut battle = Battle::new(Uuid::new_v4(), a, b, 50, Utc::now());

        assert_eq!(battle.side_of(a), Some(PlayerTarget::Player1));
        assert_eq!(battle.side_of(b), Some(PlayerTarget::Player2));
        assert_eq!(battle.side_of(Uuid::new_v4()), None);
        assert_eq!(battle.player_id(PlayerTarget::Player2), b);

        battle.set_creature(PlayerTarget::Player2, Uuid::nil());
        assert!(!battle.both_selected());
        battle.set_creature(PlayerTarget::Player1, Uuid::nil());
        assert!(battle.both_selected());
        assert!(!battle.status.is_terminal());
    }
}
