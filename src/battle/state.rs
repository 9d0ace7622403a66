use crate::errors::{ActionError, ActionResult};
use crate::player::{BattlePlayer, PlayerAction, PlayerTarget};
use crate::pokemon::BattlePokemon;
use chrono::{DateTime, Utc};
use schema::{HazardType, StatType, StatusKind, Terrain, Weather};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Copy)]
pub enum GameState {
    WaitingForActions,
    TurnInProgress,
    Player1Win,
    Player2Win,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionFailureReason {
    Asleep,
    Frozen,
    FullyParalyzed,
    Flinched,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    Fainted,
    Forfeit,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BattleOutcome {
    pub winner: PlayerTarget,
    pub reason: EndReason,
}

/// Where an end-of-turn HP change came from.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum ResidualSource {
    Weather(Weather),
    Status(StatusKind),
    Terrain(Terrain),
    Item(String),
    Ability(String),
}

impl std::fmt::Display for ResidualSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResidualSource::Weather(w) => write!(f, "the {:?}", w),
            ResidualSource::Status(s) => write!(f, "its {}", s),
            ResidualSource::Terrain(t) => write!(f, "the {:?} Terrain", t),
            ResidualSource::Item(name) | ResidualSource::Ability(name) => write!(f, "its {}", name),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum BattleEvent {
    // Turn Management
    TurnStarted {
        turn_number: u32,
    },
    TurnEnded {
        turn_number: u32,
    },

    // Actions
    MoveUsed {
        player: PlayerTarget,
        pokemon: String,
        move_name: String,
    },
    ActionPrevented {
        player: PlayerTarget,
        pokemon: String,
        reason: ActionFailureReason,
    },
    WokeUp {
        player: PlayerTarget,
        pokemon: String,
    },
    Thawed {
        player: PlayerTarget,
        pokemon: String,
    },
    MoveMissed {
        player: PlayerTarget,
        pokemon: String,
        move_name: String,
    },
    MoveHadNoEffect {
        target: PlayerTarget,
        pokemon: String,
    },
    MoveFailed {
        player: PlayerTarget,
    },
    CriticalHit {
        player: PlayerTarget,
    },
    AttackTypeEffectiveness {
        multiplier: f64,
    },
    MultiHitCompleted {
        hits: u8,
    },
    PlayerForfeited {
        player: PlayerTarget,
    },

    // Damage and Healing
    DamageDealt {
        target: PlayerTarget,
        pokemon: String,
        damage: u16,
        remaining_hp: u16,
    },
    RecoilTaken {
        target: PlayerTarget,
        pokemon: String,
        damage: u16,
    },
    PokemonHealed {
        target: PlayerTarget,
        pokemon: String,
        amount: u16,
        new_hp: u16,
    },
    ResidualDamage {
        target: PlayerTarget,
        pokemon: String,
        source: ResidualSource,
        damage: u16,
    },
    ResidualHeal {
        target: PlayerTarget,
        pokemon: String,
        source: ResidualSource,
        amount: u16,
    },
    PokemonFainted {
        player: PlayerTarget,
        pokemon: String,
    },

    // Status and Stats
    StatusApplied {
        target: PlayerTarget,
        pokemon: String,
        status: StatusKind,
    },
    StatusCured {
        target: PlayerTarget,
        pokemon: String,
        status: StatusKind,
    },
    Flinched {
        target: PlayerTarget,
        pokemon: String,
    },
    StatStageChanged {
        target: PlayerTarget,
        pokemon: String,
        stat: StatType,
        delta: i8,
    },
    StatChangeBlocked {
        target: PlayerTarget,
        pokemon: String,
        stat: StatType,
        rising: bool,
    },

    // Field
    WeatherStarted {
        weather: Weather,
    },
    WeatherEnded {
        weather: Weather,
    },
    TerrainStarted {
        terrain: Terrain,
    },
    TerrainEnded {
        terrain: Terrain,
    },
    HazardSet {
        side: PlayerTarget,
        hazard: HazardType,
        layers: u8,
    },
    ItemConsumed {
        target: PlayerTarget,
        pokemon: String,
        item: String,
    },

    // Battle End
    BattleEnded {
        winner: PlayerTarget,
        reason: EndReason,
    },
}

impl BattleEvent {
    /// Formats the event into a human-readable string.
    /// Returns None for silent events that should not produce user-visible text.
    pub fn format(&self) -> Option<String> {
        match self {
            BattleEvent::TurnStarted { turn_number } => Some(format!("=== Turn {} ===", turn_number)),
            BattleEvent::TurnEnded { .. } => None,

            BattleEvent::MoveUsed { pokemon, move_name, .. } => {
                Some(format!("{} used {}!", pokemon, move_name))
            }
            BattleEvent::ActionPrevented { pokemon, reason, .. } => Some(match reason {
                ActionFailureReason::Asleep => format!("{} is fast asleep!", pokemon),
                ActionFailureReason::Frozen => format!("{} is frozen solid!", pokemon),
                ActionFailureReason::FullyParalyzed => format!("{} is fully paralyzed!", pokemon),
                ActionFailureReason::Flinched => format!("{} flinched and couldn't move!", pokemon),
            }),
            BattleEvent::WokeUp { pokemon, .. } => Some(format!("{} woke up!", pokemon)),
            BattleEvent::Thawed { pokemon, .. } => Some(format!("{} thawed out!", pokemon)),
            BattleEvent::MoveMissed { pokemon, .. } => Some(format!("{}'s attack missed!", pokemon)),
            BattleEvent::MoveHadNoEffect { pokemon, .. } => {
                Some(format!("It doesn't affect {}...", pokemon))
            }
            BattleEvent::MoveFailed { .. } => Some("But it failed!".to_string()),
            BattleEvent::CriticalHit { .. } => Some("A critical hit!".to_string()),
            BattleEvent::AttackTypeEffectiveness { multiplier } => match *multiplier {
                m if m > 1.0 => Some("It's super effective!".to_string()),
                m if m < 1.0 && m > 0.0 => Some("It's not very effective...".to_string()),
                _ => None,
            },
            BattleEvent::MultiHitCompleted { hits } => Some(format!("Hit {} time(s)!", hits)),
            BattleEvent::PlayerForfeited { player } => Some(format!("{:?} forfeited the battle!", player)),

            BattleEvent::DamageDealt { pokemon, damage, .. } => {
                Some(format!("{} took {} damage!", pokemon, damage))
            }
            BattleEvent::RecoilTaken { pokemon, damage, .. } => {
                Some(format!("{} took {} recoil damage!", pokemon, damage))
            }
            BattleEvent::PokemonHealed { pokemon, amount, .. } => {
                Some(format!("{} restored {} HP!", pokemon, amount))
            }
            BattleEvent::ResidualDamage { pokemon, source, damage, .. } => {
                Some(format!("{} is hurt by {}! ({} damage)", pokemon, source, damage))
            }
            BattleEvent::ResidualHeal { pokemon, source, amount, .. } => {
                Some(format!("{} restored {} HP thanks to {}!", pokemon, amount, source))
            }
            BattleEvent::PokemonFainted { pokemon, .. } => Some(format!("{} fainted!", pokemon)),

            BattleEvent::StatusApplied { pokemon, status, .. } => Some(match status {
                StatusKind::Burn => format!("{} was burned!", pokemon),
                StatusKind::Freeze => format!("{} was frozen solid!", pokemon),
                StatusKind::Paralysis => format!("{} is paralyzed! It may be unable to move!", pokemon),
                StatusKind::Poison => format!("{} was poisoned!", pokemon),
                StatusKind::BadlyPoisoned => format!("{} was badly poisoned!", pokemon),
                StatusKind::Sleep => format!("{} fell asleep!", pokemon),
            }),
            BattleEvent::StatusCured { pokemon, status, .. } => {
                Some(format!("{} was cured of its {}!", pokemon, status))
            }
            BattleEvent::Flinched { .. } => None,
            BattleEvent::StatStageChanged { pokemon, stat, delta, .. } => {
                let verb = match *delta {
                    d if d >= 2 => "rose sharply",
                    d if d > 0 => "rose",
                    d if d <= -2 => "harshly fell",
                    _ => "fell",
                };
                Some(format!("{}'s {} {}!", pokemon, stat, verb))
            }
            BattleEvent::StatChangeBlocked { pokemon, stat, rising, .. } => {
                let direction = if *rising { "higher" } else { "lower" };
                Some(format!("{}'s {} won't go any {}!", pokemon, stat, direction))
            }

            BattleEvent::WeatherStarted { weather } => Some(weather.start_message().to_string()),
            BattleEvent::WeatherEnded { .. } => Some("The weather returned to normal.".to_string()),
            BattleEvent::TerrainStarted { terrain } => Some(terrain.start_message().to_string()),
            BattleEvent::TerrainEnded { .. } => Some("The terrain faded.".to_string()),
            BattleEvent::HazardSet { side, hazard, layers } => {
                Some(format!("{} now covers {:?}'s side ({} layer(s))!", hazard, side, layers))
            }
            BattleEvent::ItemConsumed { pokemon, item, .. } => {
                Some(format!("{} used up its {}!", pokemon, item))
            }

            BattleEvent::BattleEnded { winner, reason } => Some(match reason {
                EndReason::Fainted => format!("{:?} has won the battle!", winner),
                EndReason::Forfeit => format!("{:?} wins by forfeit!", winner),
            }),
        }
    }

    /// Category tag written to the battle log.
    pub fn log_kind(&self) -> &'static str {
        match self {
            BattleEvent::TurnStarted { .. } | BattleEvent::TurnEnded { .. } => "turn",
            BattleEvent::MoveUsed { .. }
            | BattleEvent::MoveMissed { .. }
            | BattleEvent::MoveHadNoEffect { .. }
            | BattleEvent::MoveFailed { .. }
            | BattleEvent::CriticalHit { .. }
            | BattleEvent::AttackTypeEffectiveness { .. }
            | BattleEvent::MultiHitCompleted { .. } => "move",
            BattleEvent::ActionPrevented { .. }
            | BattleEvent::WokeUp { .. }
            | BattleEvent::Thawed { .. }
            | BattleEvent::StatusApplied { .. }
            | BattleEvent::StatusCured { .. }
            | BattleEvent::Flinched { .. } => "status",
            BattleEvent::DamageDealt { .. }
            | BattleEvent::RecoilTaken { .. }
            | BattleEvent::ResidualDamage { .. } => "damage",
            BattleEvent::PokemonHealed { .. } | BattleEvent::ResidualHeal { .. } => "heal",
            BattleEvent::StatStageChanged { .. } | BattleEvent::StatChangeBlocked { .. } => "stat",
            BattleEvent::WeatherStarted { .. } | BattleEvent::WeatherEnded { .. } => "weather",
            BattleEvent::TerrainStarted { .. } | BattleEvent::TerrainEnded { .. } => "terrain",
            BattleEvent::HazardSet { .. } => "hazard",
            BattleEvent::ItemConsumed { .. } => "item",
            BattleEvent::PokemonFainted { .. } => "faint",
            BattleEvent::PlayerForfeited { .. } | BattleEvent::BattleEnded { .. } => "battle_end",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct EventBus {
    events: Vec<BattleEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn push(&mut self, event: BattleEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[BattleEvent] {
        &self.events
    }

    /// Formatted text of every non-silent event, in order.
    pub fn messages(&self) -> Vec<String> {
        self.events.iter().filter_map(BattleEvent::format).collect()
    }

    /// Return true if the event bus contains no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Return the number of events in the bus.
    pub fn len(&self) -> usize {
        self.events.len()
    }
}

impl std::fmt::Display for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for event in &self.events {
            match event.format() {
                Some(text) => writeln!(f, "  {}", text)?,
                None => writeln!(f, "  {:?}", event)?,
            }
        }
        Ok(())
    }
}

/// Append-only record of what happened in the battle.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BattleLogEntry {
    pub turn: u32,
    pub timestamp: DateTime<Utc>,
    pub kind: String,
    pub message: String,
    pub data: serde_json::Value,
}

/// Weather and terrain shared by both sides.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldState {
    pub weather: Option<Weather>,
    pub weather_turns: u8,
    pub terrain: Option<Terrain>,
    pub terrain_turns: u8,
}

impl FieldState {
    pub fn set_weather(&mut self, weather: Weather, duration: u8) {
        self.weather = Some(weather);
        self.weather_turns = duration;
    }

    pub fn set_terrain(&mut self, terrain: Terrain, duration: u8) {
        self.terrain = Some(terrain);
        self.terrain_turns = duration;
    }

    /// Counts weather down by one turn; returns the weather that just ended.
    pub fn tick_weather(&mut self) -> Option<Weather> {
        if self.weather_turns == 0 {
            return None;
        }
        self.weather_turns -= 1;
        if self.weather_turns == 0 {
            return self.weather.take();
        }
        None
    }

    /// Counts terrain down by one turn; returns the terrain that just ended.
    pub fn tick_terrain(&mut self) -> Option<Terrain> {
        if self.terrain_turns == 0 {
            return None;
        }
        self.terrain_turns -= 1;
        if self.terrain_turns == 0 {
            return self.terrain.take();
        }
        None
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Prevented(ActionFailureReason),
    Missed,
    Immune,
    Damaged {
        damage: u16,
        hits: u8,
        critical: bool,
        effectiveness: f64,
    },
    StatusMoveUsed,
    Failed,
    Forfeited,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ResolvedAction {
    pub player: PlayerTarget,
    pub action: PlayerAction,
    pub move_name: Option<String>,
    pub outcome: ActionOutcome,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResidualKind {
    Damage,
    Heal,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ResidualEffect {
    pub target: PlayerTarget,
    pub source: ResidualSource,
    pub kind: ResidualKind,
    pub amount: u16,
}

/// Everything one call to `resolve_turn` did.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct TurnResolution {
    pub turn: u32,
    pub actions: Vec<ResolvedAction>,
    pub residuals: Vec<ResidualEffect>,
    pub battle_ended: bool,
    pub outcome: Option<BattleOutcome>,
    pub events: EventBus,
}

impl TurnResolution {
    pub fn empty(turn: u32) -> Self {
        Self {
            turn,
            ..Default::default()
        }
    }

    pub fn winner(&self) -> Option<PlayerTarget> {
        self.outcome.map(|o| o.winner)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BattleState {
    pub battle_id: Uuid,
    pub players: [BattlePlayer; 2],
    pub turn_number: u32,
    pub game_state: GameState,
    pub field: FieldState,
    pub outcome: Option<BattleOutcome>,
    pub log: Vec<BattleLogEntry>,
}

impl BattleState {
    pub fn new(id: Uuid, player1: BattlePlayer, player2: BattlePlayer) -> Self {
        Self {
            battle_id: id,
            players: [player1, player2],
            turn_number: 1,
            game_state: GameState::WaitingForActions,
            field: FieldState::default(),
            outcome: None,
            log: Vec::new(),
        }
    }

    pub fn player(&self, target: PlayerTarget) -> &BattlePlayer {
        &self.players[target.to_index()]
    }

    pub fn player_mut(&mut self, target: PlayerTarget) -> &mut BattlePlayer {
        &mut self.players[target.to_index()]
    }

    pub fn pokemon(&self, target: PlayerTarget) -> &BattlePokemon {
        &self.players[target.to_index()].pokemon
    }

    pub fn pokemon_mut(&mut self, target: PlayerTarget) -> &mut BattlePokemon {
        &mut self.players[target.to_index()].pokemon
    }

    /// Which side a player id is on, if either.
    pub fn side_of(&self, player_id: Uuid) -> Option<PlayerTarget> {
        PlayerTarget::both()
            .into_iter()
            .find(|t| self.player(*t).player_id == player_id)
    }

    pub fn is_ended(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn winner(&self) -> Option<PlayerTarget> {
        self.outcome.map(|o| o.winner)
    }

    /// Validates and queues an action for one side. Nothing changes on error.
    pub fn submit_action(&mut self, target: PlayerTarget, action: PlayerAction) -> ActionResult<()> {
        if self.is_ended() || self.game_state != GameState::WaitingForActions {
            return Err(ActionError::NotAcceptingActions);
        }
        let player = self.player(target);
        if player.has_submitted() {
            return Err(ActionError::AlreadySubmitted(target));
        }
        if let PlayerAction::UseMove { move_index } = action {
            player.pokemon.check_move_usable(move_index)?;
        }
        self.player_mut(target).pending_action = Some(action);
        Ok(())
    }

    pub fn ready_for_turn_resolution(&self) -> bool {
        self.players.iter().all(BattlePlayer::has_submitted)
    }

    pub fn clear_actions(&mut self) {
        for player in &mut self.players {
            player.pending_action = None;
        }
    }

    pub(crate) fn finish(&mut self, outcome: BattleOutcome) {
        self.outcome = Some(outcome);
        self.game_state = match outcome.winner {
            PlayerTarget::Player1 => GameState::Player1Win,
            PlayerTarget::Player2 => GameState::Player2Win,
        };
    }

    /// Appends the formatted events of a turn to the battle log.
    pub fn record_events(&mut self, turn: u32, events: &EventBus) {
        let timestamp = Utc::now();
        for event in events.events() {
            let Some(message) = event.format() else {
                continue;
            };
            self.log.push(BattleLogEntry {
                turn,
                timestamp,
                kind: event.log_kind().to_string(),
                message,
                data: serde_json::to_value(event).unwrap_or(serde_json::Value::Null),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::tests::common::{create_test_battle, physical_move, TestPokemonBuilder};
    use pretty_assertions::assert_eq;
    use schema::PokemonType;

    fn battle() -> BattleState {
        let tackle = physical_move("Tackle", PokemonType::Normal, 40);
        let p1 = TestPokemonBuilder::new("Alpha").with_moves(vec![tackle.clone()]).build();
        let p2 = TestPokemonBuilder::new("Beta").with_moves(vec![tackle]).build();
        create_test_battle(p1, p2)
    }

    #[test]
    fn test_second_submission_is_rejected_without_mutation() {
        let mut state = battle();
        let action = PlayerAction::UseMove { move_index: 0 };
        assert_eq!(state.submit_action(PlayerTarget::Player1, action), Ok(()));

        let before = serde_json::to_value(&state).expect("state serializes");
        let second = state.submit_action(PlayerTarget::Player1, PlayerAction::Forfeit);
        assert_eq!(second, Err(ActionError::AlreadySubmitted(PlayerTarget::Player1)));
        assert_eq!(serde_json::to_value(&state).expect("state serializes"), before);
    }

    #[test]
    fn test_out_of_range_move_is_rejected() {
        let mut state = battle();
        let result = state.submit_action(PlayerTarget::Player2, PlayerAction::UseMove { move_index: 3 });
        assert_eq!(result, Err(ActionError::InvalidMoveIndex(3)));
        assert!(!state.player(PlayerTarget::Player2).has_submitted());
    }

    #[test]
    fn test_move_without_pp_is_rejected() {
        let mut state = battle();
        state.pokemon_mut(PlayerTarget::Player1).moves[0].pp = 0;
        let result = state.submit_action(PlayerTarget::Player1, PlayerAction::UseMove { move_index: 0 });
        assert_eq!(result, Err(ActionError::MoveUnusable("Tackle".to_string())));
    }

    #[test]
    fn test_field_counters_snap_to_none() {
        let mut field = FieldState::default();
        field.set_weather(Weather::Rain, 2);
        assert_eq!(field.tick_weather(), None);
        assert_eq!(field.weather, Some(Weather::Rain));
        assert_eq!(field.tick_weather(), Some(Weather::Rain));
        assert_eq!(field.weather, None);
        assert_eq!(field.tick_weather(), None);
    }

    #[test]
    fn test_record_events_skips_silent_events() {
        let mut state = battle();
        let mut bus = EventBus::new();
        bus.push(BattleEvent::TurnStarted { turn_number: 1 });
        bus.push(BattleEvent::TurnEnded { turn_number: 1 });
        state.record_events(1, &bus);
        assert_eq!(state.log.len(), 1);
        assert_eq!(state.log[0].kind, "turn");
        assert_eq!(state.log[0].message, "=== Turn 1 ===");
    }
}
