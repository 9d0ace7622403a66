use crate::battle::calculators::{calculate_damage, percent_of, DamageContext};
use crate::battle::rng::TurnRng;
use crate::battle::state::{
    ActionFailureReason, ActionOutcome, BattleEvent, BattleOutcome, BattleState, EndReason, EventBus,
    GameState, ResidualEffect, ResidualKind, ResidualSource, ResolvedAction, TurnResolution,
};
use crate::battle::stats::{effective_priority, effective_speed};
use crate::effects::{active_ability_effects, active_item_effects, AbilityEffect, ItemEffect};
use crate::move_data::{MoveData, MultiHit, StatChange};
use crate::player::{PlayerAction, PlayerTarget, FORFEIT_PRIORITY};
use crate::pokemon::StatusCondition;
use schema::{EffectTarget, PokemonType, StatType, StatusKind, Terrain, Weather};
use std::cmp::Ordering;

/// Per-turn scratch state threaded through every phase.
struct TurnLog {
    bus: EventBus,
    faint_order: Vec<PlayerTarget>,
    actions: Vec<ResolvedAction>,
    residuals: Vec<ResidualEffect>,
}

impl TurnLog {
    fn new() -> Self {
        Self {
            bus: EventBus::new(),
            faint_order: Vec::new(),
            actions: Vec::new(),
            residuals: Vec::new(),
        }
    }
}

/// Main entry point for turn resolution.
///
/// Does nothing unless both sides have an action queued. Otherwise orders the
/// two actions, executes them, runs the end-of-turn phase if nobody fainted,
/// and advances the turn counter. The formatted events are appended to the
/// battle log.
pub fn resolve_turn(battle_state: &mut BattleState, rng: &mut TurnRng) -> TurnResolution {
    let turn = battle_state.turn_number;
    if battle_state.is_ended() || !battle_state.ready_for_turn_resolution() {
        return TurnResolution::empty(turn);
    }

    let mut log = TurnLog::new();

    // 1. Initialization
    battle_state.game_state = GameState::TurnInProgress;
    log.bus.push(BattleEvent::TurnStarted { turn_number: turn });

    // 2. Ordering
    let order = determine_action_order(battle_state, rng);

    // 3. Execution
    for (actor, action) in order {
        if battle_state.pokemon(actor).is_fainted() {
            continue;
        }
        let resolved = execute_action(battle_state, actor, action, &mut log, rng);
        log.actions.push(resolved);

        if battle_state.is_ended() || check_for_faints(battle_state, &mut log) {
            break;
        }
    }

    // 4. End-of-turn phase (only if the battle is still going)
    if !battle_state.is_ended() {
        execute_end_turn_phase(battle_state, &mut log);
        check_for_faints(battle_state, &mut log);
    }

    // 5. Cleanup & finalization
    finalize_turn(battle_state, &mut log);

    let TurnLog {
        bus,
        actions,
        residuals,
        ..
    } = log;
    battle_state.record_events(turn, &bus);

    TurnResolution {
        turn,
        actions,
        residuals,
        battle_ended: battle_state.is_ended(),
        outcome: battle_state.outcome,
        events: bus,
    }
}

/// Fires weather and terrain entry abilities once at battle start, faster
/// combatant first, so the slower one's effect is the one left standing.
pub fn apply_entry_abilities(battle_state: &mut BattleState, rng: &mut TurnRng) -> EventBus {
    let mut bus = EventBus::new();
    let turn = battle_state.turn_number;

    let speeds = PlayerTarget::both().map(|target| {
        let pokemon = battle_state.pokemon(target);
        let ctx = pokemon.condition_context(&battle_state.field, turn, None);
        effective_speed(pokemon, &ctx)
    });
    let order = match speeds[0].cmp(&speeds[1]) {
        Ordering::Greater => [PlayerTarget::Player1, PlayerTarget::Player2],
        Ordering::Less => [PlayerTarget::Player2, PlayerTarget::Player1],
        Ordering::Equal if rng.coin_flip("entry ability speed tie") => {
            [PlayerTarget::Player1, PlayerTarget::Player2]
        }
        Ordering::Equal => [PlayerTarget::Player2, PlayerTarget::Player1],
    };

    for target in order {
        let pokemon = battle_state.pokemon(target);
        let ctx = pokemon.condition_context(&battle_state.field, turn, None);
        let entries: Vec<AbilityEffect> = active_ability_effects(pokemon.ability.as_ref(), &ctx)
            .filter(|e| {
                matches!(
                    e,
                    AbilityEffect::SetWeatherOnEntry { .. } | AbilityEffect::SetTerrainOnEntry { .. }
                )
            })
            .cloned()
            .collect();

        for effect in entries {
            match effect {
                AbilityEffect::SetWeatherOnEntry { weather, duration } => {
                    battle_state.field.set_weather(weather, duration);
                    bus.push(BattleEvent::WeatherStarted { weather });
                }
                AbilityEffect::SetTerrainOnEntry { terrain, duration } => {
                    battle_state.field.set_terrain(terrain, duration);
                    bus.push(BattleEvent::TerrainStarted { terrain });
                }
                _ => {}
            }
        }
    }

    battle_state.record_events(turn, &bus);
    bus
}

/// Ends the battle outside turn resolution with `forfeiter` as the loser.
/// Queued actions are dropped. A battle that already ended is left alone.
pub fn apply_forfeit(battle_state: &mut BattleState, forfeiter: PlayerTarget) -> EventBus {
    let mut log = TurnLog::new();
    if !battle_state.is_ended() {
        execute_forfeit(battle_state, forfeiter, &mut log);
        battle_state.clear_actions();
    }
    let turn = battle_state.turn_number;
    battle_state.record_events(turn, &log.bus);
    log.bus
}

/// Orders the two queued actions: priority first, then effective speed, with
/// an exact tie settled by a coin flip.
pub fn determine_action_order(
    battle_state: &BattleState,
    rng: &mut TurnRng,
) -> Vec<(PlayerTarget, PlayerAction)> {
    let mut keyed: Vec<(PlayerTarget, PlayerAction, i8, u32)> = PlayerTarget::both()
        .into_iter()
        .filter_map(|target| {
            let action = battle_state.player(target).pending_action?;
            let (priority, speed) = calculate_action_priority(battle_state, target, action);
            Some((target, action, priority, speed))
        })
        .collect();

    let swap = match keyed.as_slice() {
        [first, second] => {
            let ordering = second.2.cmp(&first.2).then(second.3.cmp(&first.3));
            let swap = match ordering {
                Ordering::Less => false,
                Ordering::Greater => true,
                Ordering::Equal => !rng.coin_flip("speed tie"),
            };
            tracing::debug!(
                first_priority = first.2,
                first_speed = first.3,
                second_priority = second.2,
                second_speed = second.3,
                swapped = swap,
                "action order"
            );
            swap
        }
        _ => false,
    };
    if swap {
        keyed.swap(0, 1);
    }

    keyed
        .into_iter()
        .map(|(target, action, _, _)| (target, action))
        .collect()
}

fn calculate_action_priority(
    battle_state: &BattleState,
    target: PlayerTarget,
    action: PlayerAction,
) -> (i8, u32) {
    let pokemon = battle_state.pokemon(target);
    let turn = battle_state.turn_number;
    match action {
        PlayerAction::Forfeit => {
            let ctx = pokemon.condition_context(&battle_state.field, turn, None);
            (FORFEIT_PRIORITY, effective_speed(pokemon, &ctx))
        }
        PlayerAction::UseMove { move_index } => {
            let move_data = pokemon.moves.get(move_index).map(|m| &m.data);
            let ctx = pokemon.condition_context(&battle_state.field, turn, move_data);
            let priority = move_data.map_or(0, |m| effective_priority(pokemon, m, &ctx));
            (priority, effective_speed(pokemon, &ctx))
        }
    }
}

fn execute_action(
    battle_state: &mut BattleState,
    actor: PlayerTarget,
    action: PlayerAction,
    log: &mut TurnLog,
    rng: &mut TurnRng,
) -> ResolvedAction {
    match action {
        PlayerAction::Forfeit => {
            execute_forfeit(battle_state, actor, log);
            ResolvedAction {
                player: actor,
                action,
                move_name: None,
                outcome: ActionOutcome::Forfeited,
            }
        }
        PlayerAction::UseMove { move_index } => {
            let (move_name, outcome) = execute_move(battle_state, actor, move_index, log, rng);
            ResolvedAction {
                player: actor,
                action,
                move_name,
                outcome,
            }
        }
    }
}

fn execute_forfeit(battle_state: &mut BattleState, actor: PlayerTarget, log: &mut TurnLog) {
    let outcome = BattleOutcome {
        winner: actor.opponent(),
        reason: EndReason::Forfeit,
    };
    battle_state.finish(outcome);
    log.bus.push(BattleEvent::PlayerForfeited { player: actor });
    log.bus.push(BattleEvent::BattleEnded {
        winner: outcome.winner,
        reason: outcome.reason,
    });
}

fn execute_move(
    battle_state: &mut BattleState,
    actor: PlayerTarget,
    move_index: usize,
    log: &mut TurnLog,
    rng: &mut TurnRng,
) -> (Option<String>, ActionOutcome) {
    if let Some(reason) = check_action_preventing_conditions(battle_state, actor, log, rng) {
        let move_name = battle_state
            .pokemon(actor)
            .moves
            .get(move_index)
            .map(|m| m.data.name.clone());
        return (move_name, ActionOutcome::Prevented(reason));
    }

    let move_data = match battle_state.pokemon_mut(actor).use_move(move_index) {
        Ok(data) => data,
        Err(err) => {
            tracing::debug!(?actor, %err, "move failed at execution");
            log.bus.push(BattleEvent::MoveFailed { player: actor });
            return (None, ActionOutcome::Failed);
        }
    };

    log.bus.push(BattleEvent::MoveUsed {
        player: actor,
        pokemon: battle_state.pokemon(actor).name().to_string(),
        move_name: move_data.name.clone(),
    });

    let outcome = if move_data.is_status() {
        execute_status_move(battle_state, actor, &move_data, log, rng);
        ActionOutcome::StatusMoveUsed
    } else {
        execute_damaging_move(battle_state, actor, &move_data, log, rng)
    };
    (Some(move_data.name), outcome)
}

/// Sleep, freeze, paralysis and flinch checks. Returns the reason the action
/// is lost, if it is.
fn check_action_preventing_conditions(
    battle_state: &mut BattleState,
    actor: PlayerTarget,
    log: &mut TurnLog,
    rng: &mut TurnRng,
) -> Option<ActionFailureReason> {
    let pokemon = battle_state.pokemon_mut(actor);
    let name = pokemon.name().to_string();

    if pokemon.flinched {
        log.bus.push(BattleEvent::ActionPrevented {
            player: actor,
            pokemon: name,
            reason: ActionFailureReason::Flinched,
        });
        return Some(ActionFailureReason::Flinched);
    }

    match pokemon.status {
        Some(StatusCondition::Sleep(turns)) => {
            let remaining = turns.saturating_sub(1);
            if remaining == 0 {
                pokemon.status = None;
                log.bus.push(BattleEvent::WokeUp {
                    player: actor,
                    pokemon: name,
                });
            } else {
                pokemon.status = Some(StatusCondition::Sleep(remaining));
                log.bus.push(BattleEvent::ActionPrevented {
                    player: actor,
                    pokemon: name,
                    reason: ActionFailureReason::Asleep,
                });
            }
            Some(ActionFailureReason::Asleep)
        }
        Some(StatusCondition::Freeze) => {
            if rng.chance(20, "thaw") {
                pokemon.status = None;
                log.bus.push(BattleEvent::Thawed {
                    player: actor,
                    pokemon: name,
                });
                None
            } else {
                log.bus.push(BattleEvent::ActionPrevented {
                    player: actor,
                    pokemon: name,
                    reason: ActionFailureReason::Frozen,
                });
                Some(ActionFailureReason::Frozen)
            }
        }
        Some(StatusCondition::Paralysis) if rng.chance(25, "full paralysis") => {
            log.bus.push(BattleEvent::ActionPrevented {
                player: actor,
                pokemon: name,
                reason: ActionFailureReason::FullyParalyzed,
            });
            Some(ActionFailureReason::FullyParalyzed)
        }
        _ => None,
    }
}

fn execute_status_move(
    battle_state: &mut BattleState,
    actor: PlayerTarget,
    move_data: &MoveData,
    log: &mut TurnLog,
    rng: &mut TurnRng,
) {
    let defender = actor.opponent();

    for change in &move_data.stat_changes {
        apply_stat_change(battle_state, actor, change, log);
    }

    if let Some(inflict) = &move_data.status_inflict {
        try_inflict_status(battle_state, defender, inflict.status, 100, log, rng);
    }

    if let Some(effect) = move_data.weather {
        battle_state.field.set_weather(effect.weather, effect.duration);
        log.bus.push(BattleEvent::WeatherStarted {
            weather: effect.weather,
        });
    }

    if let Some(effect) = move_data.terrain {
        battle_state.field.set_terrain(effect.terrain, effect.duration);
        log.bus.push(BattleEvent::TerrainStarted {
            terrain: effect.terrain,
        });
    }

    if let Some(hazard) = move_data.hazard {
        let hazards = &mut battle_state.player_mut(defender).hazards;
        if hazards.add(hazard) {
            let layers = hazards.layers(hazard);
            log.bus.push(BattleEvent::HazardSet {
                side: defender,
                hazard,
                layers,
            });
        } else {
            log.bus.push(BattleEvent::MoveFailed { player: actor });
        }
    }

    if move_data.heal_percent > 0 {
        let pokemon = battle_state.pokemon_mut(actor);
        let amount = percent_of(pokemon.max_hp(), move_data.heal_percent);
        let healed = pokemon.heal(amount);
        if healed > 0 {
            log.bus.push(BattleEvent::PokemonHealed {
                target: actor,
                pokemon: pokemon.name().to_string(),
                amount: healed,
                new_hp: pokemon.current_hp(),
            });
        }
    }
}

/// Hit count for a multi-hit move. 2-5 hit moves use the 35/35/15/15 split.
fn roll_hit_count(multi_hit: MultiHit, rng: &mut TurnRng) -> u8 {
    if multi_hit.min_hits == 2 && multi_hit.max_hits == 5 {
        match rng.next_outcome("multi-hit count") {
            1..=35 => 2,
            36..=70 => 3,
            71..=85 => 4,
            _ => 5,
        }
    } else {
        rng.range_inclusive(multi_hit.min_hits, multi_hit.max_hits, "multi-hit count")
    }
}

fn execute_damaging_move(
    battle_state: &mut BattleState,
    actor: PlayerTarget,
    move_data: &MoveData,
    log: &mut TurnLog,
    rng: &mut TurnRng,
) -> ActionOutcome {
    let defender = actor.opponent();
    let turn = battle_state.turn_number;

    let mut planned_hits: u8 = 1;
    let mut hits: u8 = 0;
    let mut total_damage: u16 = 0;
    let mut total_recoil: u16 = 0;
    let mut total_drain: u16 = 0;
    let mut any_critical = false;
    let mut effectiveness = 1.0;

    while hits < planned_hits {
        let result = {
            let mut ctx = DamageContext::new(
                battle_state.pokemon(actor),
                battle_state.pokemon(defender),
                move_data,
                &battle_state.field,
                turn,
            );
            ctx.skip_accuracy = hits > 0;
            calculate_damage(&ctx, rng)
        };

        if !result.hit {
            log.bus.push(BattleEvent::MoveMissed {
                player: actor,
                pokemon: battle_state.pokemon(actor).name().to_string(),
                move_name: move_data.name.clone(),
            });
            return ActionOutcome::Missed;
        }
        if result.is_immune() {
            log.bus.push(BattleEvent::MoveHadNoEffect {
                target: defender,
                pokemon: battle_state.pokemon(defender).name().to_string(),
            });
            return ActionOutcome::Immune;
        }

        if hits == 0 {
            if let Some(multi_hit) = move_data.multi_hit {
                planned_hits = roll_hit_count(multi_hit, rng).max(1);
            }
        }

        if result.critical {
            any_critical = true;
            log.bus.push(BattleEvent::CriticalHit { player: actor });
        }
        let dealt = deal_damage(battle_state, defender, result.damage, log);
        log.bus.push(BattleEvent::DamageDealt {
            target: defender,
            pokemon: battle_state.pokemon(defender).name().to_string(),
            damage: dealt,
            remaining_hp: battle_state.pokemon(defender).current_hp(),
        });

        hits += 1;
        total_damage = total_damage.saturating_add(result.damage);
        total_recoil = total_recoil.saturating_add(result.recoil);
        total_drain = total_drain.saturating_add(result.drain);
        effectiveness = result.effectiveness;

        if battle_state.pokemon(defender).is_fainted() {
            break;
        }
    }

    log.bus.push(BattleEvent::AttackTypeEffectiveness {
        multiplier: effectiveness,
    });
    if move_data.multi_hit.is_some() {
        log.bus.push(BattleEvent::MultiHitCompleted { hits });
    }

    if total_recoil > 0 && !ignores_indirect_damage(battle_state, actor) {
        let taken = deal_damage(battle_state, actor, total_recoil, log);
        log.bus.push(BattleEvent::RecoilTaken {
            target: actor,
            pokemon: battle_state.pokemon(actor).name().to_string(),
            damage: taken,
        });
    }

    if total_drain > 0 {
        let pokemon = battle_state.pokemon_mut(actor);
        let healed = pokemon.heal(total_drain);
        if healed > 0 {
            log.bus.push(BattleEvent::PokemonHealed {
                target: actor,
                pokemon: pokemon.name().to_string(),
                amount: healed,
                new_hp: pokemon.current_hp(),
            });
        }
    }

    apply_secondary_effect(battle_state, actor, move_data, log, rng);

    ActionOutcome::Damaged {
        damage: total_damage,
        hits,
        critical: any_critical,
        effectiveness,
    }
}

/// One gate roll for the whole secondary block, then independent status and
/// flinch rolls.
fn apply_secondary_effect(
    battle_state: &mut BattleState,
    actor: PlayerTarget,
    move_data: &MoveData,
    log: &mut TurnLog,
    rng: &mut TurnRng,
) {
    let Some(secondary) = &move_data.secondary else {
        return;
    };
    if secondary.chance > 0 && secondary.chance < 100 && !rng.chance(secondary.chance, "secondary effect") {
        return;
    }

    for change in &secondary.stat_changes {
        apply_stat_change(battle_state, actor, change, log);
    }

    let defender = actor.opponent();
    if let Some(inflict) = &secondary.status_inflict {
        try_inflict_status(battle_state, defender, inflict.status, inflict.chance, log, rng);
    }

    if secondary.flinch_chance > 0 && rng.chance(secondary.flinch_chance, "flinch") {
        let pokemon = battle_state.pokemon_mut(defender);
        if !pokemon.is_fainted() {
            pokemon.flinched = true;
            log.bus.push(BattleEvent::Flinched {
                target: defender,
                pokemon: pokemon.name().to_string(),
            });
        }
    }
}

fn apply_stat_change(battle_state: &mut BattleState, actor: PlayerTarget, change: &StatChange, log: &mut TurnLog) {
    let target = match change.target {
        EffectTarget::User => actor,
        EffectTarget::Opponent => actor.opponent(),
    };
    let pokemon = battle_state.pokemon_mut(target);
    let delta = pokemon.stat_stages.apply_change(change.stat, change.stages);
    let name = pokemon.name().to_string();
    if delta != 0 {
        log.bus.push(BattleEvent::StatStageChanged {
            target,
            pokemon: name,
            stat: change.stat,
            delta,
        });
    } else {
        log.bus.push(BattleEvent::StatChangeBlocked {
            target,
            pokemon: name,
            stat: change.stat,
            rising: change.stages > 0,
        });
    }
}

fn is_type_immune_to_status(types: impl Fn(PokemonType) -> bool, status: StatusKind) -> bool {
    match status {
        StatusKind::Burn => types(PokemonType::Fire),
        StatusKind::Freeze => types(PokemonType::Ice),
        StatusKind::Paralysis => types(PokemonType::Electric),
        StatusKind::Poison | StatusKind::BadlyPoisoned => {
            types(PokemonType::Poison) || types(PokemonType::Steel)
        }
        StatusKind::Sleep => false,
    }
}

/// Attempts to give `target` a primary status. Chances below 100 roll; sleep
/// rolls its 1-3 turn duration.
fn try_inflict_status(
    battle_state: &mut BattleState,
    target: PlayerTarget,
    status: StatusKind,
    chance: u8,
    log: &mut TurnLog,
    rng: &mut TurnRng,
) -> bool {
    let turn = battle_state.turn_number;
    let pokemon = battle_state.pokemon(target);
    if pokemon.is_fainted() || pokemon.status.is_some() {
        return false;
    }
    if is_type_immune_to_status(|t| pokemon.has_type(t), status) {
        return false;
    }
    let ctx = pokemon.condition_context(&battle_state.field, turn, None);
    let ability_immune = active_ability_effects(pokemon.ability.as_ref(), &ctx)
        .any(|e| matches!(e, AbilityEffect::StatusImmunity { statuses } if statuses.contains(&status)));
    if ability_immune {
        return false;
    }

    if chance < 100 && !rng.chance(chance, "status infliction") {
        return false;
    }

    let sleep_turns = if status == StatusKind::Sleep {
        rng.range_inclusive(1, 3, "sleep duration")
    } else {
        0
    };

    let pokemon = battle_state.pokemon_mut(target);
    pokemon.status = Some(StatusCondition::from_kind(status, sleep_turns));
    log.bus.push(BattleEvent::StatusApplied {
        target,
        pokemon: pokemon.name().to_string(),
        status,
    });
    true
}

/// Applies damage and records the faint, in order, if it knocks the target out.
fn deal_damage(battle_state: &mut BattleState, target: PlayerTarget, amount: u16, log: &mut TurnLog) -> u16 {
    let pokemon = battle_state.pokemon_mut(target);
    let lost = pokemon.take_damage(amount);
    if pokemon.is_fainted() && !log.faint_order.contains(&target) {
        log.faint_order.push(target);
        log.bus.push(BattleEvent::PokemonFainted {
            player: target,
            pokemon: pokemon.name().to_string(),
        });
    }
    lost
}

fn ignores_indirect_damage(battle_state: &BattleState, target: PlayerTarget) -> bool {
    let pokemon = battle_state.pokemon(target);
    let ctx = pokemon.condition_context(&battle_state.field, battle_state.turn_number, None);
    let ignores =
        active_ability_effects(pokemon.ability.as_ref(), &ctx).any(|e| matches!(e, AbilityEffect::IgnoreIndirectDamage));
    ignores
}

/// Ends the battle if anyone has fainted. The side that fainted first loses.
fn check_for_faints(battle_state: &mut BattleState, log: &mut TurnLog) -> bool {
    if battle_state.is_ended() {
        return true;
    }
    let Some(&loser) = log.faint_order.first() else {
        return false;
    };
    let outcome = BattleOutcome {
        winner: loser.opponent(),
        reason: EndReason::Fainted,
    };
    battle_state.finish(outcome);
    log.bus.push(BattleEvent::BattleEnded {
        winner: outcome.winner,
        reason: outcome.reason,
    });
    tracing::debug!(battle_id = %battle_state.battle_id, winner = ?outcome.winner, "battle ended by faint");
    true
}

fn residual_damage(
    battle_state: &mut BattleState,
    target: PlayerTarget,
    source: ResidualSource,
    amount: u16,
    log: &mut TurnLog,
) {
    let amount = amount.max(1);
    let dealt = deal_damage(battle_state, target, amount, log);
    log.bus.push(BattleEvent::ResidualDamage {
        target,
        pokemon: battle_state.pokemon(target).name().to_string(),
        source: source.clone(),
        damage: dealt,
    });
    log.residuals.push(ResidualEffect {
        target,
        source,
        kind: ResidualKind::Damage,
        amount: dealt,
    });
}

fn residual_heal(
    battle_state: &mut BattleState,
    target: PlayerTarget,
    source: ResidualSource,
    amount: u16,
    log: &mut TurnLog,
) -> u16 {
    let pokemon = battle_state.pokemon_mut(target);
    let healed = pokemon.heal(amount.max(1));
    if healed > 0 {
        log.bus.push(BattleEvent::ResidualHeal {
            target,
            pokemon: pokemon.name().to_string(),
            source: source.clone(),
            amount: healed,
        });
        log.residuals.push(ResidualEffect {
            target,
            source,
            kind: ResidualKind::Heal,
            amount: healed,
        });
    }
    healed
}

fn consume_item(battle_state: &mut BattleState, target: PlayerTarget, log: &mut TurnLog) {
    let pokemon = battle_state.pokemon_mut(target);
    if !pokemon.held_item.as_ref().is_some_and(|item| item.consumable) {
        return;
    }
    if let Some(item) = pokemon.held_item.take() {
        log.bus.push(BattleEvent::ItemConsumed {
            target,
            pokemon: pokemon.name().to_string(),
            item: item.name,
        });
    }
}

fn execute_end_turn_phase(battle_state: &mut BattleState, log: &mut TurnLog) {
    apply_weather_damage(battle_state, log);
    apply_status_damage(battle_state, log);
    apply_healing_effects(battle_state, log);
    apply_status_cures(battle_state, log);
    apply_end_of_turn_stat_boosts(battle_state, log);

    if let Some(weather) = battle_state.field.tick_weather() {
        log.bus.push(BattleEvent::WeatherEnded { weather });
    }
    if let Some(terrain) = battle_state.field.tick_terrain() {
        log.bus.push(BattleEvent::TerrainEnded { terrain });
    }
}

fn apply_weather_damage(battle_state: &mut BattleState, log: &mut TurnLog) {
    let Some(weather) = battle_state.field.weather else {
        return;
    };
    let immune_types: &[PokemonType] = match weather {
        Weather::Sandstorm => &[PokemonType::Rock, PokemonType::Ground, PokemonType::Steel],
        Weather::Hail | Weather::Snow => &[PokemonType::Ice],
        Weather::Sun | Weather::Rain => return,
    };

    for target in PlayerTarget::both() {
        let pokemon = battle_state.pokemon(target);
        if pokemon.is_fainted() || immune_types.iter().any(|t| pokemon.has_type(*t)) {
            continue;
        }
        let ctx = pokemon.condition_context(&battle_state.field, battle_state.turn_number, None);
        let shielded = active_ability_effects(pokemon.ability.as_ref(), &ctx).any(|e| {
            matches!(
                e,
                AbilityEffect::WeatherImmunity | AbilityEffect::IgnoreIndirectDamage
            )
        });
        if shielded {
            continue;
        }
        let amount = pokemon.max_hp() / 16;
        residual_damage(battle_state, target, ResidualSource::Weather(weather), amount, log);
    }
}

fn apply_status_damage(battle_state: &mut BattleState, log: &mut TurnLog) {
    for target in PlayerTarget::both() {
        let pokemon = battle_state.pokemon(target);
        if pokemon.is_fainted() {
            continue;
        }
        let max_hp = pokemon.max_hp();
        let status = pokemon.status;
        let amount = match status {
            Some(StatusCondition::Burn) => max_hp / 16,
            Some(StatusCondition::Poison) => max_hp / 8,
            Some(StatusCondition::BadlyPoisoned(counter)) => {
                let counter = counter.saturating_add(1);
                battle_state.pokemon_mut(target).status = Some(StatusCondition::BadlyPoisoned(counter));
                (u32::from(counter) * u32::from(max_hp) / 16).min(u32::from(u16::MAX)) as u16
            }
            _ => continue,
        };
        if ignores_indirect_damage(battle_state, target) {
            continue;
        }
        let Some(kind) = battle_state.pokemon(target).status_kind() else {
            continue;
        };
        residual_damage(battle_state, target, ResidualSource::Status(kind), amount, log);
    }
}

fn apply_healing_effects(battle_state: &mut BattleState, log: &mut TurnLog) {
    let turn = battle_state.turn_number;
    for target in PlayerTarget::both() {
        if battle_state.pokemon(target).is_fainted() {
            continue;
        }

        if battle_state.field.terrain == Some(Terrain::Grassy) {
            let amount = battle_state.pokemon(target).max_hp() / 16;
            residual_heal(battle_state, target, ResidualSource::Terrain(Terrain::Grassy), amount, log);
        }

        let pokemon = battle_state.pokemon(target);
        let ctx = pokemon.condition_context(&battle_state.field, turn, None);
        let ability_heal: Option<(String, u8)> = pokemon.ability.as_ref().and_then(|ability| {
            active_ability_effects(Some(ability), &ctx).find_map(|e| match e {
                AbilityEffect::EndOfTurnHeal { percent } => Some((ability.name.clone(), *percent)),
                _ => None,
            })
        });
        if let Some((name, percent)) = ability_heal {
            let amount = percent_of(battle_state.pokemon(target).max_hp(), percent);
            residual_heal(battle_state, target, ResidualSource::Ability(name), amount, log);
        }

        let pokemon = battle_state.pokemon(target);
        let ctx = pokemon.condition_context(&battle_state.field, turn, None);
        let item_heals: Vec<(String, ItemEffect)> = pokemon
            .held_item
            .as_ref()
            .map(|item| {
                active_item_effects(Some(item), &ctx)
                    .filter(|e| matches!(e, ItemEffect::EndOfTurnHeal { .. } | ItemEffect::PinchHeal { .. }))
                    .map(|e| (item.name.clone(), e.clone()))
                    .collect()
            })
            .unwrap_or_default();
        for (name, effect) in item_heals {
            let max_hp = battle_state.pokemon(target).max_hp();
            let amount = match effect {
                ItemEffect::EndOfTurnHeal { divisor } => max_hp / divisor.max(1),
                ItemEffect::PinchHeal { percent } => percent_of(max_hp, percent),
                _ => continue,
            };
            if residual_heal(battle_state, target, ResidualSource::Item(name), amount, log) > 0 {
                consume_item(battle_state, target, log);
            }
        }
    }
}

fn apply_status_cures(battle_state: &mut BattleState, log: &mut TurnLog) {
    let turn = battle_state.turn_number;
    for target in PlayerTarget::both() {
        let pokemon = battle_state.pokemon(target);
        let Some(status) = pokemon.status_kind() else {
            continue;
        };
        if pokemon.is_fainted() {
            continue;
        }
        let ctx = pokemon.condition_context(&battle_state.field, turn, None);
        let cures = active_item_effects(pokemon.held_item.as_ref(), &ctx).any(|e| {
            matches!(e, ItemEffect::CureStatus { statuses } if statuses.is_empty() || statuses.contains(&status))
        });
        if !cures {
            continue;
        }
        let pokemon = battle_state.pokemon_mut(target);
        pokemon.status = None;
        log.bus.push(BattleEvent::StatusCured {
            target,
            pokemon: pokemon.name().to_string(),
            status,
        });
        consume_item(battle_state, target, log);
    }
}

fn apply_end_of_turn_stat_boosts(battle_state: &mut BattleState, log: &mut TurnLog) {
    let turn = battle_state.turn_number;
    for target in PlayerTarget::both() {
        let pokemon = battle_state.pokemon(target);
        if pokemon.is_fainted() {
            continue;
        }
        let ctx = pokemon.condition_context(&battle_state.field, turn, None);
        let boosts: Vec<(StatType, i8)> = active_ability_effects(pokemon.ability.as_ref(), &ctx)
            .filter_map(|e| match e {
                AbilityEffect::EndOfTurnStatBoost { stat, stages } => Some((*stat, *stages)),
                _ => None,
            })
            .collect();
        for (stat, stages) in boosts {
            let change = StatChange {
                stat,
                stages,
                target: EffectTarget::User,
            };
            apply_stat_change(battle_state, target, &change, log);
        }
    }
}

fn finalize_turn(battle_state: &mut BattleState, log: &mut TurnLog) {
    for player in &mut battle_state.players {
        player.pokemon.flinched = false;
    }
    battle_state.clear_actions();
    log.bus.push(BattleEvent::TurnEnded {
        turn_number: battle_state.turn_number,
    });
    battle_state.turn_number += 1;
    if !battle_state.is_ended() {
        battle_state.game_state = GameState::WaitingForActions;
    }
}
