//! Hit, critical-hit and damage calculation for a single damaging hit.
//!
//! Every roll goes through the [`TurnRng`] handed in by the caller. The
//! calculator reads the combatants but never mutates them: damage, recoil and
//! drain come back in a [`DamageResult`] for the turn resolver to apply.

use crate::battle::rng::TurnRng;
use crate::battle::state::FieldState;
use crate::battle::stats::{effective_attack, effective_defense, is_grounded, stage_multiplier};
use crate::effects::{active_ability_effects, active_item_effects, AbilityEffect, ConditionContext, ItemEffect};
use crate::move_data::MoveData;
use crate::pokemon::{BattlePokemon, StatusCondition};
use schema::{MoveCategory, PokemonType, Terrain, Weather};
use serde::{Deserialize, Serialize};

pub const CRITICAL_MULTIPLIER: f64 = 1.5;
pub const STAB_MULTIPLIER: f64 = 1.5;
pub const TERRAIN_BOOST: f64 = 1.3;
pub const DAMAGE_ROLL_MIN: u8 = 85;
pub const DAMAGE_ROLL_MAX: u8 = 100;

/// Everything the calculator needs to know about one hit.
#[derive(Debug, Clone, Copy)]
pub struct DamageContext<'a> {
    pub attacker: &'a BattlePokemon,
    pub defender: &'a BattlePokemon,
    pub move_data: &'a MoveData,
    pub field: &'a FieldState,
    pub turn_number: u32,
    /// The hit is already known to be critical; no crit roll is made.
    pub force_critical: bool,
    /// Later hits of a multi-hit move reuse the first hit's accuracy check.
    pub skip_accuracy: bool,
}

impl<'a> DamageContext<'a> {
    pub fn new(
        attacker: &'a BattlePokemon,
        defender: &'a BattlePokemon,
        move_data: &'a MoveData,
        field: &'a FieldState,
        turn_number: u32,
    ) -> Self {
        Self {
            attacker,
            defender,
            move_data,
            field,
            turn_number,
            force_critical: false,
            skip_accuracy: false,
        }
    }

    pub fn attacker_context(&self) -> ConditionContext {
        self.attacker
            .condition_context(self.field, self.turn_number, Some(self.move_data))
    }

    pub fn defender_context(&self) -> ConditionContext {
        self.defender
            .condition_context(self.field, self.turn_number, Some(self.move_data))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DamageResult {
    pub damage: u16,
    pub hit: bool,
    pub critical: bool,
    pub effectiveness: f64,
    /// The damage roll used, 85..=100. Zero when no roll was made.
    pub roll: u8,
    pub recoil: u16,
    pub drain: u16,
    /// The damage is enough to knock the defender out.
    pub fainted: bool,
}

impl DamageResult {
    fn no_damage(hit: bool) -> Self {
        Self {
            damage: 0,
            hit,
            critical: false,
            effectiveness: 1.0,
            roll: 0,
            recoil: 0,
            drain: 0,
            fainted: false,
        }
    }

    pub fn is_immune(&self) -> bool {
        self.hit && self.effectiveness == 0.0
    }
}

/// Computes one hit of a damaging move.
///
/// Status moves return zero damage without rolling. A miss consumes only the
/// accuracy roll. Immunity consumes the accuracy and crit rolls but no damage
/// roll.
pub fn calculate_damage(ctx: &DamageContext, rng: &mut TurnRng) -> DamageResult {
    if ctx.move_data.is_status() {
        return DamageResult::no_damage(true);
    }

    if !ctx.skip_accuracy && !check_accuracy(ctx, ctx.force_critical, rng) {
        return DamageResult::no_damage(false);
    }

    let critical = check_critical_hit(ctx, rng);
    let effectiveness = calculate_type_effectiveness(ctx);
    if effectiveness == 0.0 {
        return DamageResult {
            critical,
            effectiveness,
            ..DamageResult::no_damage(true)
        };
    }

    let roll = rng.range_inclusive(DAMAGE_ROLL_MIN, DAMAGE_ROLL_MAX, "damage roll");

    let attacker_ctx = ctx.attacker_context();
    let defender_ctx = ctx.defender_context();
    let level = u32::from(ctx.attacker.level);
    let power = u32::from(ctx.move_data.power);
    let attack = effective_attack(ctx.attacker, ctx.move_data, critical, &attacker_ctx);
    let defense = effective_defense(ctx.defender, ctx.move_data, critical, &defender_ctx);

    // Truncating integer division first, then float.
    let base = ((2 * level / 5 + 2) * power * attack / defense) as f64 / 50.0 + 2.0;

    let mut damage = base;
    damage *= weather_modifier(ctx.field.weather, ctx.move_data.move_type);
    if critical {
        damage *= CRITICAL_MULTIPLIER;
    }
    damage = damage * f64::from(roll) / 100.0;
    damage *= stab_modifier(ctx, &attacker_ctx);
    damage *= effectiveness;
    damage *= burn_modifier(ctx, &attacker_ctx);
    damage *= item_modifier(ctx, &attacker_ctx);
    damage *= ability_modifier(ctx, &attacker_ctx, &defender_ctx);
    damage *= terrain_modifier(ctx, &attacker_ctx);

    let damage = (damage.floor() as u32).clamp(1, u32::from(u16::MAX)) as u16;

    DamageResult {
        damage,
        hit: true,
        critical,
        effectiveness,
        roll,
        recoil: percent_of(damage, ctx.move_data.recoil_percent),
        drain: percent_of(damage, ctx.move_data.drain_percent),
        fainted: damage >= ctx.defender.current_hp(),
    }
}

/// `amount * percent / 100`, at least 1 whenever percent is non-zero.
pub fn percent_of(amount: u16, percent: u8) -> u16 {
    if percent == 0 {
        return 0;
    }
    let value = u32::from(amount) * u32::from(percent) / 100;
    value.clamp(1, u32::from(u16::MAX)) as u16
}

/// Rolls accuracy for the move. Accuracy 0 never misses and consumes no roll.
/// A critical hit ignores the defender's positive evasion stage.
pub fn check_accuracy(ctx: &DamageContext, critical: bool, rng: &mut TurnRng) -> bool {
    if ctx.move_data.accuracy == 0 {
        return true;
    }

    let attacker_ctx = ctx.attacker_context();
    let defender_ctx = ctx.defender_context();

    let accuracy_stage = ctx.attacker.stat_stages.accuracy;
    let mut evasion_stage = ctx.defender.stat_stages.evasion;
    if critical && evasion_stage > 0 {
        evasion_stage = 0;
    }

    let ability_accuracy: f64 = active_ability_effects(ctx.attacker.ability.as_ref(), &attacker_ctx)
        .filter_map(|e| match e {
            AbilityEffect::AccuracyModifier { multiplier } => Some(*multiplier),
            _ => None,
        })
        .chain(
            active_item_effects(ctx.attacker.held_item.as_ref(), &attacker_ctx).filter_map(|e| match e {
                ItemEffect::AccuracyModifier { multiplier } => Some(*multiplier),
                _ => None,
            }),
        )
        .product();
    let ability_evasion: f64 = active_ability_effects(ctx.defender.ability.as_ref(), &defender_ctx)
        .filter_map(|e| match e {
            AbilityEffect::EvasionModifier { multiplier } => Some(*multiplier),
            _ => None,
        })
        .chain(
            active_item_effects(ctx.defender.held_item.as_ref(), &defender_ctx).filter_map(|e| match e {
                ItemEffect::EvasionModifier { multiplier } => Some(*multiplier),
                _ => None,
            }),
        )
        .product();

    let final_accuracy = f64::from(ctx.move_data.accuracy)
        * (stage_multiplier(accuracy_stage) / stage_multiplier(evasion_stage))
        * ability_accuracy
        / ability_evasion.max(f64::MIN_POSITIVE);

    let roll = rng.next_outcome("accuracy");
    let hit = f64::from(roll) <= final_accuracy;
    tracing::debug!(
        move_name = %ctx.move_data.name,
        roll,
        final_accuracy,
        hit,
        "accuracy check"
    );
    hit
}

/// Critical-hit chance in percent for a crit stage.
pub fn critical_hit_chance(stage: u8) -> f64 {
    match stage {
        0 => 6.25,
        1 => 12.5,
        2 => 50.0,
        _ => 100.0,
    }
}

/// Whether this hit is critical. A forced crit skips the roll.
pub fn check_critical_hit(ctx: &DamageContext, rng: &mut TurnRng) -> bool {
    if ctx.force_critical {
        return true;
    }
    let attacker_ctx = ctx.attacker_context();
    let ability_stages: u8 = active_ability_effects(ctx.attacker.ability.as_ref(), &attacker_ctx)
        .filter_map(|e| match e {
            AbilityEffect::CritStageBoost { stages } => Some(*stages),
            _ => None,
        })
        .sum();
    let item_stages: u8 = active_item_effects(ctx.attacker.held_item.as_ref(), &attacker_ctx)
        .filter_map(|e| match e {
            ItemEffect::CritStageBoost { stages } => Some(*stages),
            _ => None,
        })
        .sum();
    let stage = ctx
        .move_data
        .crit_ratio
        .saturating_add(ability_stages)
        .saturating_add(item_stages);

    rng.percent_float("critical hit") < critical_hit_chance(stage)
}

/// Type chart multiplier, zeroed by type-immunity abilities and by
/// ground-immunity items against Ground moves.
pub fn calculate_type_effectiveness(ctx: &DamageContext) -> f64 {
    let move_type = ctx.move_data.move_type;
    let defender_ctx = ctx.defender_context();

    let ability_immune = active_ability_effects(ctx.defender.ability.as_ref(), &defender_ctx)
        .any(|e| matches!(e, AbilityEffect::TypeImmunity { types } if types.contains(&move_type)));
    let item_immune = move_type == PokemonType::Ground
        && active_item_effects(ctx.defender.held_item.as_ref(), &defender_ctx)
            .any(|e| matches!(e, ItemEffect::GroundImmunity));
    if ability_immune || item_immune {
        return 0.0;
    }

    PokemonType::effectiveness_against(
        move_type,
        ctx.defender.species.primary_type,
        ctx.defender.species.secondary_type,
    )
}

pub fn weather_modifier(weather: Option<Weather>, move_type: PokemonType) -> f64 {
    match (weather, move_type) {
        (Some(Weather::Sun), PokemonType::Fire) | (Some(Weather::Rain), PokemonType::Water) => 1.5,
        (Some(Weather::Sun), PokemonType::Water) | (Some(Weather::Rain), PokemonType::Fire) => 0.5,
        _ => 1.0,
    }
}

fn stab_modifier(ctx: &DamageContext, attacker_ctx: &ConditionContext) -> f64 {
    if !ctx.attacker.has_type(ctx.move_data.move_type) {
        return 1.0;
    }
    active_ability_effects(ctx.attacker.ability.as_ref(), attacker_ctx)
        .find_map(|e| match e {
            AbilityEffect::StabOverride { multiplier } => Some(*multiplier),
            _ => None,
        })
        .unwrap_or(STAB_MULTIPLIER)
}

fn burn_modifier(ctx: &DamageContext, attacker_ctx: &ConditionContext) -> f64 {
    let burned = matches!(ctx.attacker.status, Some(StatusCondition::Burn));
    if !burned || ctx.move_data.category != MoveCategory::Physical {
        return 1.0;
    }
    let ignores = active_ability_effects(ctx.attacker.ability.as_ref(), attacker_ctx).any(|e| {
        matches!(
            e,
            AbilityEffect::IgnoreBurnPenalty | AbilityEffect::IgnoreIndirectDamage
        )
    });
    if ignores {
        1.0
    } else {
        0.5
    }
}

fn item_modifier(ctx: &DamageContext, attacker_ctx: &ConditionContext) -> f64 {
    active_item_effects(ctx.attacker.held_item.as_ref(), attacker_ctx)
        .map(|e| match e {
            ItemEffect::DamageMultiplier { multiplier } => *multiplier,
            ItemEffect::TypeBoost { move_type, multiplier } if *move_type == ctx.move_data.move_type => {
                *multiplier
            }
            _ => 1.0,
        })
        .product()
}

fn ability_modifier(
    ctx: &DamageContext,
    attacker_ctx: &ConditionContext,
    defender_ctx: &ConditionContext,
) -> f64 {
    let move_type = ctx.move_data.move_type;
    let category = ctx.move_data.category;

    let boost: f64 = active_ability_effects(ctx.attacker.ability.as_ref(), attacker_ctx)
        .filter_map(|e| match e {
            AbilityEffect::DamageBoost {
                multiplier,
                move_types,
                move_categories,
            } if (move_types.is_empty() || move_types.contains(&move_type))
                && (move_categories.is_empty() || move_categories.contains(&category)) =>
            {
                Some(*multiplier)
            }
            _ => None,
        })
        .product();

    let resistance: f64 = active_ability_effects(ctx.defender.ability.as_ref(), defender_ctx)
        .filter_map(|e| match e {
            AbilityEffect::DamageResistance {
                multiplier,
                affected_types,
            } if affected_types.is_empty() || affected_types.contains(&move_type) => Some(*multiplier),
            _ => None,
        })
        .product();

    boost * resistance
}

fn terrain_modifier(ctx: &DamageContext, attacker_ctx: &ConditionContext) -> f64 {
    if !is_grounded(ctx.attacker, attacker_ctx) {
        return 1.0;
    }
    match (ctx.field.terrain, ctx.move_data.move_type) {
        (Some(Terrain::Electric), PokemonType::Electric)
        | (Some(Terrain::Grassy), PokemonType::Grass)
        | (Some(Terrain::Psychic), PokemonType::Psychic) => TERRAIN_BOOST,
        _ => 1.0,
    }
}
