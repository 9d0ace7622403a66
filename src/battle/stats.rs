use crate::effects::{
    active_ability_effects, active_item_effects, AbilityEffect, ConditionContext, ItemEffect,
};
use crate::move_data::MoveData;
use crate::pokemon::{BattlePokemon, StatusCondition};
use schema::{MoveCategory, PokemonType, StatType};
use serde::{Deserialize, Serialize};

pub const MIN_STAGE: i8 = -6;
pub const MAX_STAGE: i8 = 6;

/// Stage multiplier for a stage clamped to [-6, 6].
/// Positive stages: `(2 + s) / 2`. Negative stages: `2 / (2 - s)`.
/// Accuracy and evasion use the same table.
pub fn stage_multiplier(stage: i8) -> f64 {
    let s = f64::from(stage.clamp(MIN_STAGE, MAX_STAGE));
    if s >= 0.0 {
        (2.0 + s) / 2.0
    } else {
        2.0 / (2.0 - s)
    }
}

/// Seven in-battle stages, each kept within [-6, 6].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatStages {
    pub attack: i8,
    pub defense: i8,
    pub sp_attack: i8,
    pub sp_defense: i8,
    pub speed: i8,
    pub accuracy: i8,
    pub evasion: i8,
}

impl StatStages {
    pub fn get(&self, stat: StatType) -> i8 {
        match stat {
            StatType::Attack => self.attack,
            StatType::Defense => self.defense,
            StatType::SpAttack => self.sp_attack,
            StatType::SpDefense => self.sp_defense,
            StatType::Speed => self.speed,
            StatType::Accuracy => self.accuracy,
            StatType::Evasion => self.evasion,
        }
    }

    fn slot(&mut self, stat: StatType) -> &mut i8 {
        match stat {
            StatType::Attack => &mut self.attack,
            StatType::Defense => &mut self.defense,
            StatType::SpAttack => &mut self.sp_attack,
            StatType::SpDefense => &mut self.sp_defense,
            StatType::Speed => &mut self.speed,
            StatType::Accuracy => &mut self.accuracy,
            StatType::Evasion => &mut self.evasion,
        }
    }

    /// Adds `delta`, clamps to [-6, 6], and returns the change actually
    /// applied. Zero means the stage was already at the bound.
    pub fn apply_change(&mut self, stat: StatType, delta: i8) -> i8 {
        let slot = self.slot(stat);
        let old = *slot;
        let new = old.saturating_add(delta).clamp(MIN_STAGE, MAX_STAGE);
        *slot = new;
        new - old
    }

    pub fn multiplier(&self, stat: StatType) -> f64 {
        stage_multiplier(self.get(stat))
    }
}

/// Scales a stat by its stage, truncating toward zero.
pub fn apply_stat_stage_multiplier(base_stat: u16, stage: i8) -> f64 {
    f64::from(base_stat) * stage_multiplier(stage)
}

/// Product of ability and held-item multipliers for `stat` whose conditions hold.
pub fn stat_multiplier_from_effects(
    pokemon: &BattlePokemon,
    stat: StatType,
    ctx: &ConditionContext,
) -> f64 {
    let from_ability: f64 = active_ability_effects(pokemon.ability.as_ref(), ctx)
        .filter_map(|effect| match effect {
            AbilityEffect::StatMultiplier { stat: s, multiplier } if *s == stat => Some(*multiplier),
            _ => None,
        })
        .product();
    let from_item: f64 = active_item_effects(pokemon.held_item.as_ref(), ctx)
        .filter_map(|effect| match effect {
            ItemEffect::StatMultiplier { stat: s, multiplier } if *s == stat => Some(*multiplier),
            _ => None,
        })
        .product();
    from_ability * from_item
}

/// Effective attacking stat for a damaging move. A critical hit ignores a
/// negative stage.
pub fn effective_attack(
    attacker: &BattlePokemon,
    move_data: &MoveData,
    critical: bool,
    ctx: &ConditionContext,
) -> u32 {
    let stat = match move_data.category {
        MoveCategory::Physical => StatType::Attack,
        MoveCategory::Special => StatType::SpAttack,
        MoveCategory::Status => return 0,
    };
    let base = attacker.stats.value(stat).unwrap_or(0);
    let mut stage = attacker.stat_stages.get(stat);
    if critical && stage < 0 {
        stage = 0;
    }
    let value = apply_stat_stage_multiplier(base, stage) * stat_multiplier_from_effects(attacker, stat, ctx);
    value.max(0.0) as u32
}

/// Effective defending stat against a damaging move. A critical hit ignores
/// a positive stage. Never below 1 so it can divide.
pub fn effective_defense(
    defender: &BattlePokemon,
    move_data: &MoveData,
    critical: bool,
    ctx: &ConditionContext,
) -> u32 {
    let stat = match move_data.category {
        MoveCategory::Physical => StatType::Defense,
        MoveCategory::Special => StatType::SpDefense,
        MoveCategory::Status => return 1,
    };
    let base = defender.stats.value(stat).unwrap_or(1);
    let mut stage = defender.stat_stages.get(stat);
    if critical && stage > 0 {
        stage = 0;
    }
    let value = apply_stat_stage_multiplier(base, stage) * stat_multiplier_from_effects(defender, stat, ctx);
    (value as u32).max(1)
}

/// Speed used for turn ordering: stage and ability/item multipliers, then
/// halved under paralysis.
pub fn effective_speed(pokemon: &BattlePokemon, ctx: &ConditionContext) -> u32 {
    let base = apply_stat_stage_multiplier(pokemon.stats.speed, pokemon.stat_stages.speed);
    let mut speed = (base * stat_multiplier_from_effects(pokemon, StatType::Speed, ctx)) as u32;

    if matches!(pokemon.status, Some(StatusCondition::Paralysis)) {
        speed /= 2;
    }

    speed
}

/// Move priority plus any priority-boosting abilities that apply to it.
pub fn effective_priority(pokemon: &BattlePokemon, move_data: &MoveData, ctx: &ConditionContext) -> i8 {
    let boost: i8 = active_ability_effects(pokemon.ability.as_ref(), ctx)
        .filter_map(|effect| match effect {
            AbilityEffect::PriorityBoost {
                amount,
                move_types,
                move_categories,
            } if (move_types.is_empty() || move_types.contains(&move_data.move_type))
                && (move_categories.is_empty() || move_categories.contains(&move_data.category)) =>
            {
                Some(*amount)
            }
            _ => None,
        })
        .sum();
    move_data.priority.saturating_add(boost)
}

/// Grounded combatants feel terrain. Flying types, ground-immune abilities
/// and ground-immune items are airborne.
pub fn is_grounded(pokemon: &BattlePokemon, ctx: &ConditionContext) -> bool {
    if pokemon.has_type(PokemonType::Flying) {
        return false;
    }
    let levitating = active_ability_effects(pokemon.ability.as_ref(), ctx).any(|effect| {
        matches!(effect, AbilityEffect::TypeImmunity { types } if types.contains(&PokemonType::Ground))
    });
    let floating = active_item_effects(pokemon.held_item.as_ref(), ctx)
        .any(|effect| matches!(effect, ItemEffect::GroundImmunity));
    !(levitating || floating)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::tests::common::{neutral_context, TestPokemonBuilder};
    use crate::effects::{Ability, ConditionalEffect};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(-6, 0.25)]
    #[case(-2, 0.5)]
    #[case(-1, 2.0 / 3.0)]
    #[case(0, 1.0)]
    #[case(1, 1.5)]
    #[case(2, 2.0)]
    #[case(6, 4.0)]
    #[case(9, 4.0)]
    #[case(-9, 0.25)]
    fn test_stage_multiplier_table(#[case] stage: i8, #[case] expected: f64) {
        assert_eq!(stage_multiplier(stage), expected);
    }

    #[test]
    fn test_negative_two_stage_is_half() {
        // 2 / (2 - (-2)) = 2 / 4
        assert_eq!(stage_multiplier(-2), 2.0 / 4.0);
    }

    #[test]
    fn test_apply_change_never_leaves_bounds() {
        let mut stages = StatStages::default();
        for delta in [3, 3, 3, -12, -12, 5, -1, 12] {
            for stat in [StatType::Attack, StatType::Evasion] {
                let old = stages.get(stat);
                let actual = stages.apply_change(stat, delta);
                let new = stages.get(stat);
                assert!((MIN_STAGE..=MAX_STAGE).contains(&new));
                assert_eq!(actual, new - old);
            }
        }
    }

    #[test]
    fn test_apply_change_at_bound_reports_zero() {
        let mut stages = StatStages::default();
        assert_eq!(stages.apply_change(StatType::Speed, 6), 6);
        assert_eq!(stages.apply_change(StatType::Speed, 1), 0);
        assert_eq!(stages.apply_change(StatType::Speed, -2), -2);
        assert_eq!(stages.speed, 4);
    }

    #[test]
    fn test_effective_speed_paralysis_halves() {
        let mut pokemon = TestPokemonBuilder::new("Speedy").with_base_stats(100).build();
        let ctx = neutral_context();
        let normal = effective_speed(&pokemon, &ctx);

        pokemon.status = Some(StatusCondition::Paralysis);
        assert_eq!(effective_speed(&pokemon, &ctx), normal / 2);

        pokemon.stat_stages.speed = 2;
        assert_eq!(effective_speed(&pokemon, &ctx), normal);
    }

    #[test]
    fn test_ability_stat_multiplier_applies_to_attack() {
        let huge_power = Ability {
            name: "huge_power".to_string(),
            description: String::new(),
            effects: vec![ConditionalEffect {
                effect: AbilityEffect::StatMultiplier {
                    stat: StatType::Attack,
                    multiplier: 2.0,
                },
                condition: None,
            }],
        };
        let plain = TestPokemonBuilder::new("Plain").with_base_stats(100).build();
        let boosted = TestPokemonBuilder::new("Boosted")
            .with_base_stats(100)
            .with_ability(huge_power)
            .build();
        let tackle = crate::battle::tests::common::physical_move("Tackle", PokemonType::Normal, 40);
        let ctx = neutral_context();

        assert_eq!(
            effective_attack(&boosted, &tackle, false, &ctx),
            effective_attack(&plain, &tackle, false, &ctx) * 2
        );
    }

    #[test]
    fn test_crit_ignores_unfavourable_stages() {
        let mut attacker = TestPokemonBuilder::new("Atk").with_base_stats(100).build();
        let mut defender = TestPokemonBuilder::new("Def").with_base_stats(100).build();
        attacker.stat_stages.attack = -2;
        defender.stat_stages.defense = 2;
        let tackle = crate::battle::tests::common::physical_move("Tackle", PokemonType::Normal, 40);
        let ctx = neutral_context();

        let raw_attack = u32::from(attacker.stats.attack);
        let raw_defense = u32::from(defender.stats.defense);
        assert_eq!(effective_attack(&attacker, &tackle, false, &ctx), raw_attack / 2);
        assert_eq!(effective_attack(&attacker, &tackle, true, &ctx), raw_attack);
        assert_eq!(effective_defense(&defender, &tackle, false, &ctx), raw_defense * 2);
        assert_eq!(effective_defense(&defender, &tackle, true, &ctx), raw_defense);
    }
}
