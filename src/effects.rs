//! Abilities, held items, and the conditions that switch their effects on.
//!
//! Every effect is a variant carrying only the fields it needs. Callers pick
//! out the variants relevant to them with a `match`, after checking the
//! effect's optional [`EffectCondition`] against a [`ConditionContext`].

use schema::{MoveCategory, PokemonType, StatType, StatusKind, Terrain, Weather};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HpComparison {
    Below,
    Above,
    Equal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HpThreshold {
    pub percent: u8,
    pub comparison: HpComparison,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusRequirement {
    /// Any primary status at all.
    Any,
    Specific(StatusKind),
}

/// When an effect applies. Every populated field must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectCondition {
    #[serde(default)]
    pub hp: Option<HpThreshold>,
    /// Holder at or below this HP percent.
    #[serde(default)]
    pub pinch_threshold: Option<u8>,
    #[serde(default)]
    pub weather: Option<Weather>,
    #[serde(default)]
    pub terrain: Option<Terrain>,
    #[serde(default)]
    pub status: Option<StatusRequirement>,
    #[serde(default)]
    pub move_category: Option<MoveCategory>,
    #[serde(default)]
    pub move_type: Option<PokemonType>,
    #[serde(default)]
    pub requires_contact: bool,
    #[serde(default)]
    pub first_turn: bool,
}

/// Snapshot of the holder and the field that a condition is checked against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConditionContext {
    pub current_hp: u16,
    pub max_hp: u16,
    pub status: Option<StatusKind>,
    pub weather: Option<Weather>,
    pub terrain: Option<Terrain>,
    pub move_category: Option<MoveCategory>,
    pub move_type: Option<PokemonType>,
    pub is_contact: bool,
    pub turn_number: u32,
}

impl ConditionContext {
    /// Integer HP percentage, truncated.
    pub fn hp_percent(&self) -> u32 {
        if self.max_hp == 0 {
            return 0;
        }
        u32::from(self.current_hp) * 100 / u32::from(self.max_hp)
    }
}

impl EffectCondition {
    pub fn is_met(&self, ctx: &ConditionContext) -> bool {
        let hp_percent = ctx.hp_percent();

        if let Some(threshold) = self.hp {
            let target = u32::from(threshold.percent);
            let holds = match threshold.comparison {
                HpComparison::Below => hp_percent < target,
                HpComparison::Above => hp_percent > target,
                HpComparison::Equal => hp_percent == target,
            };
            if !holds {
                return false;
            }
        }

        if let Some(pinch) = self.pinch_threshold {
            if hp_percent > u32::from(pinch) {
                return false;
            }
        }

        if self.weather.is_some() && ctx.weather != self.weather {
            return false;
        }
        if self.terrain.is_some() && ctx.terrain != self.terrain {
            return false;
        }

        match self.status {
            Some(StatusRequirement::Any) if ctx.status.is_none() => return false,
            Some(StatusRequirement::Specific(kind)) if ctx.status != Some(kind) => return false,
            _ => {}
        }

        if self.move_category.is_some() && ctx.move_category != self.move_category {
            return false;
        }
        if self.move_type.is_some() && ctx.move_type != self.move_type {
            return false;
        }
        if self.requires_contact && !ctx.is_contact {
            return false;
        }
        if self.first_turn && ctx.turn_number != 1 {
            return false;
        }

        true
    }
}

/// An effect plus the condition gating it. No condition means always on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalEffect<E> {
    pub effect: E,
    #[serde(default)]
    pub condition: Option<EffectCondition>,
}

impl<E> ConditionalEffect<E> {
    pub fn applies(&self, ctx: &ConditionContext) -> bool {
        self.condition.as_ref().map_or(true, |c| c.is_met(ctx))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AbilityEffect {
    /// Huge Power, Guts, Marvel Scale.
    StatMultiplier { stat: StatType, multiplier: f64 },
    /// Boosts damage the holder deals. Empty filters match everything.
    DamageBoost {
        multiplier: f64,
        #[serde(default)]
        move_types: Vec<PokemonType>,
        #[serde(default)]
        move_categories: Vec<MoveCategory>,
    },
    /// Scales damage the holder takes from the listed types (Thick Fat).
    DamageResistance {
        multiplier: f64,
        affected_types: Vec<PokemonType>,
    },
    /// Replaces the usual 1.5 same-type bonus (Adaptability).
    StabOverride { multiplier: f64 },
    AccuracyModifier { multiplier: f64 },
    EvasionModifier { multiplier: f64 },
    CritStageBoost { stages: u8 },
    IgnoreBurnPenalty,
    /// No weather, status or recoil damage (Magic Guard).
    IgnoreIndirectDamage,
    StatusImmunity { statuses: Vec<StatusKind> },
    WeatherImmunity,
    /// Moves of these types have no effect on the holder (Levitate).
    TypeImmunity { types: Vec<PokemonType> },
    PriorityBoost {
        amount: i8,
        #[serde(default)]
        move_types: Vec<PokemonType>,
        #[serde(default)]
        move_categories: Vec<MoveCategory>,
    },
    EndOfTurnHeal { percent: u8 },
    EndOfTurnStatBoost { stat: StatType, stages: i8 },
    SetWeatherOnEntry { weather: Weather, duration: u8 },
    SetTerrainOnEntry { terrain: Terrain, duration: u8 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ability {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub effects: Vec<ConditionalEffect<AbilityEffect>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ItemEffect {
    /// Choice Band and friends.
    StatMultiplier { stat: StatType, multiplier: f64 },
    /// Life Orb.
    DamageMultiplier { multiplier: f64 },
    /// Charcoal, Mystic Water, ...
    TypeBoost { move_type: PokemonType, multiplier: f64 },
    CritStageBoost { stages: u8 },
    AccuracyModifier { multiplier: f64 },
    EvasionModifier { multiplier: f64 },
    /// Leftovers: heals `max_hp / divisor` every turn.
    EndOfTurnHeal { divisor: u16 },
    /// Sitrus Berry: heals a percent of max HP once the condition holds.
    PinchHeal { percent: u8 },
    CureStatus { statuses: Vec<StatusKind> },
    /// Air Balloon.
    GroundImmunity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeldItem {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub effects: Vec<ConditionalEffect<ItemEffect>>,
    /// Removed from the holder after it triggers.
    #[serde(default)]
    pub consumable: bool,
}

/// Iterates the effects of an optional ability whose conditions hold.
/// An absent ability yields nothing.
pub fn active_ability_effects<'a>(
    ability: Option<&'a Ability>,
    ctx: &'a ConditionContext,
) -> impl Iterator<Item = &'a AbilityEffect> + 'a {
    ability
        .into_iter()
        .flat_map(|a| a.effects.iter())
        .filter(move |e| e.applies(ctx))
        .map(|e| &e.effect)
}

/// Iterates the effects of an optional held item whose conditions hold.
pub fn active_item_effects<'a>(
    item: Option<&'a HeldItem>,
    ctx: &'a ConditionContext,
) -> impl Iterator<Item = &'a ItemEffect> + 'a {
    item.into_iter()
        .flat_map(|i| i.effects.iter())
        .filter(move |e| e.applies(ctx))
        .map(|e| &e.effect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn context(current_hp: u16, max_hp: u16) -> ConditionContext {
        ConditionContext {
            current_hp,
            max_hp,
            status: None,
            weather: None,
            terrain: None,
            move_category: None,
            move_type: None,
            is_contact: false,
            turn_number: 3,
        }
    }

    #[rstest]
    #[case(HpComparison::Below, 33, 32, true)]
    #[case(HpComparison::Below, 33, 33, false)]
    #[case(HpComparison::Above, 50, 51, true)]
    #[case(HpComparison::Above, 50, 50, false)]
    #[case(HpComparison::Equal, 100, 100, true)]
    #[case(HpComparison::Equal, 100, 99, false)]
    fn test_hp_threshold_comparisons(
        #[case] comparison: HpComparison,
        #[case] percent: u8,
        #[case] current_hp: u16,
        #[case] expected: bool,
    ) {
        let condition = EffectCondition {
            hp: Some(HpThreshold { percent, comparison }),
            ..Default::default()
        };
        assert_eq!(condition.is_met(&context(current_hp, 100)), expected);
    }

    #[test]
    fn test_empty_condition_always_holds() {
        assert!(EffectCondition::default().is_met(&context(1, 100)));
    }

    #[test]
    fn test_move_requirements_need_a_move() {
        let condition = EffectCondition {
            move_type: Some(PokemonType::Fire),
            ..Default::default()
        };
        let mut ctx = context(100, 100);
        assert!(!condition.is_met(&ctx));

        ctx.move_type = Some(PokemonType::Fire);
        assert!(condition.is_met(&ctx));
    }

    #[test]
    fn test_status_requirement_any_and_specific() {
        let any = EffectCondition {
            status: Some(StatusRequirement::Any),
            ..Default::default()
        };
        let burned = EffectCondition {
            status: Some(StatusRequirement::Specific(StatusKind::Burn)),
            ..Default::default()
        };
        let mut ctx = context(100, 100);
        assert!(!any.is_met(&ctx));

        ctx.status = Some(StatusKind::Poison);
        assert!(any.is_met(&ctx));
        assert!(!burned.is_met(&ctx));

        ctx.status = Some(StatusKind::Burn);
        assert!(burned.is_met(&ctx));
    }

    #[test]
    fn test_pinch_weather_and_first_turn() {
        let condition = EffectCondition {
            pinch_threshold: Some(50),
            weather: Some(Weather::Rain),
            first_turn: true,
            ..Default::default()
        };
        let mut ctx = context(50, 100);
        ctx.weather = Some(Weather::Rain);
        assert!(!condition.is_met(&ctx), "turn 3 is not the first turn");

        ctx.turn_number = 1;
        assert!(condition.is_met(&ctx));

        ctx.current_hp = 51;
        assert!(!condition.is_met(&ctx));
    }

    #[test]
    fn test_absent_ability_contributes_nothing() {
        let ctx = context(100, 100);
        assert_eq!(active_ability_effects(None, &ctx).count(), 0);
        assert_eq!(active_item_effects(None, &ctx).count(), 0);
    }

    #[test]
    fn test_only_met_effects_are_active() {
        let blaze = Ability {
            name: "blaze".to_string(),
            description: String::new(),
            effects: vec![ConditionalEffect {
                effect: AbilityEffect::DamageBoost {
                    multiplier: 1.5,
                    move_types: vec![PokemonType::Fire],
                    move_categories: vec![],
                },
                condition: Some(EffectCondition {
                    hp: Some(HpThreshold {
                        percent: 34,
                        comparison: HpComparison::Below,
                    }),
                    ..Default::default()
                }),
            }],
        };

        assert_eq!(active_ability_effects(Some(&blaze), &context(100, 100)).count(), 0);
        assert_eq!(active_ability_effects(Some(&blaze), &context(30, 100)).count(), 1);
    }
}
