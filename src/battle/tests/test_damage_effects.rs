#[cfg(test)]
mod tests {
    use crate::battle::calculators::percent_of;
    use crate::battle::rng::TurnRng;
    use crate::battle::state::{ActionOutcome, BattleEvent, BattleState};
    use crate::battle::tests::common::{
        create_test_battle, physical_move, predictable_rng, run_turn, special_move, splash,
        TestPokemonBuilder, USE_FIRST_MOVE,
    };
    use crate::move_data::{MoveData, MultiHit, SecondaryEffect, StatusInflict};
    use crate::player::PlayerTarget;
    use crate::pokemon::StatusCondition;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use schema::{PokemonType, StatusKind};

    fn attacker_vs_splasher(move_data: MoveData, defender: TestPokemonBuilder) -> BattleState {
        let attacker = TestPokemonBuilder::new("Attacker")
            .with_base_speed(120)
            .with_moves(vec![move_data])
            .build();
        create_test_battle(attacker, defender.with_moves(vec![splash()]).build())
    }

    fn fury_attack() -> MoveData {
        let mut data = physical_move("Fury Attack", PokemonType::Normal, 15);
        data.multi_hit = Some(MultiHit {
            min_hits: 2,
            max_hits: 5,
        });
        data
    }

    /// Accuracy, crit and damage for the first hit, the hit count, then crit
    /// and damage for every later hit.
    fn multi_hit_rolls(count_roll: u8, extra_hits: usize) -> TurnRng {
        let mut outcomes = vec![50, 100, 50, count_roll];
        for _ in 0..extra_hits {
            outcomes.extend([100, 50]);
        }
        TurnRng::new_for_test(outcomes)
    }

    fn ember(secondary_chance: u8) -> MoveData {
        let mut data = special_move("Ember", PokemonType::Fire, 40);
        data.secondary = Some(SecondaryEffect {
            chance: secondary_chance,
            stat_changes: vec![],
            status_inflict: Some(StatusInflict {
                status: StatusKind::Burn,
                chance: 100,
            }),
            flinch_chance: 0,
        });
        data
    }

    #[rstest]
    #[case(35, 2)]
    #[case(36, 3)]
    #[case(70, 3)]
    #[case(85, 4)]
    #[case(86, 5)]
    fn test_two_to_five_hit_distribution(#[case] count_roll: u8, #[case] expected_hits: u8) {
        // Arrange
        let mut state = attacker_vs_splasher(fury_attack(), TestPokemonBuilder::new("Target"));
        let mut rng = multi_hit_rolls(count_roll, usize::from(expected_hits) - 1);

        // Act
        let resolution = run_turn(&mut state, USE_FIRST_MOVE, USE_FIRST_MOVE, &mut rng);

        // Assert: 22 * 15 -> 8.6, roll 86, STAB -> 11 per hit
        let ActionOutcome::Damaged { damage, hits, .. } = resolution.actions[0].outcome else {
            panic!("expected damage, got {:?}", resolution.actions[0].outcome);
        };
        assert_eq!(hits, expected_hits);
        assert_eq!(damage, 11 * u16::from(expected_hits));
        let target = state.pokemon(PlayerTarget::Player2);
        assert_eq!(target.current_hp(), target.max_hp() - damage);
        assert!(resolution
            .events
            .events()
            .iter()
            .any(|e| matches!(e, BattleEvent::MultiHitCompleted { hits } if *hits == expected_hits)));
    }

    #[test]
    fn test_multi_hit_stops_when_target_faints() {
        let mut state = attacker_vs_splasher(fury_attack(), TestPokemonBuilder::new("Target").with_hp(15));
        // Five hits are planned, the second one knocks the target out.
        let mut rng = multi_hit_rolls(86, 1);

        let resolution = run_turn(&mut state, USE_FIRST_MOVE, USE_FIRST_MOVE, &mut rng);

        let ActionOutcome::Damaged { hits, .. } = resolution.actions[0].outcome else {
            panic!("expected damage, got {:?}", resolution.actions[0].outcome);
        };
        assert_eq!(hits, 2);
        assert!(state.pokemon(PlayerTarget::Player2).is_fainted());
        assert_eq!(resolution.winner(), Some(PlayerTarget::Player1));
        assert_eq!(resolution.actions.len(), 1);
    }

    #[test]
    fn test_recoil_is_a_share_of_damage_dealt() {
        let mut double_edge = physical_move("Double-Edge", PokemonType::Normal, 120);
        double_edge.recoil_percent = 33;
        let mut state = attacker_vs_splasher(double_edge, TestPokemonBuilder::new("Target"));

        let resolution = run_turn(&mut state, USE_FIRST_MOVE, USE_FIRST_MOVE, &mut predictable_rng());

        let ActionOutcome::Damaged { damage, .. } = resolution.actions[0].outcome else {
            panic!("expected damage, got {:?}", resolution.actions[0].outcome);
        };
        let recoil = percent_of(damage, 33);
        assert!(recoil > 0);
        let attacker = state.pokemon(PlayerTarget::Player1);
        assert_eq!(attacker.current_hp(), attacker.max_hp() - recoil);
        assert!(resolution
            .events
            .events()
            .iter()
            .any(|e| matches!(e, BattleEvent::RecoilTaken { damage, .. } if *damage == recoil)));
    }

    #[test]
    fn test_drain_heals_the_attacker() {
        let mut giga_drain = special_move("Giga Drain", PokemonType::Grass, 75);
        giga_drain.drain_percent = 50;
        let attacker = TestPokemonBuilder::new("Drainer")
            .with_base_speed(120)
            .with_hp(50)
            .with_moves(vec![giga_drain])
            .build();
        let target = TestPokemonBuilder::new("Target").with_moves(vec![splash()]).build();
        let mut state = create_test_battle(attacker, target);

        let resolution = run_turn(&mut state, USE_FIRST_MOVE, USE_FIRST_MOVE, &mut predictable_rng());

        let ActionOutcome::Damaged { damage, .. } = resolution.actions[0].outcome else {
            panic!("expected damage, got {:?}", resolution.actions[0].outcome);
        };
        assert_eq!(
            state.pokemon(PlayerTarget::Player1).current_hp(),
            50 + percent_of(damage, 50)
        );
    }

    #[rstest]
    #[case(10, true)]
    #[case(11, false)]
    fn test_secondary_effect_gate(#[case] gate_roll: u8, #[case] burned: bool) {
        let mut state = attacker_vs_splasher(ember(10), TestPokemonBuilder::new("Target"));
        // accuracy, crit, damage, secondary gate
        let mut outcomes = vec![50, 50, 50, gate_roll];
        outcomes.extend(vec![50; 10]);

        run_turn(&mut state, USE_FIRST_MOVE, USE_FIRST_MOVE, &mut TurnRng::new_for_test(outcomes));

        let status = state.pokemon(PlayerTarget::Player2).status;
        assert_eq!(status == Some(StatusCondition::Burn), burned);
    }

    #[test]
    fn test_missed_move_skips_secondary_effect() {
        let mut inaccurate = ember(100);
        inaccurate.accuracy = 70;
        let mut state = attacker_vs_splasher(inaccurate, TestPokemonBuilder::new("Target"));

        // Only the accuracy roll is available.
        let resolution = run_turn(&mut state, USE_FIRST_MOVE, USE_FIRST_MOVE, &mut TurnRng::new_for_test(vec![71]));

        assert_eq!(resolution.actions[0].outcome, ActionOutcome::Missed);
        let target = state.pokemon(PlayerTarget::Player2);
        assert_eq!(target.status, None);
        assert_eq!(target.current_hp(), target.max_hp());
        // A miss still costs PP.
        assert_eq!(state.pokemon(PlayerTarget::Player1).moves[0].pp, 19);
    }

    #[test]
    fn test_type_immunity_deals_nothing() {
        let mut state = attacker_vs_splasher(
            physical_move("Tackle", PokemonType::Normal, 40),
            TestPokemonBuilder::new("Ghost").with_types(PokemonType::Ghost, None),
        );

        // accuracy and crit only; no damage roll is made.
        let resolution = run_turn(&mut state, USE_FIRST_MOVE, USE_FIRST_MOVE, &mut TurnRng::new_for_test(vec![50, 100]));

        assert_eq!(resolution.actions[0].outcome, ActionOutcome::Immune);
        let ghost = state.pokemon(PlayerTarget::Player2);
        assert_eq!(ghost.current_hp(), ghost.max_hp());
        assert!(resolution
            .events
            .events()
            .iter()
            .any(|e| matches!(e, BattleEvent::MoveHadNoEffect { .. })));
    }
}
