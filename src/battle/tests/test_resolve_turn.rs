#[cfg(test)]
mod tests {
    use crate::battle::engine::resolve_turn;
    use crate::battle::rng::TurnRng;
    use crate::battle::state::{ActionOutcome, BattleEvent, EndReason, GameState};
    use crate::battle::tests::common::{
        create_test_battle, physical_move, predictable_rng, run_turn, splash, TestPokemonBuilder,
        USE_FIRST_MOVE,
    };
    use crate::player::{PlayerAction, PlayerTarget};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use schema::PokemonType;

    fn move_order(events: &[BattleEvent]) -> Vec<PlayerTarget> {
        events
            .iter()
            .filter_map(|e| match e {
                BattleEvent::MoveUsed { player, .. } => Some(*player),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_faster_pokemon_moves_first() {
        // Arrange
        let slow = TestPokemonBuilder::new("Slowpoke").with_base_speed(40).build();
        let fast = TestPokemonBuilder::new("Zippy").with_base_speed(120).build();
        let mut state = create_test_battle(slow, fast);
        let mut rng = predictable_rng();

        // Act
        let resolution = run_turn(&mut state, USE_FIRST_MOVE, USE_FIRST_MOVE, &mut rng);

        // Assert
        assert_eq!(
            move_order(resolution.events.events()),
            vec![PlayerTarget::Player2, PlayerTarget::Player1]
        );
        assert_eq!(resolution.actions[0].player, PlayerTarget::Player2);
        assert_eq!(resolution.turn, 1);
        assert_eq!(state.turn_number, 2);
        assert_eq!(state.game_state, GameState::WaitingForActions);
        assert!(!state.player(PlayerTarget::Player1).has_submitted());
    }

    #[rstest]
    #[case(10, PlayerTarget::Player1)]
    #[case(50, PlayerTarget::Player1)]
    #[case(51, PlayerTarget::Player2)]
    #[case(90, PlayerTarget::Player2)]
    fn test_speed_tie_is_settled_by_coin_flip(#[case] coin: u8, #[case] expected_first: PlayerTarget) {
        // Arrange: identical speed and priority
        let mut state = create_test_battle(
            TestPokemonBuilder::new("Left").build(),
            TestPokemonBuilder::new("Right").build(),
        );
        let mut outcomes = vec![coin];
        outcomes.extend(vec![50; 20]);
        let mut rng = TurnRng::new_for_test(outcomes);

        // Act
        let resolution = run_turn(&mut state, USE_FIRST_MOVE, USE_FIRST_MOVE, &mut rng);

        // Assert
        assert_eq!(move_order(resolution.events.events())[0], expected_first);
    }

    #[test]
    fn test_priority_beats_speed() {
        let mut quick_attack = physical_move("Quick Attack", PokemonType::Normal, 40);
        quick_attack.priority = 1;
        let slow = TestPokemonBuilder::new("Slow")
            .with_base_speed(20)
            .with_moves(vec![quick_attack])
            .build();
        let fast = TestPokemonBuilder::new("Fast").with_base_speed(150).build();
        let mut state = create_test_battle(slow, fast);

        let resolution = run_turn(&mut state, USE_FIRST_MOVE, USE_FIRST_MOVE, &mut predictable_rng());

        assert_eq!(
            move_order(resolution.events.events()),
            vec![PlayerTarget::Player1, PlayerTarget::Player2]
        );
    }

    #[test]
    fn test_resolution_waits_for_both_sides() {
        let mut state = create_test_battle(
            TestPokemonBuilder::new("Alpha").build(),
            TestPokemonBuilder::new("Beta").build(),
        );
        state
            .submit_action(PlayerTarget::Player1, USE_FIRST_MOVE)
            .expect("first submission is accepted");

        // No rolls are available: resolving must not touch the rng.
        let resolution = resolve_turn(&mut state, &mut TurnRng::new_for_test(vec![]));

        assert!(resolution.actions.is_empty());
        assert!(resolution.events.is_empty());
        assert!(!resolution.battle_ended);
        assert_eq!(state.turn_number, 1);
        assert!(state.player(PlayerTarget::Player1).has_submitted());
        assert!(state.log.is_empty());
    }

    #[test]
    fn test_damage_and_pp_are_applied() {
        let mut state = create_test_battle(
            TestPokemonBuilder::new("Alpha").with_base_speed(100).build(),
            TestPokemonBuilder::new("Beta").with_moves(vec![splash()]).build(),
        );

        let resolution = run_turn(&mut state, USE_FIRST_MOVE, USE_FIRST_MOVE, &mut predictable_rng());

        // 22 * 40 * 100 / 100 = 880 -> 19.6; roll 86; STAB 1.5 -> 25
        let ActionOutcome::Damaged { damage, hits, critical, .. } = resolution.actions[0].outcome else {
            panic!("expected a damaging outcome, got {:?}", resolution.actions[0].outcome);
        };
        assert_eq!((damage, hits, critical), (25, 1, false));
        let defender = state.pokemon(PlayerTarget::Player2);
        assert_eq!(defender.current_hp(), defender.max_hp() - 25);
        assert_eq!(state.pokemon(PlayerTarget::Player1).moves[0].pp, 19);
        assert_eq!(state.pokemon(PlayerTarget::Player2).moves[0].pp, 19);
    }

    #[test]
    fn test_forfeit_resolves_last_and_ends_battle() {
        let mut state = create_test_battle(
            TestPokemonBuilder::new("Quitter").with_base_speed(200).build(),
            TestPokemonBuilder::new("Stayer").with_base_speed(10).build(),
        );

        let resolution = run_turn(&mut state, PlayerAction::Forfeit, USE_FIRST_MOVE, &mut predictable_rng());

        assert_eq!(resolution.actions.len(), 2);
        assert_eq!(resolution.actions[0].player, PlayerTarget::Player2);
        assert_eq!(resolution.actions[1].outcome, ActionOutcome::Forfeited);
        assert!(resolution.battle_ended);
        let outcome = resolution.outcome.expect("battle has an outcome");
        assert_eq!(outcome.winner, PlayerTarget::Player2);
        assert_eq!(outcome.reason, EndReason::Forfeit);
        assert_eq!(state.game_state, GameState::Player2Win);
    }

    #[test]
    fn test_same_seed_reproduces_the_battle() {
        let build = || {
            create_test_battle(
                TestPokemonBuilder::new("Alpha").build(),
                TestPokemonBuilder::new("Beta").build(),
            )
        };
        let mut first = build();
        let mut second = build();
        let mut rng_a = TurnRng::from_seed(2024);
        let mut rng_b = TurnRng::from_seed(2024);

        for _ in 0..3 {
            let a = run_turn(&mut first, USE_FIRST_MOVE, USE_FIRST_MOVE, &mut rng_a);
            let b = run_turn(&mut second, USE_FIRST_MOVE, USE_FIRST_MOVE, &mut rng_b);
            assert_eq!(a.events.messages(), b.events.messages());
            assert_eq!(a.actions, b.actions);
        }
        for target in PlayerTarget::both() {
            assert_eq!(
                first.pokemon(target).current_hp(),
                second.pokemon(target).current_hp()
            );
        }
    }

    #[test]
    fn test_turn_events_reach_the_battle_log() {
        let mut state = create_test_battle(
            TestPokemonBuilder::new("Alpha").with_base_speed(100).build(),
            TestPokemonBuilder::new("Beta").with_base_speed(50).build(),
        );

        run_turn(&mut state, USE_FIRST_MOVE, USE_FIRST_MOVE, &mut predictable_rng());

        assert_eq!(state.log[0].message, "=== Turn 1 ===");
        assert_eq!(state.log[1].message, "Alpha used Tackle!");
        assert!(state.log.iter().all(|entry| entry.turn == 1));
        assert!(state.log.iter().any(|entry| entry.kind == "damage"));
    }
}
