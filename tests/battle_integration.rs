//! Battle system integration tests

use creature_arena::battle::*;
use creature_arena::combat::*;
use creature_arena::core::ArenaConfig;
use creature_arena::policy::{EpsilonGreedy, ScriptedSelector};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const ATTACK: usize = 0;
const DEFEND: usize = 1;
const SPECIAL: usize = 3;

fn arena(max_ticks: u32) -> ArenaConfig {
    let mut config = ArenaConfig::default();
    config.combat.max_ticks = max_ticks;
    config.learner.hidden_sizes = vec![16, 8];
    config
}

fn build(config: &ArenaConfig) -> (Creature, Creature) {
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    let a = Creature::from_config("A", config, &mut rng).unwrap();
    let b = Creature::from_config("B", config, &mut rng).unwrap();
    (a, b)
}

fn fight(config: &ArenaConfig, selector: &mut ScriptedSelector, seed: u64) -> BattleOutcome {
    let (mut a, mut b) = build(config);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    BattleSimulator::from_config(config)
        .run(&mut a, &mut b, 0, [0.0, 0.0], selector, &mut rng)
        .unwrap()
}

#[test]
fn test_stalemate_when_nobody_can_win() {
    let config = arena(7);
    let mut selector = ScriptedSelector::constant(&["A", "B"], DEFEND);
    let outcome = fight(&config, &mut selector, 1);

    assert!(outcome.winner.is_stalemate());
    assert_eq!(outcome.ticks, 7);
    for name in ["A", "B"] {
        let events: Vec<_> = outcome.log.for_creature(name).collect();
        let last = events.last().unwrap();
        assert_eq!(last.marker(), Some(StatusMarker::Stalemate));
        assert_eq!(last.reward(), 0.0);
        assert_eq!(last.raw_action_index(), -1);
        assert!(events.iter().all(|e| e.terminal_reward == 0.0));
    }
}

#[test]
fn test_attack_only_battle_ends_by_tick_five() {
    let config = arena(10);
    let mut winners = std::collections::HashSet::new();
    for seed in 0..40 {
        let mut selector = ScriptedSelector::constant(&["A", "B"], ATTACK);
        let outcome = fight(&config, &mut selector, seed);
        assert!(outcome.ticks <= 5, "seed {seed}: {} ticks", outcome.ticks);
        assert_eq!(outcome.phases[2], BattlePhase::Knockout);
        winners.insert(outcome.winner.name().unwrap().to_string());
    }
    // Tied speed: the coin flip decides who strikes first
    assert_eq!(winners.len(), 2);
}

#[test]
fn test_insufficient_energy_special_keeps_index() {
    let mut config = arena(3);
    for spec in config.creatures.values_mut() {
        spec.energy = 20;
        spec.max_energy = 20;
    }
    let mut selector = ScriptedSelector::new()
        .with_script("A", vec![SPECIAL])
        .with_script("B", vec![DEFEND]);
    let outcome = fight(&config, &mut selector, 3);

    let casts: Vec<_> = outcome
        .log
        .for_creature("A")
        .filter(|e| e.action_index().is_some())
        .collect();
    assert_eq!(casts.len(), 3);
    for event in casts {
        assert_eq!(event.action_index(), Some(SPECIAL));
        assert_eq!(event.step_reward, 0.0);
        assert_eq!(event.effect, Some(ActionEffect::Insufficient));
        assert_eq!(event.energy, 20);
    }
    for event in outcome.log.for_creature("B") {
        assert_eq!(event.hp, 100);
        assert!(!event.statuses.is_active(StatusKind::Poison));
    }
}

#[test]
fn test_stunned_creature_skips_action() {
    let mut config = arena(4);
    for spec in config.creatures.values_mut() {
        spec.special_abilities = vec!["stun".into()];
    }
    config.creatures.get_mut("A").unwrap().speed = 20;
    let mut selector = ScriptedSelector::new()
        .with_script("A", vec![SPECIAL])
        .with_script("B", vec![ATTACK]);
    let outcome = fight(&config, &mut selector, 4);

    let b_events: Vec<_> = outcome.log.for_creature("B").collect();
    let first = b_events[0];
    assert_eq!(first.tick, 0);
    assert_eq!(first.marker(), Some(StatusMarker::Stunned));
    // Applied for 2 turns, decremented once by this tick's status step
    assert_eq!(first.statuses.remaining(StatusKind::Stun), Some(1));

    // A never took damage while B was stunned
    let a_first = outcome.log.for_creature("A").next().unwrap();
    assert_eq!(a_first.hp, 100);
    assert!(b_events
        .iter()
        .take_while(|e| e.marker() == Some(StatusMarker::Stunned))
        .all(|e| e.action_index().is_none()));
}

#[test]
fn test_defend_blocks_stun() {
    let mut config = arena(5);
    for spec in config.creatures.values_mut() {
        spec.special_abilities = vec!["stun".into()];
    }
    config.creatures.get_mut("B").unwrap().speed = 20;
    let mut selector = ScriptedSelector::new()
        .with_script("A", vec![SPECIAL])
        .with_script("B", vec![DEFEND]);
    let outcome = fight(&config, &mut selector, 5);

    assert!(outcome
        .log
        .for_creature("B")
        .all(|e| e.marker() != Some(StatusMarker::Stunned)));
    // The stun still cost energy
    let a_second = outcome.log.for_creature("A").nth(1).unwrap();
    assert_eq!(a_second.energy, 20);
}

#[test]
fn test_terminal_reward_on_last_events_only() {
    let config = arena(50);
    let mut selector = ScriptedSelector::new()
        .with_script("A", vec![ATTACK])
        .with_script("B", vec![DEFEND]);
    let outcome = fight(&config, &mut selector, 6);

    assert_eq!(outcome.winner, Winner::Creature("A".into()));
    for reward in &outcome.rewards {
        let events: Vec<_> = outcome.log.for_creature(&reward.creature).collect();
        let (last, rest) = events.split_last().unwrap();
        assert!((last.terminal_reward - reward.total).abs() < 1e-5);
        assert!(rest.iter().all(|e| e.terminal_reward == 0.0));
    }
    assert_eq!(
        outcome.log.last().unwrap().marker(),
        Some(StatusMarker::Knockout)
    );
}

#[test]
fn test_same_seed_same_battle() {
    let config = arena(40);
    let run = |seed| {
        let (mut a, mut b) = build(&config);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        BattleSimulator::from_config(&config)
            .run(&mut a, &mut b, 9, [0.3, 0.3], &mut EpsilonGreedy, &mut rng)
            .unwrap()
    };
    let first = run(77);
    assert_eq!(first, run(77));
    assert!(first.log.iter().all(|e| e.epoch == 9));
}

#[test]
fn test_outcome_serializes() {
    let config = arena(10);
    let mut selector = ScriptedSelector::constant(&["A", "B"], ATTACK);
    let outcome = fight(&config, &mut selector, 8);
    let json = serde_json::to_string(&outcome).unwrap();
    let back: BattleOutcome = serde_json::from_str(&json).unwrap();
    assert_eq!(back.winner, outcome.winner);
    assert_eq!(back.log.len(), outcome.log.len());
}
