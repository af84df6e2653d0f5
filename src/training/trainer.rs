//! REINFORCE policy-gradient update
//!
//! One batched pass over a creature's chosen-action events:
//! loss = sum[-log pi(a|s) * (r - b) - beta * H(pi(.|s))]
//! followed by a single optimizer step.

use candle_core::{Tensor, D};
use serde::{Deserialize, Serialize};

use crate::battle::event::{BattleEvent, BattleLog};
use crate::combat::creature::Creature;
use crate::core::error::Result;
use crate::core::types::{Reward, STATE_SIZE};
use crate::policy::optimizer::Adam;

/// Drift tolerated between a logged distribution and the recomputed one
const PROB_DRIFT_TOLERANCE: f32 = 1e-4;

/// Result of one policy update
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateStats {
    /// Events that contributed a loss term
    pub steps: usize,
    pub loss: f32,
    pub mean_entropy: f32,
}

/// Reward attributed to an event when training `creature`
///
/// The creature's own reward config overrides the logged step reward, signed
/// by how the action resolved. The terminal reward is always added.
pub fn event_reward(creature: &Creature, event: &BattleEvent) -> Reward {
    let step = match (event.action_name(), event.effect) {
        (Some(name), Some(effect)) => creature
            .reward_config()
            .get(name)
            .map(|configured| effect.shaped_reward(*configured))
            .unwrap_or(event.step_reward),
        _ => event.step_reward,
    };
    step + event.terminal_reward
}

/// Update `creature`'s policy from its events in `log`
pub fn reinforce(
    creature: &Creature,
    optimizer: &mut Adam,
    log: &BattleLog,
    baseline: f32,
    entropy_beta: f32,
) -> Result<UpdateStats> {
    let events: Vec<(&BattleEvent, usize)> = log
        .for_creature(creature.name())
        .filter_map(|e| e.action_index().map(|i| (e, i)))
        .collect();
    if events.is_empty() {
        return Ok(UpdateStats::default());
    }

    let policy = creature.policy();
    let device = policy.device();
    let n = events.len();

    let states: Vec<f32> = events.iter().flat_map(|(e, _)| e.state).collect();
    let actions: Vec<u32> = events.iter().map(|(_, i)| *i as u32).collect();
    let advantages: Vec<f32> = events
        .iter()
        .map(|(e, _)| event_reward(creature, e) - baseline)
        .collect();

    let states = Tensor::from_vec(states, (n, STATE_SIZE), device)?;
    let actions = Tensor::from_vec(actions, (n, 1), device)?;
    let advantages = Tensor::from_vec(advantages, n, device)?;

    let logits = policy.forward(&states)?;
    let log_probs = candle_nn::ops::log_softmax(&logits, D::Minus1)?;
    let probs = candle_nn::ops::softmax(&logits, D::Minus1)?;

    warn_on_drift(creature.name(), &events, &probs)?;

    let chosen = log_probs.gather(&actions, 1)?.squeeze(1)?;
    let entropy = (&probs * &log_probs)?.sum(1)?.neg()?;

    let policy_loss = (&chosen * &advantages)?.neg()?;
    let loss = (policy_loss - (&entropy * entropy_beta as f64)?)?.sum_all()?;

    optimizer.backward_step(&loss)?;

    Ok(UpdateStats {
        steps: n,
        loss: loss.to_scalar::<f32>()?,
        mean_entropy: entropy.mean_all()?.to_scalar::<f32>()?,
    })
}

fn warn_on_drift(creature: &str, events: &[(&BattleEvent, usize)], probs: &Tensor) -> Result<()> {
    let recomputed = probs.to_vec2::<f32>()?;
    let drift = events
        .iter()
        .zip(&recomputed)
        .flat_map(|((event, _), row)| event.probs.iter().zip(row).map(|(a, b)| (a - b).abs()))
        .fold(0.0f32, f32::max);
    if drift > PROB_DRIFT_TOLERANCE {
        tracing::warn!(
            "{}: recomputed action distribution drifted {:.6} from the logged one",
            creature,
            drift
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::event::EventAction;
    use crate::combat::action::ActionEffect;
    use crate::combat::status::{StatusMap, StatusMarker};
    use crate::core::config::ArenaConfig;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn creature(config: &ArenaConfig) -> Creature {
        let mut rng = ChaCha8Rng::seed_from_u64(31);
        Creature::from_config("A", config, &mut rng).unwrap()
    }

    fn chosen(creature: &Creature, state: [f32; 4], index: usize, reward: f32) -> BattleEvent {
        BattleEvent {
            epoch: 0,
            tick: 0,
            creature: creature.name().into(),
            state,
            action: EventAction::Chosen {
                name: creature.action_name(creature.action_at(index).unwrap()).into(),
                index,
            },
            probs: creature.policy().probabilities(&state).unwrap(),
            hp: 100,
            energy: 100,
            statuses: StatusMap::new(),
            step_reward: reward,
            terminal_reward: 0.0,
            effect: Some(ActionEffect::Applied),
        }
    }

    fn small_config() -> ArenaConfig {
        let mut config = ArenaConfig::default();
        config.learner.hidden_sizes = vec![16];
        config
    }

    #[test]
    fn test_positive_advantage_raises_probability() {
        let config = small_config();
        let a = creature(&config);
        let mut adam = Adam::for_policy(a.policy(), 0.001).unwrap();
        let state = [1.0, 0.6, 0.8, 0.4];

        let mut log = BattleLog::new();
        log.push(chosen(&a, state, 0, 1.0));
        let before = a.policy().probabilities(&state).unwrap()[0];

        let stats = reinforce(&a, &mut adam, &log, 0.0, 0.0).unwrap();
        assert_eq!(stats.steps, 1);
        let after = a.policy().probabilities(&state).unwrap()[0];
        assert!(after > before, "{before} -> {after}");
    }

    #[test]
    fn test_negative_advantage_lowers_probability() {
        let config = small_config();
        let a = creature(&config);
        let mut adam = Adam::for_policy(a.policy(), 0.001).unwrap();
        let state = [0.5, 0.5, 0.5, 0.5];

        let mut log = BattleLog::new();
        log.push(chosen(&a, state, 2, 0.0));
        let before = a.policy().probabilities(&state).unwrap()[2];
        reinforce(&a, &mut adam, &log, 1.0, 0.0).unwrap();
        let after = a.policy().probabilities(&state).unwrap()[2];
        assert!(after < before);
    }

    #[test]
    fn test_markers_and_other_creatures_skipped() {
        let config = small_config();
        let a = creature(&config);
        let mut adam = Adam::for_policy(a.policy(), 0.01).unwrap();

        let mut log = BattleLog::new();
        let mut marker = chosen(&a, [0.0; 4], 0, 0.0);
        marker.action = EventAction::Marker(StatusMarker::Stunned);
        marker.effect = None;
        log.push(marker);
        let mut foreign = chosen(&a, [0.0; 4], 0, 0.0);
        foreign.creature = "B".into();
        log.push(foreign);

        let stats = reinforce(&a, &mut adam, &log, 0.0, 0.001).unwrap();
        assert_eq!(stats, UpdateStats::default());
        assert_eq!(adam.step_count(), 0);
    }

    #[test]
    fn test_one_optimizer_step_per_episode() {
        let config = small_config();
        let a = creature(&config);
        let mut adam = Adam::for_policy(a.policy(), 0.001).unwrap();
        let mut log = BattleLog::new();
        for i in 0..5 {
            log.push(chosen(&a, [i as f32 * 10.0, 50.0, 50.0, 50.0], i % 4, 0.01));
        }
        let stats = reinforce(&a, &mut adam, &log, 0.0, 0.001).unwrap();
        assert_eq!(stats.steps, 5);
        assert_eq!(adam.step_count(), 1);
        assert!(stats.mean_entropy > 0.0);
    }

    #[test]
    fn test_event_reward_prefers_reward_config() {
        let mut config = small_config();
        config
            .creatures
            .get_mut("A")
            .unwrap()
            .reward_config
            .insert("recover".into(), 0.5);
        let a = creature(&config);

        let mut wasted = chosen(&a, [0.0; 4], 2, -0.01);
        wasted.effect = Some(ActionEffect::Wasted);
        wasted.terminal_reward = 2.0;
        assert_eq!(event_reward(&a, &wasted), 1.5);

        // No override for attack: logged step reward stands
        let attack = chosen(&a, [0.0; 4], 0, 0.01);
        assert_eq!(event_reward(&a, &attack), 0.01);
    }
}
