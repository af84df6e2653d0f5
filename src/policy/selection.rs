//! Action selection
//!
//! `ActionSelector` is the seam between the battle loop and whatever decides
//! a creature's move. The production selector is epsilon-greedy over the
//! creature's policy; scripted selectors replay fixed moves.

use std::collections::HashMap;

use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, RngCore};

use crate::combat::creature::Creature;
use crate::core::error::{ArenaError, Result};
use crate::core::types::StateVector;
use crate::policy::network::PolicyNetwork;

/// Chosen action index plus the full softmax distribution it came from
#[derive(Debug, Clone, PartialEq)]
pub struct ActionChoice {
    pub index: usize,
    pub probs: Vec<f32>,
}

/// Trait for action selection strategies
pub trait ActionSelector {
    /// Pick an action index for `creature` given its observation
    fn select(
        &mut self,
        creature: &Creature,
        state: &StateVector,
        epsilon: f32,
        rng: &mut dyn RngCore,
    ) -> Result<ActionChoice>;
}

/// Epsilon-greedy sampling from a policy
///
/// With probability `epsilon` the index is uniform over every action slot,
/// otherwise it is drawn from the softmax distribution. The distribution is
/// returned on both branches.
pub fn select_action<R: Rng + ?Sized>(
    policy: &PolicyNetwork,
    state: &StateVector,
    epsilon: f32,
    rng: &mut R,
) -> Result<ActionChoice> {
    let probs = policy.probabilities(state)?;
    if probs.is_empty() {
        return Err(ArenaError::InvalidDistribution("empty action distribution".into()));
    }

    let index = if rng.gen::<f32>() < epsilon {
        rng.gen_range(0..probs.len())
    } else {
        WeightedIndex::new(&probs)
            .map_err(|e| ArenaError::InvalidDistribution(format!("{e}: {probs:?}")))?
            .sample(rng)
    };

    Ok(ActionChoice { index, probs })
}

/// Production selector: epsilon-greedy over the acting creature's policy
#[derive(Debug, Clone, Copy, Default)]
pub struct EpsilonGreedy;

impl ActionSelector for EpsilonGreedy {
    fn select(
        &mut self,
        creature: &Creature,
        state: &StateVector,
        epsilon: f32,
        rng: &mut dyn RngCore,
    ) -> Result<ActionChoice> {
        select_action(creature.policy(), state, epsilon, rng)
    }
}

/// Replays a fixed cycle of action indices per creature
///
/// The recorded distribution is still the creature's real softmax output,
/// so battles driven by a script produce trainable logs.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSelector {
    scripts: HashMap<String, Vec<usize>>,
    cursors: HashMap<String, usize>,
}

impl ScriptedSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a creature; the sequence repeats once exhausted
    pub fn with_script(mut self, creature: &str, indices: Vec<usize>) -> Self {
        self.scripts.insert(creature.to_string(), indices);
        self
    }

    /// Every creature always picks the same index
    pub fn constant(creatures: &[&str], index: usize) -> Self {
        creatures
            .iter()
            .fold(Self::new(), |selector, name| selector.with_script(name, vec![index]))
    }
}

impl ActionSelector for ScriptedSelector {
    fn select(
        &mut self,
        creature: &Creature,
        state: &StateVector,
        _epsilon: f32,
        _rng: &mut dyn RngCore,
    ) -> Result<ActionChoice> {
        let script = self
            .scripts
            .get(creature.name())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ArenaError::InvalidConfig(format!("no script for creature {}", creature.name()))
            })?;
        let cursor = self.cursors.entry(creature.name().to_string()).or_insert(0);
        let index = script[*cursor % script.len()];
        *cursor += 1;

        Ok(ActionChoice {
            index,
            probs: creature.policy().probabilities(state)?,
        })
    }
}
