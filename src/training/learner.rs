//! Per-creature learning state: optimizer, exploration rate and baseline

use crate::battle::event::BattleLog;
use crate::combat::creature::Creature;
use crate::core::config::LearnerParams;
use crate::core::error::Result;
use crate::core::types::Reward;
use crate::policy::optimizer::{Adam, OptimizerState};
use crate::training::trainer::{reinforce, UpdateStats};

#[derive(Debug)]
pub struct Learner {
    params: LearnerParams,
    optimizer: Adam,
    epsilon: f32,
    baseline: f32,
}

impl Learner {
    pub fn new(creature: &Creature, params: LearnerParams) -> Result<Self> {
        let optimizer = Adam::for_policy(creature.policy(), params.learning_rate)?;
        Ok(Self {
            epsilon: params.epsilon,
            baseline: 0.0,
            optimizer,
            params,
        })
    }

    pub fn params(&self) -> &LearnerParams {
        &self.params
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    pub fn baseline(&self) -> f32 {
        self.baseline
    }

    pub fn optimizer(&self) -> &Adam {
        &self.optimizer
    }

    /// Multiplicative decay toward the exploration floor
    pub fn decay_epsilon(&mut self) -> f32 {
        self.epsilon = (self.epsilon * self.params.eps_decay_rate).max(self.params.eps_min);
        self.epsilon
    }

    /// `baseline <- (1 - alpha) * baseline + alpha * episode_reward`
    pub fn update_baseline(&mut self, episode_reward: Reward) -> f32 {
        let alpha = self.params.alpha_baseline;
        self.baseline = (1.0 - alpha) * self.baseline + alpha * episode_reward;
        self.baseline
    }

    /// One policy-gradient step on the creature's events in `log`
    pub fn train(&mut self, creature: &Creature, log: &BattleLog) -> Result<UpdateStats> {
        reinforce(
            creature,
            &mut self.optimizer,
            log,
            self.baseline,
            self.params.entropy_beta,
        )
    }

    pub fn export_optimizer(&self) -> Result<OptimizerState> {
        self.optimizer.export_state()
    }

    pub fn import_optimizer(&mut self, state: &OptimizerState) -> Result<()> {
        self.optimizer.import_state(state)
    }
}
