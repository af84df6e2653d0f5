//! Training loop
//!
//! Each epoch: decay epsilon -> battle -> policy update for both creatures
//! -> baselines -> win bookkeeping -> log batching. At the end of the batch
//! both creatures are checkpointed and a summary is emitted.

use std::collections::BTreeMap;

use rand_chacha::ChaCha8Rng;

use crate::battle::resolver::{BattleSimulator, Winner};
use crate::combat::creature::Creature;
use crate::core::config::{ArenaConfig, LearnerParams, TrainingConfig};
use crate::core::error::{ArenaError, Result};
use crate::core::types::Epoch;
use crate::policy::selection::{ActionSelector, EpsilonGreedy};
use crate::training::checkpoint::{Checkpoint, CheckpointStore};
use crate::training::learner::Learner;
use crate::training::log_sink::LogSink;
use crate::training::summary::{EpochProgress, EpochRecord, TrainingSummary};
use crate::training::trainer::UpdateStats;

fn learner_params(config: &ArenaConfig, name: &str) -> LearnerParams {
    match config.creatures.get(name) {
        Some(spec) => config.learner.with_overrides(&spec.learner),
        None => config.learner.clone(),
    }
}

pub struct TrainingSession<S: CheckpointStore, L: LogSink> {
    training: TrainingConfig,
    simulator: BattleSimulator,
    creatures: [Creature; 2],
    learners: [Learner; 2],
    activation_history: [Vec<serde_json::Value>; 2],
    selector: Box<dyn ActionSelector>,
    store: S,
    sink: L,
    rng: ChaCha8Rng,
    next_epoch: Epoch,
    wins: [u64; 2],
    stalemates: u64,
    last_updates: [UpdateStats; 2],
}

impl<S: CheckpointStore, L: LogSink> TrainingSession<S, L> {
    pub fn new(
        config: &ArenaConfig,
        creature_a: Creature,
        creature_b: Creature,
        store: S,
        sink: L,
        rng: ChaCha8Rng,
    ) -> Result<Self> {
        if creature_a.name() == creature_b.name() {
            return Err(ArenaError::InvalidConfig(format!(
                "both combatants are named {}",
                creature_a.name()
            )));
        }
        let learners = [
            Learner::new(&creature_a, learner_params(config, creature_a.name()))?,
            Learner::new(&creature_b, learner_params(config, creature_b.name()))?,
        ];

        Ok(Self {
            training: config.training.clone(),
            simulator: BattleSimulator::from_config(config),
            creatures: [creature_a, creature_b],
            learners,
            activation_history: [Vec::new(), Vec::new()],
            selector: Box::new(EpsilonGreedy),
            store,
            sink,
            rng,
            next_epoch: 0,
            wins: [0, 0],
            stalemates: 0,
            last_updates: [UpdateStats::default(); 2],
        })
    }

    /// Replace the epsilon-greedy selector
    pub fn with_selector(mut self, selector: Box<dyn ActionSelector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn creatures(&self) -> &[Creature; 2] {
        &self.creatures
    }

    pub fn learners(&self) -> &[Learner; 2] {
        &self.learners
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn sink(&self) -> &L {
        &self.sink
    }

    pub fn next_epoch(&self) -> Epoch {
        self.next_epoch
    }

    pub fn wins(&self) -> [u64; 2] {
        self.wins
    }

    pub fn stalemates(&self) -> u64 {
        self.stalemates
    }

    pub fn last_updates(&self) -> [UpdateStats; 2] {
        self.last_updates
    }

    pub fn into_parts(self) -> ([Creature; 2], S, L) {
        (self.creatures, self.store, self.sink)
    }

    /// Restore both creatures from the checkpoint store
    ///
    /// A missing checkpoint starts fresh at epoch 0. A checkpoint without
    /// optimizer state reinitialises the optimizer unless
    /// `require_optimizer_state` is set. Returns the epoch to run next.
    pub fn resume(&mut self) -> Result<Epoch> {
        let mut next = 0;
        for slot in 0..2 {
            let name = self.creatures[slot].name().to_string();
            let Some(checkpoint) = self.store.load(&name)? else {
                tracing::warn!("No checkpoint for {}, starting fresh at epoch 0", name);
                continue;
            };

            self.creatures[slot]
                .policy()
                .import_parameters(&checkpoint.parameters)?;
            match &checkpoint.optimizer {
                Some(state) => self.learners[slot].import_optimizer(state)?,
                None if self.training.require_optimizer_state => {
                    return Err(ArenaError::MissingOptimizerState { creature: name });
                }
                None => {
                    tracing::warn!("Checkpoint for {} has no optimizer state, reinitialising", name)
                }
            }
            self.activation_history[slot] = checkpoint.activation_history;
            next = next.max(checkpoint.epoch);
            tracing::info!("Resumed {} at epoch {}", name, checkpoint.epoch);
        }
        self.next_epoch = next;
        Ok(next)
    }

    /// Run one epoch: battle, updates, bookkeeping
    pub fn run_epoch(&mut self, summary: &mut TrainingSummary) -> Result<EpochRecord> {
        let epoch = self.next_epoch;
        let epsilons = [
            self.learners[0].decay_epsilon(),
            self.learners[1].decay_epsilon(),
        ];

        let [a, b] = &mut self.creatures;
        let outcome = self.simulator.run(
            a,
            b,
            epoch,
            epsilons,
            self.selector.as_mut(),
            &mut self.rng,
        )?;

        for slot in 0..2 {
            self.last_updates[slot] =
                self.learners[slot].train(&self.creatures[slot], &outcome.log)?;
            self.learners[slot].update_baseline(outcome.rewards[slot].total);
        }

        match &outcome.winner {
            Winner::Creature(name) => {
                if let Some(slot) = self.creatures.iter().position(|c| c.name() == name) {
                    self.wins[slot] += 1;
                }
            }
            Winner::Stalemate => self.stalemates += 1,
        }
        summary.record_epoch(&outcome.log, &outcome.winner);

        let names = [self.creatures[0].name(), self.creatures[1].name()];
        let per_creature = |values: [f32; 2]| -> BTreeMap<String, f32> {
            names.iter().map(|n| n.to_string()).zip(values).collect()
        };
        let progress = EpochProgress {
            epoch,
            rewards: per_creature([outcome.rewards[0].total, outcome.rewards[1].total]),
            wins: names.iter().map(|n| n.to_string()).zip(self.wins).collect(),
            stalemates: self.stalemates,
            winner: outcome.winner.name().map(str::to_string),
            epsilons: per_creature(epsilons),
            baselines: per_creature([self.learners[0].baseline(), self.learners[1].baseline()]),
        };
        self.sink.epoch_completed(&progress)?;

        tracing::debug!(
            "Epoch {}: winner {:?}, loss {:.4} / {:.4}",
            epoch,
            outcome.winner,
            self.last_updates[0].loss,
            self.last_updates[1].loss
        );

        self.next_epoch += 1;
        Ok(EpochRecord {
            epoch,
            log: outcome.log,
            rewards: outcome.rewards,
            wins: self.wins,
            winner: outcome.winner,
        })
    }

    /// Run the configured epoch batch and return its summary
    pub fn run(&mut self) -> Result<TrainingSummary> {
        if self.training.resume {
            self.resume()?;
        }

        let start = self.next_epoch;
        let mut summary = TrainingSummary::new([self.creatures[0].name(), self.creatures[1].name()]);
        let mut pending = Vec::new();
        tracing::info!(
            "Training {} vs {} for {} epochs from epoch {}",
            self.creatures[0].name(),
            self.creatures[1].name(),
            self.training.epochs,
            start
        );

        for _ in 0..self.training.epochs {
            pending.push(self.run_epoch(&mut summary)?);
            if pending.len() as u64 >= self.training.log_flush_interval {
                self.sink.write_batch(&pending)?;
                pending.clear();
                tracing::info!(
                    "Epoch {}: wins {} / {}, stalemates {}",
                    self.next_epoch - 1,
                    self.wins[0],
                    self.wins[1],
                    self.stalemates
                );
            }
        }
        if !pending.is_empty() {
            self.sink.write_batch(&pending)?;
        }

        self.save_checkpoints()?;
        summary.total_epochs = self.next_epoch;
        self.sink.write_summary(&summary)?;
        Ok(summary)
    }

    /// Persist both creatures with the next epoch to run
    pub fn save_checkpoints(&mut self) -> Result<()> {
        for slot in 0..2 {
            let checkpoint = Checkpoint {
                parameters: self.creatures[slot].policy().export_parameters()?,
                optimizer: Some(self.learners[slot].export_optimizer()?),
                epoch: self.next_epoch,
                activation_history: self.activation_history[slot].clone(),
            };
            self.store.save(self.creatures[slot].name(), &checkpoint)?;
            tracing::info!(
                "Saved checkpoint for {} (next epoch {})",
                self.creatures[slot].name(),
                self.next_epoch
            );
        }
        Ok(())
    }
}
