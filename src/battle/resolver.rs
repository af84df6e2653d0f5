//! Combat resolver
//!
//! Runs one battle between two creatures:
//! Init -> TurnLoop -> (Knockout | Stalemate) -> Finalized
//!
//! Each tick: knockout check -> turn order -> per creature (statuses ->
//! stun check -> select -> execute -> knockout check).

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::battle::event::{BattleEvent, BattleLog, EventAction};
use crate::combat::action::ActionResult;
use crate::combat::creature::{Creature, RuntimeState};
use crate::combat::status::{StatusKind, StatusMarker};
use crate::core::config::ArenaConfig;
use crate::core::error::{ArenaError, Result};
use crate::core::types::{Epoch, Reward, StateVector, Tick};
use crate::policy::selection::ActionSelector;

/// Battle state machine phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BattlePhase {
    Init,
    TurnLoop,
    Knockout,
    Stalemate,
    Finalized,
}

/// Who won a battle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    Creature(String),
    Stalemate,
}

impl Winner {
    pub fn name(&self) -> Option<&str> {
        match self {
            Winner::Creature(name) => Some(name),
            Winner::Stalemate => None,
        }
    }

    pub fn is_stalemate(&self) -> bool {
        matches!(self, Winner::Stalemate)
    }
}

/// Cumulative episode reward of one creature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatureReward {
    pub creature: String,
    pub total: Reward,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleOutcome {
    /// Episode rewards, first creature then second
    pub rewards: [CreatureReward; 2],
    pub log: BattleLog,
    pub winner: Winner,
    /// Number of ticks started
    pub ticks: Tick,
    /// Phase trail of the state machine
    pub phases: Vec<BattlePhase>,
}

impl BattleOutcome {
    pub fn reward_for(&self, creature: &str) -> Option<Reward> {
        self.rewards
            .iter()
            .find(|r| r.creature == creature)
            .map(|r| r.total)
    }
}

/// Log writer that remembers each creature's most recent event
struct Recorder {
    epoch: Epoch,
    log: BattleLog,
    last_event: [Option<usize>; 2],
}

impl Recorder {
    fn new(epoch: Epoch) -> Self {
        Self {
            epoch,
            log: BattleLog::new(),
            last_event: [None, None],
        }
    }

    fn push(&mut self, slot: usize, event: BattleEvent) {
        let index = self.log.push(event);
        self.last_event[slot] = Some(index);
    }

    #[allow(clippy::too_many_arguments)]
    fn chosen(
        &mut self,
        slot: usize,
        tick: Tick,
        actor: &Creature,
        state: StateVector,
        index: usize,
        probs: Vec<f32>,
        result: ActionResult,
        name: &str,
    ) {
        self.push(
            slot,
            BattleEvent {
                epoch: self.epoch,
                tick,
                creature: actor.name().to_string(),
                state,
                action: EventAction::Chosen {
                    name: name.to_string(),
                    index,
                },
                probs,
                hp: actor.hp(),
                energy: actor.energy(),
                statuses: actor.statuses().clone(),
                step_reward: result.reward,
                terminal_reward: 0.0,
                effect: Some(result.effect),
            },
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn marker(
        &mut self,
        slot: usize,
        tick: Tick,
        name: &str,
        snapshot: &RuntimeState,
        opponent: &Creature,
        width: usize,
        marker: StatusMarker,
    ) {
        self.push(
            slot,
            BattleEvent {
                epoch: self.epoch,
                tick,
                creature: name.to_string(),
                state: [
                    snapshot.hp as f32,
                    snapshot.energy as f32,
                    opponent.hp() as f32,
                    opponent.energy() as f32,
                ],
                action: EventAction::Marker(marker),
                probs: vec![0.0; width],
                hp: snapshot.hp,
                energy: snapshot.energy,
                statuses: snapshot.statuses.clone(),
                step_reward: 0.0,
                terminal_reward: 0.0,
                effect: None,
            },
        );
    }

    fn creature_marker(
        &mut self,
        slot: usize,
        tick: Tick,
        creature: &Creature,
        opponent: &Creature,
        marker: StatusMarker,
    ) {
        self.marker(
            slot,
            tick,
            creature.name(),
            &creature.runtime_state(),
            opponent,
            creature.action_count(),
            marker,
        );
    }

    /// Knockout marker; a knockout for a living creature is an invariant violation
    fn knockout(
        &mut self,
        slot: usize,
        tick: Tick,
        creature: &Creature,
        opponent: &Creature,
    ) -> Result<()> {
        if creature.is_alive() {
            return Err(ArenaError::KnockoutMismatch {
                creature: creature.name().to_string(),
                hp: creature.hp(),
            });
        }
        self.creature_marker(slot, tick, creature, opponent, StatusMarker::Knockout);
        Ok(())
    }
}

/// Borrow (actor, opponent) for slot 0 (first creature) or 1 (second)
fn pair_mut<'c>(
    slot: usize,
    a: &'c mut Creature,
    b: &'c mut Creature,
) -> (&'c mut Creature, &'c mut Creature) {
    if slot == 0 {
        (a, b)
    } else {
        (b, a)
    }
}

/// Speed descending; a tie is a fresh coin flip every tick
pub fn turn_order<R: Rng + ?Sized>(a: &Creature, b: &Creature, rng: &mut R) -> [usize; 2] {
    if a.speed() > b.speed() {
        [0, 1]
    } else if b.speed() > a.speed() {
        [1, 0]
    } else if rng.gen_bool(0.5) {
        [0, 1]
    } else {
        [1, 0]
    }
}

enum TickResult {
    Continue,
    Knockout,
}

/// Runs complete battles under one set of combat rules
#[derive(Debug, Clone, Copy)]
pub struct BattleSimulator {
    max_ticks: Tick,
}

impl BattleSimulator {
    pub fn new(max_ticks: Tick) -> Self {
        Self { max_ticks }
    }

    pub fn from_config(config: &ArenaConfig) -> Self {
        Self::new(config.combat.max_ticks)
    }

    pub fn max_ticks(&self) -> Tick {
        self.max_ticks
    }

    /// Run one battle to completion
    ///
    /// `epsilons` are the exploration rates of `a` and `b`. Both creatures
    /// are reset first; their policies are only read.
    pub fn run<R: Rng>(
        &self,
        a: &mut Creature,
        b: &mut Creature,
        epoch: Epoch,
        epsilons: [f32; 2],
        selector: &mut dyn ActionSelector,
        rng: &mut R,
    ) -> Result<BattleOutcome> {
        if a.name() == b.name() {
            return Err(ArenaError::InvalidConfig(format!(
                "both combatants are named {}",
                a.name()
            )));
        }

        let mut phases = vec![BattlePhase::Init];
        a.reset();
        b.reset();
        tracing::debug!("Epoch {}: battle {} vs {} started", epoch, a.name(), b.name());

        phases.push(BattlePhase::TurnLoop);
        let mut recorder = Recorder::new(epoch);
        let mut rewards: [Reward; 2] = [0.0, 0.0];
        let mut ticks = 0;
        let mut knocked_out = false;

        for tick in 0..self.max_ticks {
            ticks = tick + 1;

            // Knockouts left over from a previous tick
            if !a.is_alive() || !b.is_alive() {
                for slot in 0..2 {
                    let (creature, opponent) = pair_mut(slot, a, b);
                    if !creature.is_alive() {
                        recorder.knockout(slot, tick, creature, opponent)?;
                    }
                }
                knocked_out = true;
                break;
            }

            let order = turn_order(a, b, rng);
            let result = self.run_tick(
                tick,
                order,
                a,
                b,
                epsilons,
                selector,
                rng,
                &mut recorder,
                &mut rewards,
            )?;
            if let TickResult::Knockout = result {
                knocked_out = true;
                break;
            }
        }

        let winner = if knocked_out {
            phases.push(BattlePhase::Knockout);
            self.finalize_knockout(a, b, &mut recorder, &mut rewards)
        } else {
            phases.push(BattlePhase::Stalemate);
            let tick = self.max_ticks.saturating_sub(1);
            recorder.creature_marker(0, tick, a, b, StatusMarker::Stalemate);
            recorder.creature_marker(1, tick, b, a, StatusMarker::Stalemate);
            Winner::Stalemate
        };
        phases.push(BattlePhase::Finalized);

        tracing::debug!(
            "Epoch {}: battle finished after {} ticks, winner {:?}, rewards {:.2} / {:.2}",
            epoch,
            ticks,
            winner,
            rewards[0],
            rewards[1]
        );

        Ok(BattleOutcome {
            rewards: [
                CreatureReward {
                    creature: a.name().to_string(),
                    total: rewards[0],
                },
                CreatureReward {
                    creature: b.name().to_string(),
                    total: rewards[1],
                },
            ],
            log: recorder.log,
            winner,
            ticks,
            phases,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn run_tick<R: Rng>(
        &self,
        tick: Tick,
        order: [usize; 2],
        a: &mut Creature,
        b: &mut Creature,
        epsilons: [f32; 2],
        selector: &mut dyn ActionSelector,
        rng: &mut R,
        recorder: &mut Recorder,
        rewards: &mut [Reward; 2],
    ) -> Result<TickResult> {
        for slot in order {
            let (actor, opponent) = pair_mut(slot, a, b);
            if !actor.is_alive() || !opponent.is_alive() {
                continue;
            }

            let mut markers = Vec::new();
            actor.process_statuses(|marker, snapshot| markers.push((marker, snapshot.clone())));
            for (marker, snapshot) in &markers {
                recorder.marker(
                    slot,
                    tick,
                    actor.name(),
                    snapshot,
                    opponent,
                    actor.action_count(),
                    *marker,
                );
            }
            if !actor.is_alive() {
                recorder.knockout(slot, tick, actor, opponent)?;
                return Ok(TickResult::Knockout);
            }

            if actor.has_status(StatusKind::Stun) {
                recorder.creature_marker(slot, tick, actor, opponent, StatusMarker::Stunned);
                continue;
            }

            let state = actor.state_vector(opponent);
            let choice = selector.select(actor, &state, epsilons[slot], &mut *rng)?;
            let action = actor.action_at(choice.index).ok_or_else(|| {
                ArenaError::InvalidConfig(format!(
                    "action index {} out of range for {} ({} actions)",
                    choice.index,
                    actor.name(),
                    actor.action_count()
                ))
            })?;
            let name = actor.action_name(action).to_string();

            let result = actor.execute(action, opponent);
            rewards[slot] += result.reward;
            recorder.chosen(slot, tick, actor, state, choice.index, choice.probs, result, &name);

            if !opponent.is_alive() {
                recorder.knockout(1 - slot, tick, opponent, actor)?;
                return Ok(TickResult::Knockout);
            }
        }
        Ok(TickResult::Continue)
    }

    /// Apply win/lose rewards and patch each creature's last event
    fn finalize_knockout(
        &self,
        a: &Creature,
        b: &Creature,
        recorder: &mut Recorder,
        rewards: &mut [Reward; 2],
    ) -> Winner {
        let winner_slot = match a.hp().cmp(&b.hp()) {
            std::cmp::Ordering::Greater => Some(0),
            std::cmp::Ordering::Less => Some(1),
            std::cmp::Ordering::Equal => None,
        };
        let Some(winner_slot) = winner_slot else {
            return Winner::Stalemate;
        };

        let creatures = [a, b];
        for slot in 0..2 {
            rewards[slot] += creatures[slot].outcome_reward(slot == winner_slot);
            if let Some(index) = recorder.last_event[slot] {
                if let Some(event) = recorder.log.get_mut(index) {
                    event.terminal_reward += rewards[slot];
                }
            }
        }
        Winner::Creature(creatures[winner_slot].name().to_string())
    }
}
