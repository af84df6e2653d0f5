//! Per-epoch records and end-of-batch training summary

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::battle::event::{BattleEvent, BattleLog, EventAction};
use crate::battle::resolver::{CreatureReward, Winner};
use crate::combat::status::StatusMarker;
use crate::core::types::Epoch;

const RULE: &str = "---------------------------------------------------------------";

/// One epoch as handed to the log sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: Epoch,
    pub log: BattleLog,
    pub rewards: [CreatureReward; 2],
    /// Cumulative win counts after this epoch, same order as `rewards`
    pub wins: [u64; 2],
    pub winner: Winner,
}

/// Streamed once per completed epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochProgress {
    pub epoch: Epoch,
    pub rewards: BTreeMap<String, f32>,
    pub wins: BTreeMap<String, u64>,
    pub stalemates: u64,
    /// Winner name, None for a stalemate
    pub winner: Option<String>,
    pub epsilons: BTreeMap<String, f32>,
    pub baselines: BTreeMap<String, f32>,
}

/// Counts of actions and markers for one creature
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionTally {
    pub attack: u64,
    pub defend: u64,
    pub recover: u64,
    /// Special ability uses keyed by ability name
    pub specials: BTreeMap<String, u64>,
    pub knockout: u64,
    pub stunned: u64,
    pub poisoned: u64,
    pub stalemate: u64,
}

impl ActionTally {
    pub fn record(&mut self, event: &BattleEvent) {
        match &event.action {
            EventAction::Chosen { name, .. } => match name.as_str() {
                "attack" => self.attack += 1,
                "defend" => self.defend += 1,
                "recover" => self.recover += 1,
                special => *self.specials.entry(special.to_string()).or_insert(0) += 1,
            },
            EventAction::Marker(StatusMarker::Knockout) => self.knockout += 1,
            EventAction::Marker(StatusMarker::Stunned) => self.stunned += 1,
            EventAction::Marker(StatusMarker::Poisoned) => self.poisoned += 1,
            EventAction::Marker(StatusMarker::Stalemate) => self.stalemate += 1,
        }
    }

    pub fn special(&self, name: &str) -> u64 {
        self.specials.get(name).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatureSummary {
    pub name: String,
    pub wins: u64,
    pub tally: ActionTally,
}

/// Totals over one epoch batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub creatures: Vec<CreatureSummary>,
    pub stalemates: u64,
    /// Epochs run by this batch
    pub epoch_batch_size: u64,
    /// Epoch counter after the batch, including resumed epochs
    pub total_epochs: Epoch,
}

impl TrainingSummary {
    pub fn new(names: [&str; 2]) -> Self {
        Self {
            creatures: names
                .iter()
                .map(|name| CreatureSummary {
                    name: name.to_string(),
                    wins: 0,
                    tally: ActionTally::default(),
                })
                .collect(),
            stalemates: 0,
            epoch_batch_size: 0,
            total_epochs: 0,
        }
    }

    pub fn creature(&self, name: &str) -> Option<&CreatureSummary> {
        self.creatures.iter().find(|c| c.name == name)
    }

    /// Fold one finished epoch into the totals
    pub fn record_epoch(&mut self, log: &BattleLog, winner: &Winner) {
        for event in log.iter() {
            if let Some(entry) = self.creatures.iter_mut().find(|c| c.name == event.creature) {
                entry.tally.record(event);
            }
        }
        match winner {
            Winner::Creature(name) => {
                if let Some(entry) = self.creatures.iter_mut().find(|c| &c.name == name) {
                    entry.wins += 1;
                }
            }
            Winner::Stalemate => self.stalemates += 1,
        }
        self.epoch_batch_size += 1;
    }

    /// Share of the batch won by `name`, in [0, 1]
    pub fn win_rate(&self, name: &str) -> f64 {
        match (self.creature(name), self.epoch_batch_size) {
            (Some(c), n) if n > 0 => c.wins as f64 / n as f64,
            _ => 0.0,
        }
    }
}

impl fmt::Display for TrainingSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in &self.creatures {
            writeln!(f, "{RULE}")?;
            writeln!(
                f,
                "{} | Total Wins: {} | Avg Wins: {:.0}%",
                c.name,
                c.wins,
                self.win_rate(&c.name) * 100.0
            )?;
            writeln!(f, "{RULE}")?;
            writeln!(f, "  Attack: {}", c.tally.attack)?;
            writeln!(f, "  Defend: {}", c.tally.defend)?;
            for (name, count) in &c.tally.specials {
                writeln!(f, "  {}: {}", capitalize(name), count)?;
            }
            writeln!(f, "  Recover: {}", c.tally.recover)?;
            writeln!(f, "  KO: {}", c.tally.knockout)?;
            writeln!(f, "  Stunned: {}", c.tally.stunned)?;
            writeln!(f, "  Poisoned: {}", c.tally.poisoned)?;
            writeln!(f, "  Stalemate: {}", c.tally.stalemate)?;
            writeln!(f)?;
        }
        writeln!(f, "{RULE}")?;
        writeln!(
            f,
            "Epoch Batch Size: {} | Total Epochs: {} | Stalemates: {}",
            self.epoch_batch_size, self.total_epochs, self.stalemates
        )?;
        writeln!(f, "{RULE}")
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
