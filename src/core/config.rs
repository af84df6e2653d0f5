//! Arena configuration with documented defaults
//!
//! One explicit configuration object is loaded from TOML at startup and passed
//! by reference into creature construction, the battle simulator and the
//! training session. Nothing here is global.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::combat::ability::AbilityRegistry;
use crate::combat::constants::{
    ATTACK_DAMAGE, ENERGY_REGEN_BASE, ENERGY_REGEN_RECOVER, POISON_DAMAGE,
};
use crate::combat::creature::CreatureSpec;
use crate::core::error::{ArenaError, Result};
use crate::core::types::{Reward, Tick};

/// Numeric rules of the combat resolver
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatRules {
    /// Damage dealt by a plain attack (halved, rounded up, against a defender)
    pub attack_damage: u32,
    /// Energy regained by attack and defend
    pub energy_regen_base: u32,
    /// Energy regained by recover
    pub energy_regen_recover: u32,
    /// Damage dealt by poison each status tick
    pub poison_damage: u32,
    /// Tick budget per battle before it ends in a stalemate
    pub max_ticks: Tick,
}

impl Default for CombatRules {
    fn default() -> Self {
        Self {
            attack_damage: ATTACK_DAMAGE,
            energy_regen_base: ENERGY_REGEN_BASE,
            energy_regen_recover: ENERGY_REGEN_RECOVER,
            poison_damage: POISON_DAMAGE,
            max_ticks: 100,
        }
    }
}

/// Global default rewards, keyed by action or outcome name
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardDefaults {
    pub attack: Reward,
    pub defend: Reward,
    pub recover: Reward,
    pub win: Reward,
    pub lose: Reward,
}

impl Default for RewardDefaults {
    fn default() -> Self {
        Self {
            attack: 0.01,
            defend: 0.01,
            recover: 0.01,
            win: 10.0,
            lose: -10.0,
        }
    }
}

impl RewardDefaults {
    /// Look up a default reward by name
    pub fn get(&self, name: &str) -> Option<Reward> {
        match name {
            "attack" => Some(self.attack),
            "defend" => Some(self.defend),
            "recover" => Some(self.recover),
            "win" => Some(self.win),
            "lose" => Some(self.lose),
            _ => None,
        }
    }
}

/// Per-creature learning hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerParams {
    /// Starting exploration rate
    pub epsilon: f32,
    /// Exploration floor
    pub eps_min: f32,
    /// Multiplicative decay applied to epsilon at the start of every epoch
    pub eps_decay_rate: f32,
    /// Rate of the exponential moving average reward baseline
    pub alpha_baseline: f32,
    /// Weight of the entropy bonus in the policy-gradient loss
    pub entropy_beta: f32,
    pub learning_rate: f64,
    /// Widths of the hidden layers of the policy network
    pub hidden_sizes: Vec<usize>,
}

impl Default for LearnerParams {
    fn default() -> Self {
        Self {
            epsilon: 0.3,
            eps_min: 0.05,
            eps_decay_rate: 0.99,
            alpha_baseline: 0.05,
            entropy_beta: 0.001,
            learning_rate: 0.001,
            hidden_sizes: vec![64, 32, 16],
        }
    }
}

/// Optional per-creature overrides of [`LearnerParams`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerOverrides {
    pub epsilon: Option<f32>,
    pub eps_min: Option<f32>,
    pub eps_decay_rate: Option<f32>,
    pub alpha_baseline: Option<f32>,
    pub entropy_beta: Option<f32>,
    pub learning_rate: Option<f64>,
    pub hidden_sizes: Option<Vec<usize>>,
}

impl LearnerParams {
    /// Apply a creature's overrides on top of these defaults
    pub fn with_overrides(&self, overrides: &LearnerOverrides) -> LearnerParams {
        LearnerParams {
            epsilon: overrides.epsilon.unwrap_or(self.epsilon),
            eps_min: overrides.eps_min.unwrap_or(self.eps_min),
            eps_decay_rate: overrides.eps_decay_rate.unwrap_or(self.eps_decay_rate),
            alpha_baseline: overrides.alpha_baseline.unwrap_or(self.alpha_baseline),
            entropy_beta: overrides.entropy_beta.unwrap_or(self.entropy_beta),
            learning_rate: overrides.learning_rate.unwrap_or(self.learning_rate),
            hidden_sizes: overrides
                .hidden_sizes
                .clone()
                .unwrap_or_else(|| self.hidden_sizes.clone()),
        }
    }

    fn validate(&self, owner: &str) -> std::result::Result<(), String> {
        let unit = |name: &str, value: f32| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(format!("{owner}: {name} ({value}) must be within [0, 1]"))
            }
        };
        unit("epsilon", self.epsilon)?;
        unit("eps_min", self.eps_min)?;
        unit("eps_decay_rate", self.eps_decay_rate)?;
        unit("alpha_baseline", self.alpha_baseline)?;

        if self.eps_min > self.epsilon {
            return Err(format!(
                "{owner}: eps_min ({}) should be <= epsilon ({})",
                self.eps_min, self.epsilon
            ));
        }
        if self.entropy_beta < 0.0 {
            return Err(format!("{owner}: entropy_beta must not be negative"));
        }
        if self.learning_rate <= 0.0 {
            return Err(format!("{owner}: learning_rate must be positive"));
        }
        if self.hidden_sizes.iter().any(|&h| h == 0) {
            return Err(format!("{owner}: hidden layer widths must be positive"));
        }
        Ok(())
    }
}

/// Training loop and collaborator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Number of epochs run by one training session (the epoch batch)
    pub epochs: u64,
    /// Flush batched battle logs every this many epochs
    pub log_flush_interval: u64,
    pub seed: u64,
    /// Resume parameters and optimizer state from the checkpoint store
    pub resume: bool,
    /// Abort instead of reinitialising when a checkpoint lacks optimizer state
    pub require_optimizer_state: bool,
    pub checkpoint_dir: PathBuf,
    pub log_dir: PathBuf,
    pub write_battle_logs: bool,
    pub write_summary: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 100,
            log_flush_interval: 50,
            seed: 43,
            resume: true,
            require_optimizer_state: false,
            checkpoint_dir: PathBuf::from("checkpoints"),
            log_dir: PathBuf::from("battle_logs"),
            write_battle_logs: true,
            write_summary: true,
        }
    }
}

/// Complete arena configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    pub combat: CombatRules,
    pub rewards: RewardDefaults,
    pub learner: LearnerParams,
    pub training: TrainingConfig,
    pub abilities: AbilityRegistry,
    pub creatures: BTreeMap<String, CreatureSpec>,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        let mut creatures = BTreeMap::new();
        creatures.insert("A".to_string(), CreatureSpec::default());
        creatures.insert("B".to_string(), CreatureSpec::default());

        Self {
            combat: CombatRules::default(),
            rewards: RewardDefaults::default(),
            learner: LearnerParams::default(),
            training: TrainingConfig::default(),
            abilities: AbilityRegistry::default(),
            creatures,
        }
    }
}

impl ArenaConfig {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        tracing::debug!(
            "Loaded arena config from {} ({} creatures, {} abilities)",
            path.display(),
            config.creatures.len(),
            config.abilities.len()
        );
        Ok(config)
    }

    /// Parse and validate a configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: ArenaConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Look up a creature's base definition
    pub fn creature_spec(&self, name: &str) -> Result<&CreatureSpec> {
        self.creatures
            .get(name)
            .ok_or_else(|| ArenaError::UnknownCreature(name.to_string()))
    }

    /// Resolved learning hyperparameters for a creature
    pub fn learner_params(&self, name: &str) -> Result<LearnerParams> {
        let spec = self.creature_spec(name)?;
        Ok(self.learner.with_overrides(&spec.learner))
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(ArenaError::InvalidConfig(msg));

        if self.combat.max_ticks == 0 {
            return invalid("combat.max_ticks must be positive".into());
        }
        if self.training.epochs == 0 {
            return invalid("training.epochs must be positive".into());
        }
        if self.training.log_flush_interval == 0 {
            return invalid("training.log_flush_interval must be positive".into());
        }

        self.abilities.validate()?;
        self.learner
            .validate("learner")
            .or_else(|msg| invalid(msg))?;

        for (name, spec) in &self.creatures {
            if spec.max_hp == 0 {
                return invalid(format!("creature {name}: max_hp must be positive"));
            }
            if spec.hp > spec.max_hp {
                return invalid(format!(
                    "creature {name}: hp ({}) exceeds max_hp ({})",
                    spec.hp, spec.max_hp
                ));
            }
            if spec.energy > spec.max_energy {
                return invalid(format!(
                    "creature {name}: energy ({}) exceeds max_energy ({})",
                    spec.energy, spec.max_energy
                ));
            }
            for ability in &spec.special_abilities {
                if self.abilities.get(ability).is_none() {
                    return Err(ArenaError::UnknownAbility {
                        creature: name.clone(),
                        ability: ability.clone(),
                    });
                }
            }
            self.learner
                .with_overrides(&spec.learner)
                .validate(&format!("creature {name}"))
                .or_else(|msg| invalid(msg))?;
        }

        Ok(())
    }
}
