//! Special abilities
//!
//! The registry is read-only during battles. Effects are pure functions of
//! the caster and target runtime state that return the target's new statuses.

use serde::{Deserialize, Serialize};

use crate::combat::constants::{
    DEFAULT_SPECIAL_REWARD, POISON_ENERGY_COST, POISON_TURNS, STUN_ENERGY_COST, STUN_TURNS,
};
use crate::combat::creature::RuntimeState;
use crate::combat::status::{StatusKind, StatusMap};
use crate::core::error::{ArenaError, Result};
use crate::core::types::Reward;

/// What an ability does to its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AbilityEffect {
    /// Poison the target for `turns`, unconditionally
    Poison { turns: u32 },
    /// Stun the target for `turns` unless it is actively defending
    Stun { turns: u32 },
}

impl AbilityEffect {
    /// Compute the target's statuses after the effect resolves
    pub fn apply(&self, _caster: &RuntimeState, target: &RuntimeState) -> StatusMap {
        let mut statuses = target.statuses.clone();
        match *self {
            AbilityEffect::Poison { turns } => statuses.set(StatusKind::Poison, turns),
            AbilityEffect::Stun { turns } => {
                if !target.statuses.is_active(StatusKind::Defend) {
                    statuses.set(StatusKind::Stun, turns);
                }
            }
        }
        statuses
    }
}

fn default_reward() -> Reward {
    DEFAULT_SPECIAL_REWARD
}

/// A registered special ability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityDef {
    pub name: String,
    pub energy_cost: u32,
    /// Reward used when the casting creature configures none
    #[serde(default = "default_reward")]
    pub reward: Reward,
    pub effect: AbilityEffect,
}

impl AbilityDef {
    pub fn poison() -> Self {
        Self {
            name: "poison".to_string(),
            energy_cost: POISON_ENERGY_COST,
            reward: DEFAULT_SPECIAL_REWARD,
            effect: AbilityEffect::Poison { turns: POISON_TURNS },
        }
    }

    pub fn stun() -> Self {
        Self {
            name: "stun".to_string(),
            energy_cost: STUN_ENERGY_COST,
            reward: DEFAULT_SPECIAL_REWARD,
            effect: AbilityEffect::Stun { turns: STUN_TURNS },
        }
    }
}

/// Table of abilities available to creatures, looked up by name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AbilityRegistry {
    abilities: Vec<AbilityDef>,
}

impl Default for AbilityRegistry {
    fn default() -> Self {
        Self::new(vec![AbilityDef::poison(), AbilityDef::stun()])
    }
}

impl AbilityRegistry {
    pub fn new(abilities: Vec<AbilityDef>) -> Self {
        Self { abilities }
    }

    pub fn get(&self, name: &str) -> Option<&AbilityDef> {
        self.abilities.iter().find(|a| a.name == name)
    }

    /// Resolve an ability a creature asked for; unknown names are a config error
    pub fn resolve(&self, creature: &str, name: &str) -> Result<AbilityDef> {
        self.get(name)
            .cloned()
            .ok_or_else(|| ArenaError::UnknownAbility {
                creature: creature.to_string(),
                ability: name.to_string(),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &AbilityDef> {
        self.abilities.iter()
    }

    pub fn len(&self) -> usize {
        self.abilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.abilities.is_empty()
    }

    /// Names must be unique and non-empty
    pub fn validate(&self) -> Result<()> {
        for (i, ability) in self.abilities.iter().enumerate() {
            if ability.name.trim().is_empty() {
                return Err(ArenaError::InvalidConfig("ability with empty name".into()));
            }
            if self.abilities[..i].iter().any(|a| a.name == ability.name) {
                return Err(ArenaError::InvalidConfig(format!(
                    "duplicate ability: {}",
                    ability.name
                )));
            }
        }
        Ok(())
    }
}
