//! Combat actions
//!
//! The policy output index maps onto the action ordinal:
//! attack, defend, recover, then one slot per special ability.

use serde::{Deserialize, Serialize};

use crate::core::types::{Reward, BASE_ACTION_COUNT};

/// An action a creature can take on its turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombatAction {
    Attack,
    Defend,
    Recover,
    /// Special ability, by slot in the creature's ability list
    Special(usize),
}

impl CombatAction {
    /// Ordinal of this action in the policy output
    pub fn index(&self) -> usize {
        match self {
            CombatAction::Attack => 0,
            CombatAction::Defend => 1,
            CombatAction::Recover => 2,
            CombatAction::Special(slot) => BASE_ACTION_COUNT + slot,
        }
    }

    /// Map a policy output index back onto an action
    ///
    /// Returns None when the index is past the creature's last special.
    pub fn from_index(index: usize, special_count: usize) -> Option<Self> {
        match index {
            0 => Some(CombatAction::Attack),
            1 => Some(CombatAction::Defend),
            2 => Some(CombatAction::Recover),
            i if i - BASE_ACTION_COUNT < special_count => {
                Some(CombatAction::Special(i - BASE_ACTION_COUNT))
            }
            _ => None,
        }
    }
}

/// How an action resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionEffect {
    /// The action did what it says
    Applied,
    /// Recover at full energy: nothing changed, penalty reward
    Wasted,
    /// Special without enough energy: nothing changed, zero reward
    Insufficient,
}

/// Reward and resolution of one executed action
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionResult {
    pub reward: Reward,
    pub effect: ActionEffect,
}

impl ActionResult {
    pub fn applied(reward: Reward) -> Self {
        Self {
            reward,
            effect: ActionEffect::Applied,
        }
    }
}

impl ActionEffect {
    /// Signed step reward for an action whose configured reward is `configured`
    pub fn shaped_reward(&self, configured: Reward) -> Reward {
        match self {
            ActionEffect::Applied => configured,
            ActionEffect::Wasted => -configured,
            ActionEffect::Insufficient => 0.0,
        }
    }
}
