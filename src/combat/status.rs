//! Status effects and battle log markers
//!
//! A status is a named counter of remaining turns. A counter never sits at
//! zero: the entry is removed the moment it decays.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Status effects a creature can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    /// Halves incoming attack damage and blocks stun
    Defend,
    /// Damage over time, dealt during status processing
    Poison,
    /// Skips the creature's action
    Stun,
}

impl StatusKind {
    pub fn name(&self) -> &'static str {
        match self {
            StatusKind::Defend => "defend",
            StatusKind::Poison => "poison",
            StatusKind::Stun => "stun",
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Owned map of active statuses to remaining turns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusMap(BTreeMap<StatusKind, u32>);

impl StatusMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self, kind: StatusKind) -> bool {
        self.0.contains_key(&kind)
    }

    pub fn remaining(&self, kind: StatusKind) -> Option<u32> {
        self.0.get(&kind).copied()
    }

    /// Set a status counter; zero turns removes the status
    pub fn set(&mut self, kind: StatusKind, turns: u32) {
        if turns == 0 {
            self.0.remove(&kind);
        } else {
            self.0.insert(kind, turns);
        }
    }

    pub fn remove(&mut self, kind: StatusKind) {
        self.0.remove(&kind);
    }

    /// Active statuses in a stable order
    pub fn kinds(&self) -> Vec<StatusKind> {
        self.0.keys().copied().collect()
    }

    /// Decrement one status counter, removing it at zero
    pub fn decay(&mut self, kind: StatusKind) {
        if let Some(turns) = self.0.get_mut(&kind) {
            *turns = turns.saturating_sub(1);
            if *turns == 0 {
                self.0.remove(&kind);
            }
        }
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (StatusKind, u32)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }
}

impl fmt::Display for StatusMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (kind, turns)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", kind, turns)?;
        }
        f.write_str("}")
    }
}

/// Zero-reward marker events written to the battle log in place of a choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusMarker {
    Knockout,
    Stunned,
    Poisoned,
    Stalemate,
}

impl StatusMarker {
    pub fn label(&self) -> &'static str {
        match self {
            StatusMarker::Knockout => "*KNOCKOUT*",
            StatusMarker::Stunned => "*STUNNED*",
            StatusMarker::Poisoned => "*POISONED*",
            StatusMarker::Stalemate => "*STALEMATE*",
        }
    }
}

impl fmt::Display for StatusMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
