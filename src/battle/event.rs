//! Battle trajectory events
//!
//! One event per creature action, or per status/termination marker. Events
//! are append-only; the resolver adds the terminal reward to a creature's
//! last event after the battle is decided.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::combat::action::ActionEffect;
use crate::combat::status::{StatusMap, StatusMarker};
use crate::core::types::{Epoch, Reward, StateVector, Tick};

/// What happened in an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventAction {
    /// The creature chose and executed an action
    Chosen { name: String, index: usize },
    /// A status or termination marker; carries no action index
    Marker(StatusMarker),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleEvent {
    pub epoch: Epoch,
    pub tick: Tick,
    pub creature: String,
    /// Observation at the instant of the event
    pub state: StateVector,
    pub action: EventAction,
    /// Action distribution at that instant; zeros for markers
    pub probs: Vec<f32>,
    pub hp: u32,
    pub energy: u32,
    pub statuses: StatusMap,
    /// Reward returned by the action handler
    pub step_reward: Reward,
    /// Cumulative episode reward, set on the creature's final event only
    pub terminal_reward: Reward,
    /// How the chosen action resolved; None for markers
    pub effect: Option<ActionEffect>,
}

impl BattleEvent {
    pub fn reward(&self) -> Reward {
        self.step_reward + self.terminal_reward
    }

    /// Index of the chosen action, None for marker events
    pub fn action_index(&self) -> Option<usize> {
        match &self.action {
            EventAction::Chosen { index, .. } => Some(*index),
            EventAction::Marker(_) => None,
        }
    }

    /// Action index with -1 standing in for marker events
    pub fn raw_action_index(&self) -> i64 {
        self.action_index().map_or(-1, |i| i as i64)
    }

    pub fn action_name(&self) -> Option<&str> {
        match &self.action {
            EventAction::Chosen { name, .. } => Some(name),
            EventAction::Marker(_) => None,
        }
    }

    pub fn marker(&self) -> Option<StatusMarker> {
        match self.action {
            EventAction::Marker(marker) => Some(marker),
            EventAction::Chosen { .. } => None,
        }
    }

    /// Action name, or the marker label such as `*STUNNED*`
    pub fn label(&self) -> &str {
        match &self.action {
            EventAction::Chosen { name, .. } => name,
            EventAction::Marker(marker) => marker.label(),
        }
    }
}

impl fmt::Display for BattleEvent {
    /// `tick | creature | action probs hp | energy | reward | statuses`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let probs: Vec<String> = self.probs.iter().map(|p| format!("{p:.2}")).collect();
        write!(
            f,
            "{:3} | {} | {:10} [{}] {:3} | {:3} | {:5.2} | {}",
            self.tick,
            self.creature,
            self.label(),
            probs.join(", "),
            self.hp,
            self.energy,
            self.reward(),
            self.statuses
        )
    }
}

/// Ordered event log of one battle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BattleLog {
    events: Vec<BattleEvent>,
}

impl BattleLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event and return its position
    pub fn push(&mut self, event: BattleEvent) -> usize {
        self.events.push(event);
        self.events.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&BattleEvent> {
        self.events.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut BattleEvent> {
        self.events.get_mut(index)
    }

    pub fn events(&self) -> &[BattleEvent] {
        &self.events
    }

    pub fn iter(&self) -> impl Iterator<Item = &BattleEvent> {
        self.events.iter()
    }

    /// Events belonging to one creature, in order
    pub fn for_creature<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a BattleEvent> {
        self.events.iter().filter(move |e| e.creature == name)
    }

    pub fn last(&self) -> Option<&BattleEvent> {
        self.events.last()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(action: EventAction) -> BattleEvent {
        BattleEvent {
            epoch: 1,
            tick: 4,
            creature: "A".into(),
            state: [100.0, 90.0, 80.0, 70.0],
            action,
            probs: vec![0.5, 0.25, 0.25],
            hp: 100,
            energy: 90,
            statuses: StatusMap::new(),
            step_reward: 0.01,
            terminal_reward: 0.0,
            effect: Some(ActionEffect::Applied),
        }
    }

    #[test]
    fn test_marker_has_no_index() {
        let e = event(EventAction::Marker(StatusMarker::Stunned));
        assert_eq!(e.action_index(), None);
        assert_eq!(e.raw_action_index(), -1);
        assert_eq!(e.label(), "*STUNNED*");
    }

    #[test]
    fn test_chosen_index_and_reward() {
        let mut e = event(EventAction::Chosen {
            name: "attack".into(),
            index: 0,
        });
        e.terminal_reward = 10.0;
        assert_eq!(e.action_index(), Some(0));
        assert_eq!(e.action_name(), Some("attack"));
        assert!((e.reward() - 10.01).abs() < 1e-6);
    }

    #[test]
    fn test_display_layout() {
        let e = event(EventAction::Chosen {
            name: "attack".into(),
            index: 0,
        });
        assert_eq!(
            e.to_string(),
            "  4 | A | attack     [0.50, 0.25, 0.25] 100 |  90 |  0.01 | {}"
        );
    }

    #[test]
    fn test_for_creature_filters() {
        let mut log = BattleLog::new();
        log.push(event(EventAction::Marker(StatusMarker::Stunned)));
        let mut other = event(EventAction::Marker(StatusMarker::Knockout));
        other.creature = "B".into();
        let index = log.push(other);
        assert_eq!(index, 1);
        assert_eq!(log.for_creature("A").count(), 1);
        assert_eq!(log.for_creature("B").count(), 1);
    }
}
