//! Creatures - the two combatants of a battle
//!
//! A creature owns its vital stats, its status map, its resolved special
//! abilities and the policy network that picks its actions. It is created
//! once and reused across battles; `reset()` restores it between them.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::combat::ability::AbilityDef;
use crate::combat::action::{ActionEffect, ActionResult, CombatAction};
use crate::combat::constants::DEFEND_TURNS;
use crate::combat::status::{StatusKind, StatusMap, StatusMarker};
use crate::core::config::{ArenaConfig, CombatRules, LearnerOverrides, RewardDefaults};
use crate::core::error::{ArenaError, Result};
use crate::core::types::{Reward, StateVector, BASE_ACTION_COUNT, STATE_SIZE};
use crate::policy::network::PolicyNetwork;

/// Base definition of a creature as found in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreatureSpec {
    pub hp: u32,
    pub max_hp: u32,
    pub energy: u32,
    pub max_energy: u32,
    pub speed: u32,
    /// Ability names, resolved against the registry; order fixes action slots
    pub special_abilities: Vec<String>,
    /// Reward overrides keyed by action or outcome name
    pub reward_config: BTreeMap<String, Reward>,
    /// Opaque reference to the owning player
    pub owner: Option<String>,
    pub learner: LearnerOverrides,
}

impl Default for CreatureSpec {
    fn default() -> Self {
        Self {
            hp: 100,
            max_hp: 100,
            energy: 100,
            max_energy: 100,
            speed: 10,
            special_abilities: vec!["poison".to_string()],
            reward_config: BTreeMap::new(),
            owner: None,
            learner: LearnerOverrides::default(),
        }
    }
}

/// Mutable battle state of a creature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeState {
    pub hp: u32,
    pub energy: u32,
    pub statuses: StatusMap,
}

pub struct Creature {
    name: String,
    owner: Option<String>,
    hp: u32,
    max_hp: u32,
    energy: u32,
    max_energy: u32,
    speed: u32,
    statuses: StatusMap,
    abilities: Vec<AbilityDef>,
    actions: Vec<CombatAction>,
    reward_config: BTreeMap<String, Reward>,
    default_rewards: RewardDefaults,
    rules: CombatRules,
    policy: PolicyNetwork,
}

impl std::fmt::Debug for Creature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Creature")
            .field("name", &self.name)
            .field("hp", &self.hp)
            .field("energy", &self.energy)
            .field("speed", &self.speed)
            .field("statuses", &self.statuses)
            .field("actions", &self.actions.len())
            .finish()
    }
}

impl Creature {
    /// Build a creature around an existing policy
    ///
    /// Unknown abilities and a policy whose shape does not match the action
    /// list are configuration errors, reported here rather than mid-battle.
    pub fn new(
        name: &str,
        spec: &CreatureSpec,
        config: &ArenaConfig,
        policy: PolicyNetwork,
    ) -> Result<Self> {
        let abilities = spec
            .special_abilities
            .iter()
            .map(|ability| config.abilities.resolve(name, ability))
            .collect::<Result<Vec<_>>>()?;

        let mut actions = vec![CombatAction::Attack, CombatAction::Defend, CombatAction::Recover];
        actions.extend((0..abilities.len()).map(CombatAction::Special));

        if policy.output_size() != actions.len() {
            return Err(ArenaError::PolicyShapeMismatch {
                creature: name.to_string(),
                expected: actions.len(),
                actual: policy.output_size(),
            });
        }
        if policy.input_size() != STATE_SIZE {
            return Err(ArenaError::InvalidConfig(format!(
                "policy for {name} takes {} inputs, expected {STATE_SIZE}",
                policy.input_size()
            )));
        }

        Ok(Self {
            name: name.to_string(),
            owner: spec.owner.clone(),
            hp: spec.hp.min(spec.max_hp),
            max_hp: spec.max_hp,
            energy: spec.energy.min(spec.max_energy),
            max_energy: spec.max_energy,
            speed: spec.speed,
            statuses: StatusMap::new(),
            abilities,
            actions,
            reward_config: spec.reward_config.clone(),
            default_rewards: config.rewards,
            rules: config.combat,
            policy,
        })
    }

    /// Build a configured creature with a freshly initialised policy
    pub fn from_config(name: &str, config: &ArenaConfig, rng: &mut impl Rng) -> Result<Self> {
        let spec = config.creature_spec(name)?;
        let params = config.learner_params(name)?;
        let policy = PolicyNetwork::new(
            STATE_SIZE,
            &params.hidden_sizes,
            BASE_ACTION_COUNT + spec.special_abilities.len(),
            rng,
        )?;
        Self::new(name, spec, config, policy)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn hp(&self) -> u32 {
        self.hp
    }

    pub fn max_hp(&self) -> u32 {
        self.max_hp
    }

    pub fn energy(&self) -> u32 {
        self.energy
    }

    pub fn max_energy(&self) -> u32 {
        self.max_energy
    }

    pub fn speed(&self) -> u32 {
        self.speed
    }

    pub fn statuses(&self) -> &StatusMap {
        &self.statuses
    }

    pub fn has_status(&self, kind: StatusKind) -> bool {
        self.statuses.is_active(kind)
    }

    pub fn abilities(&self) -> &[AbilityDef] {
        &self.abilities
    }

    /// Actions in policy-output order
    pub fn actions(&self) -> &[CombatAction] {
        &self.actions
    }

    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    pub fn action_at(&self, index: usize) -> Option<CombatAction> {
        self.actions.get(index).copied()
    }

    pub fn action_name(&self, action: CombatAction) -> &str {
        match action {
            CombatAction::Attack => "attack",
            CombatAction::Defend => "defend",
            CombatAction::Recover => "recover",
            CombatAction::Special(slot) => self
                .abilities
                .get(slot)
                .map(|a| a.name.as_str())
                .unwrap_or("unknown"),
        }
    }

    pub fn reward_config(&self) -> &BTreeMap<String, Reward> {
        &self.reward_config
    }

    pub fn policy(&self) -> &PolicyNetwork {
        &self.policy
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Restore full hp and energy and clear statuses; the policy is kept
    pub fn reset(&mut self) {
        self.hp = self.max_hp;
        self.energy = self.max_energy;
        self.statuses.clear();
    }

    /// `[self.hp, self.energy, opponent.hp, opponent.energy]`
    pub fn state_vector(&self, opponent: &Creature) -> StateVector {
        [
            self.hp as f32,
            self.energy as f32,
            opponent.hp as f32,
            opponent.energy as f32,
        ]
    }

    pub fn runtime_state(&self) -> RuntimeState {
        RuntimeState {
            hp: self.hp,
            energy: self.energy,
            statuses: self.statuses.clone(),
        }
    }

    /// Restore a serialized runtime state, clamped to this creature's maxima
    pub fn restore_runtime_state(&mut self, state: &RuntimeState) {
        self.hp = state.hp.min(self.max_hp);
        self.energy = state.energy.min(self.max_energy);
        self.statuses = state.statuses.clone();
    }

    /// Reward for an action or outcome name: own config, then global defaults
    pub fn configured_reward(&self, name: &str) -> Option<Reward> {
        self.reward_config
            .get(name)
            .copied()
            .or_else(|| self.default_rewards.get(name))
    }

    /// Configured reward for a successful action
    pub fn action_reward(&self, action: CombatAction) -> Reward {
        match action {
            CombatAction::Special(slot) => {
                let ability = &self.abilities[slot];
                self.reward_config
                    .get(&ability.name)
                    .copied()
                    .unwrap_or(ability.reward)
            }
            other => self.configured_reward(self.action_name(other)).unwrap_or(0.0),
        }
    }

    /// Terminal reward for winning or losing the battle
    pub fn outcome_reward(&self, won: bool) -> Reward {
        let key = if won { "win" } else { "lose" };
        self.configured_reward(key).unwrap_or(0.0)
    }

    fn regen(&mut self, amount: u32) {
        self.energy = self.energy.saturating_add(amount).min(self.max_energy);
    }

    fn take_damage(&mut self, amount: u32) {
        self.hp = self.hp.saturating_sub(amount);
    }

    /// Dispatch an action against the opponent
    pub fn execute(&mut self, action: CombatAction, opponent: &mut Creature) -> ActionResult {
        match action {
            CombatAction::Attack => self.attack(opponent),
            CombatAction::Defend => self.defend(),
            CombatAction::Recover => self.recover(),
            CombatAction::Special(slot) => self.use_special(opponent, slot),
        }
    }

    /// Deal base damage, halved (rounded up) against a defending opponent
    pub fn attack(&mut self, opponent: &mut Creature) -> ActionResult {
        let mut damage = self.rules.attack_damage;
        if opponent.has_status(StatusKind::Defend) {
            damage = damage.div_ceil(2);
        }
        opponent.take_damage(damage);
        self.regen(self.rules.energy_regen_base);
        ActionResult::applied(self.action_reward(CombatAction::Attack))
    }

    /// Raise a guard that lasts until this creature's next status step
    pub fn defend(&mut self) -> ActionResult {
        self.statuses.set(StatusKind::Defend, DEFEND_TURNS);
        self.regen(self.rules.energy_regen_base);
        ActionResult::applied(self.action_reward(CombatAction::Defend))
    }

    /// Restore energy; at full energy the action is wasted and penalised
    pub fn recover(&mut self) -> ActionResult {
        let reward = self.action_reward(CombatAction::Recover);
        if self.energy >= self.max_energy {
            return ActionResult {
                reward: ActionEffect::Wasted.shaped_reward(reward),
                effect: ActionEffect::Wasted,
            };
        }
        self.regen(self.rules.energy_regen_recover);
        ActionResult::applied(reward)
    }

    /// Cast the special ability in `slot` if energy allows
    pub fn use_special(&mut self, opponent: &mut Creature, slot: usize) -> ActionResult {
        let Some(ability) = self.abilities.get(slot) else {
            return ActionResult {
                reward: 0.0,
                effect: ActionEffect::Insufficient,
            };
        };
        if self.energy < ability.energy_cost {
            return ActionResult {
                reward: 0.0,
                effect: ActionEffect::Insufficient,
            };
        }

        let effect = ability.effect;
        self.energy -= ability.energy_cost;
        opponent.statuses = effect.apply(&self.runtime_state(), &opponent.runtime_state());
        ActionResult::applied(self.action_reward(CombatAction::Special(slot)))
    }

    /// Apply per-tick status effects, then decay every counter once
    ///
    /// `on_marker` receives a snapshot of this creature whenever a status
    /// effect knocks it out.
    pub fn process_statuses(&mut self, mut on_marker: impl FnMut(StatusMarker, &RuntimeState)) {
        for kind in self.statuses.kinds() {
            if kind == StatusKind::Poison {
                self.take_damage(self.rules.poison_damage);
                if self.hp == 0 {
                    on_marker(StatusMarker::Poisoned, &self.runtime_state());
                }
            }
            self.statuses.decay(kind);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn pair(config: &ArenaConfig) -> (Creature, Creature) {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        (
            Creature::from_config("A", config, &mut rng).unwrap(),
            Creature::from_config("B", config, &mut rng).unwrap(),
        )
    }

    fn stun_config() -> ArenaConfig {
        let mut config = ArenaConfig::default();
        for spec in config.creatures.values_mut() {
            spec.special_abilities = vec!["poison".into(), "stun".into()];
        }
        config
    }

    #[test]
    fn test_action_list_order() {
        let config = stun_config();
        let (a, _) = pair(&config);
        assert_eq!(
            a.actions(),
            &[
                CombatAction::Attack,
                CombatAction::Defend,
                CombatAction::Recover,
                CombatAction::Special(0),
                CombatAction::Special(1),
            ]
        );
        assert_eq!(a.action_name(CombatAction::Special(1)), "stun");
        assert_eq!(a.policy().output_size(), 5);
    }

    #[test]
    fn test_attack_damage_full_and_halved() {
        let mut config = ArenaConfig::default();
        config.combat.attack_damage = 25;
        let (mut a, mut b) = pair(&config);

        a.attack(&mut b);
        assert_eq!(b.hp(), 75);

        b.defend();
        a.attack(&mut b);
        // ceil(25 / 2) = 13
        assert_eq!(b.hp(), 62);
    }

    #[test]
    fn test_attack_and_defend_regen_capped() {
        let config = ArenaConfig::default();
        let (mut a, mut b) = pair(&config);
        a.restore_runtime_state(&RuntimeState {
            hp: 100,
            energy: 95,
            statuses: StatusMap::new(),
        });
        a.attack(&mut b);
        assert_eq!(a.energy(), 100);
        a.defend();
        assert_eq!(a.energy(), 100);
        assert_eq!(a.statuses().remaining(StatusKind::Defend), Some(1));
    }

    #[test]
    fn test_recover_penalty_at_full_energy() {
        let config = ArenaConfig::default();
        let (mut a, _) = pair(&config);
        let result = a.recover();
        assert!(result.reward < 0.0);
        assert_eq!(result.effect, ActionEffect::Wasted);
        assert_eq!(a.energy(), 100);
    }

    #[test]
    fn test_recover_restores_energy() {
        let config = ArenaConfig::default();
        let (mut a, _) = pair(&config);
        a.restore_runtime_state(&RuntimeState {
            hp: 100,
            energy: 10,
            statuses: StatusMap::new(),
        });
        let result = a.recover();
        assert!(result.reward > 0.0);
        assert_eq!(a.energy(), 70);
    }

    #[test]
    fn test_special_with_insufficient_energy_changes_nothing() {
        let config = ArenaConfig::default();
        let (mut a, mut b) = pair(&config);
        a.restore_runtime_state(&RuntimeState {
            hp: 100,
            energy: 29,
            statuses: StatusMap::new(),
        });
        let before_a = a.runtime_state();
        let before_b = b.runtime_state();

        let result = a.use_special(&mut b, 0);
        assert_eq!(result.reward, 0.0);
        assert_eq!(result.effect, ActionEffect::Insufficient);
        assert_eq!(a.runtime_state(), before_a);
        assert_eq!(b.runtime_state(), before_b);
    }

    #[test]
    fn test_poison_costs_energy_and_applies() {
        let config = ArenaConfig::default();
        let (mut a, mut b) = pair(&config);
        let result = a.use_special(&mut b, 0);
        assert_eq!(result.reward, 0.01);
        assert_eq!(a.energy(), 70);
        assert_eq!(b.statuses().remaining(StatusKind::Poison), Some(3));
    }

    #[test]
    fn test_stun_blocked_by_defend() {
        let config = stun_config();
        let (mut a, mut b) = pair(&config);
        b.defend();
        a.use_special(&mut b, 1);
        assert!(!b.has_status(StatusKind::Stun));
        // Energy is still spent
        assert_eq!(a.energy(), 60);
    }

    #[test]
    fn test_reward_config_overrides_defaults() {
        let mut config = ArenaConfig::default();
        let spec = config.creatures.get_mut("A").unwrap();
        spec.reward_config.insert("attack".into(), 0.5);
        spec.reward_config.insert("poison".into(), 0.2);
        spec.reward_config.insert("win".into(), 3.0);
        let (mut a, mut b) = pair(&config);

        assert_eq!(a.attack(&mut b).reward, 0.5);
        assert_eq!(a.use_special(&mut b, 0).reward, 0.2);
        assert_eq!(a.outcome_reward(true), 3.0);
        assert_eq!(a.outcome_reward(false), -10.0);
        assert_eq!(b.configured_reward("attack"), Some(0.01));
    }

    #[test]
    fn test_poison_ticks_and_decays() {
        let config = ArenaConfig::default();
        let (mut a, mut b) = pair(&config);
        a.use_special(&mut b, 0);

        let mut markers = Vec::new();
        for _ in 0..3 {
            b.process_statuses(|marker, _| markers.push(marker));
        }
        assert_eq!(b.hp(), 85);
        assert!(!b.has_status(StatusKind::Poison));
        assert!(markers.is_empty());
    }

    #[test]
    fn test_poison_knockout_reports_marker() {
        let config = ArenaConfig::default();
        let (mut a, mut b) = pair(&config);
        a.use_special(&mut b, 0);
        b.restore_runtime_state(&RuntimeState {
            hp: 5,
            energy: 50,
            statuses: b.statuses().clone(),
        });

        let mut seen = Vec::new();
        b.process_statuses(|marker, snapshot| seen.push((marker, snapshot.hp)));
        assert_eq!(seen, vec![(StatusMarker::Poisoned, 0)]);
        assert!(!b.is_alive());
    }

    #[test]
    fn test_defend_expires_on_next_status_step() {
        let config = ArenaConfig::default();
        let (mut a, _) = pair(&config);
        a.defend();
        a.process_statuses(|_, _| {});
        assert!(!a.has_status(StatusKind::Defend));
    }

    #[test]
    fn test_reset_keeps_policy() {
        let config = ArenaConfig::default();
        let (mut a, mut b) = pair(&config);
        let logits = a.policy().logits(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        b.attack(&mut a);
        b.use_special(&mut a, 0);
        a.reset();
        assert_eq!(a.hp(), 100);
        assert_eq!(a.energy(), 100);
        assert!(a.statuses().is_empty());
        assert_eq!(a.policy().logits(&[1.0, 2.0, 3.0, 4.0]).unwrap(), logits);
    }

    #[test]
    fn test_runtime_state_round_trip() {
        let config = ArenaConfig::default();
        let (mut a, mut b) = pair(&config);
        a.use_special(&mut b, 0);
        a.attack(&mut b);

        let json = serde_json::to_string(&b.runtime_state()).unwrap();
        let restored: RuntimeState = serde_json::from_str(&json).unwrap();

        let (_, mut clone) = pair(&config);
        clone.restore_runtime_state(&restored);
        assert_eq!(clone.is_alive(), b.is_alive());

        b.process_statuses(|_, _| {});
        clone.process_statuses(|_, _| {});
        assert_eq!(clone.runtime_state(), b.runtime_state());
    }

    #[test]
    fn test_policy_width_mismatch_rejected() {
        let config = ArenaConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let policy = PolicyNetwork::new(STATE_SIZE, &[4], 7, &mut rng).unwrap();
        let result = Creature::new("A", config.creature_spec("A").unwrap(), &config, policy);
        assert!(matches!(
            result,
            Err(ArenaError::PolicyShapeMismatch { expected: 4, actual: 7, .. })
        ));
    }

    #[test]
    fn test_unknown_ability_rejected_at_construction() {
        let config = ArenaConfig::default();
        let mut spec = CreatureSpec::default();
        spec.special_abilities = vec!["teleport".into()];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let policy = PolicyNetwork::new(STATE_SIZE, &[4], 4, &mut rng).unwrap();
        assert!(matches!(
            Creature::new("X", &spec, &config, policy),
            Err(ArenaError::UnknownAbility { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_vitals_stay_in_bounds(actions in proptest::collection::vec(0usize..5, 1..40)) {
            let config = stun_config();
            let (mut a, mut b) = pair(&config);
            for (turn, index) in actions.into_iter().enumerate() {
                let (actor, target) = if turn % 2 == 0 { (&mut a, &mut b) } else { (&mut b, &mut a) };
                actor.process_statuses(|_, _| {});
                let action = actor.action_at(index).unwrap();
                actor.execute(action, target);
                for c in [&a, &b] {
                    prop_assert!(c.hp() <= c.max_hp());
                    prop_assert!(c.energy() <= c.max_energy());
                }
            }
        }
    }
}
