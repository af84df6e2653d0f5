//! Combat constants - default tunable values in one place
//!
//! These are the defaults behind `CombatRules`; a loaded configuration may
//! override any of them.

/// Damage dealt by a plain attack
pub const ATTACK_DAMAGE: u32 = 20;

/// Energy regained by attacking or defending
pub const ENERGY_REGEN_BASE: u32 = 10;

/// Energy regained by the recover action
pub const ENERGY_REGEN_RECOVER: u32 = 60;

/// Damage-over-time dealt by poison each status tick
pub const POISON_DAMAGE: u32 = 5;

/// Turns a defend status lasts (expires at the defender's next status step)
pub const DEFEND_TURNS: u32 = 1;

/// Default poison ability parameters
pub const POISON_ENERGY_COST: u32 = 30;
pub const POISON_TURNS: u32 = 3;

/// Default stun ability parameters
pub const STUN_ENERGY_COST: u32 = 40;
pub const STUN_TURNS: u32 = 2;

/// Reward for a special ability when neither the creature nor the ability
/// configures one
pub const DEFAULT_SPECIAL_REWARD: f32 = 0.01;
