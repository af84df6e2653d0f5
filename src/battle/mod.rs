//! Battle system - one-on-one turn-based combat producing training trajectories
//!
//! The resolver owns turn order, status processing, knockout detection and
//! terminal reward bookkeeping. The event log it returns is the only input
//! the trainer sees.

pub mod event;
pub mod resolver;

// Re-exports for convenient access
pub use event::{BattleEvent, BattleLog, EventAction};
pub use resolver::{turn_order, BattleOutcome, BattlePhase, BattleSimulator, CreatureReward, Winner};
