//! Creature Arena - turn-based creature battles with policy-gradient learning

pub mod battle;
pub mod combat;
pub mod core;
pub mod policy;
pub mod training;
