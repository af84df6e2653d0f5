pub mod ability;
pub mod action;
pub mod constants;
pub mod creature;
pub mod status;

pub use ability::{AbilityDef, AbilityEffect, AbilityRegistry};
pub use action::{ActionEffect, ActionResult, CombatAction};
pub use creature::{Creature, CreatureSpec, RuntimeState};
pub use status::{StatusKind, StatusMap, StatusMarker};
