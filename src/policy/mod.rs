//! Policy networks, action selection and the optimizer that trains them

pub mod network;
pub mod optimizer;
pub mod selection;

pub use network::PolicyNetwork;
pub use optimizer::{Adam, AdamParams, OptimizerState};
pub use selection::{select_action, ActionChoice, ActionSelector, EpsilonGreedy, ScriptedSelector};
