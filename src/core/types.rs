//! Core type definitions used throughout the codebase

/// Battle tick counter (one round of actions)
pub type Tick = u32;

/// Training epoch counter (one battle plus one update)
pub type Epoch = u64;

/// Scalar reward signal
pub type Reward = f32;

/// Width of the observation fed to every policy network
pub const STATE_SIZE: usize = 4;

/// Observation of a battle from one creature's point of view
///
/// Layout: `[self.hp, self.energy, opponent.hp, opponent.energy]`, raw values.
pub type StateVector = [f32; STATE_SIZE];

/// Number of fixed base actions every creature has (attack, defend, recover)
pub const BASE_ACTION_COUNT: usize = 3;
