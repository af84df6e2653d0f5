use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArenaError {
    #[error("Creature {creature} references unknown ability: {ability}")]
    UnknownAbility { creature: String, ability: String },

    #[error("Unknown creature: {0}")]
    UnknownCreature(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Policy for {creature} has {actual} outputs, expected {expected}")]
    PolicyShapeMismatch {
        creature: String,
        expected: usize,
        actual: usize,
    },

    /// A knockout was raised for a creature that still has hp left.
    #[error("Knockout mismatch: {creature} marked knocked out with {hp} hp remaining")]
    KnockoutMismatch { creature: String, hp: u32 },

    #[error("Checkpoint for {creature} has no optimizer state, cannot resume")]
    MissingOptimizerState { creature: String },

    #[error("Invalid action distribution: {0}")]
    InvalidDistribution(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ArenaError>;
