//! Training - policy-gradient updates, the epoch loop and its collaborators

pub mod checkpoint;
pub mod learner;
pub mod log_sink;
pub mod session;
pub mod summary;
pub mod trainer;

pub use checkpoint::{Checkpoint, CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
pub use learner::Learner;
pub use log_sink::{FileLogSink, LogSink, MemoryLogSink};
pub use session::TrainingSession;
pub use summary::{ActionTally, CreatureSummary, EpochProgress, EpochRecord, TrainingSummary};
pub use trainer::{event_reward, reinforce, UpdateStats};
