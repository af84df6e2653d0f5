//! Checkpoint persistence
//!
//! A checkpoint carries a creature's policy parameters, its optimizer state,
//! the next epoch to run and an opaque activation history. Stores must
//! round-trip all four losslessly.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use candle_core::{Device, Tensor};
use serde::{Deserialize, Serialize};

use crate::core::error::{ArenaError, Result};
use crate::core::types::Epoch;
use crate::policy::optimizer::OptimizerState;

#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub parameters: HashMap<String, Tensor>,
    pub optimizer: Option<OptimizerState>,
    /// Next epoch to run when resuming
    pub epoch: Epoch,
    /// Carried through unchanged; never inspected by training
    pub activation_history: Vec<serde_json::Value>,
}

/// Trait for checkpoint persistence backends
pub trait CheckpointStore {
    /// Load a creature's checkpoint; Ok(None) when none was saved yet
    fn load(&self, creature: &str) -> Result<Option<Checkpoint>>;

    fn save(&mut self, creature: &str, checkpoint: &Checkpoint) -> Result<()>;
}

/// In-memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpointStore {
    checkpoints: HashMap<String, Checkpoint>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, creature: &str) -> Option<&Checkpoint> {
        self.checkpoints.get(creature)
    }

    pub fn insert(&mut self, creature: &str, checkpoint: Checkpoint) {
        self.checkpoints.insert(creature.to_string(), checkpoint);
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn load(&self, creature: &str) -> Result<Option<Checkpoint>> {
        Ok(self.checkpoints.get(creature).cloned())
    }

    fn save(&mut self, creature: &str, checkpoint: &Checkpoint) -> Result<()> {
        self.checkpoints
            .insert(creature.to_string(), checkpoint.clone());
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct OptimizerMeta {
    step: usize,
    learning_rate: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointMeta {
    epoch: Epoch,
    optimizer: Option<OptimizerMeta>,
    #[serde(default)]
    activation_history: Vec<serde_json::Value>,
}

const FIRST_MOMENT_PREFIX: &str = "m.";
const SECOND_MOMENT_PREFIX: &str = "v.";

/// Directory-backed store
///
/// Per creature: `nn_<name>.safetensors` (parameters),
/// `nn_<name>.optim.safetensors` (Adam moments) and `nn_<name>.json`
/// (epoch, Adam step and learning rate, activation history).
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn parameters_path(&self, creature: &str) -> PathBuf {
        self.dir.join(format!("nn_{creature}.safetensors"))
    }

    pub fn optimizer_path(&self, creature: &str) -> PathBuf {
        self.dir.join(format!("nn_{creature}.optim.safetensors"))
    }

    pub fn meta_path(&self, creature: &str) -> PathBuf {
        self.dir.join(format!("nn_{creature}.json"))
    }

    fn load_optimizer(&self, creature: &str, meta: &CheckpointMeta) -> Result<Option<OptimizerState>> {
        let path = self.optimizer_path(creature);
        let Some(optim) = &meta.optimizer else {
            return Ok(None);
        };
        if !path.is_file() {
            return Ok(None);
        }

        let tensors = candle_core::safetensors::load(&path, &Device::Cpu)?;
        let mut first_moments = HashMap::new();
        let mut second_moments = HashMap::new();
        for (key, tensor) in tensors {
            if let Some(name) = key.strip_prefix(FIRST_MOMENT_PREFIX) {
                first_moments.insert(name.to_string(), tensor);
            } else if let Some(name) = key.strip_prefix(SECOND_MOMENT_PREFIX) {
                second_moments.insert(name.to_string(), tensor);
            } else {
                return Err(ArenaError::Checkpoint(format!(
                    "unexpected tensor {key} in {}",
                    path.display()
                )));
            }
        }
        Ok(Some(OptimizerState {
            step: optim.step,
            learning_rate: optim.learning_rate,
            first_moments,
            second_moments,
        }))
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn load(&self, creature: &str) -> Result<Option<Checkpoint>> {
        let params_path = self.parameters_path(creature);
        if !params_path.is_file() {
            return Ok(None);
        }
        let parameters = candle_core::safetensors::load(&params_path, &Device::Cpu)?;

        let meta_path = self.meta_path(creature);
        let meta: CheckpointMeta = if meta_path.is_file() {
            serde_json::from_str(&fs::read_to_string(&meta_path)?)?
        } else {
            CheckpointMeta {
                epoch: 0,
                optimizer: None,
                activation_history: Vec::new(),
            }
        };
        let optimizer = self.load_optimizer(creature, &meta)?;

        tracing::debug!("Read checkpoint {} (epoch {})", params_path.display(), meta.epoch);
        Ok(Some(Checkpoint {
            parameters,
            optimizer,
            epoch: meta.epoch,
            activation_history: meta.activation_history,
        }))
    }

    fn save(&mut self, creature: &str, checkpoint: &Checkpoint) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        candle_core::safetensors::save(&checkpoint.parameters, self.parameters_path(creature))?;

        let optimizer = match &checkpoint.optimizer {
            Some(state) => {
                let mut moments = HashMap::new();
                for (name, tensor) in &state.first_moments {
                    moments.insert(format!("{FIRST_MOMENT_PREFIX}{name}"), tensor.clone());
                }
                for (name, tensor) in &state.second_moments {
                    moments.insert(format!("{SECOND_MOMENT_PREFIX}{name}"), tensor.clone());
                }
                candle_core::safetensors::save(&moments, self.optimizer_path(creature))?;
                Some(OptimizerMeta {
                    step: state.step,
                    learning_rate: state.learning_rate,
                })
            }
            None => {
                let stale = self.optimizer_path(creature);
                if stale.is_file() {
                    fs::remove_file(stale)?;
                }
                None
            }
        };

        let meta = CheckpointMeta {
            epoch: checkpoint.epoch,
            optimizer,
            activation_history: checkpoint.activation_history.clone(),
        };
        fs::write(self.meta_path(creature), serde_json::to_string_pretty(&meta)?)?;
        Ok(())
    }
}
