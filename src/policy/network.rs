//! Feed-forward policy network
//!
//! `input -> hidden[0] -> ... -> hidden[n] -> output`, ReLU between layers,
//! raw logits out. Parameters live in a `VarMap` so the optimizer and the
//! checkpoint store can reach them by name.

use std::collections::HashMap;
use std::fmt;

use candle_core::{Device, Tensor, Var, D};
use candle_nn::{Linear, Module, VarMap};
use rand::Rng;

use crate::core::error::{ArenaError, Result};
use crate::core::types::StateVector;

pub struct PolicyNetwork {
    varmap: VarMap,
    layers: Vec<Linear>,
    input_size: usize,
    hidden_sizes: Vec<usize>,
    output_size: usize,
    device: Device,
}

impl fmt::Debug for PolicyNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyNetwork")
            .field("input_size", &self.input_size)
            .field("hidden_sizes", &self.hidden_sizes)
            .field("output_size", &self.output_size)
            .finish()
    }
}

fn lock_error() -> ArenaError {
    ArenaError::Checkpoint("policy parameter map lock poisoned".into())
}

impl PolicyNetwork {
    /// Build a network with parameters drawn uniformly from `±1/sqrt(fan_in)`
    pub fn new(
        input_size: usize,
        hidden_sizes: &[usize],
        output_size: usize,
        rng: &mut impl Rng,
    ) -> Result<Self> {
        if input_size == 0 || output_size == 0 {
            return Err(ArenaError::InvalidConfig(
                "policy input and output sizes must be positive".into(),
            ));
        }

        let device = Device::Cpu;
        let varmap = VarMap::new();

        let mut sizes = Vec::with_capacity(hidden_sizes.len() + 2);
        sizes.push(input_size);
        sizes.extend_from_slice(hidden_sizes);
        sizes.push(output_size);

        let mut layers = Vec::with_capacity(sizes.len() - 1);
        {
            let mut data = varmap.data().lock().map_err(|_| lock_error())?;
            for (i, pair) in sizes.windows(2).enumerate() {
                let (fan_in, fan_out) = (pair[0], pair[1]);
                let bound = 1.0 / (fan_in as f32).sqrt();

                let weights: Vec<f32> = (0..fan_in * fan_out)
                    .map(|_| rng.gen_range(-bound..bound))
                    .collect();
                let biases: Vec<f32> = (0..fan_out).map(|_| rng.gen_range(-bound..bound)).collect();

                let weight = Var::from_tensor(&Tensor::from_vec(weights, (fan_out, fan_in), &device)?)?;
                let bias = Var::from_tensor(&Tensor::from_vec(biases, fan_out, &device)?)?;

                layers.push(Linear::new(
                    weight.as_tensor().clone(),
                    Some(bias.as_tensor().clone()),
                ));
                data.insert(format!("layers.{i}.weight"), weight);
                data.insert(format!("layers.{i}.bias"), bias);
            }
        }

        Ok(Self {
            varmap,
            layers,
            input_size,
            hidden_sizes: hidden_sizes.to_vec(),
            output_size,
            device,
        })
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn hidden_sizes(&self) -> &[usize] {
        &self.hidden_sizes
    }

    pub fn output_size(&self) -> usize {
        self.output_size
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Batched forward pass: `[n, input] -> [n, output]` logits
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let mut xs = xs.clone();
        let last = self.layers.len() - 1;
        for (i, layer) in self.layers.iter().enumerate() {
            xs = layer.forward(&xs)?;
            if i < last {
                xs = xs.relu()?;
            }
        }
        Ok(xs)
    }

    fn state_tensor(&self, state: &StateVector) -> Result<Tensor> {
        if state.len() != self.input_size {
            return Err(ArenaError::InvalidConfig(format!(
                "policy expects {} inputs, got {}",
                self.input_size,
                state.len()
            )));
        }
        Ok(Tensor::from_slice(&state[..], (1, self.input_size), &self.device)?)
    }

    /// Raw scores for one observation
    pub fn logits(&self, state: &StateVector) -> Result<Vec<f32>> {
        let logits = self.forward(&self.state_tensor(state)?)?;
        Ok(logits.flatten_all()?.to_vec1::<f32>()?)
    }

    /// Softmax distribution over actions for one observation
    pub fn probabilities(&self, state: &StateVector) -> Result<Vec<f32>> {
        let logits = self.forward(&self.state_tensor(state)?)?;
        let probs = candle_nn::ops::softmax(&logits, D::Minus1)?;
        Ok(probs.flatten_all()?.to_vec1::<f32>()?)
    }

    /// Trainable variables, sorted by name
    pub fn named_vars(&self) -> Result<Vec<(String, Var)>> {
        let data = self.varmap.data().lock().map_err(|_| lock_error())?;
        let mut vars: Vec<(String, Var)> = data
            .iter()
            .map(|(name, var)| (name.clone(), var.clone()))
            .collect();
        vars.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(vars)
    }

    /// Detached copies of every parameter tensor
    pub fn export_parameters(&self) -> Result<HashMap<String, Tensor>> {
        let mut params = HashMap::new();
        for (name, var) in self.named_vars()? {
            params.insert(name, var.as_tensor().copy()?);
        }
        Ok(params)
    }

    /// Overwrite every parameter in place from a name-keyed tensor map
    pub fn import_parameters(&self, params: &HashMap<String, Tensor>) -> Result<()> {
        for (name, var) in self.named_vars()? {
            let tensor = params
                .get(&name)
                .ok_or_else(|| ArenaError::Checkpoint(format!("missing parameter {name}")))?;
            if tensor.dims() != var.dims() {
                return Err(ArenaError::Checkpoint(format!(
                    "parameter {name} has shape {:?}, expected {:?}",
                    tensor.dims(),
                    var.dims()
                )));
            }
            var.set(&tensor.to_device(&self.device)?)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn network(seed: u64) -> PolicyNetwork {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        PolicyNetwork::new(4, &[8, 6], 5, &mut rng).unwrap()
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let net = network(1);
        let probs = net.probabilities(&[100.0, 50.0, 80.0, 10.0]).unwrap();
        assert_eq!(probs.len(), 5);
        let total: f32 = probs.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert!(probs.iter().all(|p| *p >= 0.0));
    }

    #[test]
    fn test_same_seed_same_parameters() {
        let a = network(7);
        let b = network(7);
        let state = [10.0, 20.0, 30.0, 40.0];
        assert_eq!(a.logits(&state).unwrap(), b.logits(&state).unwrap());
    }

    #[test]
    fn test_parameter_names_per_layer() {
        let net = network(3);
        let names: Vec<String> = net.named_vars().unwrap().into_iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            vec![
                "layers.0.bias",
                "layers.0.weight",
                "layers.1.bias",
                "layers.1.weight",
                "layers.2.bias",
                "layers.2.weight",
            ]
        );
    }

    #[test]
    fn test_export_import_round_trip() {
        let source = network(11);
        let target = network(12);
        let state = [1.0, 2.0, 3.0, 4.0];
        assert_ne!(source.logits(&state).unwrap(), target.logits(&state).unwrap());

        target.import_parameters(&source.export_parameters().unwrap()).unwrap();
        assert_eq!(source.logits(&state).unwrap(), target.logits(&state).unwrap());
    }

    #[test]
    fn test_import_rejects_wrong_shape() {
        let source = network(1);
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let other = PolicyNetwork::new(4, &[3], 5, &mut rng).unwrap();
        assert!(other.import_parameters(&source.export_parameters().unwrap()).is_err());
    }

    #[test]
    fn test_no_hidden_layers() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let net = PolicyNetwork::new(4, &[], 3, &mut rng).unwrap();
        assert_eq!(net.logits(&[0.0; 4]).unwrap().len(), 3);
    }
}
