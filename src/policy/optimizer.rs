//! Adam optimizer over candle variables
//!
//! Moment buffers are kept per parameter name so the whole optimizer state
//! can be exported into a checkpoint and restored on resume.

use std::collections::HashMap;

use candle_core::backprop::GradStore;
use candle_core::{Tensor, Var};

use crate::core::error::{ArenaError, Result};
use crate::policy::network::PolicyNetwork;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdamParams {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
}

impl Default for AdamParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.001,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
        }
    }
}

struct AdamSlot {
    name: String,
    var: Var,
    first_moment: Var,
    second_moment: Var,
}

/// Exported optimizer state: step counter and per-parameter moments
#[derive(Debug, Clone)]
pub struct OptimizerState {
    pub step: usize,
    pub learning_rate: f64,
    pub first_moments: HashMap<String, Tensor>,
    pub second_moments: HashMap<String, Tensor>,
}

pub struct Adam {
    slots: Vec<AdamSlot>,
    step_t: usize,
    params: AdamParams,
}

impl std::fmt::Debug for Adam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adam")
            .field("vars", &self.slots.len())
            .field("step_t", &self.step_t)
            .field("params", &self.params)
            .finish()
    }
}

impl Adam {
    pub fn new(vars: Vec<(String, Var)>, params: AdamParams) -> Result<Self> {
        let slots = vars
            .into_iter()
            .filter(|(_, var)| var.dtype().is_float())
            .map(|(name, var)| {
                let first_moment = Var::zeros(var.shape(), var.dtype(), var.device())?;
                let second_moment = Var::zeros(var.shape(), var.dtype(), var.device())?;
                Ok(AdamSlot {
                    name,
                    var,
                    first_moment,
                    second_moment,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            slots,
            step_t: 0,
            params,
        })
    }

    /// Optimizer over every trainable parameter of a policy
    pub fn for_policy(policy: &PolicyNetwork, learning_rate: f64) -> Result<Self> {
        Self::new(
            policy.named_vars()?,
            AdamParams {
                learning_rate,
                ..AdamParams::default()
            },
        )
    }

    pub fn step_count(&self) -> usize {
        self.step_t
    }

    pub fn learning_rate(&self) -> f64 {
        self.params.learning_rate
    }

    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        let grads = loss.backward()?;
        self.step(&grads)
    }

    pub fn step(&mut self, grads: &GradStore) -> Result<()> {
        self.step_t += 1;
        let lr = self.params.learning_rate;
        let beta1 = self.params.beta1;
        let beta2 = self.params.beta2;
        let scale_m = 1f64 / (1f64 - beta1.powi(self.step_t as i32));
        let scale_v = 1f64 / (1f64 - beta2.powi(self.step_t as i32));

        for slot in &self.slots {
            let theta = &slot.var;
            let m = &slot.first_moment;
            let v = &slot.second_moment;
            if let Some(g) = grads.get(theta) {
                let next_m = ((m.as_tensor() * beta1)? + (g * (1.0 - beta1))?)?;
                let next_v = ((v.as_tensor() * beta2)? + (g.sqr()? * (1.0 - beta2))?)?;
                let m_hat = (&next_m * scale_m)?;
                let v_hat = (&next_v * scale_v)?;
                let adjusted = (m_hat / (v_hat.sqrt()? + self.params.eps)?)?;
                let next_theta = (theta.as_tensor() - (adjusted * lr)?)?;
                m.set(&next_m)?;
                v.set(&next_v)?;
                theta.set(&next_theta)?;
            }
        }
        Ok(())
    }

    /// Detached copy of the step counter and moment buffers
    pub fn export_state(&self) -> Result<OptimizerState> {
        let mut first_moments = HashMap::new();
        let mut second_moments = HashMap::new();
        for slot in &self.slots {
            first_moments.insert(slot.name.clone(), slot.first_moment.as_tensor().copy()?);
            second_moments.insert(slot.name.clone(), slot.second_moment.as_tensor().copy()?);
        }
        Ok(OptimizerState {
            step: self.step_t,
            learning_rate: self.params.learning_rate,
            first_moments,
            second_moments,
        })
    }

    /// Restore moments and step counter; every parameter must be present
    pub fn import_state(&mut self, state: &OptimizerState) -> Result<()> {
        for slot in &self.slots {
            for (moments, target, kind) in [
                (&state.first_moments, &slot.first_moment, "first"),
                (&state.second_moments, &slot.second_moment, "second"),
            ] {
                let tensor = moments.get(&slot.name).ok_or_else(|| {
                    ArenaError::Checkpoint(format!("missing {kind} moment for {}", slot.name))
                })?;
                if tensor.dims() != target.dims() {
                    return Err(ArenaError::Checkpoint(format!(
                        "{kind} moment for {} has shape {:?}, expected {:?}",
                        slot.name,
                        tensor.dims(),
                        target.dims()
                    )));
                }
                target.set(&tensor.to_device(target.device())?)?;
            }
        }
        self.step_t = state.step;
        self.params.learning_rate = state.learning_rate;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};

    fn quadratic_var() -> Var {
        Var::from_tensor(&Tensor::new(&[3.0f32, -2.0], &Device::Cpu).unwrap()).unwrap()
    }

    #[test]
    fn test_adam_minimises_quadratic() {
        let x = quadratic_var();
        let mut adam = Adam::new(
            vec![("x".into(), x.clone())],
            AdamParams {
                learning_rate: 0.1,
                ..AdamParams::default()
            },
        )
        .unwrap();

        for _ in 0..300 {
            let loss = x.as_tensor().sqr().unwrap().sum_all().unwrap();
            adam.backward_step(&loss).unwrap();
        }
        let values = x.as_tensor().to_vec1::<f32>().unwrap();
        assert!(values.iter().all(|v| v.abs() < 0.05), "{values:?}");
        assert_eq!(adam.step_count(), 300);
    }

    #[test]
    fn test_state_export_import() {
        let x = quadratic_var();
        let mut adam = Adam::new(vec![("x".into(), x.clone())], AdamParams::default()).unwrap();
        let loss = x.as_tensor().sqr().unwrap().sum_all().unwrap();
        adam.backward_step(&loss).unwrap();

        let state = adam.export_state().unwrap();
        assert_eq!(state.step, 1);

        let y = quadratic_var();
        let mut restored = Adam::new(vec![("x".into(), y)], AdamParams::default()).unwrap();
        restored.import_state(&state).unwrap();
        assert_eq!(restored.step_count(), 1);

        let again = restored.export_state().unwrap();
        assert_eq!(
            again.first_moments["x"].to_vec1::<f32>().unwrap(),
            state.first_moments["x"].to_vec1::<f32>().unwrap()
        );
    }

    #[test]
    fn test_import_missing_moment_fails() {
        let x = quadratic_var();
        let mut adam = Adam::new(vec![("x".into(), x)], AdamParams::default()).unwrap();
        let state = OptimizerState {
            step: 4,
            learning_rate: 0.01,
            first_moments: HashMap::new(),
            second_moments: HashMap::new(),
        };
        assert!(adam.import_state(&state).is_err());
    }

    #[test]
    fn test_non_float_vars_skipped() {
        let ints = Var::zeros(3, DType::U32, &Device::Cpu).unwrap();
        let adam = Adam::new(vec![("ids".into(), ints)], AdamParams::default()).unwrap();
        assert!(adam.export_state().unwrap().first_moments.is_empty());
    }
}
