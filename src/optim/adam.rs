//! # Adam Optimizer

use super::error::{check_epsilon, check_learning_rate, check_unit_interval, Result};
use super::state::{zeros_buffer, Slots, StateArena};
use super::Batch;
use crate::tensor::TensorData;

use ndarray::{ArrayD, Zip};
use serde::{Deserialize, Serialize};

/// Hyperparameters for Adam.
/// Reference: Adam: A Method for Stochastic Optimization - https://arxiv.org/abs/1412.6980
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdamConfig {
    /// Learning rate (default: 1e-3).
    pub lr: TensorData,
    /// Decay of the first moment estimate, in `[0, 1)` (default: 0.9).
    pub beta1: TensorData,
    /// Decay of the second moment estimate, in `[0, 1)` (default: 0.999).
    pub beta2: TensorData,
    /// Added to `sqrt(v_hat)` in the denominator (default: 1e-8).
    pub epsilon: TensorData,
}

impl Default for AdamConfig {
    fn default() -> Self {
        AdamConfig {
            lr: 1e-3,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
        }
    }
}

impl AdamConfig {
    pub fn validate(&self) -> Result<()> {
        check_learning_rate(self.lr)?;
        check_unit_interval("beta1", self.beta1)?;
        check_unit_interval("beta2", self.beta2)?;
        check_epsilon(self.epsilon)
    }
}

#[derive(Clone, Debug)]
pub(crate) struct AdamState {
    m: ArrayD<TensorData>, // 1st moment estimate
    v: ArrayD<TensorData>, // 2nd moment estimate
}

impl Slots for AdamState {
    const NAMES: &'static [&'static str] = &["m", "v"];

    fn zeros(shape: &[usize]) -> Self {
        AdamState {
            m: zeros_buffer(shape),
            v: zeros_buffer(shape),
        }
    }

    fn slots(&self) -> Vec<&ArrayD<TensorData>> {
        vec![&self.m, &self.v]
    }

    fn slots_mut(&mut self) -> Vec<&mut ArrayD<TensorData>> {
        vec![&mut self.m, &mut self.v]
    }
}

/// Adam with bias-corrected moment estimates.
///
/// `t` is shared by every parameter. It starts at 1, every parameter in a
/// step is corrected with the same value, and it advances once the whole
/// step is done.
#[derive(Clone, Debug)]
pub(crate) struct Adam {
    config: AdamConfig,
    t: u64,
    state: StateArena<AdamState>,
}

impl Adam {
    pub(crate) fn new(config: AdamConfig, shapes: &[Vec<usize>]) -> Result<Self> {
        config.validate()?;
        Ok(Adam {
            config,
            t: 1,
            state: StateArena::zeros_like(shapes),
        })
    }

    pub(crate) fn config(&self) -> AdamConfig {
        self.config
    }

    pub(crate) fn set_learning_rate(&mut self, lr: TensorData) -> Result<()> {
        check_learning_rate(lr)?;
        self.config.lr = lr;
        Ok(())
    }

    pub(crate) fn timestep(&self) -> u64 {
        self.t
    }

    /// Callers check `t >= 1` before restoring it.
    pub(crate) fn set_timestep(&mut self, t: u64) {
        self.t = t;
    }

    pub(crate) fn state(&self) -> &StateArena<AdamState> {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut StateArena<AdamState> {
        &mut self.state
    }

    pub(crate) fn step(&mut self, batch: &Batch<'_>) {
        let AdamConfig {
            lr,
            beta1,
            beta2,
            epsilon,
        } = self.config;

        let t = self.t as TensorData;
        let bias_correction1 = 1.0 - beta1.powf(t);
        let bias_correction2 = 1.0 - beta2.powf(t);

        batch.for_each(self.state.entries_mut(), |state, param, gradient| {
            let AdamState { m, v } = state;
            Zip::from(param)
                .and(gradient)
                .and(m)
                .and(v)
                .for_each(|p, &g, m, v| {
                    *m = beta1 * *m + (1.0 - beta1) * g;
                    *v = beta2 * *v + (1.0 - beta2) * g * g;
                    let m_hat = *m / bias_correction1;
                    let v_hat = *v / bias_correction2;
                    *p -= (lr * m_hat) / (v_hat.sqrt() + epsilon);
                });
        });

        self.t = self.t.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optim::{Method, OptimError, Optimizer};
    use crate::tensor::{full, Parameter};
    use approx::assert_relative_eq;

    #[test]
    fn first_step_from_unit_gradient() {
        let w = full(&[1], 1.0);
        let mut opt = Optimizer::new(
            vec![Parameter::new("w", w.clone())],
            Method::Adam(AdamConfig::default()),
        )
        .unwrap();
        assert_eq!(opt.timestep(), Some(1));

        opt.step(&[full(&[1], 1.0)]).unwrap();

        assert_relative_eq!(*opt.buffer("m", 0).unwrap().first().unwrap(), 0.1, max_relative = 1e-5);
        assert_relative_eq!(*opt.buffer("v", 0).unwrap().first().unwrap(), 0.001, max_relative = 1e-4);
        assert_relative_eq!(w.to_vec()[0], 1.0 - 0.001 / (1.0 + 1e-8), max_relative = 1e-6);
        assert_eq!(opt.timestep(), Some(2));
    }

    #[test]
    fn counter_advances_once_per_step_for_all_parameters() {
        let params: Vec<Parameter> = (0..4)
            .map(|i| Parameter::new(format!("w{}", i), full(&[3], 1.0)))
            .collect();
        let mut opt = Optimizer::new(params.clone(), Method::Adam(AdamConfig::default())).unwrap();
        let grads: Vec<_> = (0..4).map(|_| full(&[3], 0.5)).collect();

        opt.step(&grads).unwrap();
        opt.step(&grads).unwrap();
        assert_eq!(opt.timestep(), Some(3));

        // Same gradients and same t: every parameter moved identically.
        let first = params[0].tensor().to_vec();
        for param in &params[1..] {
            assert_eq!(param.tensor().to_vec(), first);
        }
    }

    #[test]
    fn bias_correction_uses_pre_increment_counter() {
        let w = full(&[1], 0.0);
        let config = AdamConfig {
            lr: 0.1,
            beta1: 0.5,
            beta2: 0.5,
            epsilon: 1e-8,
        };
        let mut opt =
            Optimizer::new(vec![Parameter::new("w", w.clone())], Method::Adam(config)).unwrap();
        opt.step(&[full(&[1], 2.0)]).unwrap();
        opt.step(&[full(&[1], 2.0)]).unwrap();

        // t = 2 on the second step: m = 1.5, v = 3, m_hat = 2, v_hat = 4.
        let second: f32 = 0.1 * 2.0 / (2.0 + 1e-8);
        let first: f32 = 0.1 * 2.0 / (2.0 + 1e-8);
        assert_relative_eq!(w.to_vec()[0], -(first + second), max_relative = 1e-6);
    }

    #[test]
    fn betas_must_lie_in_unit_interval() {
        let config = AdamConfig {
            beta2: 1.0,
            ..AdamConfig::default()
        };
        let err = Adam::new(config, &[]).unwrap_err();
        assert!(matches!(err, OptimError::InvalidHyperparameter { name: "beta2", .. }));

        for beta1 in [1.0, -0.1] {
            let config = AdamConfig {
                beta1,
                ..AdamConfig::default()
            };
            let err = Adam::new(config, &[]).unwrap_err();
            assert!(matches!(err, OptimError::InvalidHyperparameter { name: "beta1", .. }));
        }
    }

    #[test]
    fn counter_saturates_instead_of_wrapping() {
        let mut adam = Adam::new(AdamConfig::default(), &[]).unwrap();
        adam.set_timestep(u64::MAX);
        let batch = Batch {
            params: &[],
            gradients: &[],
            snapshots: &[],
            parallel: false,
        };
        adam.step(&batch);
        assert_eq!(adam.timestep(), u64::MAX);
    }
}
