//! # Adadelta Optimizer
//!
//! Reference: ADADELTA: An Adaptive Learning Rate Method - http://www.matthewzeiler.com/pubs/googleTR2012/googleTR2012.pdf
//!
//! There is no global learning rate; the step size comes from the ratio of
//! the decayed update and gradient magnitudes:
//!
//! ```text
//! accu_gradient = rho * accu_gradient + (1 - rho) * gradient^2
//! delta         = -sqrt((accu_delta + epsilon) / (accu_gradient + epsilon)) * gradient
//! accu_delta    = rho * accu_delta + (1 - rho) * delta^2
//! param         = param + delta
//! ```
//!
//! `delta` reads `accu_delta` from the previous step; it is overwritten only
//! afterwards.

use super::error::{check_epsilon, check_unit_interval, Result};
use super::state::{zeros_buffer, Slots, StateArena};
use super::Batch;
use crate::tensor::TensorData;

use ndarray::{ArrayD, Zip};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdadeltaConfig {
    /// Decay rate of both running averages, in `[0, 1)` (default: 0.95).
    pub rho: TensorData,
    /// Added to numerator and denominator of the ratio (default: 1e-6).
    pub epsilon: TensorData,
}

impl Default for AdadeltaConfig {
    fn default() -> Self {
        AdadeltaConfig {
            rho: 0.95,
            epsilon: 1e-6,
        }
    }
}

impl AdadeltaConfig {
    pub fn validate(&self) -> Result<()> {
        check_unit_interval("rho", self.rho)?;
        check_epsilon(self.epsilon)
    }
}

#[derive(Clone, Debug)]
pub(crate) struct AdadeltaState {
    accu_gradient: ArrayD<TensorData>,
    accu_delta: ArrayD<TensorData>,
}

impl Slots for AdadeltaState {
    const NAMES: &'static [&'static str] = &["accu_gradient", "accu_delta"];

    fn zeros(shape: &[usize]) -> Self {
        AdadeltaState {
            accu_gradient: zeros_buffer(shape),
            accu_delta: zeros_buffer(shape),
        }
    }

    fn slots(&self) -> Vec<&ArrayD<TensorData>> {
        vec![&self.accu_gradient, &self.accu_delta]
    }

    fn slots_mut(&mut self) -> Vec<&mut ArrayD<TensorData>> {
        vec![&mut self.accu_gradient, &mut self.accu_delta]
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Adadelta {
    config: AdadeltaConfig,
    state: StateArena<AdadeltaState>,
}

impl Adadelta {
    pub(crate) fn new(config: AdadeltaConfig, shapes: &[Vec<usize>]) -> Result<Self> {
        config.validate()?;
        Ok(Adadelta {
            config,
            state: StateArena::zeros_like(shapes),
        })
    }

    pub(crate) fn config(&self) -> AdadeltaConfig {
        self.config
    }

    pub(crate) fn state(&self) -> &StateArena<AdadeltaState> {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut StateArena<AdadeltaState> {
        &mut self.state
    }

    pub(crate) fn step(&mut self, batch: &Batch<'_>) {
        let AdadeltaConfig { rho, epsilon } = self.config;
        batch.for_each(self.state.entries_mut(), |state, param, gradient| {
            let AdadeltaState {
                accu_gradient,
                accu_delta,
            } = state;
            Zip::from(param)
                .and(gradient)
                .and(accu_gradient)
                .and(accu_delta)
                .for_each(|p, &g, accu_g, accu_d| {
                    *accu_g = rho * *accu_g + (1.0 - rho) * g * g;
                    let delta = -((*accu_d + epsilon) / (*accu_g + epsilon)).sqrt() * g;
                    *accu_d = rho * *accu_d + (1.0 - rho) * delta * delta;
                    *p += delta;
                });
        });
    }
}
