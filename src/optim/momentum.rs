//! # Momentum Optimizer
//!
//! Gradient descent with a persistent velocity per parameter:
//!
//! ```text
//! velocity = momentum * velocity - lr * gradient
//! param    = param + velocity
//! ```

use super::error::{check_learning_rate, check_unit_interval, Result};
use super::state::{zeros_buffer, Slots, StateArena};
use super::Batch;
use crate::tensor::TensorData;

use ndarray::{ArrayD, Zip};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumConfig {
    /// Learning rate (default: 0.01).
    pub lr: TensorData,
    /// Momentum factor in `[0, 1)` (default: 0.9).
    pub momentum: TensorData,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        MomentumConfig {
            lr: 0.01,
            momentum: 0.9,
        }
    }
}

impl MomentumConfig {
    /// A momentum of 1 or more makes the velocity grow without bound.
    pub fn validate(&self) -> Result<()> {
        check_learning_rate(self.lr)?;
        check_unit_interval("momentum", self.momentum)
    }
}

#[derive(Clone, Debug)]
pub(crate) struct MomentumState {
    velocity: ArrayD<TensorData>,
}

impl Slots for MomentumState {
    const NAMES: &'static [&'static str] = &["velocity"];

    fn zeros(shape: &[usize]) -> Self {
        MomentumState {
            velocity: zeros_buffer(shape),
        }
    }

    fn slots(&self) -> Vec<&ArrayD<TensorData>> {
        vec![&self.velocity]
    }

    fn slots_mut(&mut self) -> Vec<&mut ArrayD<TensorData>> {
        vec![&mut self.velocity]
    }
}

#[derive(Clone, Debug)]
pub(crate) struct MomentumDescent {
    config: MomentumConfig,
    state: StateArena<MomentumState>,
}

impl MomentumDescent {
    pub(crate) fn new(config: MomentumConfig, shapes: &[Vec<usize>]) -> Result<Self> {
        config.validate()?;
        Ok(MomentumDescent {
            config,
            state: StateArena::zeros_like(shapes),
        })
    }

    pub(crate) fn config(&self) -> MomentumConfig {
        self.config
    }

    pub(crate) fn set_learning_rate(&mut self, lr: TensorData) -> Result<()> {
        check_learning_rate(lr)?;
        self.config.lr = lr;
        Ok(())
    }

    pub(crate) fn state(&self) -> &StateArena<MomentumState> {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut StateArena<MomentumState> {
        &mut self.state
    }

    pub(crate) fn step(&mut self, batch: &Batch<'_>) {
        let MomentumConfig { lr, momentum } = self.config;
        batch.for_each(self.state.entries_mut(), |state, param, gradient| {
            Zip::from(param)
                .and(gradient)
                .and(&mut state.velocity)
                .for_each(|p, &g, v| {
                    *v = momentum * *v - lr * g;
                    *p += *v;
                });
        });
    }
}
