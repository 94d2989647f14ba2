//! # Stochastic Gradient Descent (SGD) Optimizer

use super::error::{check_learning_rate, Result};
use super::state::StateArena;
use super::Batch;
use crate::tensor::TensorData;

use ndarray::Zip;
use serde::{Deserialize, Serialize};

/// Hyperparameters for plain gradient descent.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SgdConfig {
    /// Learning rate (default: 0.01).
    pub lr: TensorData,
}

impl Default for SgdConfig {
    fn default() -> Self {
        SgdConfig { lr: 0.01 }
    }
}

impl SgdConfig {
    pub fn validate(&self) -> Result<()> {
        check_learning_rate(self.lr)
    }
}

/// `param = param - lr * gradient`. Keeps no state between steps.
#[derive(Clone, Debug)]
pub(crate) struct GradientDescent {
    config: SgdConfig,
    state: StateArena<()>,
}

impl GradientDescent {
    pub(crate) fn new(config: SgdConfig, shapes: &[Vec<usize>]) -> Result<Self> {
        config.validate()?;
        Ok(GradientDescent {
            config,
            state: StateArena::zeros_like(shapes),
        })
    }

    pub(crate) fn config(&self) -> SgdConfig {
        self.config
    }

    pub(crate) fn set_learning_rate(&mut self, lr: TensorData) -> Result<()> {
        check_learning_rate(lr)?;
        self.config.lr = lr;
        Ok(())
    }

    pub(crate) fn state(&self) -> &StateArena<()> {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut StateArena<()> {
        &mut self.state
    }

    pub(crate) fn step(&mut self, batch: &Batch<'_>) {
        let lr = self.config.lr;
        batch.for_each(self.state.entries_mut(), |_, param, gradient| {
            Zip::from(param).and(gradient).for_each(|p, &g| *p -= lr * g);
        });
    }
}
