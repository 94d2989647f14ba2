//! # Adagrad Optimizer

use super::error::{check_epsilon, check_learning_rate, Result};
use super::state::{zeros_buffer, Slots, StateArena};
use super::Batch;
use crate::tensor::TensorData;

use ndarray::{ArrayD, Zip};
use serde::{Deserialize, Serialize};

/// Hyperparameters for Adagrad.
/// Reference: Adaptive Subgradient Methods for Online Learning and Stochastic Optimization - http://jmlr.org/papers/v12/duchi11a.html
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdagradConfig {
    /// Learning rate (default: 1.0).
    pub lr: TensorData,
    /// Added to the accumulated sum under the square root (default: 1e-6).
    pub epsilon: TensorData,
}

impl Default for AdagradConfig {
    fn default() -> Self {
        AdagradConfig {
            lr: 1.0,
            epsilon: 1e-6,
        }
    }
}

impl AdagradConfig {
    pub fn validate(&self) -> Result<()> {
        check_learning_rate(self.lr)?;
        check_epsilon(self.epsilon)
    }
}

#[derive(Clone, Debug)]
pub(crate) struct AdagradState {
    gsum: ArrayD<TensorData>, // Sum of squared gradients, never reset
}

impl Slots for AdagradState {
    const NAMES: &'static [&'static str] = &["gsum"];

    fn zeros(shape: &[usize]) -> Self {
        AdagradState {
            gsum: zeros_buffer(shape),
        }
    }

    fn slots(&self) -> Vec<&ArrayD<TensorData>> {
        vec![&self.gsum]
    }

    fn slots_mut(&mut self) -> Vec<&mut ArrayD<TensorData>> {
        vec![&mut self.gsum]
    }
}

/// ```text
/// gsum  = gsum + gradient^2
/// param = param - lr * gradient / sqrt(gsum + epsilon)
/// ```
///
/// The per-coordinate step size only ever shrinks as `gsum` grows.
#[derive(Clone, Debug)]
pub(crate) struct Adagrad {
    config: AdagradConfig,
    state: StateArena<AdagradState>,
}

impl Adagrad {
    pub(crate) fn new(config: AdagradConfig, shapes: &[Vec<usize>]) -> Result<Self> {
        config.validate()?;
        Ok(Adagrad {
            config,
            state: StateArena::zeros_like(shapes),
        })
    }

    pub(crate) fn config(&self) -> AdagradConfig {
        self.config
    }

    pub(crate) fn set_learning_rate(&mut self, lr: TensorData) -> Result<()> {
        check_learning_rate(lr)?;
        self.config.lr = lr;
        Ok(())
    }

    pub(crate) fn state(&self) -> &StateArena<AdagradState> {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut StateArena<AdagradState> {
        &mut self.state
    }

    pub(crate) fn step(&mut self, batch: &Batch<'_>) {
        let AdagradConfig { lr, epsilon } = self.config;
        batch.for_each(self.state.entries_mut(), |state, param, gradient| {
            Zip::from(param)
                .and(gradient)
                .and(&mut state.gsum)
                .for_each(|p, &g, gsum| {
                    *gsum += g * g;
                    *p -= lr * g / (*gsum + epsilon).sqrt();
                });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optim::{Method, Optimizer};
    use crate::tensor::{full, Parameter};
    use approx::assert_relative_eq;

    #[test]
    fn first_step_matches_closed_form() {
        let w = full(&[2], 1.0);
        let config = AdagradConfig {
            lr: 0.5,
            epsilon: 1e-6,
        };
        let mut opt =
            Optimizer::new(vec![Parameter::new("w", w.clone())], Method::Adagrad(config)).unwrap();
        opt.step(&[full(&[2], 2.0)]).unwrap();

        let expected = 1.0 - 0.5 * 2.0 / (4.0f32 + 1e-6).sqrt();
        for value in w.to_vec() {
            assert_relative_eq!(value, expected);
        }
        assert!(opt.buffer("gsum", 0).unwrap().iter().all(|s| *s == 4.0));
    }

    #[test]
    fn accumulator_only_grows() {
        let w = full(&[1], 0.0);
        let mut opt = Optimizer::new(
            vec![Parameter::new("w", w)],
            Method::Adagrad(AdagradConfig::default()),
        )
        .unwrap();
        let mut previous = 0.0;
        for g in [1.0, -2.0, 0.0, 0.5] {
            opt.step(&[full(&[1], g)]).unwrap();
            let gsum = *opt.buffer("gsum", 0).unwrap().first().unwrap();
            assert!(gsum >= previous);
            previous = gsum;
        }
        assert_relative_eq!(previous, 5.25);
    }
}
