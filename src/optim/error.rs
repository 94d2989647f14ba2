//! # Optimizer Errors

use crate::tensor::TensorData;

/// Result alias used across the `optim` module.
pub type Result<T> = std::result::Result<T, OptimError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum OptimError {
    #[error("Invalid hyperparameter `{name}` = {value}: {reason}")]
    InvalidHyperparameter {
        name: &'static str,
        value: TensorData,
        reason: &'static str,
    },
    #[error(transparent)]
    ShapeMismatch(#[from] ShapeMismatch),
}

/// Raised by `step` before anything is mutated.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ShapeMismatch {
    #[error("Expected {expected} gradients (one per parameter), got {got}")]
    Count { expected: usize, got: usize },
    #[error("Gradient {index} for parameter `{name}`: expected shape {expected:?}, got {got:?}")]
    Gradient {
        index: usize,
        name: String,
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    #[error("Parameter {index} (`{name}`) changed shape from {expected:?} to {got:?}")]
    Parameter {
        index: usize,
        name: String,
        expected: Vec<usize>,
        got: Vec<usize>,
    },
}

// --- Hyperparameter domain checks ---

pub(crate) fn check_learning_rate(lr: TensorData) -> Result<()> {
    if !lr.is_finite() || lr < 0.0 {
        return Err(OptimError::InvalidHyperparameter {
            name: "lr",
            value: lr,
            reason: "must be finite and >= 0",
        });
    }
    Ok(())
}

pub(crate) fn check_epsilon(epsilon: TensorData) -> Result<()> {
    if !epsilon.is_finite() || epsilon <= 0.0 {
        return Err(OptimError::InvalidHyperparameter {
            name: "epsilon",
            value: epsilon,
            reason: "must be finite and > 0",
        });
    }
    Ok(())
}

/// Momentum and decay rates all live in `[0, 1)`.
pub(crate) fn check_unit_interval(name: &'static str, value: TensorData) -> Result<()> {
    if !(0.0..1.0).contains(&value) {
        return Err(OptimError::InvalidHyperparameter {
            name,
            value,
            reason: "must be in [0, 1)",
        });
    }
    Ok(())
}
