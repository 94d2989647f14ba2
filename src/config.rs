//! Configuration structures for building optimizers
//!
//! An optimizer configuration is a JSON object tagged by `"method"`; any
//! hyperparameter left out takes the method's default.
//!
//! ```json
//! {
//!   "method": "adam",
//!   "lr": 0.0005,
//!   "beta2": 0.99,
//!   "parallel": true
//! }
//! ```

use crate::optim::{Method, OptimError, Optimizer};
use crate::tensor::Parameter;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] OptimError),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Update rule and its hyperparameters.
    #[serde(flatten)]
    pub method: Method,

    /// Dispatch per-parameter updates on the rayon pool (default false).
    #[serde(default)]
    pub parallel: bool,
}

impl OptimizerConfig {
    pub fn validate(&self) -> Result<(), OptimError> {
        self.method.validate()
    }

    /// Builds an optimizer over `params` from this configuration.
    pub fn build<I>(&self, params: I) -> Result<Optimizer, OptimError>
    where
        I: IntoIterator<Item = Parameter>,
    {
        Ok(Optimizer::new(params, self.method)?.with_parallel(self.parallel))
    }
}

impl From<Method> for OptimizerConfig {
    fn from(method: Method) -> Self {
        OptimizerConfig {
            method,
            parallel: false,
        }
    }
}

/// Loads and validates an optimizer configuration from a JSON file.
///
/// # Examples
///
/// ```no_run
/// use rtorch_optim::config::load_config;
///
/// let cfg = load_config("config/adam.json").unwrap();
/// assert_eq!(cfg.method.name(), "adam");
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<OptimizerConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Parses and validates an optimizer configuration from a JSON string.
pub fn parse_config(json: &str) -> Result<OptimizerConfig, ConfigError> {
    let config: OptimizerConfig = serde_json::from_str(json)?;
    config.validate()?;
    Ok(config)
}
