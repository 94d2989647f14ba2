//! # RTorch Optimizers
//!
//! Gradient-based parameter update rules for RTorch tensors: plain gradient
//! descent, momentum, Adagrad, Adadelta and Adam.
//!
//! Gradients are computed elsewhere; this crate only turns (parameter,
//! gradient, per-parameter state) into the next parameter and state.
//!
//! ```
//! use rtorch_optim::{tensor, Method, Optimizer, Parameter};
//!
//! let w = tensor::full(&[2], 1.0);
//! let mut opt = Optimizer::new(
//!     vec![Parameter::new("w", w.clone())],
//!     "sgd-lr_0.5".parse::<Method>().unwrap(),
//! )
//! .unwrap();
//!
//! opt.step(&[tensor::full(&[2], 1.0)]).unwrap();
//! assert_eq!(w.to_vec(), vec![0.5, 0.5]);
//! ```

pub mod config;
pub mod optim;
pub mod tensor;
pub mod utils;

pub use config::{load_config, parse_config, ConfigError, OptimizerConfig};
pub use optim::{Method, OptimError, Optimizer, ShapeMismatch};
pub use tensor::{Parameter, Tensor, TensorData};
