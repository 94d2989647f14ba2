//! # Parameters
//!
//! A trainable tensor together with the name it is known by.

use super::Tensor;

/// A named, trainable tensor.
///
/// The training loop owns the storage. Optimizers keep a clone of the handle,
/// which points at the same data, so updates made in `step` are visible to
/// the caller immediately.
#[derive(Clone, Debug)]
pub struct Parameter {
    name: String,
    tensor: Tensor,
}

impl Parameter {
    pub fn new(name: impl Into<String>, tensor: Tensor) -> Self {
        Parameter {
            name: name.into(),
            tensor,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The shared handle to the parameter's storage.
    pub fn tensor(&self) -> &Tensor {
        &self.tensor
    }

    pub fn shape(&self) -> Vec<usize> {
        self.tensor.shape()
    }
}
