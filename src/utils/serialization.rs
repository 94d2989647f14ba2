//! # Optimizer State Serialization
//!
//! Saving and loading optimizer state (accumulators, moments, counters) so a
//! training run can resume exactly where it stopped.
//! Uses `serde` for serialization and `bincode` as the binary format.

use crate::optim::Optimizer;
use crate::tensor::TensorData;

use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

// --- Error Type ---
#[derive(thiserror::Error, Debug)]
pub enum SerializationError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization Error (Bincode): {0}")]
    Bincode(#[from] bincode::Error),
    #[error("Tensor shape mismatch during loading: key '{key}', expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        key: String,
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    #[error("Missing key in state dict during loading: '{0}'")]
    MissingKey(String),
    #[error("Unexpected key in state dict during loading: '{0}'")]
    UnexpectedKey(String),
    #[error("State dict was saved by '{got}', cannot load into '{expected}'")]
    MethodMismatch { expected: String, got: String },
    #[error("Invalid value {value} for scalar '{key}'")]
    InvalidScalar { key: String, value: f64 },
}

// --- Serializable Tensor Wrapper ---

/// Shape plus row-major data, independent of the in-memory layout.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SerializableTensor {
    pub shape: Vec<usize>,
    pub data: Vec<TensorData>,
}

impl SerializableTensor {
    pub fn from_array(array: &ArrayD<TensorData>) -> Self {
        SerializableTensor {
            shape: array.shape().to_vec(),
            data: array.iter().copied().collect(),
        }
    }

    /// Converts back into an ndarray; `key` is only used for error reporting.
    pub fn to_ndarray(&self, key: &str) -> Result<ArrayD<TensorData>, SerializationError> {
        ArrayD::from_shape_vec(IxDyn(&self.shape), self.data.clone()).map_err(|_| {
            SerializationError::ShapeMismatch {
                key: key.to_string(),
                expected: self.shape.clone(),
                got: vec![self.data.len()],
            }
        })
    }
}

// --- State Dictionary Type ---

/// Snapshot of everything an optimizer mutates during `step`.
///
/// Buffer keys are `<slot>.<parameter index>`, e.g. `velocity.0` or `m.3`.
/// Global counters live in `scalars` (Adam stores `t`). Hyperparameters are
/// not included; they belong to the optimizer the dict is loaded into.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct StateDict {
    pub method: String,
    pub steps: u64,
    pub scalars: BTreeMap<String, f64>,
    pub buffers: BTreeMap<String, SerializableTensor>,
}

// --- Save / Load ---

/// Writes the optimizer's state dict to `path`.
pub fn save_state<P: AsRef<Path>>(optimizer: &Optimizer, path: P) -> Result<(), SerializationError> {
    let state_dict = optimizer.state_dict();
    let file = File::create(path.as_ref())?;
    let writer = BufWriter::new(file);
    bincode::serialize_into(writer, &state_dict)?;
    Ok(())
}

/// Reads a state dict from `path` and restores it into `optimizer`.
///
/// With `strict`, keys the optimizer does not know about are an error;
/// otherwise they are logged and ignored. Missing keys are always an error.
pub fn load_state<P: AsRef<Path>>(
    optimizer: &mut Optimizer,
    path: P,
    strict: bool,
) -> Result<(), SerializationError> {
    let file = File::open(path.as_ref())?;
    let reader = BufReader::new(file);
    let state_dict: StateDict = bincode::deserialize_from(reader)?;
    optimizer.load_state_dict(&state_dict, strict)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializable_tensor_keeps_logical_order() {
        let array = ArrayD::from_shape_vec(IxDyn(&[2, 2]), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let transposed = array.t().to_owned();
        let stored = SerializableTensor::from_array(&transposed);
        assert_eq!(stored.shape, vec![2, 2]);
        assert_eq!(stored.data, vec![1.0, 3.0, 2.0, 4.0]);
        assert_eq!(stored.to_ndarray("x").unwrap(), transposed);
    }

    #[test]
    fn corrupt_tensor_reports_key() {
        let stored = SerializableTensor {
            shape: vec![3],
            data: vec![1.0],
        };
        match stored.to_ndarray("gsum.2") {
            Err(SerializationError::ShapeMismatch { key, .. }) => assert_eq!(key, "gsum.2"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
