//! # Tensor Module
//!
//! Defines the shared `Tensor` handle the optimizers read gradients from and
//! write parameters into, plus the named `Parameter` wrapper.

use ndarray::{ArrayD, IxDyn};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub mod param;

pub use param::Parameter;

#[derive(thiserror::Error, Debug)]
pub enum TensorError {
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    #[error("ndarray error: {0}")]
    NdarrayError(#[from] ndarray::ShapeError),
}

/// Element type of every tensor handled by the crate.
pub type TensorData = f32;

/// # Tensor
///
/// A cheaply clonable handle to an `ndarray::ArrayD`. Clones share the same
/// storage, so the training loop and the optimizer can both hold a handle to
/// a parameter while the caller stays its owner.
#[derive(Clone, Debug)]
pub struct Tensor {
    data: Arc<RwLock<ArrayD<TensorData>>>,
}

impl Tensor {
    /// Creates a new Tensor from an ndarray::ArrayD.
    pub fn new(data: ArrayD<TensorData>) -> Self {
        Tensor {
            data: Arc::new(RwLock::new(data)),
        }
    }

    /// Creates a tensor from a flat vector in row-major order.
    pub fn from_vec(shape: &[usize], values: Vec<TensorData>) -> Result<Self, TensorError> {
        let expected: usize = shape.iter().product();
        if expected != values.len() {
            return Err(TensorError::ShapeMismatch {
                expected: shape.to_vec(),
                got: vec![values.len()],
            });
        }
        let data = ArrayD::from_shape_vec(IxDyn(shape), values)?;
        Ok(Self::new(data))
    }

    /// Returns the current shape of the tensor.
    pub fn shape(&self) -> Vec<usize> {
        self.data().shape().to_vec()
    }

    /// Returns the total number of elements.
    pub fn size(&self) -> usize {
        self.data().len()
    }

    /// Provides read-only access to the underlying data.
    /// Note: This locks the RwLock for reading.
    pub fn data(&self) -> RwLockReadGuard<'_, ArrayD<TensorData>> {
        self.data.read().expect("Tensor data RwLock poisoned")
    }

    /// Provides mutable access to the underlying data.
    /// Note: This locks the RwLock for writing.
    pub fn data_mut(&self) -> RwLockWriteGuard<'_, ArrayD<TensorData>> {
        self.data.write().expect("Tensor data RwLock poisoned")
    }

    /// Clones the underlying data into a new ArrayD.
    pub fn data_clone(&self) -> ArrayD<TensorData> {
        self.data().clone()
    }

    /// Copies the elements out in logical (row-major) order.
    pub fn to_vec(&self) -> Vec<TensorData> {
        self.data().iter().copied().collect()
    }

    /// Whether both handles point at the same storage.
    pub fn shares_storage(&self, other: &Tensor) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl From<ArrayD<TensorData>> for Tensor {
    fn from(data: ArrayD<TensorData>) -> Self {
        Tensor::new(data)
    }
}

// --- Helper functions ---

/// Helper to create a tensor filled with zeros.
pub fn zeros(shape: &[usize]) -> Tensor {
    Tensor::new(ArrayD::zeros(IxDyn(shape)))
}

/// Helper to create a tensor filled with `value`.
pub fn full(shape: &[usize], value: TensorData) -> Tensor {
    Tensor::new(ArrayD::from_elem(IxDyn(shape), value))
}
