//! # Utility Functions (`utils`)
//!
//! Optimizer state persistence and the per-parameter dispatch helper.

pub(crate) mod parallel;
pub mod serialization;

pub use serialization::{load_state, save_state, SerializableTensor, SerializationError, StateDict};
