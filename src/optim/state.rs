//! # Per-Parameter State
//!
//! Every rule keeps its auxiliary tensors in a `StateArena`: one fixed-size
//! record per parameter, indexed by the parameter's position in the set and
//! zero-initialized at construction.

use crate::tensor::TensorData;
use crate::utils::serialization::{SerializableTensor, SerializationError};
use ndarray::{ArrayD, IxDyn};
use std::collections::BTreeMap;

/// A per-parameter record made of named, parameter-shaped buffers.
pub(crate) trait Slots: Send + Sized {
    /// Buffer names, in the order `slots` yields them.
    const NAMES: &'static [&'static str];

    fn zeros(shape: &[usize]) -> Self;

    fn slots(&self) -> Vec<&ArrayD<TensorData>>;

    fn slots_mut(&mut self) -> Vec<&mut ArrayD<TensorData>>;
}

/// Rules without auxiliary state.
impl Slots for () {
    const NAMES: &'static [&'static str] = &[];

    fn zeros(_shape: &[usize]) -> Self {}

    fn slots(&self) -> Vec<&ArrayD<TensorData>> {
        Vec::new()
    }

    fn slots_mut(&mut self) -> Vec<&mut ArrayD<TensorData>> {
        Vec::new()
    }
}

pub(crate) fn zeros_buffer(shape: &[usize]) -> ArrayD<TensorData> {
    ArrayD::zeros(IxDyn(shape))
}

/// Key under which a buffer is stored in a state dict, e.g. `m.0`.
pub(crate) fn slot_key(slot: &str, index: usize) -> String {
    format!("{}.{}", slot, index)
}

#[derive(Clone, Debug)]
pub(crate) struct StateArena<S> {
    entries: Vec<S>,
}

impl<S: Slots> StateArena<S> {
    pub(crate) fn zeros_like(shapes: &[Vec<usize>]) -> Self {
        StateArena {
            entries: shapes.iter().map(|shape| S::zeros(shape)).collect(),
        }
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [S] {
        &mut self.entries
    }

    pub(crate) fn buffer(&self, slot: &str, index: usize) -> Option<&ArrayD<TensorData>> {
        let position = S::NAMES.iter().position(|name| *name == slot)?;
        self.entries
            .get(index)
            .and_then(|entry| entry.slots().into_iter().nth(position))
    }

    pub(crate) fn expected_keys(&self) -> Vec<String> {
        (0..self.entries.len())
            .flat_map(|index| S::NAMES.iter().map(move |name| slot_key(name, index)))
            .collect()
    }

    pub(crate) fn export(&self, buffers: &mut BTreeMap<String, SerializableTensor>) {
        for (index, entry) in self.entries.iter().enumerate() {
            for (name, slot) in S::NAMES.iter().zip(entry.slots()) {
                buffers.insert(slot_key(name, index), SerializableTensor::from_array(slot));
            }
        }
    }

    /// Builds a full replacement arena from saved buffers, checking every key
    /// and shape. Nothing is modified; apply the result with `replace`.
    pub(crate) fn decode(
        &self,
        shapes: &[Vec<usize>],
        buffers: &BTreeMap<String, SerializableTensor>,
    ) -> Result<Vec<S>, SerializationError> {
        shapes
            .iter()
            .enumerate()
            .map(|(index, shape)| -> Result<S, SerializationError> {
                let mut entry = S::zeros(shape);
                for (name, slot) in S::NAMES.iter().zip(entry.slots_mut()) {
                    let key = slot_key(name, index);
                    let stored = buffers
                        .get(&key)
                        .ok_or_else(|| SerializationError::MissingKey(key.clone()))?;
                    let array = stored.to_ndarray(&key)?;
                    if array.shape() != shape.as_slice() {
                        return Err(SerializationError::ShapeMismatch {
                            key,
                            expected: shape.clone(),
                            got: array.shape().to_vec(),
                        });
                    }
                    *slot = array;
                }
                Ok(entry)
            })
            .collect()
    }

    pub(crate) fn replace(&mut self, entries: Vec<S>) {
        self.entries = entries;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Pair {
        a: ArrayD<TensorData>,
        b: ArrayD<TensorData>,
    }

    impl Slots for Pair {
        const NAMES: &'static [&'static str] = &["a", "b"];

        fn zeros(shape: &[usize]) -> Self {
            Pair {
                a: zeros_buffer(shape),
                b: zeros_buffer(shape),
            }
        }

        fn slots(&self) -> Vec<&ArrayD<TensorData>> {
            vec![&self.a, &self.b]
        }

        fn slots_mut(&mut self) -> Vec<&mut ArrayD<TensorData>> {
            vec![&mut self.a, &mut self.b]
        }
    }

    #[test]
    fn arena_is_zeroed_and_shaped_like_parameters() {
        let arena = StateArena::<Pair>::zeros_like(&[vec![2, 3], vec![4]]);
        assert_eq!(arena.buffer("a", 0).unwrap().shape(), &[2, 3]);
        assert_eq!(arena.buffer("b", 1).unwrap().shape(), &[4]);
        assert!(arena.buffer("b", 1).unwrap().iter().all(|x| *x == 0.0));
        assert!(arena.buffer("c", 0).is_none());
        assert!(arena.buffer("a", 2).is_none());
        assert_eq!(arena.expected_keys(), vec!["a.0", "b.0", "a.1", "b.1"]);
    }

    #[test]
    fn decode_rejects_wrong_shape_without_touching_state() {
        let shapes = vec![vec![2]];
        let mut arena = StateArena::<Pair>::zeros_like(&shapes);
        arena.entries_mut()[0].a.fill(1.0);

        let mut buffers = BTreeMap::new();
        arena.export(&mut buffers);
        buffers.insert(
            "b.0".to_string(),
            SerializableTensor {
                shape: vec![3],
                data: vec![0.0; 3],
            },
        );

        let err = arena.decode(&shapes, &buffers).unwrap_err();
        assert!(matches!(err, SerializationError::ShapeMismatch { .. }));
        assert_eq!(arena.buffer("a", 0).unwrap().as_slice().unwrap(), &[1.0, 1.0]);
    }
}
