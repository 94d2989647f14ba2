//! # Parallelism Utilities (CPU Threading)
//!
//! Runs one update per parameter, either in order on the calling thread or
//! spread over the `rayon` pool. Updates never read another parameter's state,
//! so both paths produce identical results.

use crate::tensor::{Parameter, Tensor, TensorData};
use ndarray::ArrayD;
use rayon::prelude::*;

/// Applies `update(state, param, gradient)` to every parameter.
///
/// `snapshots[i]` holds a pre-step copy of gradient `i` when its storage is
/// shared with a parameter; such gradients are never locked during dispatch.
pub(crate) fn for_each_param<S, F>(
    params: &[Parameter],
    gradients: &[Tensor],
    snapshots: &[Option<ArrayD<TensorData>>],
    states: &mut [S],
    parallel: bool,
    update: F,
) where
    S: Send,
    F: Fn(&mut S, &mut ArrayD<TensorData>, &ArrayD<TensorData>) + Sync,
{
    if parallel {
        states
            .par_iter_mut()
            .zip(params.par_iter())
            .zip(gradients.par_iter())
            .zip(snapshots.par_iter())
            .for_each(|(((state, param), gradient), snapshot)| {
                apply(state, param, gradient, snapshot.as_ref(), &update)
            });
    } else {
        for (((state, param), gradient), snapshot) in states
            .iter_mut()
            .zip(params)
            .zip(gradients)
            .zip(snapshots)
        {
            apply(state, param, gradient, snapshot.as_ref(), &update);
        }
    }
}

fn apply<S, F>(
    state: &mut S,
    param: &Parameter,
    gradient: &Tensor,
    snapshot: Option<&ArrayD<TensorData>>,
    update: &F,
) where
    F: Fn(&mut S, &mut ArrayD<TensorData>, &ArrayD<TensorData>),
{
    match snapshot {
        Some(gradient) => {
            let mut value = param.tensor().data_mut();
            update(state, &mut *value, gradient);
        }
        None => {
            let gradient = gradient.data();
            let mut value = param.tensor().data_mut();
            update(state, &mut *value, &*gradient);
        }
    }
}
