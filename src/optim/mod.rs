//! # Optimization Algorithms (`optim`)
//!
//! Parameter-update rules for gradient-based training. An [`Optimizer`] binds
//! one [`Method`] to a fixed, ordered set of parameters and owns all of the
//! per-parameter state the method needs. The training loop computes the
//! gradients and hands them to [`Optimizer::step`], once per batch.

use crate::tensor::{Parameter, Tensor, TensorData};
use crate::utils::parallel::for_each_param;
use crate::utils::serialization::{SerializationError, StateDict};

use log::{debug, trace, warn};
use ndarray::ArrayD;
use std::collections::{BTreeMap, BTreeSet};

// --- Submodules ---
pub mod adadelta;
pub mod adagrad;
pub mod adam;
pub mod error;
pub mod method;
pub mod momentum;
pub mod sgd;
pub(crate) mod state;

pub use adadelta::AdadeltaConfig;
pub use adagrad::AdagradConfig;
pub use adam::AdamConfig;
pub use error::{OptimError, Result, ShapeMismatch};
pub use method::{Method, ParseMethodError};
pub use momentum::MomentumConfig;
pub use sgd::SgdConfig;

use adadelta::Adadelta;
use adagrad::Adagrad;
use adam::Adam;
use momentum::MomentumDescent;
use sgd::GradientDescent;

/// One validated call to `step`: parameters and gradients pairwise aligned.
pub(crate) struct Batch<'a> {
    params: &'a [Parameter],
    gradients: &'a [Tensor],
    snapshots: &'a [Option<ArrayD<TensorData>>],
    parallel: bool,
}

impl<'a> Batch<'a> {
    /// Runs `update(state, param, gradient)` once for every parameter.
    pub(crate) fn for_each<S, F>(&self, states: &mut [S], update: F)
    where
        S: Send,
        F: Fn(&mut S, &mut ArrayD<TensorData>, &ArrayD<TensorData>) + Sync,
    {
        for_each_param(
            self.params,
            self.gradients,
            self.snapshots,
            states,
            self.parallel,
            update,
        )
    }
}

#[derive(Clone, Debug)]
enum UpdateRule {
    GradientDescent(GradientDescent),
    Momentum(MomentumDescent),
    Adagrad(Adagrad),
    Adadelta(Adadelta),
    Adam(Adam),
}

/// Evaluates `$body` with `$r` bound to whichever rule is active.
macro_rules! with_rule {
    ($rule:expr, $r:ident => $body:expr) => {
        match $rule {
            UpdateRule::GradientDescent($r) => $body,
            UpdateRule::Momentum($r) => $body,
            UpdateRule::Adagrad($r) => $body,
            UpdateRule::Adadelta($r) => $body,
            UpdateRule::Adam($r) => $body,
        }
    };
}

impl UpdateRule {
    fn new(method: Method, shapes: &[Vec<usize>]) -> Result<Self> {
        let rule = match method {
            Method::GradientDescent(config) => {
                UpdateRule::GradientDescent(GradientDescent::new(config, shapes)?)
            }
            Method::Momentum(config) => UpdateRule::Momentum(MomentumDescent::new(config, shapes)?),
            Method::Adagrad(config) => UpdateRule::Adagrad(Adagrad::new(config, shapes)?),
            Method::Adadelta(config) => UpdateRule::Adadelta(Adadelta::new(config, shapes)?),
            Method::Adam(config) => UpdateRule::Adam(Adam::new(config, shapes)?),
        };
        Ok(rule)
    }

    fn method(&self) -> Method {
        match self {
            UpdateRule::GradientDescent(rule) => Method::GradientDescent(rule.config()),
            UpdateRule::Momentum(rule) => Method::Momentum(rule.config()),
            UpdateRule::Adagrad(rule) => Method::Adagrad(rule.config()),
            UpdateRule::Adadelta(rule) => Method::Adadelta(rule.config()),
            UpdateRule::Adam(rule) => Method::Adam(rule.config()),
        }
    }

    /// Names of the global scalars this rule keeps in a state dict.
    fn scalar_keys(&self) -> &'static [&'static str] {
        match self {
            UpdateRule::Adam(_) => &["t"],
            _ => &[],
        }
    }
}

/// # Optimizer
///
/// Holds handles to the caller's parameters (clones of the same storage, not
/// copies), the chosen update rule and its per-parameter state. State is
/// created zeroed at construction, one entry per parameter, and lives as long
/// as the optimizer.
#[derive(Clone, Debug)]
pub struct Optimizer {
    params: Vec<Parameter>,
    shapes: Vec<Vec<usize>>,
    rule: UpdateRule,
    steps: u64,
    parallel: bool,
}

impl Optimizer {
    /// Creates an optimizer for `params` using `method`.
    ///
    /// Fails with [`OptimError::InvalidHyperparameter`] if a hyperparameter
    /// is outside its domain.
    pub fn new<I>(params: I, method: Method) -> Result<Self>
    where
        I: IntoIterator<Item = Parameter>,
    {
        let params: Vec<Parameter> = params.into_iter().collect();
        let shapes: Vec<Vec<usize>> = params.iter().map(Parameter::shape).collect();
        let rule = UpdateRule::new(method, &shapes)?;
        debug!("built optimizer {} over {} parameters", method, params.len());
        Ok(Optimizer {
            params,
            shapes,
            rule,
            steps: 0,
            parallel: false,
        })
    }

    /// Dispatch per-parameter updates on the rayon thread pool.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    /// Applies one update to every parameter.
    ///
    /// `gradients[i]` must have the shape of parameter `i`. All shapes are
    /// checked before anything is written, so on error no parameter and no
    /// state has changed. Non-finite values coming out of the math are left
    /// as they are.
    pub fn step(&mut self, gradients: &[Tensor]) -> Result<()> {
        self.check_shapes(gradients)?;
        let snapshots = self.snapshot_aliased(gradients);

        let batch = Batch {
            params: &self.params,
            gradients,
            snapshots: &snapshots,
            parallel: self.parallel,
        };
        with_rule!(&mut self.rule, rule => rule.step(&batch));

        self.steps += 1;
        trace!("{} step {} applied", self.rule.method().name(), self.steps);
        Ok(())
    }

    fn check_shapes(&self, gradients: &[Tensor]) -> Result<()> {
        if gradients.len() != self.params.len() {
            return Err(ShapeMismatch::Count {
                expected: self.params.len(),
                got: gradients.len(),
            }
            .into());
        }

        for (index, ((param, expected), gradient)) in self
            .params
            .iter()
            .zip(&self.shapes)
            .zip(gradients)
            .enumerate()
        {
            let current = param.shape();
            if &current != expected {
                return Err(ShapeMismatch::Parameter {
                    index,
                    name: param.name().to_string(),
                    expected: expected.clone(),
                    got: current,
                }
                .into());
            }
            let got = gradient.shape();
            if &got != expected {
                return Err(ShapeMismatch::Gradient {
                    index,
                    name: param.name().to_string(),
                    expected: expected.clone(),
                    got,
                }
                .into());
            }
        }
        Ok(())
    }

    /// Copies gradients whose storage is also a parameter, so they keep their
    /// pre-step value and are never locked while parameters are written.
    fn snapshot_aliased(&self, gradients: &[Tensor]) -> Vec<Option<ArrayD<TensorData>>> {
        gradients
            .iter()
            .map(|gradient| {
                let aliased = self
                    .params
                    .iter()
                    .any(|param| param.tensor().shares_storage(gradient));
                aliased.then(|| gradient.data_clone())
            })
            .collect()
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.params
    }

    /// The active method with its current hyperparameters.
    pub fn method(&self) -> Method {
        self.rule.method()
    }

    /// Number of completed `step` calls.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Adam's bias-correction counter `t`; `None` for the other methods.
    pub fn timestep(&self) -> Option<u64> {
        match &self.rule {
            UpdateRule::Adam(adam) => Some(adam.timestep()),
            _ => None,
        }
    }

    pub fn learning_rate(&self) -> Option<TensorData> {
        self.method().learning_rate()
    }

    /// Replaces the shared learning-rate scalar used by subsequent steps.
    pub fn set_learning_rate(&mut self, lr: TensorData) -> Result<()> {
        match &mut self.rule {
            UpdateRule::GradientDescent(rule) => rule.set_learning_rate(lr),
            UpdateRule::Momentum(rule) => rule.set_learning_rate(lr),
            UpdateRule::Adagrad(rule) => rule.set_learning_rate(lr),
            UpdateRule::Adadelta(_) => Err(OptimError::InvalidHyperparameter {
                name: "lr",
                value: lr,
                reason: "adadelta has no learning rate",
            }),
            UpdateRule::Adam(rule) => rule.set_learning_rate(lr),
        }
    }

    /// Auxiliary tensor `slot` (e.g. `"velocity"`, `"m"`) of parameter `index`.
    pub fn buffer(&self, slot: &str, index: usize) -> Option<&ArrayD<TensorData>> {
        with_rule!(&self.rule, rule => rule.state().buffer(slot, index))
    }

    /// Snapshot of all state mutated by `step`.
    pub fn state_dict(&self) -> StateDict {
        let mut buffers = BTreeMap::new();
        with_rule!(&self.rule, rule => rule.state().export(&mut buffers));

        let mut scalars = BTreeMap::new();
        if let UpdateRule::Adam(adam) = &self.rule {
            scalars.insert("t".to_string(), adam.timestep() as f64);
        }

        StateDict {
            method: self.rule.method().name().to_string(),
            steps: self.steps,
            scalars,
            buffers,
        }
    }

    /// Restores state produced by [`Optimizer::state_dict`].
    ///
    /// Everything is validated before anything is replaced. Missing keys are
    /// always an error; unknown keys only when `strict`.
    pub fn load_state_dict(
        &mut self,
        state_dict: &StateDict,
        strict: bool,
    ) -> std::result::Result<(), SerializationError> {
        let name = self.rule.method().name();
        if state_dict.method != name {
            return Err(SerializationError::MethodMismatch {
                expected: name.to_string(),
                got: state_dict.method.clone(),
            });
        }

        let known_buffers: BTreeSet<String> =
            with_rule!(&self.rule, rule => rule.state().expected_keys())
                .into_iter()
                .collect();
        let scalar_keys = self.rule.scalar_keys();
        let unexpected = state_dict
            .buffers
            .keys()
            .filter(|key| !known_buffers.contains(*key))
            .chain(
                state_dict
                    .scalars
                    .keys()
                    .filter(|key| !scalar_keys.contains(&key.as_str())),
            );
        for key in unexpected {
            if strict {
                return Err(SerializationError::UnexpectedKey(key.clone()));
            }
            warn!("Key '{}' found in loaded state dict but not used by the optimizer.", key);
        }

        let timestep = match &self.rule {
            UpdateRule::Adam(_) => Some(read_timestep(&state_dict.scalars)?),
            _ => None,
        };

        with_rule!(&mut self.rule, rule => {
            let entries = rule.state().decode(&self.shapes, &state_dict.buffers)?;
            rule.state_mut().replace(entries);
        });
        if let (UpdateRule::Adam(adam), Some(t)) = (&mut self.rule, timestep) {
            adam.set_timestep(t);
        }
        self.steps = state_dict.steps;

        debug!("loaded {} state after {} steps", name, self.steps);
        Ok(())
    }
}

/// Largest counter an `f64` scalar carries without losing whole numbers.
const MAX_TIMESTEP: f64 = 9_007_199_254_740_992.0; // 2^53

fn read_timestep(scalars: &BTreeMap<String, f64>) -> std::result::Result<u64, SerializationError> {
    let value = *scalars
        .get("t")
        .ok_or_else(|| SerializationError::MissingKey("t".to_string()))?;
    if !value.is_finite() || !(1.0..=MAX_TIMESTEP).contains(&value) || value.fract() != 0.0 {
        return Err(SerializationError::InvalidScalar {
            key: "t".to_string(),
            value,
        });
    }
    Ok(value as u64)
}
