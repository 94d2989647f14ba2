//! End-to-end training loops on a convex quadratic
//!
//! loss(w) = 0.5 * sum((w - target)^2), so the gradient is `w - target`.

use rtorch_optim::optim::{
    AdadeltaConfig, AdagradConfig, AdamConfig, Method, MomentumConfig, SgdConfig,
};
use rtorch_optim::tensor::Tensor;
use rtorch_optim::{Optimizer, Parameter};

const TARGET: [f32; 6] = [1.0, -2.0, 0.5, 3.0, -0.25, 0.0];

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn gradient(w: &Tensor) -> Tensor {
    let values = w.to_vec().iter().zip(TARGET).map(|(w, t)| w - t).collect();
    Tensor::from_vec(&[2, 3], values).unwrap()
}

fn loss(w: &Tensor) -> f32 {
    w.to_vec()
        .iter()
        .zip(TARGET)
        .map(|(w, t)| 0.5 * (w - t) * (w - t))
        .sum()
}

fn train(method: Method, steps: usize, parallel: bool) -> (Vec<Tensor>, Optimizer) {
    let params = vec![
        Parameter::new("w0", Tensor::from_vec(&[2, 3], vec![0.0; 6]).unwrap()),
        Parameter::new("w1", Tensor::from_vec(&[2, 3], vec![5.0; 6]).unwrap()),
        Parameter::new("w2", Tensor::from_vec(&[2, 3], vec![-4.0; 6]).unwrap()),
    ];
    let tensors: Vec<Tensor> = params.iter().map(|p| p.tensor().clone()).collect();
    let mut opt = Optimizer::new(params, method).unwrap().with_parallel(parallel);

    for _ in 0..steps {
        let grads: Vec<Tensor> = tensors.iter().map(gradient).collect();
        opt.step(&grads).unwrap();
    }
    (tensors, opt)
}

fn methods() -> Vec<(Method, usize)> {
    vec![
        (Method::GradientDescent(SgdConfig { lr: 0.1 }), 200),
        (
            Method::Momentum(MomentumConfig {
                lr: 0.05,
                momentum: 0.9,
            }),
            300,
        ),
        (
            Method::Adagrad(AdagradConfig {
                lr: 1.0,
                epsilon: 1e-6,
            }),
            300,
        ),
        (
            Method::Adadelta(AdadeltaConfig {
                rho: 0.9,
                epsilon: 1e-2,
            }),
            1000,
        ),
        (
            Method::Adam(AdamConfig {
                lr: 0.1,
                ..AdamConfig::default()
            }),
            500,
        ),
    ]
}

#[test]
fn test_every_method_reduces_quadratic_loss() {
    init_logging();
    for (method, steps) in methods() {
        let start: f32 = train(method, 0, false).0.iter().map(loss).sum();
        let (tensors, opt) = train(method, steps, false);
        let end: f32 = tensors.iter().map(loss).sum();

        assert_eq!(opt.steps(), steps as u64);
        assert!(
            end < 0.05 * start,
            "{} only reduced loss from {} to {}",
            method,
            start,
            end
        );
    }
}

#[test]
fn test_parallel_dispatch_is_bit_identical() {
    init_logging();
    for (method, steps) in methods() {
        let (sequential, seq_opt) = train(method, steps / 4, false);
        let (parallel, par_opt) = train(method, steps / 4, true);

        for (a, b) in sequential.iter().zip(&parallel) {
            assert_eq!(a.to_vec(), b.to_vec(), "{} diverged", method.name());
        }
        assert_eq!(seq_opt.state_dict(), par_opt.state_dict());
    }
}

#[test]
fn test_learning_rate_change_takes_effect_next_step() {
    init_logging();
    let (tensors, mut opt) = train(Method::GradientDescent(SgdConfig { lr: 0.1 }), 3, false);
    opt.set_learning_rate(0.0).unwrap();

    let frozen: Vec<Vec<f32>> = tensors.iter().map(Tensor::to_vec).collect();
    let grads: Vec<Tensor> = tensors.iter().map(gradient).collect();
    opt.step(&grads).unwrap();

    let after: Vec<Vec<f32>> = tensors.iter().map(Tensor::to_vec).collect();
    assert_eq!(frozen, after);
}
