use briny_spectral::approx::approx_eq;
use briny_spectral::backprop::{self, mse_loss, sgd};
use briny_spectral::function::{Function, Saved};
use briny_spectral::gradcheck::{gradcheck, GradCheckOptions};
use briny_spectral::layers::{Correlate2d, CorrelationGrads, Init, SpectralMagnitude};
use briny_spectral::tensor;
use briny_spectral::tensors::{Ten64, Tensor, WithGrad};
use briny_spectral::OpError;
use rand::{rngs::StdRng, Rng, SeedableRng};

fn random_tensor(rng: &mut StdRng, rows: usize, cols: usize) -> Ten64 {
    Tensor::new(
        vec![rows, cols],
        (0..rows * cols).map(|_| rng.random_range(-1.0..1.0)).collect(),
    )
}

#[test]
fn test_spectral_zero_input() {
    let op = SpectralMagnitude;
    let (out, mut saved) = op.evaluate(&Tensor::zeros(vec![8, 8])).unwrap();
    assert_eq!(out, Tensor::zeros(vec![8, 5]));

    let grad = op.gradient(&mut saved, &out).unwrap();
    assert_eq!(grad.shape, vec![8, 8]);
}

#[test]
fn test_spectral_output_is_nonnegative_half_spectrum() {
    let mut rng = StdRng::seed_from_u64(1);
    for (h, w) in [(1, 1), (4, 6), (5, 7), (8, 8), (3, 10)] {
        let x = random_tensor(&mut rng, h, w);
        let (out, mut saved) = SpectralMagnitude.evaluate(&x).unwrap();
        assert_eq!(out.shape, vec![h, w / 2 + 1]);
        assert!(out.data.iter().all(|&v| v >= 0.0));

        let grad = SpectralMagnitude.gradient(&mut saved, &out).unwrap();
        assert_eq!(grad.shape, vec![h, w]);
    }
}

#[test]
fn test_spectral_backward_is_plain_inverse_fft() {
    // a unit DC bin transforms back to a constant 1 / (H * W)
    let (_, mut saved) = SpectralMagnitude.evaluate(&Tensor::zeros(vec![4, 6])).unwrap();
    let mut grad_out = Tensor::zeros(vec![4, 4]);
    grad_out.data[0] = 1.0;
    let grad = SpectralMagnitude.gradient(&mut saved, &grad_out).unwrap();
    assert!(approx_eq(&grad, &Tensor::new(vec![4, 6], vec![1.0 / 24.0; 24])));
}

#[test]
fn test_spectral_backward_errors() {
    let (_, mut saved) = SpectralMagnitude.evaluate(&Tensor::zeros(vec![4, 4])).unwrap();
    let err = SpectralMagnitude.gradient(&mut saved, &Tensor::zeros(vec![4, 4])).unwrap_err();
    assert!(err.is_shape_mismatch());

    // a rejected gradient leaves the context in place
    SpectralMagnitude.gradient(&mut saved, &Tensor::zeros(vec![4, 3])).unwrap();
    let err = SpectralMagnitude.gradient(&mut saved, &Tensor::zeros(vec![4, 3])).unwrap_err();
    assert!(err.is_state());

    let err = SpectralMagnitude.evaluate(&tensor!([1.0, 2.0])).unwrap_err();
    assert!(err.is_shape_mismatch());
}

#[test]
fn test_spectral_gradient_is_not_the_true_gradient() {
    let mut rng = StdRng::seed_from_u64(2);
    let x = random_tensor(&mut rng, 4, 4);
    let report = gradcheck(&SpectralMagnitude, &x, &GradCheckOptions::default()).unwrap();
    assert!(!report.passed);
    assert!(report.first_failure.is_some());
}

#[test]
fn test_correlate_scenario() {
    let op = Correlate2d::new(3, 3).unwrap();
    let (out, mut saved) = op.evaluate(&Tensor::zeros(vec![10, 10])).unwrap();
    assert_eq!(out.shape, vec![8, 8]);

    let grads = op.gradient(&mut saved, &Tensor::zeros(vec![8, 8])).unwrap();
    assert_eq!(grads.input.shape, vec![10, 10]);
    assert_eq!(grads.filter.shape, vec![3, 3]);
    assert_eq!(grads.bias, None);
}

#[test]
fn test_correlate_shapes() {
    let mut rng = StdRng::seed_from_u64(3);
    for (hi, wi, kh, kw) in [(5, 5, 1, 1), (6, 4, 2, 3), (7, 9, 7, 2), (3, 8, 3, 8), (10, 6, 4, 1)] {
        let op = Correlate2d::with_rng(kh, kw, Init::StandardNormal, &mut rng).unwrap();
        let x = random_tensor(&mut rng, hi, wi);
        let (out, mut saved) = op.evaluate(&x).unwrap();
        assert_eq!(out.shape, vec![hi - kh + 1, wi - kw + 1]);

        let g = random_tensor(&mut rng, hi - kh + 1, wi - kw + 1);
        let grads = op.gradient(&mut saved, &g).unwrap();
        assert_eq!(grads.input.shape, vec![hi, wi]);
        assert_eq!(grads.filter.shape, vec![kh, kw]);
    }
}

#[test]
fn test_correlate_gradients_by_hand() {
    let op = Correlate2d::from_filter(tensor!([[1.0, 2.0], [3.0, 4.0]])).unwrap();
    let x = tensor!([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]]);
    let (out, mut saved) = op.evaluate(&x).unwrap();
    assert_eq!(out, tensor!([[37.0, 47.0], [67.0, 77.0]]));

    // asymmetric upstream gradient so correlation and convolution disagree
    let grads = op.gradient(&mut saved, &tensor!([[1.0, 2.0], [3.0, 4.0]])).unwrap();
    assert_eq!(grads.input, tensor!([[1.0, 4.0, 4.0], [6.0, 20.0, 16.0], [9.0, 24.0, 16.0]]));
    assert_eq!(grads.filter, tensor!([[37.0, 47.0], [67.0, 77.0]]));
    assert_ne!(grads.filter, tensor!([[77.0, 67.0], [47.0, 37.0]]));
}

#[test]
fn test_correlate_passes_gradcheck() {
    let mut rng = StdRng::seed_from_u64(4);
    let op = Correlate2d::with_rng(3, 2, Init::StandardNormal, &mut rng)
        .unwrap()
        .with_bias(0.3);
    let x = random_tensor(&mut rng, 6, 5);
    let report = gradcheck(&op, &x, &GradCheckOptions::default()).unwrap();
    assert!(report.passed, "max error {}", report.max_abs_error);
    assert_eq!(report.analytic.shape, vec![4 * 4, 6 * 5]);
}

#[test]
fn test_correlate_backward_twice_is_state_error() {
    let op = Correlate2d::new(2, 2).unwrap();
    let (_, mut saved) = op.evaluate(&Tensor::zeros(vec![4, 4])).unwrap();
    op.gradient(&mut saved, &Tensor::zeros(vec![3, 3])).unwrap();
    let err = op.gradient(&mut saved, &Tensor::zeros(vec![3, 3])).unwrap_err();
    assert!(matches!(err, OpError::State { op: "correlate2d", .. }));

    let err = op.gradient(&mut Saved::empty(), &Tensor::zeros(vec![3, 3])).unwrap_err();
    assert!(err.is_state());
}

#[test]
fn test_correlate_shape_errors() {
    assert!(Correlate2d::new(0, 3).unwrap_err().is_shape_mismatch());

    let op = Correlate2d::new(3, 3).unwrap();
    assert!(op.evaluate(&Tensor::zeros(vec![2, 5])).unwrap_err().is_shape_mismatch());
    assert!(op.evaluate(&Tensor::zeros(vec![0, 5])).unwrap_err().is_shape_mismatch());

    let (_, mut saved) = op.evaluate(&Tensor::zeros(vec![5, 5])).unwrap();
    let err = op.gradient(&mut saved, &Tensor::zeros(vec![2, 3])).unwrap_err();
    assert!(err.is_shape_mismatch());
    assert!(saved.is_live());
}

#[test]
fn test_correlate_does_not_mutate_filter() {
    let mut rng = StdRng::seed_from_u64(5);
    let op = Correlate2d::with_rng(2, 2, Init::StandardNormal, &mut rng).unwrap();
    let before = op.filter().value.clone();
    let x = random_tensor(&mut rng, 4, 4);
    let (out, mut saved) = op.evaluate(&x).unwrap();
    op.gradient(&mut saved, &out).unwrap();
    assert_eq!(op.filter().value, before);
    assert_eq!(op.filter().grad, Tensor::zeros(vec![2, 2]));
}

#[test]
fn test_correlate_bias() {
    let op = Correlate2d::from_filter(tensor!([[1.0]])).unwrap().with_bias(2.0);
    let (out, mut saved) = op.evaluate(&tensor!([[1.0, 2.0], [3.0, 4.0]])).unwrap();
    assert_eq!(out, tensor!([[3.0, 4.0], [5.0, 6.0]]));

    let grads = op.gradient(&mut saved, &tensor!([[1.0, 2.0], [3.0, 4.0]])).unwrap();
    assert_eq!(grads.bias, Some(10.0));
}

#[test]
fn test_seeded_init_is_reproducible() {
    let a = Correlate2d::with_rng(3, 3, Init::default(), &mut StdRng::seed_from_u64(9)).unwrap();
    let b = Correlate2d::with_rng(3, 3, Init::default(), &mut StdRng::seed_from_u64(9)).unwrap();
    assert_eq!(a.parameters(), b.parameters());

    let err = Correlate2d::with_rng(
        3,
        3,
        Init::Normal { mean: 0.0, std: -1.0 },
        &mut StdRng::seed_from_u64(9),
    )
    .unwrap_err();
    assert!(matches!(err, OpError::Config(_)));
}

#[test]
fn test_normal_init_validates_parameters() {
    let mut rng = StdRng::seed_from_u64(4);
    for init in [
        Init::Normal { mean: 0.0, std: -0.5 },
        Init::Normal { mean: 0.0, std: f64::NAN },
        Init::Normal { mean: 0.0, std: f64::INFINITY },
        Init::Normal { mean: f64::NAN, std: 1.0 },
    ] {
        let err = Correlate2d::with_rng(2, 2, init, &mut rng).unwrap_err();
        assert!(matches!(err, OpError::Config(_)), "{init:?} gave {err:?}");
    }

    // zero spread is a constant filter
    let op = Correlate2d::with_rng(2, 3, Init::Normal { mean: 0.25, std: 0.0 }, &mut rng).unwrap();
    assert_eq!(op.filter().value, Tensor::new(vec![2, 3], vec![0.25; 6]));
}

#[test]
fn test_accumulate_rejects_mismatched_bias() {
    let grads = CorrelationGrads {
        input: Tensor::zeros(vec![3, 3]),
        filter: tensor!([[1.0, 1.0], [1.0, 1.0]]),
        bias: Some(1.0),
    };

    let mut op = Correlate2d::from_filter(tensor!([[1.0, 2.0], [3.0, 4.0]])).unwrap();
    assert!(op.accumulate(&grads).unwrap_err().is_state());
    assert_eq!(op.filter().grad, Tensor::zeros(vec![2, 2]));

    let mut op = op.with_bias(0.5);
    op.accumulate(&grads).unwrap();
    assert_eq!(op.bias().unwrap().grad, 1.0);

    let no_bias = CorrelationGrads { bias: None, ..grads };
    assert!(op.accumulate(&no_bias).unwrap_err().is_state());
    assert_eq!(op.filter().grad, tensor!([[1.0, 1.0], [1.0, 1.0]]));
    assert_eq!(op.bias().unwrap().grad, 1.0);
}

#[test]
fn test_contexts_are_per_call() {
    let mut rng = StdRng::seed_from_u64(6);
    let op = Correlate2d::with_rng(2, 2, Init::StandardNormal, &mut rng).unwrap();
    let a = random_tensor(&mut rng, 3, 3);
    let b = random_tensor(&mut rng, 5, 4);

    // two forwards before any backward keep independent contexts
    let (_, mut saved_a) = op.evaluate(&a).unwrap();
    let (_, mut saved_b) = op.evaluate(&b).unwrap();
    let grads_b = op.gradient(&mut saved_b, &Tensor::zeros(vec![4, 3])).unwrap();
    let grads_a = op.gradient(&mut saved_a, &Tensor::zeros(vec![2, 2])).unwrap();
    assert_eq!(grads_a.input.shape, vec![3, 3]);
    assert_eq!(grads_b.input.shape, vec![5, 4]);

    std::thread::scope(|s| {
        for rows in 2..6 {
            let op = &op;
            s.spawn(move || {
                let x = Tensor::zeros(vec![rows, 4]);
                let (out, mut saved) = op.evaluate(&x).unwrap();
                let grads = op.gradient(&mut saved, &out).unwrap();
                assert_eq!(grads.input.shape, vec![rows, 4]);
            });
        }
    });
}

#[test]
fn test_backprop_closures() {
    let input = WithGrad::new(Tensor::zeros(vec![8, 8]));
    let (out, mut back) = backprop::spectral_magnitude(&input).unwrap();
    assert_eq!(out.shape, vec![8, 5]);
    assert_eq!(back(&out).unwrap().shape, vec![8, 8]);
    assert!(back(&out).unwrap_err().is_state());

    let op = Correlate2d::new(3, 3).unwrap();
    let mut x = WithGrad::new(Tensor::zeros(vec![10, 10]));
    let (out, mut back) = backprop::correlate2d(&op, &x).unwrap();
    let grads = back(&Tensor::new(out.shape.clone(), vec![1.0; 64])).unwrap();
    assert!(back(&out).unwrap_err().is_state());

    x.accumulate(&grads.input).unwrap();
    assert_eq!(x.grad.shape, vec![10, 10]);
}

#[test]
fn test_mse_loss_and_backprop() {
    let pred = tensor!([1.0, 2.0]);
    let target = tensor!([1.5, 2.5]);
    let (loss, backward) = mse_loss(&pred, &target).unwrap();
    assert_eq!(loss, 0.25);
    assert_eq!(backward(1.0).data, vec![-0.5, -0.5]);

    assert!(matches!(mse_loss(&pred, &tensor!([1.0])), Err(e) if e.is_shape_mismatch()));
}

#[test]
fn test_sgd() {
    let mut w = WithGrad {
        value: tensor!([1.0, 2.0]),
        grad: tensor!([0.1, 0.2]),
    };
    sgd(&mut w, 0.5);
    assert_eq!(w.value.data, vec![0.95, 1.9]);
    assert_eq!(w.grad.data, vec![0.0, 0.0]);
}

#[test]
fn test_training_reduces_loss() {
    let mut rng = StdRng::seed_from_u64(8);
    let target_op = Correlate2d::from_filter(tensor!([[0.0, 1.0], [-1.0, 0.5]])).unwrap();
    let mut op = Correlate2d::with_rng(2, 2, Init::Normal { mean: 0.0, std: 0.1 }, &mut rng)
        .unwrap()
        .with_bias(0.0);
    let x = random_tensor(&mut rng, 8, 8);
    let (target, _) = target_op.evaluate(&x).unwrap();

    let mut losses = Vec::new();
    for _ in 0..100 {
        let (pred, mut saved) = op.evaluate(&x).unwrap();
        let (loss, loss_back) = mse_loss(&pred, &target).unwrap();
        let grads = op.gradient(&mut saved, &loss_back(1.0)).unwrap();
        op.accumulate(&grads).unwrap();
        op.step(0.2);
        losses.push(loss);
    }

    assert!(losses[99] < losses[0] * 0.01, "loss went {} -> {}", losses[0], losses[99]);
    assert_eq!(op.filter().grad, Tensor::zeros(vec![2, 2]));
}
