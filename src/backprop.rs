//! Differentiable operations in closure form, plus loss and optimizer primitives.
//!
//! # Autograd Pattern
//!
//! Each operation follows the same pattern:
//! 1. **Inputs** are references to `WithGrad<Ten64>` (or a plain `Ten64` for [`register`]).
//! 2. **Forward Pass** computes an output `Ten64`.
//! 3. **Backward Pass** is returned as a boxed closure owning the saved context.
//! 4. **Gradient Application** feeds the closure's result into
//!    [`WithGrad::accumulate`] or a layer's own `accumulate`.
//!
//! The backward closures are `FnMut`: the first call consumes the saved context,
//! any further call fails with [`crate::error::OpError::State`].
//!
//! ## Usage Guidelines
//!
//! - Operations return `Err` on shape mismatches rather than panicking.
//! - [`sgd`] is the only place parameters are mutated.

use rayon::prelude::*;

use crate::error::{OpError, Result};
use crate::function::Function;
use crate::layers::{CorrelationGrads, Correlate2d, SpectralMagnitude};
use crate::tensors::{Ten64, Tensor, WithGrad};

/// A registered backward pass producing `G` from `∂L/∂output`.
pub type BackFn<'a, G> = dyn FnMut(&Ten64) -> Result<G> + Send + 'a;

/// Runs `op` forward on `input` and registers its backward pass as a closure.
///
/// # Returns
/// - `out`: the forward output
/// - `back`: closure mapping `∂L/∂out` to the op's gradients; usable once
///
/// # Errors
/// Propagates the forward pass's [`OpError::ShapeMismatch`].
pub fn register<'a, F>(op: &'a F, input: &Ten64) -> Result<(Ten64, Box<BackFn<'a, F::Grad>>)>
where
    F: Function + Sync,
    F::Saved: Send + 'a,
{
    let (out, mut saved) = op.evaluate(input)?;
    let back = move |grad_output: &Ten64| op.gradient(&mut saved, grad_output);
    Ok((out, Box::new(back)))
}

/// `|rfft2(input)|` with its (simplistic) inverse-FFT backward pass.
///
/// # Example
/// ```rust
/// use briny_spectral::backprop::spectral_magnitude;
/// use briny_spectral::tensors::{Tensor, WithGrad};
///
/// let input = WithGrad::new(Tensor::zeros(vec![8, 8]));
/// let (out, mut back) = spectral_magnitude(&input).unwrap();
/// assert!(out.data.iter().all(|&v| v == 0.0));
///
/// let grad_in = back(&out).unwrap();
/// assert_eq!(grad_in.shape, vec![8, 8]);
/// assert!(back(&out).unwrap_err().is_state());
/// ```
///
/// # Errors
/// Fails with [`OpError::ShapeMismatch`] unless the input is a non-empty 2D tensor.
pub fn spectral_magnitude(input: &WithGrad<Ten64>) -> Result<(Ten64, Box<BackFn<'static, Ten64>>)> {
    register(&SpectralMagnitude, &input.value)
}

/// Valid 2D cross-correlation of `input` with `op`'s filter.
///
/// # Returns
/// - `out`: tensor of shape `(Hi - kh + 1, Wi - kw + 1)`
/// - `back`: closure mapping `∂L/∂out` to `∂L/∂input`, `∂L/∂filter` (and `∂L/∂bias`)
///
/// # Errors
/// Fails with [`OpError::ShapeMismatch`] if the input is smaller than the filter.
pub fn correlate2d<'a>(
    op: &'a Correlate2d,
    input: &WithGrad<Ten64>,
) -> Result<(Ten64, Box<BackFn<'a, CorrelationGrads>>)> {
    register(op, &input.value)
}

/// Computes Mean Squared Error (MSE) loss: `mean((prediction - target)^2)`.
///
/// # Returns
/// - Scalar loss value
/// - Closure that maps `dL/dloss` into a gradient tensor shaped like `prediction`
///
/// # Errors
/// Fails with [`OpError::ShapeMismatch`] if shapes of `prediction` and `target` differ
/// or the tensors are empty.
pub fn mse_loss(prediction: &Ten64, target: &Ten64) -> Result<(f64, impl Fn(f64) -> Ten64 + use<>)> {
    if prediction.shape != target.shape || prediction.is_empty() {
        return Err(OpError::shape(
            "mse_loss",
            format!("a non-empty tensor of shape {:?}", target.shape),
            prediction.shape.clone(),
        ));
    }

    #[allow(clippy::cast_precision_loss)]
    let n = prediction.len() as f64;

    let loss = prediction
        .data
        .par_iter()
        .zip(&target.data)
        .map(|(&y, &t)| (y - t).powi(2))
        .sum::<f64>()
        / n;

    let shape = prediction.shape.clone();
    let pred_data = prediction.data.clone();
    let target_data = target.data.clone();

    let back = move |grad_output: f64| {
        let grad: Vec<f64> = pred_data
            .par_iter()
            .zip(&target_data)
            .map(|(&y, &t)| 2.0 * (y - t) * grad_output / n)
            .collect();

        Tensor::new(shape.clone(), grad)
    };

    Ok((loss, back))
}

/// Performs an in-place Stochastic Gradient Descent (SGD) update.
///
/// Applies: `param = param - learning_rate * gradient` and then zeros gradient.
pub fn sgd(w: &mut WithGrad<Ten64>, lr: f64) {
    for (param, grad) in w.value.data.iter_mut().zip(&w.grad.data) {
        *param -= lr * *grad;
    }
    w.zero_grad();
}
