//! Finite-difference gradient checking.
//!
//! [`gradcheck`] builds two Jacobians of an operation's output with respect to its
//! input: the analytic one, one row per output element by feeding a one-hot
//! `∂L/∂out` through [`Function::gradient`], and a numeric one from central
//! differences. Entry `(i, j)` passes when
//! `|analytic - numeric| <= atol + rtol * |numeric|`.
//!
//! # Example
//! ```rust
//! use briny_spectral::gradcheck::{gradcheck, GradCheckOptions};
//! use briny_spectral::layers::Correlate2d;
//! use briny_spectral::tensor;
//!
//! let op = Correlate2d::from_filter(tensor!([[1.0, -2.0], [0.5, 3.0]])).unwrap();
//! let input = tensor!([[0.1, 0.7, -0.3], [1.2, -0.8, 0.4], [0.9, 0.2, -1.1]]);
//! let report = gradcheck(&op, &input, &GradCheckOptions::default()).unwrap();
//! assert!(report.passed);
//! ```

use log::{debug, warn};

use crate::error::{OpError, Result};
use crate::function::{Function, InputGradient};
use crate::tensors::{Ten64, Tensor};

/// Tolerances for [`gradcheck`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradCheckOptions {
    /// Perturbation used for central differences.
    pub eps: f64,
    /// Absolute tolerance.
    pub atol: f64,
    /// Relative tolerance, scaled by the numeric entry.
    pub rtol: f64,
}

impl Default for GradCheckOptions {
    fn default() -> Self {
        Self {
            eps: 1e-6,
            atol: 1e-5,
            rtol: 1e-3,
        }
    }
}

/// Outcome of a [`gradcheck`] run.
#[derive(Debug, Clone, PartialEq)]
pub struct GradCheckReport {
    /// Whether every Jacobian entry was within tolerance.
    pub passed: bool,
    /// Largest `|analytic - numeric|` over all entries.
    pub max_abs_error: f64,
    /// `(output index, input index)` of the first failing entry.
    pub first_failure: Option<(usize, usize)>,
    /// Analytic Jacobian, shape `(outputs, inputs)`.
    pub analytic: Ten64,
    /// Numeric Jacobian, shape `(outputs, inputs)`.
    pub numeric: Ten64,
}

/// Compares `op`'s backward pass against central finite differences at `input`.
///
/// # Errors
/// Propagates any error from the operation, and fails with
/// [`OpError::ShapeMismatch`] if the reported input gradient is not shaped like
/// `input`.
pub fn gradcheck<F>(op: &F, input: &Ten64, opts: &GradCheckOptions) -> Result<GradCheckReport>
where
    F: Function,
    F::Saved: Clone,
{
    let (out, saved) = op.evaluate(input)?;
    let n_out = out.len();
    let n_in = input.len();
    debug!("gradcheck {}: {n_out} outputs × {n_in} inputs", op.name());

    let mut numeric = vec![0.0f64; n_out * n_in];
    let mut probe = input.clone();
    for j in 0..n_in {
        let orig = probe.data[j];
        probe.data[j] = orig + opts.eps;
        let (plus, _) = op.evaluate(&probe)?;
        probe.data[j] = orig - opts.eps;
        let (minus, _) = op.evaluate(&probe)?;
        probe.data[j] = orig;

        for i in 0..n_out {
            numeric[i * n_in + j] = (plus.data[i] - minus.data[i]) / (2.0 * opts.eps);
        }
    }

    let mut analytic = vec![0.0f64; n_out * n_in];
    let mut one_hot = out.zeros_like();
    for (i, row) in analytic.chunks_mut(n_in).enumerate() {
        one_hot.data[i] = 1.0;
        let grads = op.gradient(&mut saved.clone(), &one_hot)?;
        one_hot.data[i] = 0.0;

        let g = grads.input_grad();
        if g.shape != input.shape {
            return Err(OpError::shape(
                "gradcheck",
                format!("{:?}", input.shape),
                g.shape.clone(),
            ));
        }
        row.copy_from_slice(&g.data);
    }

    let mut max_abs_error = 0.0f64;
    let mut first_failure = None;
    for (idx, (a, n)) in analytic.iter().zip(&numeric).enumerate() {
        let err = (a - n).abs();
        max_abs_error = max_abs_error.max(err);
        if first_failure.is_none() && err > opts.atol + opts.rtol * n.abs() {
            first_failure = Some((idx / n_in, idx % n_in));
        }
    }

    let passed = first_failure.is_none();
    if let Some((i, j)) = first_failure {
        warn!(
            "gradcheck {}: jacobian mismatch at output {i}, input {j} (analytic {}, numeric {}); max error {max_abs_error:e}",
            op.name(),
            analytic[i * n_in + j],
            numeric[i * n_in + j],
        );
    }

    Ok(GradCheckReport {
        passed,
        max_abs_error,
        first_failure,
        analytic: Tensor::new(vec![n_out, n_in], analytic),
        numeric: Tensor::new(vec![n_out, n_in], numeric),
    })
}
