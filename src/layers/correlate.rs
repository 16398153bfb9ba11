//! A 2D cross-correlation with a learnable filter.

use log::debug;
use rand::Rng;
use rand_distr::{Distribution, Normal, StandardNormal};

use crate::error::{OpError, Result};
use crate::function::{Function, InputGradient, Saved};
use crate::ops::signal::{convolve2d, correlate2d, Mode};
use crate::tensors::{Ten64, Tensor, WithGrad};

/// How a freshly constructed filter is filled.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Init {
    /// Samples from `N(0, 1)`.
    #[default]
    StandardNormal,
    /// Samples from `N(mean, std²)`. Both values must be finite and `std`
    /// non-negative; `std == 0` fills the filter with `mean`.
    Normal { mean: f64, std: f64 },
}

impl Init {
    fn sample<R: Rng + ?Sized>(self, rng: &mut R, len: usize) -> Result<Vec<f64>> {
        match self {
            Self::StandardNormal => Ok((0..len)
                .map(|_| -> f64 { StandardNormal.sample(rng) })
                .collect()),
            Self::Normal { mean, std } => {
                // rand_distr only rejects a non-finite std
                if !mean.is_finite() || !(std.is_finite() && std >= 0.0) {
                    return Err(OpError::Config(format!(
                        "normal init needs a finite mean and a finite, non-negative std (got mean {mean}, std {std})"
                    )));
                }
                let dist = Normal::new(mean, std)
                    .map_err(|e| OpError::Config(format!("normal init: {e}")))?;
                Ok((0..len).map(|_| dist.sample(rng)).collect())
            }
        }
    }
}

/// "Valid" 2D cross-correlation of the input with a learnable `(kh, kw)` filter,
/// plus an optional learnable scalar bias.
///
/// - Forward: `out[i, j] = Σ input[i + m, j + n] * filter[m, n] (+ bias)`,
///   shape `(Hi - kh + 1, Wi - kw + 1)`.
/// - Backward: `∂L/∂input = convolve_full(∂L/∂out, filter)`,
///   `∂L/∂filter = correlate_valid(input, ∂L/∂out)`, `∂L/∂bias = Σ ∂L/∂out`.
///
/// Forward and backward only read the parameters; updating them is left to an
/// optimizer such as [`Correlate2d::step`].
///
/// # Example
/// ```rust
/// use briny_spectral::function::Function;
/// use briny_spectral::layers::Correlate2d;
/// use briny_spectral::tensors::Tensor;
///
/// let op = Correlate2d::new(3, 3).unwrap();
/// let (out, mut saved) = op.evaluate(&Tensor::zeros(vec![10, 10])).unwrap();
/// assert_eq!(out.shape, vec![8, 8]);
///
/// let grads = op.gradient(&mut saved, &Tensor::zeros(vec![8, 8])).unwrap();
/// assert_eq!(grads.input.shape, vec![10, 10]);
/// assert_eq!(grads.filter.shape, vec![3, 3]);
/// ```
#[derive(Debug, Clone)]
pub struct Correlate2d {
    filter: WithGrad<Ten64>,
    bias: Option<WithGrad<f64>>,
}

/// The tensors a forward pass keeps for its backward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationSaved {
    pub input: Ten64,
    pub filter: Ten64,
    pub has_bias: bool,
}

/// Gradients of a [`Correlate2d`] backward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationGrads {
    /// `∂L/∂input`, shaped like the forward input.
    pub input: Ten64,
    /// `∂L/∂filter`, shaped like the filter.
    pub filter: Ten64,
    /// `∂L/∂bias`, present when the op has a bias.
    pub bias: Option<f64>,
}

impl InputGradient for CorrelationGrads {
    fn input_grad(&self) -> &Ten64 {
        &self.input
    }
}

impl Correlate2d {
    /// Creates a `(kh, kw)` filter drawn from a standard normal distribution.
    ///
    /// # Errors
    /// Fails with [`OpError::ShapeMismatch`] if `kh` or `kw` is zero.
    pub fn new(kh: usize, kw: usize) -> Result<Self> {
        Self::with_rng(kh, kw, Init::default(), &mut rand::rng())
    }

    /// Creates a `(kh, kw)` filter using `init` and a caller-supplied RNG.
    ///
    /// # Errors
    /// Fails with [`OpError::ShapeMismatch`] if `kh` or `kw` is zero and with
    /// [`OpError::Config`] if `init` has a non-finite mean or a negative or
    /// non-finite standard deviation.
    pub fn with_rng<R: Rng + ?Sized>(kh: usize, kw: usize, init: Init, rng: &mut R) -> Result<Self> {
        if kh == 0 || kw == 0 {
            return Err(OpError::shape(
                "correlate2d",
                "a kernel with positive height and width".to_string(),
                vec![kh, kw],
            ));
        }
        let data = init.sample(rng, kh * kw)?;
        Ok(Self {
            filter: WithGrad::new(Tensor::new(vec![kh, kw], data)),
            bias: None,
        })
    }

    /// Wraps an existing filter.
    ///
    /// # Errors
    /// Fails with [`OpError::ShapeMismatch`] unless `filter` is a non-empty 2D tensor.
    pub fn from_filter(filter: Ten64) -> Result<Self> {
        filter.dims2()?;
        Ok(Self {
            filter: WithGrad::new(filter),
            bias: None,
        })
    }

    /// Rebuilds an op from the tensors returned by [`Correlate2d::parameters`].
    ///
    /// # Errors
    /// Fails with [`OpError::ShapeMismatch`] if there is no filter, the filter is not
    /// 2D, or a bias tensor is present but does not hold exactly one value.
    pub fn from_parameters(params: &[Ten64]) -> Result<Self> {
        match params {
            [filter] => Self::from_filter(filter.clone()),
            [filter, bias] if bias.len() == 1 => {
                Ok(Self::from_filter(filter.clone())?.with_bias(bias.data[0]))
            }
            _ => Err(OpError::shape(
                "correlate2d",
                "a filter and at most one scalar bias".to_string(),
                params.iter().map(Tensor::len).collect(),
            )),
        }
    }

    /// Enables a learnable scalar bias starting at `value`.
    #[must_use]
    pub fn with_bias(mut self, value: f64) -> Self {
        self.bias = Some(WithGrad::scalar(value));
        self
    }

    /// The learnable filter and its accumulated gradient.
    pub const fn filter(&self) -> &WithGrad<Ten64> {
        &self.filter
    }

    /// The learnable bias and its accumulated gradient, if enabled.
    pub const fn bias(&self) -> Option<&WithGrad<f64>> {
        self.bias.as_ref()
    }

    /// `(kh, kw)`.
    pub fn kernel_dims(&self) -> (usize, usize) {
        (self.filter.value.shape[0], self.filter.value.shape[1])
    }

    /// Current parameter values: the filter, then the bias as a `(1, 1)` tensor.
    pub fn parameters(&self) -> Vec<Ten64> {
        let mut params = vec![self.filter.value.clone()];
        if let Some(bias) = &self.bias {
            params.push(Tensor::new(vec![1, 1], vec![bias.value]));
        }
        params
    }

    /// Adds a backward pass's parameter gradients into the accumulated gradients.
    ///
    /// Nothing is accumulated when an error is returned.
    ///
    /// # Errors
    /// - [`OpError::State`] if `grads` came from an op with a different bias setting
    /// - [`OpError::ShapeMismatch`] if `grads.filter` is not filter-shaped
    pub fn accumulate(&mut self, grads: &CorrelationGrads) -> Result<()> {
        if self.bias.is_some() != grads.bias.is_some() {
            return Err(OpError::State {
                op: "correlate2d",
                reason: "bias gradient does not match the op's bias",
            });
        }
        self.filter.accumulate(&grads.filter)?;
        if let (Some(bias), Some(g)) = (&mut self.bias, grads.bias) {
            bias.grad += g;
        }
        Ok(())
    }

    /// One SGD step on every parameter, then clears the accumulated gradients.
    pub fn step(&mut self, lr: f64) {
        crate::backprop::sgd(&mut self.filter, lr);
        if let Some(bias) = &mut self.bias {
            bias.value -= lr * bias.grad;
            bias.grad = 0.0;
        }
    }
}

impl Function for Correlate2d {
    type Saved = CorrelationSaved;
    type Grad = CorrelationGrads;

    fn name(&self) -> &'static str {
        "correlate2d"
    }

    fn evaluate(&self, input: &Ten64) -> Result<(Ten64, Saved<CorrelationSaved>)> {
        input.dims2()?;
        let mut out = correlate2d(input, &self.filter.value, Mode::Valid)?;
        if let Some(bias) = &self.bias {
            for v in &mut out.data {
                *v += bias.value;
            }
        }
        debug!(
            "{}: forward {:?} ⋆ {:?} -> {:?}",
            self.name(),
            input.shape,
            self.filter.value.shape,
            out.shape
        );

        let saved = CorrelationSaved {
            input: input.clone(),
            filter: self.filter.value.clone(),
            has_bias: self.bias.is_some(),
        };
        Ok((out, Saved::new(saved)))
    }

    fn gradient(
        &self,
        saved: &mut Saved<CorrelationSaved>,
        grad_output: &Ten64,
    ) -> Result<CorrelationGrads> {
        let ctx = saved.peek().ok_or(OpError::no_context(self.name()))?;
        let (hi, wi) = ctx.input.dims2()?;
        let (kh, kw) = ctx.filter.dims2()?;
        let expected = [(hi + 1).saturating_sub(kh), (wi + 1).saturating_sub(kw)];
        if grad_output.shape != expected {
            return Err(OpError::shape(
                self.name(),
                format!("{expected:?}"),
                grad_output.shape.clone(),
            ));
        }
        let ctx = saved.take(self.name())?;

        let input = convolve2d(grad_output, &ctx.filter, Mode::Full)?;
        let filter = correlate2d(&ctx.input, grad_output, Mode::Valid)?;
        let bias = ctx.has_bias.then(|| grad_output.sum());
        debug!(
            "{}: backward {:?} -> input {:?}, filter {:?}",
            self.name(),
            grad_output.shape,
            input.shape,
            filter.shape
        );

        Ok(CorrelationGrads {
            input,
            filter,
            bias,
        })
    }
}
