//! A parameterless operation built on the real 2D FFT.

use log::debug;

use crate::error::{OpError, Result};
use crate::function::{Function, Saved};
use crate::ops::fft::{half_width, irfft2, rfft2_magnitude, Spectrum};
use crate::tensors::Ten64;

/// `|rfft2(x)|` with an inverse-FFT backward pass.
///
/// The backward pass returns `irfft2(∂L/∂out)`. That is **not** the gradient of
/// the magnitude (which would also need the phase of the forward spectrum); the
/// simplistic formula is kept on purpose and [`crate::gradcheck`] reports it as
/// failing.
///
/// # Example
/// ```rust
/// use briny_spectral::function::Function;
/// use briny_spectral::layers::SpectralMagnitude;
/// use briny_spectral::tensors::Tensor;
///
/// let op = SpectralMagnitude;
/// let (out, mut saved) = op.evaluate(&Tensor::zeros(vec![8, 8])).unwrap();
/// assert_eq!(out.shape, vec![8, 5]);
/// let grad = op.gradient(&mut saved, &out).unwrap();
/// assert_eq!(grad.shape, vec![8, 8]);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpectralMagnitude;

/// Shape of the forward input, all the backward pass needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpectrumSaved {
    pub height: usize,
    pub width: usize,
}

impl Function for SpectralMagnitude {
    type Saved = SpectrumSaved;
    type Grad = Ten64;

    fn name(&self) -> &'static str {
        "spectral_magnitude"
    }

    fn evaluate(&self, input: &Ten64) -> Result<(Ten64, Saved<SpectrumSaved>)> {
        let (height, width) = input.dims2()?;
        let out = rfft2_magnitude(input)?;
        debug!("{}: forward ({height}, {width}) -> {:?}", self.name(), out.shape);
        Ok((out, Saved::new(SpectrumSaved { height, width })))
    }

    fn gradient(&self, saved: &mut Saved<SpectrumSaved>, grad_output: &Ten64) -> Result<Ten64> {
        let &SpectrumSaved { height, width } = saved
            .peek()
            .ok_or(OpError::no_context(self.name()))?;
        let expected = [height, half_width(width)];
        if grad_output.shape != expected {
            return Err(OpError::shape(
                self.name(),
                format!("{expected:?}"),
                grad_output.shape.clone(),
            ));
        }
        saved.take(self.name())?;

        debug!("{}: backward {:?} -> ({height}, {width})", self.name(), grad_output.shape);
        irfft2(&Spectrum::from_real(grad_output)?, width)
    }
}
