//! Custom differentiable operations.
//!
//! - [`SpectralMagnitude`] — parameterless, `|rfft2(x)|` with an inverse-FFT backward
//! - [`Correlate2d`] — valid 2D cross-correlation with a learnable filter
//!
//! Both implement [`crate::function::Function`]; use [`crate::backprop`] to get
//! the closure form.

mod correlate;
mod spectral;

pub use correlate::{CorrelationGrads, CorrelationSaved, Correlate2d, Init};
pub use spectral::{SpectralMagnitude, SpectrumSaved};
