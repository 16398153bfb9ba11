//! # Numerical Kernels
//!
//! The general-purpose primitives the differentiable operations are built on.
//! Nothing in here knows about gradients; the layers in [`crate::layers`] combine
//! these kernels into forward/backward pairs.
//!
//! ## Submodules
//!
//! - [`fft`] — Real-input 2D FFT and its inverse (`rustfft`)
//! - [`signal`] — 2D correlation/convolution with `valid` and `full` boundary modes
//!
//! ## Notes
//!
//! - Every kernel validates its operand shapes and returns [`crate::error::OpError`]
//! - Independent rows/columns are processed in parallel with `rayon`
//!
//! Example:
//! ```rust
//! use briny_spectral::ops::{fft, signal};
//! use briny_spectral::tensor;
//!
//! let x = tensor!([[1.0, 0.0, 0.0, 0.0], [0.0, 0.0, 0.0, 0.0]]);
//! let mag = fft::rfft2_magnitude(&x).unwrap();
//! assert_eq!(mag.shape, vec![2, 3]);
//!
//! let k = tensor!([[1.0, 1.0]]);
//! let out = signal::correlate2d(&x, &k, signal::Mode::Valid).unwrap();
//! assert_eq!(out.shape, vec![2, 3]);
//! ```

pub mod fft;
pub mod signal;
