//! briny_spectral: custom differentiable operations backed by numerical kernels.
//!
//! Shows how an autodiff engine is extended with operations whose forward pass is
//! an ordinary numerical routine (an FFT, a 2D correlation) and whose backward pass
//! is written by hand.
//!
//! # Features
//!
//! - [`layers::SpectralMagnitude`]: `|rfft2(x)|` with an inverse-FFT backward.
//! - [`layers::Correlate2d`]: valid 2D cross-correlation with a learnable filter.
//! - Explicit forward contexts instead of hidden per-instance state.
//! - Finite-difference gradient checking and `.bpat` parameter persistence.
//!
//! # Modules
//!
//! - [`tensors`] — Core tensor data structures.
//! - [`ops`] — FFT and correlation/convolution kernels.
//! - [`function`] — The `evaluate`/`gradient` interface and saved contexts.
//! - [`layers`] — The two differentiable operations.
//! - [`backprop`] — Closure-style registration, loss and optimizer.
//! - [`gradcheck`] — Numeric verification of backward passes.
//! - [`modelio`] — Saving/loading of learnable parameters.
//!
//! # Example
//!
//! ```rust
//! use briny_spectral::backprop;
//! use briny_spectral::layers::Correlate2d;
//! use briny_spectral::tensors::{Tensor, WithGrad};
//!
//! let mut op = Correlate2d::new(3, 3).unwrap();
//! let input = WithGrad::new(Tensor::zeros(vec![10, 10]));
//! let (out, mut back) = backprop::correlate2d(&op, &input).unwrap();
//! assert_eq!(out.shape, vec![8, 8]);
//!
//! let grads = back(&Tensor::zeros(vec![8, 8])).unwrap();
//! drop(back);
//! op.accumulate(&grads).unwrap();
//! op.step(0.1);
//! ```

pub mod approx;
pub mod backprop;
pub mod error;
pub mod function;
pub mod gradcheck;
pub mod layers;
pub mod modelio;
pub mod ops;
pub mod tensors;

pub use error::{OpError, Result};
