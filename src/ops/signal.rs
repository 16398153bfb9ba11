//! 2D correlation and convolution kernels.
//!
//! # Boundary Modes
//!
//! - [`Mode::Valid`]: only positions where the kernel lies entirely inside the
//!   input. Output `(Ha - Hk + 1, Wa - Wk + 1)`.
//! - [`Mode::Full`]: every position where kernel and input overlap, with zero
//!   padding. Output `(Ha + Hk - 1, Wa + Wk - 1)`.
//!
//! Convolution is correlation with the kernel flipped on both axes. Stride is
//! always 1. Output rows are computed in parallel with `rayon`.

use log::trace;
use rayon::prelude::*;

use crate::error::{OpError, Result};
use crate::tensors::{Ten64, Tensor};

/// Boundary handling for [`correlate2d`] and [`convolve2d`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// No padding; the kernel must fit inside the input.
    #[default]
    Valid,
    /// Zero padding so every overlap contributes.
    Full,
}

impl Mode {
    /// Output shape for an `a`-shaped input and `k`-shaped kernel.
    fn output_dims(self, a: (usize, usize), k: (usize, usize)) -> Option<(usize, usize)> {
        match self {
            Self::Valid => {
                if k.0 > a.0 || k.1 > a.1 {
                    None
                } else {
                    Some((a.0 - k.0 + 1, a.1 - k.1 + 1))
                }
            }
            Self::Full => Some((a.0 + k.0 - 1, a.1 + k.1 - 1)),
        }
    }

    /// Offset between output coordinates and input coordinates.
    const fn padding(self, k: (usize, usize)) -> (usize, usize) {
        match self {
            Self::Valid => (0, 0),
            Self::Full => (k.0 - 1, k.1 - 1),
        }
    }
}

/// 2D cross-correlation: `out[i, j] = Σ a[i + m - ph, j + n - pw] * k[m, n]`.
///
/// `(ph, pw)` is zero in valid mode and `(Hk - 1, Wk - 1)` in full mode; input
/// positions outside `a` read as zero.
///
/// # Errors
/// Fails with [`OpError::ShapeMismatch`] if either operand is not a non-empty 2D
/// tensor, or in valid mode if the kernel is larger than the input on any axis.
///
/// # Example
/// ```rust
/// use briny_spectral::ops::signal::{correlate2d, Mode};
/// use briny_spectral::tensor;
///
/// let a = tensor!([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
/// let k = tensor!([[1.0, 1.0]]);
/// let out = correlate2d(&a, &k, Mode::Valid).unwrap();
/// assert_eq!(out, tensor!([[3.0, 5.0], [9.0, 11.0]]));
/// ```
pub fn correlate2d(a: &Ten64, k: &Ten64, mode: Mode) -> Result<Ten64> {
    let (ha, wa) = a.dims2()?;
    let (hk, wk) = k.dims2()?;
    let (ho, wo) = mode.output_dims((ha, wa), (hk, wk)).ok_or_else(|| {
        OpError::shape(
            "correlate2d",
            format!("a kernel no larger than the input ({ha}, {wa})"),
            vec![hk, wk],
        )
    })?;
    let (ph, pw) = mode.padding((hk, wk));
    trace!("correlate2d {mode:?}: ({ha}, {wa}) ⋆ ({hk}, {wk}) -> ({ho}, {wo})");

    let a_data = &a.data;
    let k_data = &k.data;
    let mut out = vec![0.0f64; ho * wo];

    out.par_chunks_mut(wo).enumerate().for_each(|(i, row)| {
        for (j, cell) in row.iter_mut().enumerate() {
            let mut sum = 0.0;
            for m in 0..hk {
                // input row index, skipping rows that fall into the padding
                let Some(r) = (i + m).checked_sub(ph).filter(|&r| r < ha) else {
                    continue;
                };
                for n in 0..wk {
                    if let Some(c) = (j + n).checked_sub(pw).filter(|&c| c < wa) {
                        sum += a_data[r * wa + c] * k_data[m * wk + n];
                    }
                }
            }
            *cell = sum;
        }
    });

    Ok(Tensor::new(vec![ho, wo], out))
}

/// 2D convolution: correlation of `a` with `k` flipped on both axes.
///
/// # Errors
/// Same as [`correlate2d`].
///
/// # Example
/// ```rust
/// use briny_spectral::ops::signal::{convolve2d, Mode};
/// use briny_spectral::tensor;
///
/// let a = tensor!([[1.0, 2.0], [3.0, 4.0]]);
/// let k = tensor!([[1.0, 1.0], [1.0, 1.0]]);
/// let out = convolve2d(&a, &k, Mode::Full).unwrap();
/// assert_eq!(out, tensor!([[1.0, 3.0, 2.0], [4.0, 10.0, 6.0], [3.0, 7.0, 4.0]]));
/// ```
pub fn convolve2d(a: &Ten64, k: &Ten64, mode: Mode) -> Result<Ten64> {
    correlate2d(a, &k.flip2()?, mode)
}
