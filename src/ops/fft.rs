//! Real-input 2D discrete Fourier transforms.
//!
//! The forward transform keeps only the non-redundant half of the last axis
//! (`W/2 + 1` bins), the inverse rebuilds the Hermitian half before transforming
//! back. Both use [`rustfft`] plans and process independent rows/columns with
//! `rayon`.
//!
//! Normalisation follows the usual "backward" convention: the forward transform is
//! unscaled and the inverse divides by `H * W`.

use std::sync::Arc;

use log::trace;
use num_complex::Complex64;
use rayon::prelude::*;
use rustfft::{Fft, FftPlanner};

use crate::error::{OpError, Result};
use crate::tensors::{Ten64, Tensor};

/// A row-major complex half-spectrum of shape `(rows, cols)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<Complex64>,
}

impl Spectrum {
    /// Interprets a real tensor as a spectrum with zero imaginary part.
    ///
    /// # Errors
    /// Fails with [`OpError::ShapeMismatch`] unless `t` is a non-empty 2D tensor.
    pub fn from_real(t: &Ten64) -> Result<Self> {
        let (rows, cols) = t.dims2()?;
        Ok(Self {
            rows,
            cols,
            data: t.data.iter().map(|&re| Complex64::new(re, 0.0)).collect(),
        })
    }

    /// Elementwise modulus `|z|`.
    pub fn magnitude(&self) -> Ten64 {
        Tensor::new(
            vec![self.rows, self.cols],
            self.data.par_iter().map(|z| z.norm()).collect(),
        )
    }
}

/// Number of bins kept by a real transform of length `width`.
#[inline]
pub const fn half_width(width: usize) -> usize {
    width / 2 + 1
}

/// Applies `fft` in place to every column of a row-major `rows × cols` buffer.
fn transform_columns(data: &mut [Complex64], rows: usize, cols: usize, fft: &Arc<dyn Fft<f64>>) {
    let mut columns = vec![Complex64::default(); rows * cols];
    for r in 0..rows {
        for c in 0..cols {
            columns[c * rows + r] = data[r * cols + c];
        }
    }

    columns.par_chunks_mut(rows).for_each(|col| fft.process(col));

    for c in 0..cols {
        for r in 0..rows {
            data[r * cols + c] = columns[c * rows + r];
        }
    }
}

/// Forward real 2D FFT of an `(H, W)` tensor, producing an `(H, W/2+1)` spectrum.
///
/// # Errors
/// Fails with [`OpError::ShapeMismatch`] unless `x` is a non-empty 2D tensor.
pub fn rfft2(x: &Ten64) -> Result<Spectrum> {
    let (rows, cols) = x.dims2()?;
    let half = half_width(cols);
    trace!("rfft2: ({rows}, {cols}) -> ({rows}, {half})");

    let mut planner = FftPlanner::<f64>::new();
    let row_fft = planner.plan_fft_forward(cols);
    let col_fft = planner.plan_fft_forward(rows);

    let mut out = vec![Complex64::default(); rows * half];
    out.par_chunks_mut(half)
        .zip(x.data.par_chunks(cols))
        .for_each(|(dst, src)| {
            let mut buf: Vec<Complex64> = src.iter().map(|&v| Complex64::new(v, 0.0)).collect();
            row_fft.process(&mut buf);
            dst.copy_from_slice(&buf[..half]);
        });

    transform_columns(&mut out, rows, half, &col_fft);

    Ok(Spectrum {
        rows,
        cols: half,
        data: out,
    })
}

/// `|rfft2(x)|`, the non-negative magnitude of the half-spectrum.
///
/// # Errors
/// Same as [`rfft2`].
pub fn rfft2_magnitude(x: &Ten64) -> Result<Ten64> {
    Ok(rfft2(x)?.magnitude())
}

/// Inverse real 2D FFT back to an `(H, width)` real tensor.
///
/// Bins past `width / 2` are ignored and missing bins are treated as zero, so any
/// half-spectrum width is accepted. The imaginary parts of the DC (and, for even
/// `width`, Nyquist) bins do not contribute to the result.
///
/// # Errors
/// Fails with [`OpError::ShapeMismatch`] if `width` is zero or the spectrum is empty.
pub fn irfft2(spec: &Spectrum, width: usize) -> Result<Ten64> {
    let (rows, cols) = (spec.rows, spec.cols);
    if width == 0 || rows == 0 || cols == 0 || spec.data.len() != rows * cols {
        return Err(OpError::shape(
            "irfft2",
            format!("a non-empty spectrum and width > 0 (width = {width})"),
            vec![rows, cols],
        ));
    }
    trace!("irfft2: ({rows}, {cols}) -> ({rows}, {width})");

    let mut planner = FftPlanner::<f64>::new();
    let col_ifft = planner.plan_fft_inverse(rows);
    let row_ifft = planner.plan_fft_inverse(width);

    let mut freq = spec.data.clone();
    transform_columns(&mut freq, rows, cols, &col_ifft);

    #[allow(clippy::cast_precision_loss)]
    let scale = 1.0 / (rows * width) as f64;
    let nyquist = width / 2;

    let mut out = vec![0.0f64; rows * width];
    out.par_chunks_mut(width)
        .zip(freq.par_chunks(cols))
        .for_each(|(dst, src)| {
            let mut buf = vec![Complex64::default(); width];
            for (k, slot) in buf.iter_mut().enumerate().take(nyquist + 1) {
                if k < cols {
                    *slot = src[k];
                }
            }
            for k in nyquist + 1..width {
                buf[k] = buf[width - k].conj();
            }
            row_ifft.process(&mut buf);
            for (d, z) in dst.iter_mut().zip(&buf) {
                *d = z.re * scale;
            }
        });

    Ok(Tensor::new(vec![rows, width], out))
}
