//! Core tensor data structures.
//!
//! # Tensor Utilities
//!
//! Everything the differentiable operations exchange is a dense, row-major
//! [`Tensor`]. Learnable values are paired with their gradient in a [`WithGrad`].
//!
//! ## Design Highlights
//! - `Tensor<T>` stores `shape` as a `Vec<usize>` and enforces it at runtime
//! - [`Ten64`] is the `f64` tensor every operation in this crate works on
//! - `WithGrad<T>` pairs a value with its accumulated gradient
//! - The `tensor!` macro builds tensors from nested array literals
//!
//! ## Limitations
//! - Row-major only
//! - No broadcasting or views; operations clone what they keep
//!
//! ## Example
//!
//! ```rust
//! use briny_spectral::tensors::Tensor;
//! let t = Tensor::new(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
//! assert_eq!(t.shape, vec![2, 3]);
//! assert_eq!(t.dims2().unwrap(), (2, 3));
//! ```

use crate::error::{OpError, Result};

/// Represents an N-dimensional tensor with a shape and flat row-major data.
///
/// - `shape` defines the structure, e.g., `[2, 3]` for a 2×3 matrix.
/// - `data` holds the flattened content in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<T> {
    pub shape: Vec<usize>,
    pub data: Vec<T>,
}

/// The tensor type used by every operation in this crate.
pub type Ten64 = Tensor<f64>;

impl<T> Tensor<T> {
    /// Creates a new tensor with the given shape and flat data.
    ///
    /// # Panics
    /// Panics if the number of elements in `data` does not match the shape product.
    /// Use [`Tensor::try_new`] for data that did not come from a literal.
    pub fn new(shape: impl Into<Vec<usize>>, data: Vec<T>) -> Self {
        let shape = shape.into();
        assert_eq!(
            shape.iter().product::<usize>(),
            data.len(),
            "shape {:?} is incompatible with {} data elements",
            shape,
            data.len()
        );
        Self { shape, data }
    }

    /// Fallible version of [`Tensor::new`].
    ///
    /// # Errors
    /// Returns [`OpError::ShapeMismatch`] when `data.len()` differs from the shape product.
    pub fn try_new(shape: impl Into<Vec<usize>>, data: Vec<T>) -> Result<Self> {
        let shape = shape.into();
        let expected = shape.iter().product::<usize>();
        if expected != data.len() {
            return Err(OpError::shape(
                "tensor",
                format!("{expected} elements"),
                vec![data.len()],
            ));
        }
        Ok(Self { shape, data })
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the tensor holds no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `(rows, cols)` of a non-empty 2D tensor.
    ///
    /// # Errors
    /// Fails with [`OpError::ShapeMismatch`] for any other rank or a zero-sized axis.
    pub fn dims2(&self) -> Result<(usize, usize)> {
        match self.shape.as_slice() {
            &[rows, cols] if rows > 0 && cols > 0 => Ok((rows, cols)),
            other => Err(OpError::shape(
                "tensor",
                "a non-empty 2D tensor".to_string(),
                other.to_vec(),
            )),
        }
    }
}

impl<T: Copy + Default> Tensor<T> {
    /// Creates a tensor filled with `T::default()`.
    pub fn zeros(shape: impl Into<Vec<usize>>) -> Self {
        let shape = shape.into();
        let len = shape.iter().product();
        Self {
            shape,
            data: vec![T::default(); len],
        }
    }

    /// A default-filled tensor with the same shape as `self`.
    pub fn zeros_like(&self) -> Self {
        Self::zeros(self.shape.clone())
    }
}

impl Ten64 {
    /// Element at `(row, col)` of a 2D tensor.
    ///
    /// # Panics
    /// Panics if the tensor is not 2D or the index is out of bounds.
    #[inline]
    pub fn at(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.shape[1] + col]
    }

    /// Sum of all elements.
    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Reverses both axes of a 2D tensor.
    ///
    /// # Errors
    /// Fails with [`OpError::ShapeMismatch`] if the tensor is not a non-empty 2D tensor.
    pub fn flip2(&self) -> Result<Self> {
        let (rows, cols) = self.dims2()?;
        let mut data = Vec::with_capacity(self.len());
        for r in (0..rows).rev() {
            data.extend(self.data[r * cols..(r + 1) * cols].iter().rev());
        }
        Ok(Self::new(vec![rows, cols], data))
    }
}

/// A container for tracking gradients of values (used in autograd).
///
/// Typically used as `WithGrad<Ten64>` or `WithGrad<f64>`.
#[derive(Debug, Clone)]
pub struct WithGrad<T> {
    pub value: T,
    pub grad: T,
}

impl WithGrad<Ten64> {
    /// Wraps a tensor with a zeroed gradient of the same shape.
    pub fn new(value: Ten64) -> Self {
        let grad = value.zeros_like();
        Self { value, grad }
    }

    /// Adds `grad` into the accumulated gradient.
    ///
    /// # Errors
    /// Fails with [`OpError::ShapeMismatch`] if `grad` does not have the value's shape.
    pub fn accumulate(&mut self, grad: &Ten64) -> Result<()> {
        if grad.shape != self.value.shape {
            return Err(OpError::shape(
                "accumulate",
                format!("{:?}", self.value.shape),
                grad.shape.clone(),
            ));
        }
        for (g, d) in self.grad.data.iter_mut().zip(&grad.data) {
            *g += *d;
        }
        Ok(())
    }

    /// Resets the accumulated gradient to zero.
    pub fn zero_grad(&mut self) {
        self.grad.data.fill(0.0);
    }
}

impl WithGrad<f64> {
    /// Wraps a scalar with a zero gradient.
    pub fn scalar(value: f64) -> Self {
        Self { value, grad: 0.0 }
    }
}

/// Defines a tensor from nested literal arrays.
///
/// Supports arbitrary dimensionality as long as sublists are uniform in shape.
///
/// # Example
/// ```
/// use briny_spectral::tensor;
/// let t = tensor!([[1.0, 2.0], [3.0, 4.0]]);
/// assert_eq!(t.shape, vec![2, 2]);
/// ```
#[macro_export]
macro_rules! tensor {
    ([ $( [ $( $inner:tt )* ] ),+ $(,)? ]) => {{
        let children = vec![ $( $crate::tensor!([ $( $inner )* ]) ),+ ];
        let first_shape = &children[0].shape;
        assert!(children.iter().all(|c| c.shape == *first_shape),
            "ragged tensor literal (rows have mismatched shapes)");
        let mut shape = vec![children.len()];
        shape.extend_from_slice(first_shape);
        let mut data = Vec::with_capacity(children.len() * children[0].data.len());
        for c in children { data.extend(c.data); }
        $crate::tensors::Tensor::new(shape, data)
    }};

    ([ $( $x:expr ),+ $(,)? ]) => {{
        let data = vec![ $( $x ),+ ];
        $crate::tensors::Tensor::new(vec![data.len()], data)
    }};

    ($x:expr) => {
        $crate::tensors::Tensor::new(Vec::<usize>::new(), vec![$x])
    };
}
