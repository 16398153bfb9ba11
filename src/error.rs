//! Error types shared by every operation.

use thiserror::Error;

/// Failure of a differentiable operation or numerical kernel.
///
/// All errors are returned synchronously to the immediate caller; nothing is
/// retried or recovered internally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpError {
    /// Input dimensions are incompatible with the operation or its configured kernel.
    #[error("shape mismatch in {op}: expected {expected}, got {got:?}")]
    ShapeMismatch {
        op: &'static str,
        expected: String,
        got: Vec<usize>,
    },
    /// A backward pass was requested without a matching saved forward context.
    #[error("invalid state in {op}: {reason}")]
    State {
        op: &'static str,
        reason: &'static str,
    },
    /// An operation was configured with unusable parameters.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl OpError {
    pub(crate) fn shape(op: &'static str, expected: String, got: Vec<usize>) -> Self {
        Self::ShapeMismatch { op, expected, got }
    }

    pub(crate) const fn no_context(op: &'static str) -> Self {
        Self::State {
            op,
            reason: "backward called without a matching forward context",
        }
    }

    /// Whether this is a [`OpError::ShapeMismatch`].
    pub fn is_shape_mismatch(&self) -> bool {
        matches!(self, Self::ShapeMismatch { .. })
    }

    /// Whether this is a [`OpError::State`].
    pub fn is_state(&self) -> bool {
        matches!(self, Self::State { .. })
    }
}

/// Result alias for operations in this crate.
pub type Result<T> = core::result::Result<T, OpError>;

/// Failure while saving or loading a `.bpat` file.
#[derive(Debug, Error)]
pub enum ModelIoError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid magic header")]
    BadMagic,
    #[error("a .bpat file holds at most 255 tensors, got {0}")]
    TooManyTensors(usize),
    #[error("tensor {index} failed validation")]
    Invalid { index: usize },
}
