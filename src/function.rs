//! The interface a custom differentiable operation implements.
//!
//! An operation exposes two capabilities: [`Function::evaluate`] computes the
//! output together with a [`Saved`] context, and [`Function::gradient`] consumes
//! that context to map `∂L/∂output` to the operation's gradients. The context is a
//! value owned by the caller, never state hidden on the operation, so one operation
//! can be evaluated any number of times, from any number of threads, before its
//! gradients are requested.

use crate::error::{OpError, Result};
use crate::tensors::Ten64;

/// A two-state slot holding what a forward pass saved for its backward pass.
///
/// Taking the context empties the slot; a second take fails with
/// [`OpError::State`].
#[derive(Debug, Clone, PartialEq)]
pub struct Saved<T> {
    slot: Option<T>,
}

impl<T> Saved<T> {
    /// A slot holding `ctx`.
    pub const fn new(ctx: T) -> Self {
        Self { slot: Some(ctx) }
    }

    /// A slot with nothing saved, as if no forward pass had run.
    pub const fn empty() -> Self {
        Self { slot: None }
    }

    /// Whether a context is still waiting to be consumed.
    pub const fn is_live(&self) -> bool {
        self.slot.is_some()
    }

    /// Borrows the saved context without consuming it.
    pub const fn peek(&self) -> Option<&T> {
        self.slot.as_ref()
    }

    /// Removes and returns the saved context.
    ///
    /// # Errors
    /// Fails with [`OpError::State`] if the slot is empty.
    pub fn take(&mut self, op: &'static str) -> Result<T> {
        self.slot.take().ok_or(OpError::no_context(op))
    }
}

impl<T> Default for Saved<T> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Gradient bundles that carry `∂L/∂input`.
pub trait InputGradient {
    /// The gradient with respect to the operation's tensor input.
    fn input_grad(&self) -> &Ten64;
}

impl InputGradient for Ten64 {
    fn input_grad(&self) -> &Ten64 {
        self
    }
}

/// A differentiable operation on a single tensor input.
pub trait Function {
    /// What the forward pass keeps for the backward pass.
    type Saved;
    /// The gradients produced by the backward pass.
    type Grad: InputGradient;

    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Forward pass.
    ///
    /// # Errors
    /// Fails with [`OpError::ShapeMismatch`] if `input` is not acceptable.
    fn evaluate(&self, input: &Ten64) -> Result<(Ten64, Saved<Self::Saved>)>;

    /// Backward pass; consumes the context saved by [`Function::evaluate`].
    ///
    /// # Errors
    /// Fails with [`OpError::State`] if `saved` is empty and with
    /// [`OpError::ShapeMismatch`] if `grad_output` does not match the forward output.
    fn gradient(&self, saved: &mut Saved<Self::Saved>, grad_output: &Ten64) -> Result<Self::Grad>;
}
