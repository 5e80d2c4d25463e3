//! Optimizer trait and shared helpers

use gradlab_core::{GradlabError, ParamId, ParamStore, Result, Tensor};

/// Trait for optimizers
///
/// An optimizer holds [`ParamId`] handles into a [`ParamStore`] owned by the
/// training loop, plus one set of auxiliary buffers per handle. The mapping
/// from handle to buffer is positional and fixed at construction.
pub trait Optimizer: Send {
    /// Optimizer name
    fn name(&self) -> &str;

    /// Parameters this optimizer updates, in buffer order
    fn params(&self) -> &[ParamId];

    /// Current learning rate
    fn learning_rate(&self) -> f64;

    /// Replace the learning rate (e.g. from a schedule)
    fn set_learning_rate(&mut self, lr: f64) -> Result<()>;

    /// Apply one update to every parameter that currently has a gradient.
    ///
    /// Parameters without a gradient are skipped.
    fn step(&mut self, store: &mut ParamStore) -> Result<()>;

    /// Drop the gradient of every managed parameter
    fn zero_grad(&self, store: &mut ParamStore) -> Result<()> {
        for id in self.params() {
            store.clear_grad(*id)?;
        }
        Ok(())
    }
}

/// One zero buffer per parameter, shaped like the parameter
pub(crate) fn zeroed_buffers(params: &[ParamId], store: &ParamStore) -> Result<Vec<Tensor>> {
    params
        .iter()
        .map(|id| Ok(Tensor::zeros(store.value(*id)?.raw_dim())))
        .collect()
}

/// Fails if any parameter was reshaped after its buffers were allocated.
///
/// Runs before a step touches anything, so an error leaves both the store and
/// the optimizer state as they were.
pub(crate) fn check_shapes(params: &[ParamId], buffers: &[Tensor], store: &ParamStore) -> Result<()> {
    for (id, buffer) in params.iter().zip(buffers) {
        let value = store.value(*id)?;
        if buffer.shape() != value.shape() {
            return Err(GradlabError::ShapeMismatch {
                index: id.0,
                expected: buffer.shape().to_vec(),
                got: value.shape().to_vec(),
            });
        }
    }
    Ok(())
}

pub(crate) fn check_non_negative(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(GradlabError::invalid(name, value, "must be finite"));
    }
    if value < 0.0 {
        return Err(GradlabError::invalid(name, value, "must be >= 0"));
    }
    Ok(())
}

/// Strictly positive, for terms that end up in a denominator
pub(crate) fn check_positive(name: &str, value: f64) -> Result<()> {
    check_non_negative(name, value)?;
    if value == 0.0 {
        return Err(GradlabError::invalid(name, value, "must be > 0"));
    }
    Ok(())
}

/// `0 <= value < 1`, or `0 <= value <= 1` when `inclusive` is set
pub(crate) fn check_unit_interval(name: &str, value: f64, inclusive: bool) -> Result<()> {
    check_non_negative(name, value)?;
    if inclusive && value > 1.0 {
        return Err(GradlabError::invalid(name, value, "must be in [0, 1]"));
    }
    if !inclusive && value >= 1.0 {
        return Err(GradlabError::invalid(name, value, "must be in [0, 1)"));
    }
    Ok(())
}
