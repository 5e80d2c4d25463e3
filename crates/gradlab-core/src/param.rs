//! Parameter arena
//!
//! The training loop owns every parameter in a [`ParamStore`]. Optimizers keep
//! only [`ParamId`] handles into it plus their own auxiliary buffers, and mutate
//! the stored values in place during `step()`.

use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

use crate::error::{GradlabError, Result};

/// Dense n-dimensional tensor of `f64`
pub type Tensor = ArrayD<f64>;

/// Handle to a parameter in a [`ParamStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParamId(pub usize);

impl std::fmt::Display for ParamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "param#{}", self.0)
    }
}

/// A trainable tensor and its (possibly absent) gradient
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    value: Tensor,
    grad: Option<Tensor>,
}

impl Parameter {
    pub fn new(value: Tensor) -> Self {
        Self { value, grad: None }
    }

    pub fn value(&self) -> &Tensor {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut Tensor {
        &mut self.value
    }

    pub fn grad(&self) -> Option<&Tensor> {
        self.grad.as_ref()
    }

    pub fn shape(&self) -> &[usize] {
        self.value.shape()
    }

    /// Mutable value and shared gradient at the same time, for in-place updates
    pub fn split_mut(&mut self) -> (&mut Tensor, Option<&Tensor>) {
        (&mut self.value, self.grad.as_ref())
    }
}

/// Arena of parameters owned by the training loop
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParamStore {
    params: Vec<Parameter>,
}

impl ParamStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parameter and return its handle
    pub fn add(&mut self, value: Tensor) -> ParamId {
        self.params.push(Parameter::new(value));
        ParamId(self.params.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Handles of every registered parameter, in registration order
    pub fn ids(&self) -> Vec<ParamId> {
        (0..self.params.len()).map(ParamId).collect()
    }

    pub fn get(&self, id: ParamId) -> Result<&Parameter> {
        self.params
            .get(id.0)
            .ok_or_else(|| GradlabError::NotFound(format!("{id}")))
    }

    pub fn get_mut(&mut self, id: ParamId) -> Result<&mut Parameter> {
        self.params
            .get_mut(id.0)
            .ok_or_else(|| GradlabError::NotFound(format!("{id}")))
    }

    pub fn value(&self, id: ParamId) -> Result<&Tensor> {
        Ok(self.get(id)?.value())
    }

    pub fn grad(&self, id: ParamId) -> Result<Option<&Tensor>> {
        Ok(self.get(id)?.grad())
    }

    /// Attach a gradient; its shape must match the parameter exactly (no broadcasting)
    pub fn set_grad(&mut self, id: ParamId, grad: Tensor) -> Result<()> {
        let param = self.get_mut(id)?;
        if param.shape() != grad.shape() {
            return Err(GradlabError::ShapeMismatch {
                index: id.0,
                expected: param.shape().to_vec(),
                got: grad.shape().to_vec(),
            });
        }
        param.grad = Some(grad);
        Ok(())
    }

    /// Drop the gradient of one parameter
    pub fn clear_grad(&mut self, id: ParamId) -> Result<()> {
        self.get_mut(id)?.grad = None;
        Ok(())
    }
}
