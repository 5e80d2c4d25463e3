//! Adam optimizer
//!
//! Reference: Adam: A Method for Stochastic Optimization - https://arxiv.org/abs/1412.6980

use ndarray::Zip;
use tracing::trace;

use gradlab_core::{ParamId, ParamStore, Result, Tensor};

use crate::config::AdamConfig;
use crate::optimizer::{check_non_negative, check_shapes, zeroed_buffers, Optimizer};

/// First/second moment buffers and the shared step counter.
///
/// The counter starts at 0 and is incremented before bias correction, so the
/// first `step()` corrects with `t = 1`.
pub(crate) struct Moments {
    pub(crate) m: Vec<Tensor>,
    pub(crate) v: Vec<Tensor>,
    pub(crate) t: u64,
}

impl Moments {
    pub(crate) fn new(params: &[ParamId], store: &ParamStore) -> Result<Self> {
        Ok(Self {
            m: zeroed_buffers(params, store)?,
            v: zeroed_buffers(params, store)?,
            t: 0,
        })
    }

    /// Advance the counter and return `(1 - beta1^t, 1 - beta2^t)`
    pub(crate) fn advance(&mut self, betas: (f64, f64)) -> (f64, f64) {
        self.t += 1;
        bias_corrections(betas, self.t)
    }

    /// `(m_hat, v_hat)` for the `index`-th parameter at the current step
    pub(crate) fn corrected(&self, index: usize, betas: (f64, f64)) -> Option<(Tensor, Tensor)> {
        if self.t == 0 {
            return None;
        }
        let (bc1, bc2) = bias_corrections(betas, self.t);
        let m = self.m.get(index)?;
        let v = self.v.get(index)?;
        Some((m / bc1, v / bc2))
    }
}

fn bias_corrections((beta1, beta2): (f64, f64), t: u64) -> (f64, f64) {
    let t = t as f64;
    (1.0 - beta1.powf(t), 1.0 - beta2.powf(t))
}

/// Adam with L2 weight decay folded into the gradient.
///
/// ```txt
/// g = grad + weight_decay * param      (if weight_decay > 0)
/// m = beta1 * m + (1 - beta1) * g
/// v = beta2 * v + (1 - beta2) * g^2
/// param -= lr * (m / (1 - beta1^t)) / (sqrt(v / (1 - beta2^t)) + eps)
/// ```
pub struct Adam {
    params: Vec<ParamId>,
    moments: Moments,
    config: AdamConfig,
}

impl Adam {
    pub fn new(params: &[ParamId], store: &ParamStore, config: AdamConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            params: params.to_vec(),
            moments: Moments::new(params, store)?,
            config,
        })
    }

    pub fn config(&self) -> &AdamConfig {
        &self.config
    }

    /// Number of completed `step()` calls
    pub fn step_count(&self) -> u64 {
        self.moments.t
    }

    /// Raw `(m, v)` buffers of the `index`-th parameter
    pub fn moments(&self, index: usize) -> Option<(&Tensor, &Tensor)> {
        Some((self.moments.m.get(index)?, self.moments.v.get(index)?))
    }

    /// Bias-corrected `(m_hat, v_hat)`; `None` before the first step
    pub fn bias_corrected(&self, index: usize) -> Option<(Tensor, Tensor)> {
        self.moments.corrected(index, self.config.betas)
    }
}

impl Optimizer for Adam {
    fn name(&self) -> &str {
        "adam"
    }

    fn params(&self) -> &[ParamId] {
        &self.params
    }

    fn learning_rate(&self) -> f64 {
        self.config.lr
    }

    fn set_learning_rate(&mut self, lr: f64) -> Result<()> {
        check_non_negative("lr", lr)?;
        self.config.lr = lr;
        Ok(())
    }

    fn step(&mut self, store: &mut ParamStore) -> Result<()> {
        let AdamConfig {
            lr,
            betas: (beta1, beta2),
            eps,
            weight_decay,
        } = self.config;
        check_shapes(&self.params, &self.moments.m, store)?;
        let (bc1, bc2) = self.moments.advance(self.config.betas);

        for (index, id) in self.params.iter().enumerate() {
            let m = &mut self.moments.m[index];
            let v = &mut self.moments.v[index];
            let (value, grad) = store.get_mut(*id)?.split_mut();
            let Some(grad) = grad else {
                trace!("{id} has no gradient, skipping");
                continue;
            };

            Zip::from(value)
                .and(grad)
                .and(m)
                .and(v)
                .for_each(|p, &g, m, v| {
                    let g = if weight_decay > 0.0 { g + weight_decay * *p } else { g };
                    *m = beta1 * *m + (1.0 - beta1) * g;
                    *v = beta2 * *v + (1.0 - beta2) * g * g;
                    let m_hat = *m / bc1;
                    let v_hat = *v / bc2;
                    *p -= lr * m_hat / (v_hat.sqrt() + eps);
                });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    #[test]
    fn test_first_step_moves_by_lr() {
        let mut store = ParamStore::new();
        let id = store.add(arr1(&[1.0]).into_dyn());
        store.set_grad(id, arr1(&[0.1]).into_dyn()).unwrap();

        let mut adam = Adam::new(&[id], &store, AdamConfig::new(0.1)).unwrap();
        adam.step(&mut store).unwrap();

        // m_hat = g, v_hat = g^2, so the update is lr * g / (|g| + eps)
        let p = store.value(id).unwrap()[[0]];
        assert!((p - 0.9).abs() < 1e-6, "p = {p}");
        assert_eq!(adam.step_count(), 1);
    }

    #[test]
    fn test_bias_corrected_unavailable_before_step() {
        let mut store = ParamStore::new();
        let id = store.add(arr1(&[1.0]).into_dyn());
        let adam = Adam::new(&[id], &store, AdamConfig::default()).unwrap();

        assert_eq!(adam.step_count(), 0);
        assert!(adam.bias_corrected(0).is_none());
        let (m, v) = adam.moments(0).unwrap();
        assert_eq!(m[[0]], 0.0);
        assert_eq!(v[[0]], 0.0);
    }

    #[test]
    fn test_counter_advances_without_gradients() {
        let mut store = ParamStore::new();
        let id = store.add(arr1(&[1.0]).into_dyn());
        let mut adam = Adam::new(&[id], &store, AdamConfig::default()).unwrap();

        adam.step(&mut store).unwrap();
        adam.step(&mut store).unwrap();

        assert_eq!(adam.step_count(), 2);
        assert_eq!(store.value(id).unwrap()[[0]], 1.0);
    }

    #[test]
    fn test_bias_corrections_at_first_step() {
        let (bc1, bc2) = bias_corrections((0.9, 0.999), 1);
        assert!((bc1 - 0.1).abs() < 1e-12);
        assert!((bc2 - 0.001).abs() < 1e-12);
    }
}
