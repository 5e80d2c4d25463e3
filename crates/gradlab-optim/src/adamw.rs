//! AdamW optimizer
//!
//! Adam with decoupled weight decay, as described in
//! [Decoupled Weight Decay Regularization](https://arxiv.org/abs/1711.05101).

use ndarray::Zip;
use tracing::trace;

use gradlab_core::{ParamId, ParamStore, Result, Tensor};

use crate::adam::Moments;
use crate::config::AdamConfig;
use crate::optimizer::{check_non_negative, check_shapes, Optimizer};

/// AdamW.
///
/// ```txt
/// param -= lr * weight_decay * param
/// m = beta1 * m + (1 - beta1) * grad
/// v = beta2 * v + (1 - beta2) * grad^2
/// param -= lr * (m / (1 - beta1^t)) / (sqrt(v / (1 - beta2^t)) + eps)
/// ```
pub struct AdamW {
    params: Vec<ParamId>,
    moments: Moments,
    config: AdamConfig,
}

impl AdamW {
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

    pub fn step_count(&self) -> u64 {
        self.moments.t
    }

    pub fn moments(&self, index: usize) -> Option<(&Tensor, &Tensor)> {
        Some((self.moments.m.get(index)?, self.moments.v.get(index)?))
    }

    pub fn bias_corrected(&self, index: usize) -> Option<(Tensor, Tensor)> {
        self.moments.corrected(index, self.config.betas)
    }
}

impl Optimizer for AdamW {
    fn name(&self) -> &str {
        "adamw"
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
                    *p -= lr * weight_decay * *p;
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
    use crate::adam::Adam;
    use ndarray::arr1;

    #[test]
    fn test_decoupled_decay_with_zero_gradient() {
        let mut store = ParamStore::new();
        let id = store.add(arr1(&[2.0]).into_dyn());
        store.set_grad(id, arr1(&[0.0]).into_dyn()).unwrap();

        let config = AdamConfig::new(0.1).with_weight_decay(0.5);
        let mut opt = AdamW::new(&[id], &store, config).unwrap();
        opt.step(&mut store).unwrap();

        // Pure decay: 2.0 - 0.1 * 0.5 * 2.0 = 1.9; moments stay zero
        assert!((store.value(id).unwrap()[[0]] - 1.9).abs() < 1e-12);
        let (m, v) = opt.moments(0).unwrap();
        assert_eq!(m[[0]], 0.0);
        assert_eq!(v[[0]], 0.0);
    }

    #[test]
    fn test_differs_from_adam_only_with_weight_decay() {
        let run = |decoupled: bool, weight_decay: f64| {
            let mut store = ParamStore::new();
            let id = store.add(arr1(&[1.5, -0.5]).into_dyn());
            let config = AdamConfig::new(0.05).with_weight_decay(weight_decay);
            let mut opt: Box<dyn Optimizer> = if decoupled {
                Box::new(AdamW::new(&[id], &store, config).unwrap())
            } else {
                Box::new(Adam::new(&[id], &store, config).unwrap())
            };
            for _ in 0..5 {
                store.set_grad(id, arr1(&[0.3, -0.2]).into_dyn()).unwrap();
                opt.step(&mut store).unwrap();
            }
            store.value(id).unwrap().clone()
        };

        assert_eq!(run(true, 0.0), run(false, 0.0));
        assert_ne!(run(true, 0.1), run(false, 0.1));
    }
}
