//! Stochastic Gradient Descent with momentum

use ndarray::Zip;
use tracing::trace;

use gradlab_core::{ParamId, ParamStore, Result, Tensor};

use crate::config::SgdConfig;
use crate::optimizer::{check_non_negative, check_shapes, zeroed_buffers, Optimizer};

/// SGD with momentum and L2 weight decay (no dampening, no Nesterov).
///
/// Per parameter:
/// ```txt
/// g = grad + weight_decay * param        (if weight_decay > 0)
/// velocity = momentum * velocity + g     (if momentum > 0)
/// g = velocity                           (if momentum > 0)
/// param -= lr * g
/// ```
pub struct Sgd {
    params: Vec<ParamId>,
    velocity: Vec<Tensor>,
    config: SgdConfig,
}

impl Sgd {
    pub fn new(params: &[ParamId], store: &ParamStore, config: SgdConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            params: params.to_vec(),
            velocity: zeroed_buffers(params, store)?,
            config,
        })
    }

    pub fn config(&self) -> &SgdConfig {
        &self.config
    }

    /// Velocity buffer of the `index`-th managed parameter
    pub fn velocity(&self, index: usize) -> Option<&Tensor> {
        self.velocity.get(index)
    }
}

impl Optimizer for Sgd {
    fn name(&self) -> &str {
        "sgd"
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
        let SgdConfig {
            lr,
            momentum,
            weight_decay,
        } = self.config;
        check_shapes(&self.params, &self.velocity, store)?;

        for (id, velocity) in self.params.iter().zip(self.velocity.iter_mut()) {
            let (value, grad) = store.get_mut(*id)?.split_mut();
            let Some(grad) = grad else {
                trace!("{id} has no gradient, skipping");
                continue;
            };

            Zip::from(value)
                .and(grad)
                .and(velocity)
                .for_each(|p, &g, v| {
                    let mut g = if weight_decay > 0.0 { g + weight_decay * *p } else { g };
                    if momentum > 0.0 {
                        *v = momentum * *v + g;
                        g = *v;
                    }
                    *p -= lr * g;
                });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, ArrayD, IxDyn};

    fn single_param(value: &[f64], grad: &[f64]) -> (ParamStore, ParamId) {
        let mut store = ParamStore::new();
        let id = store.add(arr1(value).into_dyn());
        store.set_grad(id, arr1(grad).into_dyn()).unwrap();
        (store, id)
    }

    #[test]
    fn test_plain_gradient_descent() {
        let (mut store, id) = single_param(&[1.0, -2.0], &[0.5, 0.25]);
        let mut sgd = Sgd::new(&[id], &store, SgdConfig::new(0.1)).unwrap();

        sgd.step(&mut store).unwrap();

        let value = store.value(id).unwrap();
        assert_eq!(value[[0]], 1.0 - 0.1 * 0.5);
        assert_eq!(value[[1]], -2.0 - 0.1 * 0.25);
    }

    #[test]
    fn test_momentum_accumulates() {
        let (mut store, id) = single_param(&[0.0], &[1.0]);
        let config = SgdConfig::new(0.1).with_momentum(0.9);
        let mut sgd = Sgd::new(&[id], &store, config).unwrap();

        // v1 = 1.0, p1 = -0.1
        sgd.step(&mut store).unwrap();
        assert!((store.value(id).unwrap()[[0]] + 0.1).abs() < 1e-12);

        // v2 = 0.9 * 1.0 + 1.0 = 1.9, p2 = -0.1 - 0.19 = -0.29
        sgd.step(&mut store).unwrap();
        assert!((store.value(id).unwrap()[[0]] + 0.29).abs() < 1e-12);
        assert!((sgd.velocity(0).unwrap()[[0]] - 1.9).abs() < 1e-12);
    }

    #[test]
    fn test_weight_decay_added_to_gradient() {
        let (mut store, id) = single_param(&[2.0], &[0.0]);
        let config = SgdConfig::new(0.5).with_weight_decay(0.1);
        let mut sgd = Sgd::new(&[id], &store, config).unwrap();

        sgd.step(&mut store).unwrap();
        // g = 0 + 0.1 * 2.0 = 0.2, p = 2.0 - 0.5 * 0.2 = 1.9
        assert!((store.value(id).unwrap()[[0]] - 1.9).abs() < 1e-12);
    }

    #[test]
    fn test_missing_gradient_is_skipped() {
        let mut store = ParamStore::new();
        let with_grad = store.add(arr1(&[1.0]).into_dyn());
        let without = store.add(arr1(&[1.0]).into_dyn());
        store.set_grad(with_grad, arr1(&[1.0]).into_dyn()).unwrap();

        let config = SgdConfig::new(0.1).with_momentum(0.9);
        let mut sgd = Sgd::new(&[with_grad, without], &store, config).unwrap();
        sgd.step(&mut store).unwrap();

        assert_eq!(store.value(without).unwrap()[[0]], 1.0);
        assert_eq!(sgd.velocity(1).unwrap()[[0]], 0.0);
        assert!(store.value(with_grad).unwrap()[[0]] < 1.0);
    }

    #[test]
    fn test_reshaped_parameter_fails() {
        let (mut store, id) = single_param(&[1.0, 2.0], &[1.0, 1.0]);
        let mut sgd = Sgd::new(&[id], &store, SgdConfig::new(0.1)).unwrap();

        *store.get_mut(id).unwrap().value_mut() = ArrayD::zeros(IxDyn(&[3]));
        assert!(sgd.step(&mut store).is_err());
    }

    #[test]
    fn test_reshape_of_later_parameter_blocks_whole_step() {
        let mut store = ParamStore::new();
        let a = store.add(arr1(&[1.0]).into_dyn());
        let b = store.add(arr1(&[1.0, 1.0]).into_dyn());
        store.set_grad(a, arr1(&[1.0]).into_dyn()).unwrap();

        let config = SgdConfig::new(0.1).with_momentum(0.9);
        let mut sgd = Sgd::new(&[a, b], &store, config).unwrap();
        *store.get_mut(b).unwrap().value_mut() = ArrayD::zeros(IxDyn(&[3]));

        assert!(sgd.step(&mut store).is_err());
        assert_eq!(store.value(a).unwrap()[[0]], 1.0);
        assert_eq!(sgd.velocity(0).unwrap()[[0]], 0.0);
    }

    #[test]
    fn test_set_learning_rate() {
        let store = ParamStore::new();
        let mut sgd = Sgd::new(&[], &store, SgdConfig::new(0.1)).unwrap();
        sgd.set_learning_rate(0.5).unwrap();
        assert_eq!(sgd.learning_rate(), 0.5);
        assert!(sgd.set_learning_rate(-1.0).is_err());
        assert_eq!(sgd.learning_rate(), 0.5);
    }
}
