//! RMSprop

use ndarray::Zip;
use tracing::trace;

use gradlab_core::{ParamId, ParamStore, Result, Tensor};

use crate::config::RmsPropConfig;
use crate::optimizer::{check_non_negative, check_shapes, zeroed_buffers, Optimizer};

/// Non-centered RMSprop with optional momentum.
///
/// ```txt
/// g = grad + weight_decay * param               (if weight_decay > 0)
/// v = alpha * v + (1 - alpha) * g^2
/// momentum > 0:  buf = momentum * buf + g / (sqrt(v) + eps);  param -= lr * buf
/// otherwise:     param -= lr * g / (sqrt(v) + eps)
/// ```
pub struct RmsProp {
    params: Vec<ParamId>,
    square_avg: Vec<Tensor>,
    momentum_buffer: Option<Vec<Tensor>>,
    config: RmsPropConfig,
}

impl RmsProp {
    pub fn new(params: &[ParamId], store: &ParamStore, config: RmsPropConfig) -> Result<Self> {
        config.validate()?;
        let momentum_buffer = if config.momentum > 0.0 {
            Some(zeroed_buffers(params, store)?)
        } else {
            None
        };
        Ok(Self {
            params: params.to_vec(),
            square_avg: zeroed_buffers(params, store)?,
            momentum_buffer,
            config,
        })
    }

    pub fn config(&self) -> &RmsPropConfig {
        &self.config
    }

    /// Running average of squared gradients for the `index`-th parameter
    pub fn square_avg(&self, index: usize) -> Option<&Tensor> {
        self.square_avg.get(index)
    }

    /// Momentum buffer for the `index`-th parameter (only with momentum > 0)
    pub fn momentum_buffer(&self, index: usize) -> Option<&Tensor> {
        self.momentum_buffer.as_ref().and_then(|b| b.get(index))
    }
}

impl Optimizer for RmsProp {
    fn name(&self) -> &str {
        "rmsprop"
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
        let RmsPropConfig {
            lr,
            alpha,
            eps,
            weight_decay,
            momentum,
        } = self.config;
        let decay = move |g: f64, p: f64| if weight_decay > 0.0 { g + weight_decay * p } else { g };
        check_shapes(&self.params, &self.square_avg, store)?;

        for (index, id) in self.params.iter().enumerate() {
            let square_avg = &mut self.square_avg[index];
            let (value, grad) = store.get_mut(*id)?.split_mut();
            let Some(grad) = grad else {
                trace!("{id} has no gradient, skipping");
                continue;
            };

            match self.momentum_buffer.as_mut() {
                Some(buffers) => {
                    Zip::from(value)
                        .and(grad)
                        .and(square_avg)
                        .and(&mut buffers[index])
                        .for_each(|p, &g, v, b| {
                            let g = decay(g, *p);
                            *v = alpha * *v + (1.0 - alpha) * g * g;
                            *b = momentum * *b + g / (v.sqrt() + eps);
                            *p -= lr * *b;
                        });
                }
                None => {
                    Zip::from(value)
                        .and(grad)
                        .and(square_avg)
                        .for_each(|p, &g, v| {
                            let g = decay(g, *p);
                            *v = alpha * *v + (1.0 - alpha) * g * g;
                            *p -= lr * g / (v.sqrt() + eps);
                        });
                }
            }
        }
        Ok(())
    }
}
