//! Optimizer trait and factory configuration

use serde::{Serialize, Deserialize};

use crate::network::network::{Gradients, Network};
use crate::optim::adam::Adam;
use crate::optim::sgd::Sgd;

/// Updates network parameters from accumulated gradients.
pub trait Optimizer {
    /// Performs a single optimization step.
    fn step(&mut self, network: &mut Network, grads: &Gradients);

    fn lr(&self) -> f64;

    fn set_lr(&mut self, lr: f64);

    fn name(&self) -> &str;
}

/// Optimizer factory. The optimizer is only instantiated once it can be bound
/// to a network, in `CaptchaModule::configure_optimizers`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OptimizerConfig {
    Sgd {
        lr: f64,
        #[serde(default)]
        momentum: f64,
        #[serde(default)]
        weight_decay: f64,
    },
    Adam {
        lr: f64,
        #[serde(default = "default_beta1")]
        beta1: f64,
        #[serde(default = "default_beta2")]
        beta2: f64,
        #[serde(default = "default_eps")]
        eps: f64,
        #[serde(default)]
        weight_decay: f64,
    },
}

fn default_beta1() -> f64 { 0.9 }
fn default_beta2() -> f64 { 0.999 }
fn default_eps() -> f64 { 1e-8 }

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig::Adam {
            lr: 1e-3,
            beta1: default_beta1(),
            beta2: default_beta2(),
            eps: default_eps(),
            weight_decay: 0.0,
        }
    }
}

impl OptimizerConfig {
    pub fn lr(&self) -> f64 {
        match *self {
            OptimizerConfig::Sgd { lr, .. } | OptimizerConfig::Adam { lr, .. } => lr,
        }
    }

    /// Instantiates the optimizer with state sized for `network`'s parameters.
    pub fn build(&self, network: &Network) -> Box<dyn Optimizer> {
        match *self {
            OptimizerConfig::Sgd { lr, momentum, weight_decay } => {
                Box::new(Sgd::new(lr, momentum, weight_decay, network))
            }
            OptimizerConfig::Adam { lr, beta1, beta2, eps, weight_decay } => {
                Box::new(Adam::new(lr, beta1, beta2, eps, weight_decay, network))
            }
        }
    }
}

/// Per-parameter buffer with the same shape as the network, used for
/// momentum and moment estimates.
pub(crate) fn zeros_like_params(network: &Network) -> Vec<(Vec<f64>, Vec<f64>)> {
    network.layers.iter()
        .map(|l| (vec![0.0; l.weights.data.len()], vec![0.0; l.biases.len()]))
        .collect()
}
