//! Stochastic Gradient Descent optimizer

use crate::network::network::{Gradients, Network};
use crate::optim::optimizer::{zeros_like_params, Optimizer};

/// SGD with optional momentum and L2 weight decay.
///
/// `v = μ·v + (g + λ·p)`, `p -= lr·v`; with `μ = 0` this is plain SGD.
pub struct Sgd {
    pub learning_rate: f64,
    momentum: f64,
    weight_decay: f64,
    velocities: Vec<(Vec<f64>, Vec<f64>)>,
}

impl Sgd {
    pub fn new(learning_rate: f64, momentum: f64, weight_decay: f64, network: &Network) -> Sgd {
        Sgd {
            learning_rate,
            momentum,
            weight_decay,
            velocities: zeros_like_params(network),
        }
    }

    fn update(&self, params: &mut [f64], grads: &[f64], velocity: &mut [f64]) {
        for ((p, g), v) in params.iter_mut().zip(grads).zip(velocity.iter_mut()) {
            let g = g + self.weight_decay * *p;
            *v = self.momentum * *v + g;
            *p -= self.learning_rate * *v;
        }
    }
}

impl Optimizer for Sgd {
    fn step(&mut self, network: &mut Network, grads: &Gradients) {
        let mut velocities = std::mem::take(&mut self.velocities);
        for ((layer, (gw, gb)), (vw, vb)) in network.layers.iter_mut()
            .zip(&grads.layers)
            .zip(velocities.iter_mut())
        {
            self.update(&mut layer.weights.data, &gw.data, vw);
            self.update(&mut layer.biases, gb, vb);
        }
        self.velocities = velocities;
        network.weights_updated();
    }

    fn lr(&self) -> f64 {
        self.learning_rate
    }

    fn set_lr(&mut self, lr: f64) {
        self.learning_rate = lr;
    }

    fn name(&self) -> &str {
        "SGD"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::activation::ActivationFunction;
    use crate::network::prediction::HeadLayout;
    use approx::assert_abs_diff_eq;

    fn net() -> Network {
        let layout = HeadLayout::new(1, 1);
        Network::new(vec![(2, 2, ActivationFunction::Identity)], layout)
    }

    #[test]
    fn test_plain_sgd_moves_against_gradient() {
        let mut network = net();
        let before = network.layers[0].weights.data.clone();
        let mut grads = Gradients::zeros_for(&network);
        grads.layers[0].0.data = vec![1.0, -2.0, 0.0, 0.5];

        let mut sgd = Sgd::new(0.1, 0.0, 0.0, &network);
        sgd.step(&mut network, &grads);

        let after = &network.layers[0].weights.data;
        assert_abs_diff_eq!(after[0], before[0] - 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(after[1], before[1] + 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(after[2], before[2], epsilon = 1e-12);
    }

    #[test]
    fn test_momentum_accumulates_velocity() {
        let mut network = net();
        let start = network.layers[0].biases[0];
        let mut grads = Gradients::zeros_for(&network);
        grads.layers[0].1 = vec![1.0, 0.0];

        let mut sgd = Sgd::new(1.0, 0.9, 0.0, &network);
        sgd.step(&mut network, &grads);
        sgd.step(&mut network, &grads);

        // Steps of 1.0 and then 1.9.
        assert_abs_diff_eq!(network.layers[0].biases[0], start - 2.9, epsilon = 1e-12);
    }
}
