//! Adam optimizer

use crate::network::network::{Gradients, Network};
use crate::optim::optimizer::{zeros_like_params, Optimizer};

/// Adam (Adaptive Moment Estimation) with bias correction and L2 weight decay.
pub struct Adam {
    lr: f64,
    beta1: f64,
    beta2: f64,
    eps: f64,
    weight_decay: f64,
    t: i32,
    m: Vec<(Vec<f64>, Vec<f64>)>, // First moment
    v: Vec<(Vec<f64>, Vec<f64>)>, // Second moment
}

struct Moments<'a> {
    m: &'a mut [f64],
    v: &'a mut [f64],
}

impl Adam {
    pub fn new(lr: f64, beta1: f64, beta2: f64, eps: f64, weight_decay: f64, network: &Network) -> Self {
        Adam {
            lr,
            beta1,
            beta2,
            eps,
            weight_decay,
            t: 0,
            m: zeros_like_params(network),
            v: zeros_like_params(network),
        }
    }

    fn update(&self, params: &mut [f64], grads: &[f64], moments: Moments<'_>) {
        let bias1 = 1.0 - self.beta1.powi(self.t);
        let bias2 = 1.0 - self.beta2.powi(self.t);
        for (((p, g), m), v) in params.iter_mut()
            .zip(grads)
            .zip(moments.m.iter_mut())
            .zip(moments.v.iter_mut())
        {
            let g = g + self.weight_decay * *p;
            *m = self.beta1 * *m + (1.0 - self.beta1) * g;
            *v = self.beta2 * *v + (1.0 - self.beta2) * g * g;
            let m_hat = *m / bias1;
            let v_hat = *v / bias2;
            *p -= self.lr * m_hat / (v_hat.sqrt() + self.eps);
        }
    }
}

impl Optimizer for Adam {
    fn step(&mut self, network: &mut Network, grads: &Gradients) {
        self.t += 1;
        let mut m = std::mem::take(&mut self.m);
        let mut v = std::mem::take(&mut self.v);
        for (((layer, (gw, gb)), (mw, mb)), (vw, vb)) in network.layers.iter_mut()
            .zip(&grads.layers)
            .zip(m.iter_mut())
            .zip(v.iter_mut())
        {
            self.update(&mut layer.weights.data, &gw.data, Moments { m: mw, v: vw });
            self.update(&mut layer.biases, gb, Moments { m: mb, v: vb });
        }
        self.m = m;
        self.v = v;
        network.weights_updated();
    }

    fn lr(&self) -> f64 {
        self.lr
    }

    fn set_lr(&mut self, lr: f64) {
        self.lr = lr;
    }

    fn name(&self) -> &str {
        "Adam"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::activation::ActivationFunction;
    use crate::network::prediction::HeadLayout;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_first_step_moves_each_parameter_by_lr() {
        let layout = HeadLayout::new(1, 1);
        let mut network = Network::new(vec![(2, 2, ActivationFunction::Identity)], layout);
        let before = network.layers[0].weights.data.clone();
        let mut grads = Gradients::zeros_for(&network);
        grads.layers[0].0.data = vec![3.0, -0.01, 0.0, 100.0];

        let mut adam = Adam::new(0.01, 0.9, 0.999, 1e-8, 0.0, &network);
        adam.step(&mut network, &grads);

        // After bias correction the first update is lr·sign(g).
        let after = &network.layers[0].weights.data;
        assert_abs_diff_eq!(after[0], before[0] - 0.01, epsilon = 1e-6);
        assert_abs_diff_eq!(after[1], before[1] + 0.01, epsilon = 1e-5);
        assert_abs_diff_eq!(after[2], before[2], epsilon = 1e-12);
        assert_abs_diff_eq!(after[3], before[3] - 0.01, epsilon = 1e-6);
    }
}
