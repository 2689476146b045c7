use serde::{Serialize, Deserialize};

use crate::{math::matrix::Matrix, activation::activation::ActivationFunction};

/// Fully connected layer: `a = σ(x · W + b)`.
///
/// Unlike a stateful layer that caches its last activations, `Layer` is
/// read-only during the forward pass so one network can score a whole batch;
/// the caller keeps the returned pre-activations for backprop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    pub size: usize,
    /// Shape `(input_size, size)`.
    pub weights: Matrix,
    pub biases: Vec<f64>,
    pub activator: ActivationFunction,
    /// Transposed copy of `weights`, present only once the owning network is compiled.
    #[serde(skip)]
    packed: Option<Matrix>,
}

impl Layer {
    pub fn new(size: usize, input_size: usize, activation: ActivationFunction) -> Layer {
        Layer {
            size,
            weights: activation.init_weights(input_size, size),
            biases: vec![0.0; size],
            activator: activation,
            packed: None,
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.rows
    }

    /// Returns `(z, a)`: pre-activations and activations.
    pub fn feed_from(&self, input: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let mut z = match &self.packed {
            Some(packed) => packed.mul_vec(input),
            None => self.weights.vec_mul(input),
        };
        for (zi, b) in z.iter_mut().zip(&self.biases) {
            *zi += b;
        }
        let a = z.iter().map(|&x| self.activator.apply(x)).collect();
        (z, a)
    }

    /// Back-propagates `delta` (∂L/∂a for this layer).
    ///
    /// Returns `(weights_grad, biases_grad, input_delta)` where `input_delta`
    /// is ∂L/∂x, the error signal for the previous layer.
    pub fn compute_gradients(
        &self,
        delta: &[f64],
        input: &[f64],
        pre_activation: &[f64],
    ) -> (Matrix, Vec<f64>, Vec<f64>) {
        // δ = error ⊙ σ'(z)
        let layer_delta: Vec<f64> = delta.iter()
            .zip(pre_activation)
            .map(|(d, &z)| d * self.activator.derivative(z))
            .collect();

        let weights_grad = Matrix::outer(input, &layer_delta);
        let input_delta = self.weights.mul_vec(&layer_delta);
        (weights_grad, layer_delta, input_delta)
    }

    /// Caches a transposed weight copy so each output is one contiguous dot product.
    pub fn pack(&mut self) {
        self.packed = Some(self.weights.transpose());
    }

    pub fn is_packed(&self) -> bool {
        self.packed.is_some()
    }

    /// Re-syncs the packed copy after the weights changed.
    pub fn refresh_pack(&mut self) {
        if self.packed.is_some() {
            self.pack();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_packed_forward_matches_plain_forward() {
        let mut layer = Layer::new(4, 3, ActivationFunction::Tanh);
        let x = [0.2, -0.7, 1.1];
        let (_, plain) = layer.feed_from(&x);
        layer.pack();
        let (_, packed) = layer.feed_from(&x);
        for (a, b) in plain.iter().zip(&packed) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_weight_gradient_matches_finite_difference() {
        let mut layer = Layer::new(2, 3, ActivationFunction::Sigmoid);
        let x = [0.5, -0.3, 0.8];
        // L = sum(a), so ∂L/∂a = 1.
        let (z, _) = layer.feed_from(&x);
        let (w_grad, _, _) = layer.compute_gradients(&[1.0, 1.0], &x, &z);

        let h = 1e-6;
        let idx = 1 * layer.weights.cols + 1;
        layer.weights.data[idx] += h;
        let up: f64 = layer.feed_from(&x).1.iter().sum();
        layer.weights.data[idx] -= 2.0 * h;
        let down: f64 = layer.feed_from(&x).1.iter().sum();
        assert_abs_diff_eq!(w_grad.data[idx], (up - down) / (2.0 * h), epsilon = 1e-6);
    }
}
