use serde::{Serialize, Deserialize};
use std::f64::consts::PI;

use crate::math::matrix::Matrix;

/// Element-wise activation applied after a dense layer's affine transform.
///
/// The classification head always uses `Identity`; the per-position softmax
/// lives in the loss functions and the decoder (see [`softmax`]).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ActivationFunction {
    Sigmoid,
    ReLU,
    Identity,
    Tanh,
    LeakyReLU { alpha: f64 },
    Elu { alpha: f64 },
    Gelu,
    Swish,
}

const GELU_COEFF: f64 = 0.044715;

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

impl ActivationFunction {
    pub fn apply(&self, x: f64) -> f64 {
        match *self {
            ActivationFunction::Sigmoid => sigmoid(x),
            ActivationFunction::ReLU => x.max(0.0),
            ActivationFunction::Identity => x,
            ActivationFunction::Tanh => x.tanh(),
            ActivationFunction::LeakyReLU { alpha } => if x > 0.0 { x } else { alpha * x },
            ActivationFunction::Elu { alpha } => if x > 0.0 { x } else { alpha * (x.exp() - 1.0) },
            ActivationFunction::Gelu => {
                let c = (2.0 / PI).sqrt();
                0.5 * x * (1.0 + (c * (x + GELU_COEFF * x.powi(3))).tanh())
            }
            ActivationFunction::Swish => x * sigmoid(x),
        }
    }

    /// Derivative with respect to the pre-activation `x`.
    pub fn derivative(&self, x: f64) -> f64 {
        match *self {
            ActivationFunction::Sigmoid => {
                let s = sigmoid(x);
                s * (1.0 - s)
            }
            ActivationFunction::ReLU => if x > 0.0 { 1.0 } else { 0.0 },
            ActivationFunction::Identity => 1.0,
            ActivationFunction::Tanh => {
                let t = x.tanh();
                1.0 - t * t
            }
            ActivationFunction::LeakyReLU { alpha } => if x > 0.0 { 1.0 } else { alpha },
            ActivationFunction::Elu { alpha } => if x > 0.0 { 1.0 } else { alpha * x.exp() },
            ActivationFunction::Gelu => {
                let c = (2.0 / PI).sqrt();
                let t = (c * (x + GELU_COEFF * x.powi(3))).tanh();
                let d_inner = c * (1.0 + 3.0 * GELU_COEFF * x * x);
                0.5 * (1.0 + t) + 0.5 * x * (1.0 - t * t) * d_inner
            }
            ActivationFunction::Swish => {
                let s = sigmoid(x);
                s + x * s * (1.0 - s)
            }
        }
    }

    /// He init for the ReLU family, Xavier for everything else.
    pub fn init_weights(&self, fan_in: usize, fan_out: usize) -> Matrix {
        match self {
            ActivationFunction::ReLU
            | ActivationFunction::LeakyReLU { .. }
            | ActivationFunction::Elu { .. }
            | ActivationFunction::Gelu
            | ActivationFunction::Swish => Matrix::he(fan_in, fan_out),
            _ => Matrix::xavier(fan_in, fan_out),
        }
    }
}

/// Numerically stable softmax over one logit segment.
pub fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exp: Vec<f64> = logits.iter().map(|&z| (z - max).exp()).collect();
    let sum: f64 = exp.iter().sum();
    exp.into_iter().map(|e| e / sum).collect()
}

/// Pulls a gradient with respect to softmax probabilities back to the logits:
/// `∂L/∂z_j = p_j · (g_j − Σ_i g_i·p_i)`.
pub fn softmax_backward(probs: &[f64], grad_probs: &[f64]) -> Vec<f64> {
    let dot: f64 = probs.iter().zip(grad_probs).map(|(p, g)| p * g).sum();
    probs.iter().zip(grad_probs).map(|(p, g)| p * (g - dot)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_softmax_sums_to_one_for_large_logits() {
        let p = softmax(&[1000.0, 1001.0, 999.0]);
        assert_abs_diff_eq!(p.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert!(p[1] > p[0] && p[0] > p[2]);
    }

    #[test]
    fn test_derivatives_match_finite_differences() {
        let fns = [
            ActivationFunction::Sigmoid,
            ActivationFunction::Tanh,
            ActivationFunction::LeakyReLU { alpha: 0.1 },
            ActivationFunction::Elu { alpha: 1.0 },
            ActivationFunction::Gelu,
            ActivationFunction::Swish,
        ];
        let h = 1e-6;
        for f in fns {
            for &x in &[-1.3, -0.2, 0.4, 2.1] {
                let numeric = (f.apply(x + h) - f.apply(x - h)) / (2.0 * h);
                assert_abs_diff_eq!(f.derivative(x), numeric, epsilon = 1e-5);
            }
        }
    }
}
