use crate::activation::activation::{softmax, softmax_backward};

pub struct HuberLoss;

const DELTA: f64 = 1.0;

impl HuberLoss {
    /// L = mean(h(p − y)) where h(x) = 0.5·x² if |x| ≤ δ, else δ·(|x| − 0.5·δ).
    ///
    /// Probabilities and one-hot targets differ by at most 1, so with δ = 1
    /// only the quadratic branch is reached.
    pub fn segment(logits: &[f64], target: usize) -> (f64, Vec<f64>) {
        let probs = softmax(logits);
        let n = probs.len() as f64;
        let mut loss = 0.0;
        let grad_probs: Vec<f64> = probs.iter().enumerate()
            .map(|(i, p)| {
                let x = p - if i == target { 1.0 } else { 0.0 };
                if x.abs() <= DELTA {
                    loss += 0.5 * x * x;
                    x / n
                } else {
                    loss += DELTA * (x.abs() - 0.5 * DELTA);
                    DELTA * x.signum() / n
                }
            })
            .collect();
        (loss / n, softmax_backward(&probs, &grad_probs))
    }
}
