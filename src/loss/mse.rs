use crate::activation::activation::{softmax, softmax_backward};

/// Mean-squared error between the softmax of one position and its one-hot target.
pub struct MseLoss;

impl MseLoss {
    /// L = mean((p − y)²), gradient pulled back through the softmax.
    pub fn segment(logits: &[f64], target: usize) -> (f64, Vec<f64>) {
        let probs = softmax(logits);
        let n = probs.len() as f64;
        let diff: Vec<f64> = probs.iter().enumerate()
            .map(|(i, p)| p - if i == target { 1.0 } else { 0.0 })
            .collect();
        let loss = diff.iter().map(|d| d * d).sum::<f64>() / n;
        let grad_probs: Vec<f64> = diff.iter().map(|d| 2.0 * d / n).collect();
        (loss, softmax_backward(&probs, &grad_probs))
    }
}
