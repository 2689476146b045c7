use crate::activation::activation::{softmax, softmax_backward};

pub struct MaeLoss;

impl MaeLoss {
    /// L = mean(|p − y|); subgradient sign(p − y) / n (0 when equal).
    pub fn segment(logits: &[f64], target: usize) -> (f64, Vec<f64>) {
        let probs = softmax(logits);
        let n = probs.len() as f64;
        let mut loss = 0.0;
        let grad_probs: Vec<f64> = probs.iter().enumerate()
            .map(|(i, p)| {
                let diff = p - if i == target { 1.0 } else { 0.0 };
                loss += diff.abs();
                if diff > 0.0 { 1.0 / n } else if diff < 0.0 { -1.0 / n } else { 0.0 }
            })
            .collect();
        (loss / n, softmax_backward(&probs, &grad_probs))
    }
}
