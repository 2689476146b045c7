use crate::activation::activation::softmax;

/// Categorical cross-entropy on one head position, computed from raw logits.
pub struct CrossEntropyLoss;

impl CrossEntropyLoss {
    /// Returns `(loss, ∂loss/∂logits)` for one position with class `target`.
    ///
    ///   L = −log softmax(z)[target]
    ///   ∂L/∂z = softmax(z) − onehot(target)
    pub fn segment(logits: &[f64], target: usize) -> (f64, Vec<f64>) {
        let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let log_sum = logits.iter().map(|&z| (z - max).exp()).sum::<f64>().ln();
        let loss = -(logits[target] - max - log_sum);

        let mut grad = softmax(logits);
        grad[target] -= 1.0;
        (loss, grad)
    }
}
