use crate::network::prediction::Prediction;

/// Result of evaluating one loss over a batch.
#[derive(Debug, Clone)]
pub struct LossValue {
    /// Scalar loss, averaged over the batch.
    pub value: f64,
    /// ∂value/∂logits, one vector per sample (same shape as `Prediction::logits`).
    pub grad: Vec<Vec<f64>>,
}

impl LossValue {
    /// A loss that does not depend on the prediction.
    pub fn constant(value: f64, prediction: &Prediction) -> LossValue {
        LossValue {
            value,
            grad: prediction.logits.iter().map(|l| vec![0.0; l.len()]).collect(),
        }
    }
}

/// A named, weighted loss term.
///
/// `images` is passed through for losses that need the raw input; the
/// built-in kinds only look at the prediction and the encoded labels.
pub trait LossFn {
    /// Name the value is recorded under (`train/<tag>`, `val/<tag>`, ...).
    fn tag(&self) -> &str;

    /// Multiplier applied before summing into `total_loss`.
    fn weight(&self) -> f64;

    fn evaluate(&self, prediction: &Prediction, images: &[Vec<f64>], labels: &[Vec<usize>]) -> LossValue;
}
