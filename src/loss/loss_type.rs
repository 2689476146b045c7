use serde::{Serialize, Deserialize};

use crate::loss::cross_entropy::CrossEntropyLoss;
use crate::loss::huber::HuberLoss;
use crate::loss::loss_fn::{LossFn, LossValue};
use crate::loss::mae::MaeLoss;
use crate::loss::mse::MseLoss;
use crate::network::prediction::Prediction;

/// Built-in per-position losses.
///
/// - `CrossEntropy`: log-softmax cross-entropy on the logits.
/// - `Mse`         : squared error between softmax and one-hot target.
/// - `Mae`         : absolute error between softmax and one-hot target.
/// - `Huber`       : Huber loss (δ=1.0) between softmax and one-hot target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossKind {
    CrossEntropy,
    Mse,
    Mae,
    Huber,
}

impl LossKind {
    fn segment(self, logits: &[f64], target: usize) -> (f64, Vec<f64>) {
        match self {
            LossKind::CrossEntropy => CrossEntropyLoss::segment(logits, target),
            LossKind::Mse          => MseLoss::segment(logits, target),
            LossKind::Mae          => MaeLoss::segment(logits, target),
            LossKind::Huber        => HuberLoss::segment(logits, target),
        }
    }

    /// Mean over samples and positions, with the matching gradient.
    pub fn evaluate(self, prediction: &Prediction, labels: &[Vec<usize>]) -> LossValue {
        let layout = prediction.layout;
        let terms = (prediction.len() * layout.max_len).max(1) as f64;
        let mut value = 0.0;
        let mut grad = Vec::with_capacity(prediction.len());

        for (sample, label) in labels.iter().enumerate().take(prediction.len()) {
            let mut sample_grad = Vec::with_capacity(layout.output_size());
            for (pos, &target) in label.iter().enumerate().take(layout.max_len) {
                let (l, g) = self.segment(prediction.segment(sample, pos), target);
                value += l;
                sample_grad.extend(g.into_iter().map(|x| x / terms));
            }
            grad.push(sample_grad);
        }

        LossValue { value: value / terms, grad }
    }
}

/// A configured loss term: `{tag, weight, kind}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedLoss {
    pub tag: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    pub kind: LossKind,
}

fn default_weight() -> f64 {
    1.0
}

impl WeightedLoss {
    pub fn new(tag: impl Into<String>, weight: f64, kind: LossKind) -> Self {
        WeightedLoss { tag: tag.into(), weight, kind }
    }
}

impl LossFn for WeightedLoss {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn evaluate(&self, prediction: &Prediction, _images: &[Vec<f64>], labels: &[Vec<usize>]) -> LossValue {
        self.kind.evaluate(prediction, labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::prediction::HeadLayout;
    use approx::assert_abs_diff_eq;

    fn prediction() -> Prediction {
        Prediction {
            logits: vec![
                vec![0.3, -1.2, 2.0, 0.5, 0.1, -0.4],
                vec![1.5, 0.2, -0.3, -0.8, 0.9, 0.0],
            ],
            layout: HeadLayout::new(2, 2),
        }
    }

    #[test]
    fn test_cross_entropy_of_uniform_logits_is_ln_classes() {
        let p = Prediction { logits: vec![vec![0.0; 6]], layout: HeadLayout::new(2, 2) };
        let v = LossKind::CrossEntropy.evaluate(&p, &[vec![1, 2]]);
        assert_abs_diff_eq!(v.value, 3.0_f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_gradients_match_finite_differences() {
        let labels = vec![vec![2, 0], vec![1, 1]];
        let h = 1e-6;
        for kind in [LossKind::CrossEntropy, LossKind::Mse, LossKind::Mae, LossKind::Huber] {
            let base = prediction();
            let analytic = kind.evaluate(&base, &labels).grad;
            for (s, i) in [(0, 0), (0, 4), (1, 2), (1, 5)] {
                let mut up = base.clone();
                up.logits[s][i] += h;
                let mut down = base.clone();
                down.logits[s][i] -= h;
                let numeric = (kind.evaluate(&up, &labels).value
                    - kind.evaluate(&down, &labels).value) / (2.0 * h);
                assert_abs_diff_eq!(analytic[s][i], numeric, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_weighted_loss_deserializes_with_default_weight() {
        let loss: WeightedLoss = serde_json::from_str(r#"{"tag":"ce","kind":"cross_entropy"}"#).unwrap();
        assert_eq!(loss.tag(), "ce");
        assert_eq!(loss.weight(), 1.0);
        assert_eq!(loss.kind, LossKind::CrossEntropy);
    }
}
