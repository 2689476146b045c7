use crate::network::prediction::Prediction;

/// Multiclass accuracy over every head position (micro average).
///
/// Counts a position as correct when its argmax class equals the encoded
/// label, blanks included, so the value measures per-character accuracy
/// rather than whole-captcha accuracy.
#[derive(Debug, Clone)]
pub struct Accuracy {
    num_classes: usize,
    correct: usize,
    total: usize,
}

impl Accuracy {
    pub fn new(num_classes: usize) -> Self {
        Accuracy { num_classes, correct: 0, total: 0 }
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn update(&mut self, prediction: &Prediction, labels: &[Vec<usize>]) {
        for (sample, label) in labels.iter().enumerate().take(prediction.len()) {
            let predicted = prediction.argmax(sample);
            for (p, t) in predicted.iter().zip(label) {
                if *t < self.num_classes {
                    self.total += 1;
                    if p == t {
                        self.correct += 1;
                    }
                }
            }
        }
    }

    /// Fraction in [0, 1]; `None` before any update.
    pub fn compute(&self) -> Option<f64> {
        (self.total > 0).then(|| self.correct as f64 / self.total as f64)
    }

    pub fn reset(&mut self) {
        self.correct = 0;
        self.total = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::prediction::HeadLayout;

    #[test]
    fn test_counts_positions_not_samples() {
        // Two positions, three classes. Argmax: sample 0 -> [2, 0], sample 1 -> [1, 1].
        let prediction = Prediction {
            logits: vec![
                vec![0.0, 0.1, 0.9, 0.8, 0.1, 0.1],
                vec![0.0, 0.7, 0.3, 0.2, 0.6, 0.2],
            ],
            layout: HeadLayout::new(2, 2),
        };
        let mut acc = Accuracy::new(3);
        acc.update(&prediction, &[vec![2, 0], vec![1, 2]]);
        assert_eq!(acc.compute(), Some(0.75));
        acc.reset();
        assert_eq!(acc.compute(), None);
    }
}
