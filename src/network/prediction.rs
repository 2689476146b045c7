use serde::{Serialize, Deserialize};

/// Shape of the classification head: `max_len` positions, each scored over
/// `classes` logits. Class `0` is the blank/padding class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadLayout {
    pub max_len: usize,
    pub classes: usize,
}

impl HeadLayout {
    /// `num_classes` counts charset symbols; one blank class is added on top.
    pub fn new(max_len: usize, num_classes: usize) -> Self {
        HeadLayout { max_len, classes: num_classes + 1 }
    }

    pub fn output_size(&self) -> usize {
        self.max_len * self.classes
    }
}

/// Network output for a batch: one flat logit vector per sample.
#[derive(Debug, Clone)]
pub struct Prediction {
    pub logits: Vec<Vec<f64>>,
    pub layout: HeadLayout,
}

impl Prediction {
    pub fn len(&self) -> usize {
        self.logits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logits.is_empty()
    }

    /// Logits of one position of one sample.
    pub fn segment(&self, sample: usize, position: usize) -> &[f64] {
        let c = self.layout.classes;
        &self.logits[sample][position * c..(position + 1) * c]
    }

    /// Most likely class index at every position of `sample`.
    pub fn argmax(&self, sample: usize) -> Vec<usize> {
        (0..self.layout.max_len)
            .map(|pos| argmax(self.segment(sample, pos)))
            .collect()
    }
}

/// Index of the maximum element; `0` for an empty slice.
pub fn argmax(v: &[f64]) -> usize {
    v.iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0)
}
