/// Running (optionally weighted) mean of scalar values.
#[derive(Debug, Clone, Default)]
pub struct MeanMetric {
    sum: f64,
    weight: f64,
}

impl MeanMetric {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, value: f64) {
        self.update_weighted(value, 1.0);
    }

    pub fn update_weighted(&mut self, value: f64, weight: f64) {
        self.sum += value * weight;
        self.weight += weight;
    }

    /// `None` until at least one value was recorded.
    pub fn compute(&self) -> Option<f64> {
        (self.weight > 0.0).then(|| self.sum / self.weight)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weighted_mean_and_reset() {
        let mut m = MeanMetric::new();
        assert_eq!(m.compute(), None);
        m.update_weighted(1.0, 3.0);
        m.update(5.0);
        assert_eq!(m.compute(), Some(2.0));
        m.reset();
        assert_eq!(m.compute(), None);
    }
}
