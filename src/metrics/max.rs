/// Largest value seen since the last reset.
#[derive(Debug, Clone, Default)]
pub struct MaxMetric {
    max: Option<f64>,
}

impl MaxMetric {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when `value` is a new maximum.
    pub fn update(&mut self, value: f64) -> bool {
        match self.max {
            Some(m) if m >= value => false,
            _ => {
                self.max = Some(value);
                true
            }
        }
    }

    pub fn compute(&self) -> Option<f64> {
        self.max
    }

    pub fn reset(&mut self) {
        self.max = None;
    }
}
