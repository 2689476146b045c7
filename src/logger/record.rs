use serde::{Serialize, Deserialize};

use crate::visualize::visualizer::Figure;

/// Which evaluation loop a step belongs to; determines the metric prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStage {
    Train,
    Val,
    Test,
}

impl RunStage {
    pub fn prefix(self) -> &'static str {
        match self {
            RunStage::Train => "train",
            RunStage::Val => "val",
            RunStage::Test => "test",
        }
    }

    /// `train/<name>`, `val/<name>`, `test/<name>`.
    pub fn metric(self, name: &str) -> String {
        format!("{}/{}", self.prefix(), name)
    }
}

/// When a logged value reaches the experiment.
///
/// `on_step` forwards it immediately at the current global step; `on_epoch`
/// averages it over the epoch and forwards the mean when the epoch ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub on_step: bool,
    pub on_epoch: bool,
}

impl Cadence {
    pub const EPOCH: Cadence = Cadence { on_step: false, on_epoch: true };
    pub const STEP: Cadence = Cadence { on_step: true, on_epoch: false };
}

/// A named scalar logged by the module.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    pub name: String,
    pub value: f64,
    pub cadence: Cadence,
    /// Shown in the console summary at epoch end.
    pub prog_bar: bool,
    /// Weight of this value in the epoch mean.
    pub batch_size: usize,
}

/// Something written straight to the experiment, bypassing aggregation.
#[derive(Debug, Clone)]
pub enum ExperimentEvent {
    Scalar { tag: String, value: f64, step: usize },
    Figure { tag: String, figure: Figure, step: usize },
}

/// Everything a lifecycle hook asked to log.
#[derive(Debug, Clone, Default)]
pub struct StepLog {
    pub metrics: Vec<MetricRecord>,
    pub events: Vec<ExperimentEvent>,
}

impl StepLog {
    pub fn log(&mut self, name: impl Into<String>, value: f64, cadence: Cadence, prog_bar: bool, batch_size: usize) {
        self.metrics.push(MetricRecord { name: name.into(), value, cadence, prog_bar, batch_size });
    }

    pub fn metric(&self, name: &str) -> Option<&MetricRecord> {
        self.metrics.iter().find(|m| m.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty() && self.events.is_empty()
    }
}
