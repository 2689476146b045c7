//! Metric records, epoch aggregation and experiment sinks.

pub mod aggregator;
pub mod experiment;
pub mod record;

pub use aggregator::{EpochAggregator, EpochMetrics};
pub use experiment::{Experiment, MemoryExperiment, RunDirectory, ScalarEntry};
pub use record::{Cadence, ExperimentEvent, MetricRecord, RunStage, StepLog};
