use crate::error::Result;
use crate::logger::experiment::Experiment;
use crate::logger::record::{ExperimentEvent, StepLog};
use crate::metrics::mean::MeanMetric;

/// Epoch means of everything logged with `on_epoch`, in first-logged order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpochMetrics {
    /// `(name, mean, prog_bar)`
    pub values: Vec<(String, f64, bool)>,
}

impl EpochMetrics {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.iter().find(|(n, _, _)| n == name).map(|(_, v, _)| *v)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `name=value` pairs of the progress-bar metrics, for console output.
    pub fn progress_line(&self) -> String {
        self.values.iter()
            .filter(|(_, _, prog_bar)| *prog_bar)
            .map(|(n, v, _)| format!("{n}={v:.4}"))
            .collect::<Vec<_>>()
            .join("  ")
    }
}

/// Routes `StepLog`s to the experiment and averages epoch-cadence metrics.
///
/// A metric logged with both cadences is written as `<name>_step` every step
/// and `<name>_epoch` at epoch end.
#[derive(Debug, Default)]
pub struct EpochAggregator {
    pending: Vec<(String, MeanMetric, bool)>,
}

impl EpochAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, log: StepLog, global_step: usize, experiment: &mut dyn Experiment) -> Result<()> {
        for record in log.metrics {
            let both = record.cadence.on_step && record.cadence.on_epoch;
            if record.cadence.on_step {
                let tag = if both { format!("{}_step", record.name) } else { record.name.clone() };
                experiment.add_scalar(&tag, record.value, global_step)?;
            }
            if record.cadence.on_epoch {
                let name = if both { format!("{}_epoch", record.name) } else { record.name };
                let weight = record.batch_size.max(1) as f64;
                match self.pending.iter_mut().find(|(n, _, _)| *n == name) {
                    Some((_, mean, prog_bar)) => {
                        mean.update_weighted(record.value, weight);
                        *prog_bar |= record.prog_bar;
                    }
                    None => {
                        let mut mean = MeanMetric::new();
                        mean.update_weighted(record.value, weight);
                        self.pending.push((name, mean, record.prog_bar));
                    }
                }
            }
        }

        for event in log.events {
            match event {
                ExperimentEvent::Scalar { tag, value, step } => experiment.add_scalar(&tag, value, step)?,
                ExperimentEvent::Figure { tag, figure, step } => experiment.add_figure(&tag, &figure, step)?,
            }
        }
        Ok(())
    }

    /// Writes the epoch means to the experiment and starts a new epoch.
    pub fn flush(&mut self, global_step: usize, experiment: &mut dyn Experiment) -> Result<EpochMetrics> {
        let mut metrics = EpochMetrics::default();
        for (name, mean, prog_bar) in self.pending.drain(..) {
            if let Some(value) = mean.compute() {
                experiment.add_scalar(&name, value, global_step)?;
                metrics.values.push((name, value, prog_bar));
            }
        }
        experiment.flush()?;
        Ok(metrics)
    }

    /// Drops pending values without writing them (sanity checks).
    pub fn discard(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::experiment::MemoryExperiment;
    use crate::logger::record::Cadence;

    #[test]
    fn test_epoch_mean_is_weighted_by_batch_size() {
        let mut agg = EpochAggregator::new();
        let mut exp = MemoryExperiment::default();

        let mut a = StepLog::default();
        a.log("val/total_loss", 1.0, Cadence::EPOCH, true, 30);
        agg.record(a, 0, &mut exp).unwrap();
        let mut b = StepLog::default();
        b.log("val/total_loss", 3.0, Cadence::EPOCH, true, 10);
        agg.record(b, 0, &mut exp).unwrap();

        assert!(exp.scalars.is_empty());
        let metrics = agg.flush(7, &mut exp).unwrap();
        assert_eq!(metrics.get("val/total_loss"), Some(1.5));
        assert_eq!(exp.values("val/total_loss"), vec![1.5]);
        assert_eq!(exp.scalars[0].step, 7);
        assert!(agg.flush(8, &mut exp).unwrap().is_empty());
    }

    #[test]
    fn test_step_and_epoch_cadence_get_suffixes() {
        let mut agg = EpochAggregator::new();
        let mut exp = MemoryExperiment::default();
        let mut log = StepLog::default();
        log.log("train/total_loss", 2.0, Cadence { on_step: true, on_epoch: true }, false, 1);
        log.log("lr", 0.1, Cadence::STEP, false, 1);
        agg.record(log, 4, &mut exp).unwrap();

        assert_eq!(exp.values("train/total_loss_step"), vec![2.0]);
        assert_eq!(exp.values("lr"), vec![0.1]);
        let metrics = agg.flush(4, &mut exp).unwrap();
        assert_eq!(metrics.get("train/total_loss_epoch"), Some(2.0));
        assert_eq!(metrics.progress_line(), "");
    }
}
