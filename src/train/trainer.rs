use std::sync::atomic::Ordering;
use std::time::Instant;

use crate::data::loader::DataLoader;
use crate::error::{Error, Result};
use crate::logger::aggregator::{EpochAggregator, EpochMetrics};
use crate::logger::experiment::Experiment;
use crate::logger::record::StepLog;
use crate::optim::optimizer::Optimizer;
use crate::train::epoch_stats::EpochStats;
use crate::train::lifecycle::{Lifecycle, Stage};
use crate::train::module::{CaptchaModule, SchedulerSetup, SetupStage, StepContext};
use crate::train::train_config::TrainerConfig;

pub const LR_TAG: &str = "lr";

/// Drives a [`CaptchaModule`] through fit, validate and test runs.
///
/// The trainer owns the experiment sink, the global step counter and the
/// stage machine. The module owns everything model-specific.
pub struct Trainer<E: Experiment> {
    config: TrainerConfig,
    experiment: E,
    lifecycle: Lifecycle,
    aggregator: EpochAggregator,
    global_step: usize,
}

impl<E: Experiment> Trainer<E> {
    pub fn new(config: TrainerConfig, experiment: E) -> Self {
        Trainer {
            config,
            experiment,
            lifecycle: Lifecycle::default(),
            aggregator: EpochAggregator::new(),
            global_step: 0,
        }
    }

    pub fn stage(&self) -> Stage {
        self.lifecycle.stage()
    }

    pub fn global_step(&self) -> usize {
        self.global_step
    }

    pub fn experiment(&self) -> &E {
        &self.experiment
    }

    /// Returns to `Setup`. A run that failed midway leaves the stage where it
    /// stopped, so that case is reset instead of rejected.
    fn begin(&mut self) -> Result<()> {
        match self.lifecycle.stage() {
            Stage::Setup | Stage::Done => self.lifecycle.restart()?,
            stage => {
                log::warn!("Previous run aborted while {stage:?}; resetting");
                self.lifecycle = Lifecycle::default();
            }
        }
        self.aggregator.discard();
        Ok(())
    }

    fn record(&mut self, log: StepLog) -> Result<()> {
        self.aggregator.record(log, self.global_step, &mut self.experiment)
    }

    fn stop_requested(&self) -> bool {
        self.config.stop_flag.as_ref().is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Trains for `max_epochs`, validating after every epoch when `val` is
    /// given. Returns the per-epoch statistics of the completed epochs.
    ///
    /// # Errors
    /// Propagates step failures, experiment I/O errors and a missing monitored
    /// metric for plateau schedulers.
    pub fn fit(
        &mut self,
        module: &mut CaptchaModule,
        train: &DataLoader,
        val: Option<&DataLoader>,
    ) -> Result<Vec<EpochStats>> {
        if self.config.max_epochs == 0 {
            return Err(Error::Config("max_epochs must be at least 1".into()));
        }
        self.begin()?;
        module.setup(SetupStage::Fit);
        let setup = module.configure_optimizers();
        let mut optimizer = setup.optimizer;
        let mut lr_scheduler = setup.lr_scheduler;
        log::info!(
            "Fitting {} parameters with {} (lr {}){}",
            module.net().parameter_count(),
            optimizer.name(),
            optimizer.lr(),
            lr_scheduler.as_ref().map(|s| format!(", scheduler {}", s.scheduler.name())).unwrap_or_default(),
        );

        if let Some(val) = val {
            self.sanity_check(module, val)?;
        }
        module.on_train_start();

        let mut history = Vec::with_capacity(self.config.max_epochs);
        let mut best_saved: Option<f64> = None;
        self.lifecycle.enter(Stage::Training)?;

        for epoch in 0..self.config.max_epochs {
            if self.stop_requested() {
                log::info!("Stop requested; ending before epoch {}", epoch + 1);
                break;
            }
            self.lifecycle.enter(Stage::Training)?;
            let t_start = Instant::now();

            module.on_train_epoch_start();
            for (batch_idx, batch) in train.iter(epoch).enumerate() {
                let ctx = StepContext { batch_idx, global_step: self.global_step };
                let out = module.training_step(&batch, ctx)?;
                optimizer.step(module.net_mut(), &out.grads);
                self.record(out.log)?;
                self.global_step += 1;
            }
            let log = module.on_train_epoch_end();
            self.record(log)?;

            if let Some(val) = val {
                self.lifecycle.transition(Stage::Validating)?;
                self.validation_epoch(module, val)?;
            }

            let metrics = self.aggregator.flush(self.global_step, &mut self.experiment)?;
            log::info!("Epoch {}/{}  {}", epoch + 1, self.config.max_epochs, metrics.progress_line());

            if let Some(sched) = lr_scheduler.as_mut() {
                if (epoch + 1) % sched.frequency == 0 {
                    step_scheduler(sched, optimizer.as_mut(), &metrics)?;
                }
            }
            self.experiment.add_scalar(LR_TAG, optimizer.lr(), self.global_step)?;

            let best = module.best_val_accuracy();
            if let (Some(path), Some(best)) = (self.config.checkpoint_path.as_ref(), best) {
                if best_saved.map_or(true, |saved| best > saved) {
                    module.net().save_json(path)?;
                    log::info!("Saved checkpoint to {} (best val accuracy {best:.2}%)", path.display());
                    best_saved = Some(best);
                }
            }

            let (train_loss, train_accuracy) = module.train_summary();
            let (val_loss, val_accuracy) = module.val_summary();
            let stats = EpochStats {
                epoch: epoch + 1,
                total_epochs: self.config.max_epochs,
                global_step: self.global_step,
                train_loss: train_loss.unwrap_or(f64::NAN),
                val_loss: val.and(val_loss),
                train_accuracy,
                val_accuracy: val.and(val_accuracy),
                best_val_accuracy: best,
                lr: optimizer.lr(),
                elapsed_ms: t_start.elapsed().as_millis() as u64,
            };
            history.push(stats.clone());

            if let Some(ref tx) = self.config.progress_tx {
                // If the receiver has been dropped, stop training.
                if tx.send(stats).is_err() {
                    log::info!("Progress receiver dropped; stopping");
                    break;
                }
            }
        }

        self.lifecycle.transition(Stage::Done)?;
        self.experiment.flush()?;
        Ok(history)
    }

    /// Runs up to `sanity_val_steps` validation batches and throws the records
    /// away.
    fn sanity_check(&mut self, module: &mut CaptchaModule, val: &DataLoader) -> Result<()> {
        let steps = self.config.sanity_val_steps;
        if steps == 0 {
            return Ok(());
        }
        self.lifecycle.transition(Stage::Validating)?;
        module.on_validation_epoch_start();
        for (batch_idx, batch) in val.iter(0).take(steps).enumerate() {
            let ctx = StepContext { batch_idx, global_step: self.global_step };
            module.validation_step(&batch, ctx)?;
        }
        log::debug!("Sanity check passed on {} validation batches", steps.min(val.num_batches()));
        Ok(())
    }

    fn validation_epoch(&mut self, module: &mut CaptchaModule, val: &DataLoader) -> Result<()> {
        module.on_validation_epoch_start();
        for (batch_idx, batch) in val.iter(0).enumerate() {
            let ctx = StepContext { batch_idx, global_step: self.global_step };
            let log = module.validation_step(&batch, ctx)?;
            self.record(log)?;
        }
        let log = module.on_validation_epoch_end();
        self.record(log)
    }

    /// One validation epoch outside of `fit`.
    pub fn validate(&mut self, module: &mut CaptchaModule, val: &DataLoader) -> Result<EpochMetrics> {
        self.begin()?;
        module.setup(SetupStage::Validate);
        self.lifecycle.transition(Stage::Validating)?;
        self.validation_epoch(module, val)?;
        let metrics = self.aggregator.flush(self.global_step, &mut self.experiment)?;
        log::info!("Validation  {}", metrics.progress_line());
        self.lifecycle.transition(Stage::Done)?;
        Ok(metrics)
    }

    /// One test epoch. The returned metrics include `Test Dataset Accuracy`.
    ///
    /// # Errors
    /// Fails with [`Error::EmptyTestEpoch`] when the loader produced no samples.
    pub fn test(&mut self, module: &mut CaptchaModule, test: &DataLoader) -> Result<EpochMetrics> {
        self.begin()?;
        module.setup(SetupStage::Test);
        self.lifecycle.transition(Stage::Testing)?;
        module.on_test_epoch_start();
        for (batch_idx, batch) in test.iter(0).enumerate() {
            let ctx = StepContext { batch_idx, global_step: self.global_step };
            let log = module.test_step(&batch, ctx)?;
            self.record(log)?;
        }
        let log = module.on_test_epoch_end()?;
        self.record(log)?;
        let metrics = self.aggregator.flush(self.global_step, &mut self.experiment)?;
        log::info!("Test  {}", metrics.progress_line());
        if let (Some(loss), Some(acc)) = module.test_summary() {
            log::info!("Test mean loss {loss:.4}, per-character accuracy {:.2}%", acc * 100.0);
        }
        self.lifecycle.transition(Stage::Done)?;
        Ok(metrics)
    }
}

fn step_scheduler(sched: &mut SchedulerSetup, optimizer: &mut dyn Optimizer, metrics: &EpochMetrics) -> Result<()> {
    let monitored = metrics.get(&sched.monitor);
    if sched.scheduler.uses_monitor() && monitored.is_none() {
        return Err(Error::MissingMonitor(sched.monitor.clone()));
    }
    let before = optimizer.lr();
    sched.scheduler.step(optimizer, monitored);
    if optimizer.lr() != before {
        log::debug!("{} moved lr {before} -> {}", sched.scheduler.name(), optimizer.lr());
    }
    Ok(())
}
